use anyhow::Result;
use chrono::Local;
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{error, info};

use stock_metrics::api::FinMindClient;
use stock_metrics::cache::CacheStore;
use stock_metrics::data_collector::{read_instrument_list, CollectOptions, DataCollector};
use stock_metrics::logging::init_logging;
use stock_metrics::models::Config;
use stock_metrics::report::{CsvReportSink, ReportSink};
use stock_metrics::utils::resolve_as_of;

/// Monthly revenue, income statement and EPS sheets for a list of instruments
#[derive(Parser)]
#[command(name = "stock-metrics")]
#[command(version)]
#[command(about = "Build revenue, income-statement and EPS reports for a list of Taiwan-listed instruments")]
#[command(long_about = "
Reads instrument ids from a CSV file, refreshes each instrument's monthly revenue
and quarterly financial statements from FinMind (skipping instruments whose local
cache already holds the latest completed period), and writes three CSV sheets:
月營收.csv, 綜合損益表.csv and EPS.csv.

Examples:
  stock-metrics --input target.csv --output-dir output
  stock-metrics --no-cache --concurrency 4
  stock-metrics --as-of 2025-09-15
")]
struct Args {
    /// CSV file listing instruments (column 代號 or stock_id, else the first column)
    #[arg(long, short = 'i', default_value = "target.csv")]
    input: PathBuf,

    /// Directory the report CSV files are written to
    #[arg(long, short = 'o', default_value = "output")]
    output_dir: PathBuf,

    /// Ignore the local cache and fetch everything
    #[arg(long)]
    no_cache: bool,

    /// Number of instruments processed at once (overrides CONCURRENCY)
    #[arg(long, short = 'c')]
    concurrency: Option<usize>,

    /// Reference date in YYYY-MM-DD format, defaults to today
    #[arg(long)]
    as_of: Option<String>,
}

#[tokio::main]
async fn main() {
    let args = Args::parse();

    if let Err(e) = run(args).await {
        error!("Fatal: {:#}", e);
        eprintln!("❌ {:#}", e);
        std::process::exit(1);
    }
}

async fn run(args: Args) -> Result<()> {
    let mut config = Config::from_env()?;
    if let Some(concurrency) = args.concurrency {
        config.concurrency = concurrency;
        config.validate()?;
    }

    let now = resolve_as_of(args.as_of.as_deref())?;
    let log_path = init_logging(&config.logs_dir, Local::now().date_naive())?;

    info!("{}", "=".repeat(60));
    info!("🚀 Starting stock metrics batch (as of {})", now);
    info!("Input: {}", args.input.display());
    info!("Log file: {}", log_path.display());

    let instruments = read_instrument_list(&args.input)?;

    let provider = Arc::new(FinMindClient::new(&config)?);
    let collector = DataCollector::new(
        provider,
        CacheStore::with_data_dir(&config.data_dir),
        CollectOptions::from_config(&config, !args.no_cache),
    );

    let (report, _summary) = collector.run_batch(&instruments, now).await;

    let sink = CsvReportSink::new(&args.output_dir);
    for table in report.tables() {
        sink.write_table(table)?;
    }

    info!("✅ Reports written to {}", args.output_dir.display());
    Ok(())
}

use anyhow::{anyhow, Result};
use chrono::Local;
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{error, info, warn};

use stock_metrics::analysis::{StockAnalysis, MAX_YEARS};
use stock_metrics::api::FinMindClient;
use stock_metrics::cache::CacheStore;
use stock_metrics::data_collector::{CollectOptions, DataCollector};
use stock_metrics::logging::init_logging;
use stock_metrics::models::{Config, SeriesKind};
use stock_metrics::report::{CsvReportSink, ReportSink};
use stock_metrics::utils::resolve_as_of;

/// Single-instrument revenue and income-statement analysis
#[derive(Parser)]
#[command(name = "analyze-stock")]
#[command(version)]
#[command(about = "Compare one instrument's monthly revenue across years and summarise its income statement")]
#[command(long_about = "
Writes two CSV files for the instrument: a month-by-year revenue grid with MoM and
YoY, and an income statement summary over the latest four completed quarters,
this year to date and the whole prior year.

Examples:
  analyze-stock 2330
  analyze-stock 2330 --years 5 --no-cache
")]
struct Args {
    /// Instrument id, e.g. 2330
    stock_id: String,

    /// Number of calendar years in the revenue grid, current year included
    #[arg(
        long,
        short = 'y',
        default_value_t = 3,
        value_parser = clap::value_parser!(u32).range(1..=i64::from(MAX_YEARS))
    )]
    years: u32,

    /// Ignore the local cache and fetch everything (the cache is refreshed)
    #[arg(long)]
    no_cache: bool,

    /// Directory the analysis CSV files are written to
    #[arg(long, short = 'o', default_value = "output")]
    output_dir: PathBuf,

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
    let config = Config::from_env()?;
    let now = resolve_as_of(args.as_of.as_deref())?;
    init_logging(&config.logs_dir, Local::now().date_naive())?;

    info!("{}", "=".repeat(60));
    info!("🔍 Analyzing {} (as of {}, {} years)", args.stock_id, now, args.years);

    let mut options = CollectOptions::from_config(&config, !args.no_cache);
    options.lookback_years = options.lookback_years.max(args.years);

    let collector = DataCollector::new(
        Arc::new(FinMindClient::new(&config)?),
        CacheStore::with_data_dir(&config.data_dir),
        options,
    );

    let names = collector.instrument_names().await;
    let name = names.get(&args.stock_id).cloned().unwrap_or_default();
    info!("Name: {}", if name.is_empty() { "未知" } else { name.as_str() });

    let (revenue, _) = collector
        .get_series(&args.stock_id, SeriesKind::MonthlyRevenue, now)
        .await;
    let revenue = revenue.ok_or_else(|| anyhow!("No monthly revenue available for {}", args.stock_id))?;

    let (statement, _) = collector
        .get_series(&args.stock_id, SeriesKind::FinancialStatement, now)
        .await;
    if statement.is_none() {
        warn!("No financial statement available for {}, writing revenue only", args.stock_id);
    }

    let analysis = StockAnalysis::build(
        &args.stock_id,
        &name,
        Some(&revenue),
        statement.as_ref(),
        now,
        args.years,
    );

    let sink = CsvReportSink::new(&args.output_dir);
    for table in analysis.tables() {
        sink.write_table(table)?;
    }

    info!("✅ Analysis for {} written to {}", args.stock_id, args.output_dir.display());
    Ok(())
}

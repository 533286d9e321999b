use anyhow::{Context, Result};
use chrono::{Months, NaiveDate};
use futures::stream::{self, StreamExt};
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

use crate::api::{fetch_series, DataProvider};
use crate::cache::{series_is_fresh, CacheStore};
use crate::models::{CachedSeries, Config, SeriesKind};
use crate::report::BatchReport;

/// Knobs for one collection run
#[derive(Debug, Clone)]
pub struct CollectOptions {
    pub use_cache: bool,
    pub lookback_years: u32,
    pub concurrency: usize,
}

impl CollectOptions {
    pub fn from_config(config: &Config, use_cache: bool) -> Self {
        Self {
            use_cache,
            lookback_years: config.lookback_years,
            concurrency: config.concurrency.max(1),
        }
    }
}

/// Where a series came from this run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SeriesOutcome {
    CacheHit,
    Fetched,
    Empty,
    Failed,
}

/// Both series for one instrument, either of which may be missing
#[derive(Debug, Clone)]
pub struct InstrumentSeries {
    pub instrument_id: String,
    pub revenue: Option<CachedSeries>,
    pub revenue_outcome: SeriesOutcome,
    pub statement: Option<CachedSeries>,
    pub statement_outcome: SeriesOutcome,
}

/// Counts per series, so an instrument contributes two entries
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BatchSummary {
    pub instruments: usize,
    pub cache_hits: usize,
    pub fetched: usize,
    pub empty: usize,
    pub failures: usize,
}

impl BatchSummary {
    fn record(&mut self, outcome: SeriesOutcome) {
        match outcome {
            SeriesOutcome::CacheHit => self.cache_hits += 1,
            SeriesOutcome::Fetched => self.fetched += 1,
            SeriesOutcome::Empty => self.empty += 1,
            SeriesOutcome::Failed => self.failures += 1,
        }
    }
}

/// Earliest date requested from the provider
pub fn lookback_start(now: NaiveDate, lookback_years: u32) -> NaiveDate {
    now.checked_sub_months(Months::new(lookback_years.saturating_mul(12)))
        .unwrap_or(NaiveDate::MIN)
}

/// Cache-aware collection of instrument series
pub struct DataCollector {
    provider: Arc<dyn DataProvider>,
    cache: CacheStore,
    options: CollectOptions,
}

impl DataCollector {
    pub fn new(provider: Arc<dyn DataProvider>, cache: CacheStore, options: CollectOptions) -> Self {
        Self {
            provider,
            cache,
            options,
        }
    }

    /// Cached series when it already holds the latest completed period, else a fresh fetch
    pub async fn get_series(
        &self,
        instrument_id: &str,
        kind: SeriesKind,
        now: NaiveDate,
    ) -> (Option<CachedSeries>, SeriesOutcome) {
        if self.options.use_cache {
            if let Some(series) = self.cache.load(instrument_id, kind) {
                if series_is_fresh(&series, now) {
                    debug!("Cache hit for {} {}", instrument_id, kind);
                    return (Some(series), SeriesOutcome::CacheHit);
                }
                debug!("Cached {} for {} is stale", kind, instrument_id);
            }
        }

        let start = lookback_start(now, self.options.lookback_years);
        let records = match fetch_series(self.provider.as_ref(), instrument_id, kind, start).await {
            Ok(records) => records,
            Err(e) => {
                error!("❌ {}: failed to fetch {} - {}", instrument_id, kind, e);
                return (None, SeriesOutcome::Failed);
            }
        };

        if records.is_empty() {
            warn!("⚠️ {}: provider returned no {} data", instrument_id, kind);
            return (None, SeriesOutcome::Empty);
        }

        let series = match CachedSeries::new(kind, records) {
            Ok(series) => series,
            Err(e) => {
                error!("❌ {}: invalid {} data - {}", instrument_id, kind, e);
                return (None, SeriesOutcome::Failed);
            }
        };

        if let Err(e) = self.cache.save(instrument_id, &series) {
            warn!("Failed to cache {} for {}: {}", kind, instrument_id, e);
        }

        (Some(series), SeriesOutcome::Fetched)
    }

    /// Both series for one instrument. The statement series is fetched once and
    /// serves the income-statement and EPS sheets alike.
    pub async fn collect_instrument(&self, instrument_id: &str, now: NaiveDate) -> InstrumentSeries {
        let (revenue, revenue_outcome) = self
            .get_series(instrument_id, SeriesKind::MonthlyRevenue, now)
            .await;
        let (statement, statement_outcome) = self
            .get_series(instrument_id, SeriesKind::FinancialStatement, now)
            .await;

        InstrumentSeries {
            instrument_id: instrument_id.to_string(),
            revenue,
            revenue_outcome,
            statement,
            statement_outcome,
        }
    }

    /// Instrument names from the local cache, falling back to the provider.
    /// Any failure yields an empty map so names are simply left blank.
    pub async fn instrument_names(&self) -> HashMap<String, String> {
        if self.options.use_cache {
            if let Some(names) = self.cache.load_instrument_names() {
                return names;
            }
        }

        match self.provider.fetch_instrument_names().await {
            Ok(names) if names.is_empty() => {
                warn!("Provider returned no instrument names");
                names
            }
            Ok(names) => {
                if let Err(e) = self.cache.save_instrument_names(&names) {
                    warn!("Failed to cache instrument names: {}", e);
                }
                names
            }
            Err(e) => {
                warn!("Failed to fetch instrument names, leaving them blank: {}", e);
                HashMap::new()
            }
        }
    }

    /// Collect every instrument and build the three batch sheets.
    ///
    /// Rows keep the input order whatever the concurrency.
    pub async fn run_batch(&self, instruments: &[String], now: NaiveDate) -> (BatchReport, BatchSummary) {
        let total = instruments.len();
        info!(
            "📊 Processing {} instruments (concurrency {}, cache {})",
            total,
            self.options.concurrency,
            if self.options.use_cache { "on" } else { "off" }
        );

        let names = self.instrument_names().await;

        let collected: Vec<InstrumentSeries> = stream::iter(instruments.iter().enumerate())
            .map(|(index, instrument_id)| async move {
                info!("[{}/{}] Processing {}", index + 1, total, instrument_id);
                self.collect_instrument(instrument_id, now).await
            })
            .buffered(self.options.concurrency.max(1))
            .collect()
            .await;

        let mut report = BatchReport::new(now);
        let mut summary = BatchSummary {
            instruments: total,
            ..BatchSummary::default()
        };

        for item in &collected {
            summary.record(item.revenue_outcome);
            summary.record(item.statement_outcome);

            let name = names.get(&item.instrument_id).map(String::as_str).unwrap_or("");
            report.push_instrument(
                &item.instrument_id,
                name,
                item.revenue.as_ref(),
                item.statement.as_ref(),
                now,
            );
        }

        info!(
            "✅ Batch completed: {} instruments, {} cache hits, {} fetched, {} empty, {} failed",
            summary.instruments, summary.cache_hits, summary.fetched, summary.empty, summary.failures
        );
        (report, summary)
    }
}

/// Read instrument ids from a CSV file.
///
/// Uses the `代號` or `stock_id` column when present, otherwise the first
/// column. Blank cells are skipped.
pub fn read_instrument_list(path: &Path) -> Result<Vec<String>> {
    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .from_path(path)
        .with_context(|| format!("Failed to open instrument list {}", path.display()))?;

    let headers = reader.headers()?.clone();
    let column = headers
        .iter()
        .position(|h| {
            let h = h.trim().trim_start_matches('\u{feff}');
            h == "代號" || h == "stock_id"
        })
        .unwrap_or(0);

    let mut instruments = Vec::new();
    for record in reader.records() {
        let record = record.with_context(|| format!("Malformed row in {}", path.display()))?;
        if let Some(cell) = record.get(column) {
            let id = cell.trim();
            if !id.is_empty() {
                instruments.push(id.to_string());
            }
        }
    }

    info!("📋 Loaded {} instruments from {}", instruments.len(), path.display());
    Ok(instruments)
}

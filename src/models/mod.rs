use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use thiserror::Error;
use tracing::warn;

use crate::period::FiscalPeriod;

// ============================================================================
// Series Models
// ============================================================================

/// The two persisted series an instrument can have
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SeriesKind {
    MonthlyRevenue,
    FinancialStatement,
}

impl SeriesKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            SeriesKind::MonthlyRevenue => "monthly_revenue",
            SeriesKind::FinancialStatement => "financial_statement",
        }
    }

    /// Whether a period has the granularity this kind stores
    pub fn accepts(&self, period: &FiscalPeriod) -> bool {
        match self {
            SeriesKind::MonthlyRevenue => period.is_month(),
            SeriesKind::FinancialStatement => period.is_quarter(),
        }
    }
}

impl fmt::Display for SeriesKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Line item name. Unknown provider types are kept verbatim.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum MetricKind {
    Revenue,
    GrossProfit,
    OperatingIncome,
    PreTaxIncome,
    IncomeAfterTaxes,
    Eps,
    Other(String),
}

impl MetricKind {
    pub fn as_str(&self) -> &str {
        match self {
            MetricKind::Revenue => "Revenue",
            MetricKind::GrossProfit => "GrossProfit",
            MetricKind::OperatingIncome => "OperatingIncome",
            MetricKind::PreTaxIncome => "PreTaxIncome",
            MetricKind::IncomeAfterTaxes => "IncomeAfterTaxes",
            MetricKind::Eps => "EPS",
            MetricKind::Other(name) => name,
        }
    }
}

impl From<&str> for MetricKind {
    fn from(name: &str) -> Self {
        match name {
            "Revenue" => MetricKind::Revenue,
            "GrossProfit" => MetricKind::GrossProfit,
            "OperatingIncome" => MetricKind::OperatingIncome,
            "PreTaxIncome" => MetricKind::PreTaxIncome,
            "IncomeAfterTaxes" => MetricKind::IncomeAfterTaxes,
            "EPS" => MetricKind::Eps,
            other => MetricKind::Other(other.to_string()),
        }
    }
}

impl From<String> for MetricKind {
    fn from(name: String) -> Self {
        MetricKind::from(name.as_str())
    }
}

impl From<MetricKind> for String {
    fn from(kind: MetricKind) -> Self {
        kind.as_str().to_string()
    }
}

impl fmt::Display for MetricKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One point-in-time value of one line item
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SeriesRecord {
    pub period: FiscalPeriod,
    pub metric_kind: MetricKind,
    pub value: f64,
}

impl SeriesRecord {
    pub fn new(period: impl Into<FiscalPeriod>, metric_kind: MetricKind, value: f64) -> Self {
        Self {
            period: period.into(),
            metric_kind,
            value,
        }
    }
}

#[derive(Debug, Clone, Error, PartialEq)]
pub enum SeriesError {
    #[error("{kind} series contains a record for period {period} of the wrong granularity")]
    GranularityMismatch {
        kind: SeriesKind,
        period: FiscalPeriod,
    },

    #[error("{kind} series contains a non-finite value for {metric} at {period}")]
    NonFiniteValue {
        kind: SeriesKind,
        metric: MetricKind,
        period: FiscalPeriod,
    },
}

/// Every record stored for one `(instrument, kind)` pair
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawCachedSeries")]
pub struct CachedSeries {
    kind: SeriesKind,
    records: Vec<SeriesRecord>,
}

#[derive(Deserialize)]
struct RawCachedSeries {
    kind: SeriesKind,
    records: Vec<SeriesRecord>,
}

impl TryFrom<RawCachedSeries> for CachedSeries {
    type Error = SeriesError;

    fn try_from(raw: RawCachedSeries) -> Result<Self, Self::Error> {
        CachedSeries::new(raw.kind, raw.records)
    }
}

impl CachedSeries {
    /// Build a series, rejecting records whose granularity disagrees with `kind`.
    ///
    /// Duplicate `(period, metric_kind)` pairs are kept; lookups resolve them
    /// to the last occurrence.
    pub fn new(kind: SeriesKind, records: Vec<SeriesRecord>) -> Result<Self, SeriesError> {
        let mut seen = HashSet::new();
        let mut duplicates = 0usize;

        for record in &records {
            if !kind.accepts(&record.period) {
                return Err(SeriesError::GranularityMismatch {
                    kind,
                    period: record.period,
                });
            }
            if !record.value.is_finite() {
                return Err(SeriesError::NonFiniteValue {
                    kind,
                    metric: record.metric_kind.clone(),
                    period: record.period,
                });
            }
            if !seen.insert((record.period, &record.metric_kind)) {
                duplicates += 1;
            }
        }

        if duplicates > 0 {
            warn!(
                "{} series has {} duplicate (period, metric) records; last occurrence wins",
                kind, duplicates
            );
        }

        Ok(Self { kind, records })
    }

    pub fn kind(&self) -> SeriesKind {
        self.kind
    }

    pub fn records(&self) -> &[SeriesRecord] {
        &self.records
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }
}

// ============================================================================
// Configuration
// ============================================================================

pub const DEFAULT_FINMIND_API_URL: &str = "https://api.finmindtrade.com/api/v4/data";

/// Configuration for the application
#[derive(Debug, Clone)]
pub struct Config {
    pub data_dir: PathBuf,
    pub logs_dir: PathBuf,
    pub finmind_api_url: String,
    pub rate_limit_per_minute: u32,
    pub lookback_years: u32,
    pub concurrency: usize,
    pub request_timeout_secs: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("data"),
            logs_dir: PathBuf::from("logs"),
            finmind_api_url: DEFAULT_FINMIND_API_URL.to_string(),
            rate_limit_per_minute: 30,
            lookback_years: 2,
            concurrency: 1,
            request_timeout_secs: 30,
        }
    }
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok(); // Load .env file if it exists

        let defaults = Config::default();
        let config = Config {
            data_dir: std::env::var("DATA_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.data_dir),
            logs_dir: std::env::var("LOGS_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.logs_dir),
            finmind_api_url: std::env::var("FINMIND_API_URL")
                .unwrap_or(defaults.finmind_api_url),
            rate_limit_per_minute: env_or("RATE_LIMIT_PER_MINUTE", defaults.rate_limit_per_minute),
            lookback_years: env_or("LOOKBACK_YEARS", defaults.lookback_years),
            concurrency: env_or("CONCURRENCY", defaults.concurrency),
            request_timeout_secs: env_or("REQUEST_TIMEOUT_SECS", defaults.request_timeout_secs),
        };

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        if self.rate_limit_per_minute == 0 {
            anyhow::bail!("RATE_LIMIT_PER_MINUTE must be greater than zero");
        }
        if self.concurrency == 0 {
            anyhow::bail!("CONCURRENCY must be greater than zero");
        }
        url::Url::parse(&self.finmind_api_url)
            .map_err(|e| anyhow::anyhow!("FINMIND_API_URL is not a valid URL: {}", e))?;
        Ok(())
    }
}

fn env_or<T: FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|raw| raw.trim().parse().ok())
        .unwrap_or(default)
}

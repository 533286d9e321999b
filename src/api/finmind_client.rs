use async_trait::async_trait;
use chrono::NaiveDate;
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::Value;
use std::collections::HashMap;
use std::time::Duration;
use tracing::{debug, warn};
use url::Url;

use super::{ApiRateLimiter, DataProvider, ProviderError};
use crate::models::{Config, MetricKind, SeriesRecord};
use crate::period::{FiscalPeriod, Quarter, YearMonth};

pub const MONTH_REVENUE_DATASET: &str = "TaiwanStockMonthRevenue";
pub const FINANCIAL_STATEMENTS_DATASET: &str = "TaiwanStockFinancialStatements";
pub const STOCK_INFO_DATASET: &str = "TaiwanStockInfo";

/// Response envelope shared by every FinMind dataset
#[derive(Debug, Deserialize)]
struct Envelope {
    #[serde(default)]
    msg: String,
    status: i64,
    #[serde(default)]
    data: Vec<Value>,
}

#[derive(Debug, Deserialize)]
struct MonthRevenueRow {
    revenue_year: i32,
    revenue_month: u32,
    revenue: f64,
}

#[derive(Debug, Deserialize)]
struct StatementRow {
    date: String,
    #[serde(rename = "type")]
    kind: String,
    value: f64,
}

#[derive(Debug, Deserialize)]
struct StockInfoRow {
    stock_id: String,
    #[serde(default)]
    stock_name: String,
}

/// FinMind open-data API client
pub struct FinMindClient {
    client: Client,
    base_url: Url,
    rate_limiter: ApiRateLimiter,
}

impl FinMindClient {
    /// Create a new FinMind client
    pub fn new(config: &Config) -> Result<Self, ProviderError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .user_agent("stock-metrics/0.1")
            .build()?;

        Ok(Self {
            client,
            base_url: Url::parse(&config.finmind_api_url)?,
            rate_limiter: ApiRateLimiter::new(config.rate_limit_per_minute),
        })
    }

    /// Fetch the raw rows of one dataset
    async fn request(&self, dataset: &str, params: &[(&str, &str)]) -> Result<Vec<Value>, ProviderError> {
        self.rate_limiter.wait().await;

        let mut url = self.base_url.clone();
        {
            let mut query = url.query_pairs_mut();
            query.append_pair("dataset", dataset);
            for (key, value) in params {
                query.append_pair(key, value);
            }
        }

        debug!("Requesting {}", url);
        let response = self.client.get(url).send().await?;
        let http_status = response.status();
        let body = response.text().await?;

        let envelope: Envelope = match serde_json::from_str(&body) {
            Ok(envelope) => envelope,
            Err(_) if !http_status.is_success() => {
                return Err(ProviderError::Api {
                    status: i64::from(http_status.as_u16()),
                    msg: body.chars().take(200).collect(),
                });
            }
            Err(e) => {
                return Err(ProviderError::Decode(format!("{} response: {}", dataset, e)));
            }
        };

        if envelope.status != 200 {
            return Err(ProviderError::Api {
                status: envelope.status,
                msg: envelope.msg,
            });
        }

        debug!("{} returned {} rows", dataset, envelope.data.len());
        Ok(envelope.data)
    }

    async fn request_series(
        &self,
        dataset: &str,
        instrument_id: &str,
        start: NaiveDate,
    ) -> Result<Vec<Value>, ProviderError> {
        let start_date = start.format("%Y-%m-%d").to_string();
        self.request(
            dataset,
            &[("data_id", instrument_id), ("start_date", start_date.as_str())],
        )
        .await
    }
}

/// Decode each row on its own so one malformed row does not sink the rest
fn decode_rows<T: DeserializeOwned>(dataset: &str, rows: Vec<Value>) -> Vec<T> {
    rows.into_iter()
        .filter_map(|row| match serde_json::from_value(row) {
            Ok(parsed) => Some(parsed),
            Err(e) => {
                warn!("Skipping malformed {} row: {}", dataset, e);
                None
            }
        })
        .collect()
}

fn monthly_records(instrument_id: &str, rows: Vec<MonthRevenueRow>) -> Vec<SeriesRecord> {
    rows.into_iter()
        .filter_map(|row| match YearMonth::new(row.revenue_year, row.revenue_month) {
            Ok(month) => Some(SeriesRecord::new(month, MetricKind::Revenue, row.revenue)),
            Err(e) => {
                warn!("Skipping revenue row for {}: {}", instrument_id, e);
                None
            }
        })
        .collect()
}

fn statement_records(instrument_id: &str, rows: Vec<StatementRow>) -> Vec<SeriesRecord> {
    rows.into_iter()
        .filter_map(|row| match Quarter::from_end_date(&row.date) {
            Ok(quarter) => Some(SeriesRecord::new(
                quarter,
                MetricKind::from(row.kind),
                row.value,
            )),
            Err(e) => {
                warn!("Skipping statement row for {}: {}", instrument_id, e);
                None
            }
        })
        .collect()
}

#[async_trait]
impl DataProvider for FinMindClient {
    async fn fetch_monthly_revenue(
        &self,
        instrument_id: &str,
        start: NaiveDate,
    ) -> Result<Vec<SeriesRecord>, ProviderError> {
        let rows = self
            .request_series(MONTH_REVENUE_DATASET, instrument_id, start)
            .await?;
        let rows = decode_rows(MONTH_REVENUE_DATASET, rows);
        Ok(monthly_records(instrument_id, rows))
    }

    async fn fetch_financial_statement(
        &self,
        instrument_id: &str,
        start: NaiveDate,
    ) -> Result<Vec<SeriesRecord>, ProviderError> {
        let rows = self
            .request_series(FINANCIAL_STATEMENTS_DATASET, instrument_id, start)
            .await?;
        let rows = decode_rows(FINANCIAL_STATEMENTS_DATASET, rows);
        Ok(statement_records(instrument_id, rows))
    }

    async fn fetch_instrument_names(&self) -> Result<HashMap<String, String>, ProviderError> {
        let rows = self.request(STOCK_INFO_DATASET, &[]).await?;
        let mut names = HashMap::new();
        // The info dataset lists an instrument once per industry; keep the first
        for row in decode_rows::<StockInfoRow>(STOCK_INFO_DATASET, rows) {
            names.entry(row.stock_id).or_insert(row.stock_name);
        }
        Ok(names)
    }
}

use async_trait::async_trait;
use chrono::NaiveDate;
use governor::clock::DefaultClock;
use governor::state::direct::NotKeyed;
use governor::state::InMemoryState;
use governor::{Quota, RateLimiter};
use std::collections::HashMap;
use std::num::NonZeroU32;
use std::sync::Arc;
use thiserror::Error;

use crate::models::{SeriesKind, SeriesRecord};

pub mod finmind_client;
pub use finmind_client::FinMindClient;

#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("provider returned status {status}: {msg}")]
    Api { status: i64, msg: String },

    #[error("invalid provider URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    #[error("unexpected provider payload: {0}")]
    Decode(String),
}

/// Client-side request budget shared by every request a client makes
#[derive(Clone)]
pub struct ApiRateLimiter {
    limiter: Arc<RateLimiter<NotKeyed, InMemoryState, DefaultClock>>,
}

impl ApiRateLimiter {
    pub fn new(requests_per_minute: u32) -> Self {
        let per_minute = NonZeroU32::new(requests_per_minute).unwrap_or(NonZeroU32::MIN);
        Self {
            limiter: Arc::new(RateLimiter::direct(Quota::per_minute(per_minute))),
        }
    }

    /// Wait until one more request fits in the budget
    pub async fn wait(&self) {
        self.limiter.until_ready().await;
    }
}

/// Source of monthly revenue, financial statements and instrument names
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait DataProvider: Send + Sync {
    /// Monthly revenue records from `start` onwards
    async fn fetch_monthly_revenue(
        &self,
        instrument_id: &str,
        start: NaiveDate,
    ) -> Result<Vec<SeriesRecord>, ProviderError>;

    /// Quarterly income-statement records from `start` onwards
    async fn fetch_financial_statement(
        &self,
        instrument_id: &str,
        start: NaiveDate,
    ) -> Result<Vec<SeriesRecord>, ProviderError>;

    /// Instrument id to display name
    async fn fetch_instrument_names(&self) -> Result<HashMap<String, String>, ProviderError>;
}

/// Fetch whichever series `kind` names
pub async fn fetch_series(
    provider: &dyn DataProvider,
    instrument_id: &str,
    kind: SeriesKind,
    start: NaiveDate,
) -> Result<Vec<SeriesRecord>, ProviderError> {
    match kind {
        SeriesKind::MonthlyRevenue => provider.fetch_monthly_revenue(instrument_id, start).await,
        SeriesKind::FinancialStatement => {
            provider.fetch_financial_statement(instrument_id, start).await
        }
    }
}

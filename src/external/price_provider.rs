use async_trait::async_trait;
use chrono::NaiveDate;
use thiserror::Error;

use crate::models::PricePoint;

/// A split event as reported by the provider.
///
/// `ratio` is the factor applied to prices quoted before the split, so a
/// 10-for-1 split carries `0.1` and a 1-for-5 reverse split carries `5.0`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SplitEvent {
    pub date: NaiveDate,
    pub ratio: f64,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct TickerMetadata {
    pub name: Option<String>,
    /// ISO 4217 code the closes are quoted in
    pub currency: Option<String>,
}

/// Company profile fields used by the metrics snapshot.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TickerProfile {
    pub name: Option<String>,
    pub currency: Option<String>,
    pub average_volume: Option<f64>,
    pub fifty_day_average: Option<f64>,
    pub two_hundred_day_average: Option<f64>,
    pub market_cap: Option<f64>,
    pub beta: Option<f64>,
    pub next_earnings_date: Option<NaiveDate>,
}

#[derive(Debug, Clone, Error, PartialEq)]
pub enum PriceProviderError {
    #[error("network error: {0}")]
    Network(String),

    #[error("bad response: {0}")]
    BadResponse(String),

    #[error("parse error: {0}")]
    Parse(String),

    #[error("rate limited")]
    RateLimited,

    #[error("not found")]
    NotFound,
}

impl PriceProviderError {
    /// Errors worth another attempt after a delay.
    pub fn is_transient(&self) -> bool {
        matches!(self, PriceProviderError::Network(_) | PriceProviderError::RateLimited)
    }
}

#[async_trait]
pub trait PriceProvider: Send + Sync {
    /// Daily closes for `symbol` on dates in `[start, end)`, oldest first.
    async fn fetch_daily_bars(
        &self,
        symbol: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<PricePoint>, PriceProviderError>;

    /// Full split history for `symbol`, oldest first.
    async fn fetch_splits(&self, symbol: &str) -> Result<Vec<SplitEvent>, PriceProviderError>;

    async fn fetch_metadata(&self, symbol: &str) -> Result<TickerMetadata, PriceProviderError>;

    async fn fetch_profile(&self, symbol: &str) -> Result<TickerProfile, PriceProviderError>;
}

use chrono::NaiveDate;
use serde::{Deserialize, Serialize, Serializer};

/// Marker for snapshot fields that have no data source yet.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct NotComputed;

impl Serialize for NotComputed {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str("not_computed")
    }
}

/// Valuation and volatility snapshot for one ticker.
#[derive(Debug, Clone, Serialize)]
pub struct MetricsSnapshot {
    pub ticker: String,
    pub next_report_date: Option<NaiveDate>,
    pub volume_30d_avg: Option<f64>,
    pub short_interest: NotComputed,
    pub short_percent_of_float: NotComputed,
    pub days_to_cover: NotComputed,
    pub volatility_daily: Option<f64>,
    pub sma_50d: Option<f64>,
    pub sma_200d: Option<f64>,
    pub rsi_14d: NotComputed,
    pub market_cap: Option<f64>,
    pub liquidity_ratio: NotComputed,
    pub volatility_annualized: Option<f64>,
    pub historical_dates: Vec<NaiveDate>,
    pub historical_prices: Vec<f64>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum ScrapeResult {
    Snapshot(MetricsSnapshot),
    Failed { ticker: String, error: String },
}

#[derive(Debug, Clone, Deserialize)]
pub struct ScrapeBatchRequest {
    #[serde(default)]
    pub tickers: Vec<String>,
}

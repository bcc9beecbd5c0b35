use chrono::NaiveDate;
use serde::Serialize;
use std::collections::BTreeMap;

use crate::models::PricePoint;

/// A normalized daily series for one ticker, owned by a single request.
#[derive(Debug, Clone, PartialEq)]
pub struct TickerSeries {
    pub symbol: String,
    pub name: String,
    /// Currency the provider quoted in, before any conversion to USD
    pub currency: String,
    /// Strictly increasing, unique dates
    pub points: Vec<PricePoint>,
}

/// Multi-ticker prices reindexed onto one date axis.
///
/// Every row in `prices` has exactly `dates.len()` entries; days a ticker
/// did not trade are `None`.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct AlignedPanel {
    pub dates: Vec<NaiveDate>,
    pub prices: BTreeMap<String, Vec<Option<f64>>>,
    pub names: BTreeMap<String, String>,
}

/// Body of `GET /historical-prices/...`.
#[derive(Debug, Clone, Serialize)]
pub struct HistoricalPricesResponse {
    #[serde(flatten)]
    pub panel: AlignedPanel,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub errors: BTreeMap<String, String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

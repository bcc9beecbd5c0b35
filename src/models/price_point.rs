use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

// One daily close for a ticker. `close` is None when the day has no usable
// trade, which is distinct from a price of zero.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PricePoint {
    pub date: NaiveDate,
    pub close: Option<f64>,
}

impl PricePoint {
    pub fn new(date: NaiveDate, close: Option<f64>) -> Self {
        Self { date, close }
    }
}

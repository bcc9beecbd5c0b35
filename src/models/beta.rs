use serde::ser::SerializeMap;
use serde::{Serialize, Serializer};

/// Sampling granularity a tenor is estimated on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Basis {
    Daily,
    Monthly,
}

/// Named trailing window for beta estimates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Tenor {
    D30,
    D90,
    D180,
    Y1,
    Y2,
    Y3,
    Y5,
}

impl Tenor {
    pub const ALL: [Tenor; 7] = [
        Tenor::D30,
        Tenor::D90,
        Tenor::D180,
        Tenor::Y1,
        Tenor::Y2,
        Tenor::Y3,
        Tenor::Y5,
    ];

    pub fn label(self) -> &'static str {
        match self {
            Tenor::D30 => "30D",
            Tenor::D90 => "90D",
            Tenor::D180 => "180D",
            Tenor::Y1 => "1Y",
            Tenor::Y2 => "2Y",
            Tenor::Y3 => "3Y",
            Tenor::Y5 => "5Y",
        }
    }

    pub fn basis(self) -> Basis {
        match self {
            Tenor::D30 | Tenor::D90 | Tenor::D180 | Tenor::Y1 => Basis::Daily,
            Tenor::Y2 | Tenor::Y3 | Tenor::Y5 => Basis::Monthly,
        }
    }

    /// Trailing return observations the window must contain: trading days
    /// on the daily basis, month-ends on the monthly basis.
    pub fn required_observations(self) -> usize {
        match self {
            Tenor::D30 => 21,
            Tenor::D90 => 63,
            Tenor::D180 => 126,
            Tenor::Y1 => 252,
            Tenor::Y2 => 24,
            Tenor::Y3 => 36,
            Tenor::Y5 => 60,
        }
    }
}

/// A beta estimate, or the "N/A" sentinel when the window is too short or
/// the benchmark did not move.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum BetaValue {
    Value(f64),
    NotAvailable,
}

impl BetaValue {
    pub fn value(self) -> Option<f64> {
        match self {
            BetaValue::Value(v) => Some(v),
            BetaValue::NotAvailable => None,
        }
    }

    pub fn is_available(self) -> bool {
        matches!(self, BetaValue::Value(_))
    }
}

impl Serialize for BetaValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            BetaValue::Value(v) => serializer.serialize_f64(*v),
            BetaValue::NotAvailable => serializer.serialize_str("N/A"),
        }
    }
}

/// Betas keyed by tenor, serialized in tenor order.
#[derive(Debug, Clone, PartialEq)]
pub struct BetaResult {
    entries: Vec<(Tenor, BetaValue)>,
}

impl BetaResult {
    pub fn new(entries: Vec<(Tenor, BetaValue)>) -> Self {
        Self { entries }
    }

    pub fn all_unavailable() -> Self {
        Self::new(Tenor::ALL.iter().map(|t| (*t, BetaValue::NotAvailable)).collect())
    }

    pub fn get(&self, tenor: Tenor) -> BetaValue {
        self.entries
            .iter()
            .find(|(t, _)| *t == tenor)
            .map(|(_, v)| *v)
            .unwrap_or(BetaValue::NotAvailable)
    }

    pub fn iter(&self) -> impl Iterator<Item = &(Tenor, BetaValue)> {
        self.entries.iter()
    }
}

impl Serialize for BetaResult {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for (tenor, value) in &self.entries {
            map.serialize_entry(tenor.label(), value)?;
        }
        map.end()
    }
}

/// Body of `GET /calculate_beta/...`.
#[derive(Debug, Clone, Serialize)]
pub struct BetaResponse {
    pub ticker: String,
    pub benchmark: String,
    pub betas: BetaResult,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

use crate::external::price_provider::{
    PriceProvider, PriceProviderError, SplitEvent, TickerMetadata, TickerProfile,
};
use crate::models::PricePoint;
use async_trait::async_trait;
use chrono::NaiveDate;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// In-memory provider with scripted data and failures.
///
/// Every unknown symbol answers `NotFound`. Failures registered with
/// [`MockProvider::flaky`] are returned for the first `n` bar requests and
/// then the stored bars are served.
#[derive(Default)]
pub struct MockProvider {
    bars: HashMap<String, Vec<PricePoint>>,
    splits: HashMap<String, Vec<SplitEvent>>,
    split_failures: HashMap<String, PriceProviderError>,
    metadata: HashMap<String, TickerMetadata>,
    profiles: HashMap<String, TickerProfile>,
    failures: HashMap<String, PriceProviderError>,
    flaky: HashMap<String, (u32, PriceProviderError)>,
    delays: HashMap<String, Duration>,
    bar_calls: HashMap<String, Arc<AtomicU32>>,
}

impl MockProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_bars(mut self, symbol: &str, points: Vec<PricePoint>) -> Self {
        self.bar_calls.entry(symbol.to_string()).or_default();
        self.bars.insert(symbol.to_string(), points);
        self
    }

    pub fn with_closes(self, symbol: &str, closes: &[(NaiveDate, f64)]) -> Self {
        let points = closes.iter().map(|(d, c)| PricePoint::new(*d, Some(*c))).collect();
        self.with_bars(symbol, points)
    }

    pub fn with_name(mut self, symbol: &str, name: &str) -> Self {
        self.metadata.entry(symbol.to_string()).or_default().name = Some(name.to_string());
        self
    }

    pub fn with_currency(mut self, symbol: &str, currency: &str) -> Self {
        self.metadata.entry(symbol.to_string()).or_default().currency = Some(currency.to_string());
        self
    }

    pub fn with_splits(mut self, symbol: &str, splits: Vec<SplitEvent>) -> Self {
        self.splits.insert(symbol.to_string(), splits);
        self
    }

    /// Split history requests for `symbol` fail with `error`.
    pub fn failing_splits(mut self, symbol: &str, error: PriceProviderError) -> Self {
        self.split_failures.insert(symbol.to_string(), error);
        self
    }

    pub fn with_profile(mut self, symbol: &str, profile: TickerProfile) -> Self {
        self.profiles.insert(symbol.to_string(), profile);
        self
    }

    /// Every bar request for `symbol` fails with `error`.
    pub fn failing(mut self, symbol: &str, error: PriceProviderError) -> Self {
        self.bar_calls.entry(symbol.to_string()).or_default();
        self.failures.insert(symbol.to_string(), error);
        self
    }

    /// The first `times` bar requests for `symbol` fail with `error`.
    pub fn flaky(mut self, symbol: &str, times: u32, error: PriceProviderError) -> Self {
        self.bar_calls.entry(symbol.to_string()).or_default();
        self.flaky.insert(symbol.to_string(), (times, error));
        self
    }

    /// Bar requests for `symbol` sleep before answering.
    pub fn delayed(mut self, symbol: &str, delay: Duration) -> Self {
        self.delays.insert(symbol.to_string(), delay);
        self
    }

    /// Number of bar requests seen for `symbol` so far.
    pub fn bar_calls(&self, symbol: &str) -> u32 {
        self.bar_calls
            .get(symbol)
            .map(|c| c.load(Ordering::SeqCst))
            .unwrap_or(0)
    }
}

#[async_trait]
impl PriceProvider for MockProvider {
    async fn fetch_daily_bars(
        &self,
        symbol: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<PricePoint>, PriceProviderError> {
        let call = match self.bar_calls.get(symbol) {
            Some(counter) => counter.fetch_add(1, Ordering::SeqCst),
            None => 0,
        };

        if let Some(delay) = self.delays.get(symbol) {
            tokio::time::sleep(*delay).await;
        }

        if let Some(error) = self.failures.get(symbol) {
            return Err(error.clone());
        }

        if let Some((times, error)) = self.flaky.get(symbol) {
            if call < *times {
                return Err(error.clone());
            }
        }

        let points = self.bars.get(symbol).ok_or(PriceProviderError::NotFound)?;

        Ok(points
            .iter()
            .filter(|p| p.date >= start && p.date < end)
            .copied()
            .collect())
    }

    async fn fetch_splits(&self, symbol: &str) -> Result<Vec<SplitEvent>, PriceProviderError> {
        if let Some(error) = self.split_failures.get(symbol) {
            return Err(error.clone());
        }
        Ok(self.splits.get(symbol).cloned().unwrap_or_default())
    }

    async fn fetch_metadata(&self, symbol: &str) -> Result<TickerMetadata, PriceProviderError> {
        self.metadata
            .get(symbol)
            .cloned()
            .ok_or(PriceProviderError::NotFound)
    }

    async fn fetch_profile(&self, symbol: &str) -> Result<TickerProfile, PriceProviderError> {
        self.profiles
            .get(symbol)
            .cloned()
            .ok_or(PriceProviderError::NotFound)
    }
}

use crate::external::price_provider::{
    PriceProvider, PriceProviderError, SplitEvent, TickerMetadata, TickerProfile,
};
use crate::models::PricePoint;
use async_trait::async_trait;
use chrono::NaiveDate;
use std::future::Future;
use std::time::Duration;
use tokio::time::sleep;
use tracing::warn;

/// Delay strategy between attempts.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Backoff {
    Fixed { delay: Duration },
    /// `base * 2^attempt`, capped at `max`, optionally jittered by +/- 50%.
    Exponential { base: Duration, max: Duration, jitter: bool },
}

impl Backoff {
    /// Delay before retry number `attempt` (0-based).
    pub fn delay(self, attempt: u32) -> Duration {
        match self {
            Backoff::Fixed { delay } => delay,
            Backoff::Exponential { base, max, jitter } => {
                let scaled = base.as_secs_f64() * 2f64.powi(attempt.min(30) as i32);
                let capped = Duration::from_secs_f64(scaled.min(max.as_secs_f64()));
                if jitter {
                    capped.mul_f64(0.5 + rand::random::<f64>())
                } else {
                    capped
                }
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RetryPolicy {
    /// Retries after the first attempt; total attempts = `max_retries + 1`.
    pub max_retries: u32,
    pub backoff: Backoff,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            backoff: Backoff::Exponential {
                base: Duration::from_millis(500),
                max: Duration::from_secs(8),
                jitter: true,
            },
        }
    }
}

impl RetryPolicy {
    pub fn no_retry() -> Self {
        Self {
            max_retries: 0,
            backoff: Backoff::Fixed { delay: Duration::ZERO },
        }
    }

    /// Runs `op` until it succeeds, fails with a non-transient error, or
    /// the retry budget is spent.
    pub async fn run<T, F, Fut>(&self, what: &str, symbol: &str, mut op: F) -> Result<T, PriceProviderError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, PriceProviderError>>,
    {
        let mut attempt = 0;
        loop {
            match op().await {
                Ok(value) => return Ok(value),
                Err(e) if e.is_transient() && attempt < self.max_retries => {
                    let delay = self.backoff.delay(attempt);
                    attempt += 1;
                    warn!(
                        "{} for {} failed ({}), retrying in {}ms (attempt {}/{})",
                        what,
                        symbol,
                        e,
                        delay.as_millis(),
                        attempt,
                        self.max_retries
                    );
                    sleep(delay).await;
                }
                Err(e) => return Err(e),
            }
        }
    }
}

/// Wraps another provider and retries transient failures with a capped
/// policy. Alignment code never sees the retry loop.
pub struct RetryingProvider<P> {
    inner: P,
    policy: RetryPolicy,
}

impl<P: PriceProvider> RetryingProvider<P> {
    pub fn new(inner: P, policy: RetryPolicy) -> Self {
        Self { inner, policy }
    }

    pub fn inner(&self) -> &P {
        &self.inner
    }
}

#[async_trait]
impl<P: PriceProvider> PriceProvider for RetryingProvider<P> {
    async fn fetch_daily_bars(
        &self,
        symbol: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<PricePoint>, PriceProviderError> {
        self.policy
            .run("daily bars", symbol, || self.inner.fetch_daily_bars(symbol, start, end))
            .await
    }

    async fn fetch_splits(&self, symbol: &str) -> Result<Vec<SplitEvent>, PriceProviderError> {
        self.policy
            .run("split history", symbol, || self.inner.fetch_splits(symbol))
            .await
    }

    async fn fetch_metadata(&self, symbol: &str) -> Result<TickerMetadata, PriceProviderError> {
        self.policy
            .run("metadata", symbol, || self.inner.fetch_metadata(symbol))
            .await
    }

    async fn fetch_profile(&self, symbol: &str) -> Result<TickerProfile, PriceProviderError> {
        self.policy
            .run("profile", symbol, || self.inner.fetch_profile(symbol))
            .await
    }
}

use chrono::{Days, Months, NaiveDate};
use futures::future::join_all;
use tokio::time::{timeout_at, Instant};
use tracing::{info, warn};

use crate::external::price_provider::{PriceProvider, PriceProviderError, TickerProfile};
use crate::models::{MetricsSnapshot, NotComputed, PricePoint, ScrapeResult};
use crate::services::alignment_service;

const TRADING_DAYS_PER_YEAR: f64 = 252.0;
const HISTORY_MONTHS: u32 = 6;

/// Builds the metrics snapshot for one ticker, or a per-ticker error.
pub async fn scrape_ticker(
    provider: &dyn PriceProvider,
    symbol: &str,
    today: NaiveDate,
    deadline: Instant,
) -> ScrapeResult {
    if !alignment_service::is_valid_symbol(symbol) {
        return failed(symbol, "malformed symbol");
    }

    match timeout_at(deadline, acquire(provider, symbol, today)).await {
        Ok(Ok((profile, history))) => {
            info!("✓ Scraped {} ({} closes)", symbol, history.len());
            ScrapeResult::Snapshot(snapshot(symbol, &profile, &history))
        }
        Ok(Err(e)) => {
            warn!("✗ Scrape failed for {}: {}", symbol, e);
            failed(symbol, &e.to_string())
        }
        Err(_) => {
            warn!("✗ Deadline passed while scraping {}", symbol);
            failed(symbol, "request timed out before data arrived")
        }
    }
}

/// Scrapes every symbol concurrently, results in request order.
pub async fn scrape_batch(
    provider: &dyn PriceProvider,
    symbols: &[String],
    today: NaiveDate,
    deadline: Instant,
) -> Vec<ScrapeResult> {
    join_all(
        symbols
            .iter()
            .map(|symbol| scrape_ticker(provider, symbol, today, deadline)),
    )
    .await
}

async fn acquire(
    provider: &dyn PriceProvider,
    symbol: &str,
    today: NaiveDate,
) -> Result<(TickerProfile, Vec<PricePoint>), PriceProviderError> {
    let start = today.checked_sub_months(Months::new(HISTORY_MONTHS)).unwrap_or(today);
    let end = today.checked_add_days(Days::new(1)).unwrap_or(today);

    let (profile, bars) = tokio::join!(
        provider.fetch_profile(symbol),
        provider.fetch_daily_bars(symbol, start, end),
    );

    Ok((profile?, alignment_service::normalize_points(bars?, start, end)))
}

/// Pure mapping from provider data to the response shape.
pub fn snapshot(symbol: &str, profile: &TickerProfile, history: &[PricePoint]) -> MetricsSnapshot {
    let (historical_dates, historical_prices): (Vec<_>, Vec<_>) = history
        .iter()
        .filter_map(|p| p.close.map(|c| (p.date, round_to(c, 2))))
        .unzip();

    MetricsSnapshot {
        ticker: symbol.to_string(),
        next_report_date: profile.next_earnings_date,
        volume_30d_avg: profile.average_volume,
        short_interest: NotComputed,
        short_percent_of_float: NotComputed,
        days_to_cover: NotComputed,
        volatility_daily: profile
            .beta
            .map(|b| round_to(b / TRADING_DAYS_PER_YEAR.sqrt(), 4)),
        sma_50d: profile.fifty_day_average,
        sma_200d: profile.two_hundred_day_average,
        rsi_14d: NotComputed,
        market_cap: profile.market_cap,
        liquidity_ratio: NotComputed,
        volatility_annualized: profile.beta.map(|b| round_to(b, 4)),
        historical_dates,
        historical_prices,
    }
}

fn failed(symbol: &str, error: &str) -> ScrapeResult {
    ScrapeResult::Failed {
        ticker: symbol.to_string(),
        error: error.to_string(),
    }
}

fn round_to(value: f64, places: i32) -> f64 {
    let factor = 10f64.powi(places);
    (value * factor).round() / factor
}

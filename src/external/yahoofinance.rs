use crate::external::price_provider::{
    PriceProvider, PriceProviderError, SplitEvent, TickerMetadata, TickerProfile,
};
use crate::models::PricePoint;
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, NaiveTime};
use serde::Deserialize;
use std::collections::BTreeMap;
use tracing::debug;

const CHART_URL: &str = "https://query1.finance.yahoo.com/v8/finance/chart";
const QUOTE_SUMMARY_URL: &str = "https://query2.finance.yahoo.com/v10/finance/quoteSummary";
const COOKIE_URL: &str = "https://fc.yahoo.com";
const CRUMB_URL: &str = "https://query2.finance.yahoo.com/v1/test/getcrumb";

/// Yahoo Finance provider. No API key required.
///
/// Bars, metadata and split events come from the public chart endpoint.
/// Profiles need `quoteSummary`, which only answers once the client holds a
/// session cookie and the matching crumb.
pub struct YahooFinanceProvider {
    client: reqwest::Client,
}

impl YahooFinanceProvider {
    pub fn new() -> Self {
        Self {
            client: reqwest::Client::builder()
                .user_agent("Mozilla/5.0 (compatible; Pricegrid/0.1)")
                .cookie_store(true)
                .build()
                .unwrap_or_else(|_| reqwest::Client::new()),
        }
    }

    async fn fetch_chart(
        &self,
        symbol: &str,
        query: &[(&str, String)],
    ) -> Result<YahooResult, PriceProviderError> {
        let url = format!("{}/{}", CHART_URL, symbol);

        let resp = self
            .client
            .get(&url)
            .query(query)
            .send()
            .await
            .map_err(|e| PriceProviderError::Network(e.to_string()))?;

        match resp.status() {
            reqwest::StatusCode::TOO_MANY_REQUESTS => return Err(PriceProviderError::RateLimited),
            reqwest::StatusCode::NOT_FOUND => return Err(PriceProviderError::NotFound),
            status if !status.is_success() => {
                return Err(PriceProviderError::BadResponse(format!("HTTP {}", status)));
            }
            _ => {}
        }

        let body: YahooChartResponse = resp
            .json()
            .await
            .map_err(|e| PriceProviderError::Parse(e.to_string()))?;

        if let Some(error) = body.chart.error {
            if error.description.contains("No data found") {
                return Err(PriceProviderError::NotFound);
            }
            return Err(PriceProviderError::BadResponse(error.description));
        }

        body.chart
            .result
            .and_then(|mut results| results.pop())
            .ok_or(PriceProviderError::NotFound)
    }

    /// Session cookie + crumb handshake required by `quoteSummary`.
    async fn fetch_crumb(&self) -> Result<String, PriceProviderError> {
        // fc.yahoo.com answers 404 but still sets the session cookie
        if let Err(e) = self.client.get(COOKIE_URL).send().await {
            debug!("Cookie seed request failed: {}", e);
        }

        let resp = self
            .client
            .get(CRUMB_URL)
            .send()
            .await
            .map_err(|e| PriceProviderError::Network(e.to_string()))?;

        if resp.status() == reqwest::StatusCode::TOO_MANY_REQUESTS {
            return Err(PriceProviderError::RateLimited);
        }
        if !resp.status().is_success() {
            return Err(PriceProviderError::BadResponse(format!(
                "crumb request returned HTTP {}",
                resp.status()
            )));
        }

        let crumb = resp
            .text()
            .await
            .map_err(|e| PriceProviderError::Parse(e.to_string()))?
            .trim()
            .to_string();

        if crumb.is_empty() || crumb.contains('<') {
            return Err(PriceProviderError::BadResponse("provider returned no crumb".into()));
        }
        Ok(crumb)
    }
}

impl Default for YahooFinanceProvider {
    fn default() -> Self {
        Self::new()
    }
}

fn unix_midnight(date: NaiveDate) -> i64 {
    date.and_time(NaiveTime::MIN).and_utc().timestamp()
}

/// Bar timestamps mark the session open in UTC; shifting by the exchange
/// offset keeps Asian sessions on their local trading date.
fn local_date(timestamp: i64, gmtoffset: i64) -> Option<NaiveDate> {
    DateTime::from_timestamp(timestamp + gmtoffset, 0).map(|dt| dt.date_naive())
}

#[derive(Debug, Deserialize)]
struct YahooChartResponse {
    chart: YahooChart,
}

#[derive(Debug, Deserialize)]
struct YahooChart {
    result: Option<Vec<YahooResult>>,
    error: Option<YahooError>,
}

#[derive(Debug, Deserialize)]
struct YahooError {
    description: String,
}

#[derive(Debug, Deserialize)]
struct YahooResult {
    meta: YahooMeta,
    #[serde(default)]
    timestamp: Vec<i64>,
    indicators: YahooIndicators,
    #[serde(default)]
    events: Option<YahooEvents>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct YahooMeta {
    currency: Option<String>,
    long_name: Option<String>,
    short_name: Option<String>,
    #[serde(default)]
    gmtoffset: i64,
}

#[derive(Debug, Deserialize)]
struct YahooIndicators {
    #[serde(default)]
    quote: Vec<YahooQuote>,
}

#[derive(Debug, Deserialize)]
struct YahooQuote {
    #[serde(default)]
    close: Vec<Option<f64>>,
}

#[derive(Debug, Deserialize)]
struct YahooEvents {
    #[serde(default)]
    splits: BTreeMap<String, YahooSplit>,
}

#[derive(Debug, Deserialize)]
struct YahooSplit {
    date: i64,
    numerator: f64,
    denominator: f64,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct QuoteSummaryResponse {
    quote_summary: QuoteSummary,
}

#[derive(Debug, Deserialize)]
struct QuoteSummary {
    result: Option<Vec<QuoteSummaryResult>>,
    error: Option<YahooError>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct QuoteSummaryResult {
    #[serde(default)]
    price: Option<PriceModule>,
    #[serde(default)]
    summary_detail: Option<SummaryDetailModule>,
    #[serde(default)]
    calendar_events: Option<CalendarEventsModule>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PriceModule {
    long_name: Option<String>,
    short_name: Option<String>,
    currency: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SummaryDetailModule {
    #[serde(default)]
    average_volume: RawNumber,
    #[serde(default)]
    fifty_day_average: RawNumber,
    #[serde(default)]
    two_hundred_day_average: RawNumber,
    #[serde(default)]
    market_cap: RawNumber,
    #[serde(default)]
    beta: RawNumber,
}

#[derive(Debug, Deserialize)]
struct CalendarEventsModule {
    #[serde(default)]
    earnings: Option<EarningsModule>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct EarningsModule {
    #[serde(default)]
    earnings_date: Vec<RawNumber>,
}

// Yahoo wraps numbers as {"raw": 1.23, "fmt": "1.23"}; missing values are {}
#[derive(Debug, Default, Deserialize)]
struct RawNumber {
    raw: Option<f64>,
}

#[async_trait]
impl PriceProvider for YahooFinanceProvider {
    async fn fetch_daily_bars(
        &self,
        symbol: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<PricePoint>, PriceProviderError> {
        let result = self
            .fetch_chart(
                symbol,
                &[
                    ("interval", "1d".to_string()),
                    ("period1", unix_midnight(start).to_string()),
                    ("period2", unix_midnight(end).to_string()),
                ],
            )
            .await?;

        let closes = result
            .indicators
            .quote
            .first()
            .map(|q| q.close.as_slice())
            .unwrap_or_default();

        if !closes.is_empty() && result.timestamp.len() != closes.len() {
            return Err(PriceProviderError::Parse(
                "Timestamp and close price arrays have different lengths".into(),
            ));
        }

        let gmtoffset = result.meta.gmtoffset;
        let mut points: Vec<PricePoint> = result
            .timestamp
            .iter()
            .enumerate()
            .filter_map(|(i, ts)| {
                let date = local_date(*ts, gmtoffset)?;
                Some(PricePoint::new(date, closes.get(i).copied().flatten()))
            })
            .collect();

        points.sort_by_key(|p| p.date);

        if points.is_empty() {
            return Err(PriceProviderError::NotFound);
        }

        Ok(points)
    }

    async fn fetch_splits(&self, symbol: &str) -> Result<Vec<SplitEvent>, PriceProviderError> {
        let result = self
            .fetch_chart(
                symbol,
                &[
                    ("interval", "1d".to_string()),
                    ("range", "max".to_string()),
                    ("events", "split".to_string()),
                ],
            )
            .await?;

        let gmtoffset = result.meta.gmtoffset;
        let mut splits: Vec<SplitEvent> = result
            .events
            .map(|events| events.splits.into_values().collect::<Vec<_>>())
            .unwrap_or_default()
            .into_iter()
            .filter(|s| s.numerator > 0.0 && s.denominator > 0.0)
            .filter_map(|s| {
                Some(SplitEvent {
                    date: local_date(s.date, gmtoffset)?,
                    ratio: s.denominator / s.numerator,
                })
            })
            .collect();

        splits.sort_by_key(|s| s.date);
        Ok(splits)
    }

    async fn fetch_metadata(&self, symbol: &str) -> Result<TickerMetadata, PriceProviderError> {
        let result = self
            .fetch_chart(
                symbol,
                &[("interval", "1d".to_string()), ("range", "5d".to_string())],
            )
            .await?;

        Ok(TickerMetadata {
            name: result.meta.long_name.or(result.meta.short_name),
            currency: result.meta.currency,
        })
    }

    async fn fetch_profile(&self, symbol: &str) -> Result<TickerProfile, PriceProviderError> {
        let crumb = self.fetch_crumb().await?;
        let url = format!("{}/{}", QUOTE_SUMMARY_URL, symbol);

        let resp = self
            .client
            .get(&url)
            .query(&[
                ("modules", "price,summaryDetail,calendarEvents"),
                ("crumb", crumb.as_str()),
            ])
            .send()
            .await
            .map_err(|e| PriceProviderError::Network(e.to_string()))?;

        match resp.status() {
            reqwest::StatusCode::TOO_MANY_REQUESTS => return Err(PriceProviderError::RateLimited),
            reqwest::StatusCode::NOT_FOUND => return Err(PriceProviderError::NotFound),
            status if !status.is_success() => {
                return Err(PriceProviderError::BadResponse(format!("HTTP {}", status)));
            }
            _ => {}
        }

        let body: QuoteSummaryResponse = resp
            .json()
            .await
            .map_err(|e| PriceProviderError::Parse(e.to_string()))?;

        if let Some(error) = body.quote_summary.error {
            return Err(PriceProviderError::BadResponse(error.description));
        }

        let result = body
            .quote_summary
            .result
            .and_then(|mut r| r.pop())
            .ok_or(PriceProviderError::NotFound)?;

        let (name, currency) = match result.price {
            Some(price) => (price.long_name.or(price.short_name), price.currency),
            None => (None, None),
        };

        let mut profile = TickerProfile {
            name,
            currency,
            ..TickerProfile::default()
        };

        if let Some(detail) = result.summary_detail {
            profile.average_volume = detail.average_volume.raw;
            profile.fifty_day_average = detail.fifty_day_average.raw;
            profile.two_hundred_day_average = detail.two_hundred_day_average.raw;
            profile.market_cap = detail.market_cap.raw;
            profile.beta = detail.beta.raw;
        }

        profile.next_earnings_date = result
            .calendar_events
            .and_then(|c| c.earnings)
            .and_then(|e| e.earnings_date.into_iter().find_map(|d| d.raw))
            .and_then(|raw| DateTime::from_timestamp(raw as i64, 0))
            .map(|dt| dt.date_naive());

        Ok(profile)
    }
}

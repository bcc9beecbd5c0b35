use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::str::FromStr;
use std::sync::LazyLock;

use chrono::{Datelike, NaiveDate};
use futures::future::join_all;
use regex::Regex;
use serde::{Deserialize, Serialize};
use tokio::time::{timeout_at, Instant};
use tracing::{debug, info, warn};

use crate::external::price_provider::{PriceProvider, PriceProviderError, SplitEvent};
use crate::models::{AlignedPanel, PricePoint, TickerSeries};

pub const BASE_CURRENCY: &str = "USD";

/// A point more than this multiple of both neighbours (or less than its
/// inverse) is treated as a bad print.
const OUTLIER_FACTOR: f64 = 10.0;

/// Day-over-day ratios outside this band are treated as an unadjusted split.
const SPLIT_JUMP_UP: f64 = 5.0;
const SPLIT_JUMP_DOWN: f64 = 0.2;

static SYMBOL_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z0-9.\-=^]{1,20}$").expect("symbol pattern is valid"));

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Resample {
    #[default]
    Daily,
    /// Last trading day of each calendar month
    Monthly,
}

impl FromStr for Resample {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "daily" => Ok(Resample::Daily),
            "monthly" => Ok(Resample::Monthly),
            other => Err(format!("unknown resample '{}', expected 'daily' or 'monthly'", other)),
        }
    }
}

/// Normalization steps applied to each ticker before alignment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AlignmentConfig {
    pub outlier_filter: bool,
    pub split_correction: bool,
    pub currency_conversion: bool,
    pub resample: Resample,
}

impl Default for AlignmentConfig {
    fn default() -> Self {
        Self {
            outlier_filter: true,
            split_correction: true,
            currency_conversion: true,
            resample: Resample::Daily,
        }
    }
}

/// Why a single ticker contributed no data.
#[derive(Debug, Clone, PartialEq)]
pub struct TickerFailure {
    pub symbol: String,
    pub reason: String,
}

impl TickerFailure {
    pub fn new(symbol: &str, reason: impl Into<String>) -> Self {
        Self {
            symbol: symbol.to_string(),
            reason: reason.into(),
        }
    }

    fn from_provider(symbol: &str, error: &PriceProviderError) -> Self {
        let reason = match error {
            PriceProviderError::NotFound => "no price data returned".to_string(),
            other => other.to_string(),
        };
        Self::new(symbol, reason)
    }
}

pub type TickerOutcome = Result<TickerSeries, TickerFailure>;

/// The aligned panel plus the reason each failed ticker is empty.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AlignmentBatch {
    pub panel: AlignedPanel,
    pub errors: BTreeMap<String, String>,
}

impl AlignmentBatch {
    /// True when no row carries a single price, whether every ticker failed
    /// outright or its closes were all dropped along the way.
    pub fn all_failed(&self) -> bool {
        !self.panel.prices.is_empty()
            && self
                .panel
                .prices
                .values()
                .all(|row| row.iter().all(Option::is_none))
    }
}

pub fn is_valid_symbol(symbol: &str) -> bool {
    SYMBOL_PATTERN.is_match(symbol)
}

/// Splits a comma-separated ticker list, trimming blanks and dropping
/// repeats while keeping first-seen order.
pub fn parse_ticker_list(raw: &str) -> Vec<String> {
    let mut seen = BTreeSet::new();
    raw.split(',')
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .filter(|t| seen.insert(t.to_string()))
        .map(str::to_string)
        .collect()
}

/// Acquires and normalizes every ticker concurrently, then reindexes the
/// successful ones onto the union of their dates.
///
/// A ticker that fails, or is still running at `deadline`, becomes an
/// all-`None` row and an entry in `errors`; it never aborts its siblings.
pub async fn align(
    provider: &dyn PriceProvider,
    tickers: &[String],
    start: NaiveDate,
    end: NaiveDate,
    config: &AlignmentConfig,
    deadline: Instant,
) -> AlignmentBatch {
    let outcomes = join_all(
        tickers
            .iter()
            .map(|symbol| acquire_with_deadline(provider, symbol, start, end, config, deadline)),
    )
    .await;

    assemble(tickers, outcomes)
}

pub async fn acquire_with_deadline(
    provider: &dyn PriceProvider,
    symbol: &str,
    start: NaiveDate,
    end: NaiveDate,
    config: &AlignmentConfig,
    deadline: Instant,
) -> TickerOutcome {
    match timeout_at(deadline, acquire_ticker(provider, symbol, start, end, config)).await {
        Ok(outcome) => outcome,
        Err(_) => {
            warn!("✗ Deadline passed while acquiring {}", symbol);
            Err(TickerFailure::new(symbol, "request timed out before data arrived"))
        }
    }
}

/// Runs the per-ticker pipeline: fetch, sanitize, outlier filter, split
/// correction, currency conversion, optional monthly resample.
pub async fn acquire_ticker(
    provider: &dyn PriceProvider,
    symbol: &str,
    start: NaiveDate,
    end: NaiveDate,
    config: &AlignmentConfig,
) -> TickerOutcome {
    if !is_valid_symbol(symbol) {
        return Err(TickerFailure::new(symbol, "malformed symbol"));
    }

    let bars = provider
        .fetch_daily_bars(symbol, start, end)
        .await
        .map_err(|e| {
            warn!("✗ Failed to fetch daily bars for {}: {}", symbol, e);
            TickerFailure::from_provider(symbol, &e)
        })?;

    let mut points = normalize_points(bars, start, end);
    if points.is_empty() {
        warn!("✗ No bars for {} between {} and {}", symbol, start, end);
        return Err(TickerFailure::new(symbol, "no price data returned"));
    }

    let metadata = match provider.fetch_metadata(symbol).await {
        Ok(metadata) => metadata,
        Err(e) => {
            debug!("No metadata for {} ({}), using symbol and {}", symbol, e, BASE_CURRENCY);
            Default::default()
        }
    };
    let currency = metadata
        .currency
        .map(|c| c.trim().to_uppercase())
        .filter(|c| !c.is_empty())
        .unwrap_or_else(|| BASE_CURRENCY.to_string());

    if config.outlier_filter {
        filter_outliers(&mut points);
    }

    if config.split_correction {
        match provider.fetch_splits(symbol).await {
            Ok(splits) => correct_splits(&mut points, &splits),
            Err(e) => warn!("Skipping split correction for {}: {}", symbol, e),
        }
    }

    if config.currency_conversion && currency != BASE_CURRENCY {
        let fx_symbol = format!("{}{}=X", currency, BASE_CURRENCY);
        let rates = match provider.fetch_daily_bars(&fx_symbol, start, end).await {
            Ok(bars) => rate_map(&bars),
            Err(e) => {
                warn!("No {} rates for {} ({}), prices will be absent", fx_symbol, symbol, e);
                BTreeMap::new()
            }
        };
        convert_currency(&mut points, &rates);
    }

    if config.resample == Resample::Monthly {
        points = resample_monthly(&points);
    }

    info!("✓ Acquired {} points for {} ({})", points.len(), symbol, currency);

    Ok(TickerSeries {
        symbol: symbol.to_string(),
        name: metadata.name.unwrap_or_else(|| symbol.to_string()),
        currency,
        points,
    })
}

/// Builds the panel from per-ticker outcomes, in request order.
pub fn assemble(tickers: &[String], outcomes: Vec<TickerOutcome>) -> AlignmentBatch {
    let mut errors = BTreeMap::new();
    let mut series = Vec::new();

    for (symbol, outcome) in tickers.iter().zip(outcomes) {
        match outcome {
            Ok(s) => series.push(s),
            Err(failure) => {
                errors.insert(symbol.clone(), failure.reason);
            }
        }
    }

    let dates = build_date_axis(series.iter().map(|s| s.points.as_slice()));
    let mut panel = AlignedPanel {
        dates,
        ..AlignedPanel::default()
    };

    for s in series {
        panel.prices.insert(s.symbol.clone(), reindex(&s.points, &panel.dates));
        panel.names.insert(s.symbol, s.name);
    }
    for symbol in errors.keys() {
        panel.prices.insert(symbol.clone(), vec![None; panel.dates.len()]);
        panel.names.insert(symbol.clone(), symbol.clone());
    }

    AlignmentBatch { panel, errors }
}

/// Sorts by date, keeps the first bar of any duplicated date, drops bars
/// outside `[start, end)` and replaces non-finite closes with `None`.
pub fn normalize_points(mut bars: Vec<PricePoint>, start: NaiveDate, end: NaiveDate) -> Vec<PricePoint> {
    bars.retain(|p| p.date >= start && p.date < end);
    bars.sort_by_key(|p| p.date);
    bars.dedup_by_key(|p| p.date);
    for p in &mut bars {
        p.close = p.close.filter(|c| c.is_finite());
    }
    bars
}

/// Nulls interior points that sit 10x above or below both neighbours.
///
/// One in-place pass: a nulled point is not a neighbour for the next index.
pub fn filter_outliers(points: &mut [PricePoint]) {
    for i in 1..points.len().saturating_sub(1) {
        let (Some(prev), Some(cur), Some(next)) =
            (points[i - 1].close, points[i].close, points[i + 1].close)
        else {
            continue;
        };

        let spike = cur > OUTLIER_FACTOR * prev && cur > OUTLIER_FACTOR * next;
        let dip = cur < prev / OUTLIER_FACTOR && cur < next / OUTLIER_FACTOR;
        if spike || dip {
            debug!("Dropping outlier {} on {}", cur, points[i].date);
            points[i].close = None;
        }
    }
}

/// Rescales history before suspected unadjusted splits.
///
/// For every consecutive pair of present closes whose ratio leaves
/// `[0.2, 5]`, each split event dated on or before the jump multiplies all
/// earlier closes by its ratio. Absent closes between the pair are skipped.
/// This is a heuristic: an event already reflected in the data, or several
/// jumps sharing the same events, will be applied more than once.
pub fn correct_splits(points: &mut [PricePoint], splits: &[SplitEvent]) {
    let mut last_present: Option<usize> = None;
    for i in 0..points.len() {
        let Some(cur) = points[i].close else {
            continue;
        };
        let Some(prev) = last_present.replace(i).and_then(|j| points[j].close) else {
            continue;
        };
        if prev == 0.0 {
            continue;
        }

        let ratio = cur / prev;
        if (SPLIT_JUMP_DOWN..=SPLIT_JUMP_UP).contains(&ratio) {
            continue;
        }

        let jump_date = points[i].date;
        let factors: Vec<f64> = splits
            .iter()
            .filter(|s| s.date <= jump_date && s.ratio.is_finite() && s.ratio > 0.0)
            .map(|s| s.ratio)
            .collect();

        if factors.is_empty() {
            debug!("Jump of {:.2}x on {} has no recorded split", ratio, jump_date);
            continue;
        }

        info!("Adjusting {} closes before {} for {} split event(s)", i, jump_date, factors.len());
        for point in &mut points[..i] {
            if let Some(close) = point.close.as_mut() {
                for factor in &factors {
                    *close *= factor;
                }
            }
        }
    }
}

/// Date -> rate from FX bars, skipping absent or non-finite quotes.
pub fn rate_map(bars: &[PricePoint]) -> BTreeMap<NaiveDate, f64> {
    bars.iter()
        .filter_map(|p| p.close.filter(|c| c.is_finite()).map(|c| (p.date, c)))
        .collect()
}

/// Multiplies each close by the same-day rate; no rate means no price.
pub fn convert_currency(points: &mut [PricePoint], rates: &BTreeMap<NaiveDate, f64>) {
    for p in points.iter_mut() {
        p.close = p.close.and_then(|c| rates.get(&p.date).map(|rate| c * rate));
    }
}

/// Keeps the last point with a close in each calendar month.
pub fn resample_monthly(points: &[PricePoint]) -> Vec<PricePoint> {
    let mut by_month: BTreeMap<(i32, u32), PricePoint> = BTreeMap::new();
    for p in points.iter().filter(|p| p.close.is_some()) {
        by_month.insert((p.date.year(), p.date.month()), *p);
    }
    by_month.into_values().collect()
}

/// Sorted union of every date in `series`.
pub fn build_date_axis<'a>(series: impl IntoIterator<Item = &'a [PricePoint]>) -> Vec<NaiveDate> {
    series
        .into_iter()
        .flat_map(|points| points.iter().map(|p| p.date))
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}

/// Maps `points` onto `axis`, with `None` wherever the series has no entry.
pub fn reindex(points: &[PricePoint], axis: &[NaiveDate]) -> Vec<Option<f64>> {
    let by_date: HashMap<NaiveDate, Option<f64>> = points.iter().map(|p| (p.date, p.close)).collect();
    axis.iter()
        .map(|d| by_date.get(d).copied().flatten())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::external::mock::MockProvider;
    use std::time::Duration;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    fn series(closes: &[Option<f64>]) -> Vec<PricePoint> {
        closes
            .iter()
            .enumerate()
            .map(|(i, c)| PricePoint::new(d(2024, 1, 1 + i as u32), *c))
            .collect()
    }

    fn closes(points: &[PricePoint]) -> Vec<Option<f64>> {
        points.iter().map(|p| p.close).collect()
    }

    fn far_deadline() -> Instant {
        Instant::now() + Duration::from_secs(30)
    }

    #[test]
    fn test_outlier_spike_is_removed() {
        let mut points = series(&[Some(10.0), Some(10.0), Some(150.0), Some(10.0), Some(10.0)]);
        filter_outliers(&mut points);
        assert_eq!(closes(&points), vec![Some(10.0), Some(10.0), None, Some(10.0), Some(10.0)]);
    }

    #[test]
    fn test_outlier_dip_is_removed() {
        let mut points = series(&[Some(50.0), Some(4.0), Some(50.0)]);
        filter_outliers(&mut points);
        assert_eq!(closes(&points), vec![Some(50.0), None, Some(50.0)]);
    }

    #[test]
    fn test_ordinary_moves_are_kept() {
        let original = [Some(10.0), Some(10.0), Some(10.5), Some(11.0), Some(10.0)];
        let mut points = series(&original);
        filter_outliers(&mut points);
        assert_eq!(closes(&points), original.to_vec());
    }

    #[test]
    fn test_outlier_filter_ignores_edges_and_gaps() {
        let mut points = series(&[Some(500.0), Some(10.0), None, Some(900.0), Some(10.0)]);
        filter_outliers(&mut points);
        // index 0 is an edge, index 3 has a missing neighbour
        assert_eq!(closes(&points), vec![Some(500.0), Some(10.0), None, Some(900.0), Some(10.0)]);

        let mut short = series(&[Some(1.0), Some(100.0)]);
        filter_outliers(&mut short);
        assert_eq!(closes(&short), vec![Some(1.0), Some(100.0)]);
    }

    #[test]
    fn test_split_correction_rescales_history() {
        let mut points = series(&[Some(1000.0), Some(1010.0), Some(101.0), Some(102.0)]);
        let splits = [SplitEvent { date: d(2024, 1, 3), ratio: 0.1 }];

        correct_splits(&mut points, &splits);

        let got = closes(&points);
        assert!((got[0].unwrap() - 100.0).abs() < 1e-9);
        assert!((got[1].unwrap() - 101.0).abs() < 1e-9);
        assert_eq!(got[2], Some(101.0));
        assert_eq!(got[3], Some(102.0));
    }

    #[test]
    fn test_split_correction_looks_past_missing_closes() {
        let mut points = series(&[Some(1000.0), None, Some(100.0), Some(101.0)]);
        let splits = [SplitEvent { date: d(2024, 1, 3), ratio: 0.1 }];

        correct_splits(&mut points, &splits);

        let got = closes(&points);
        assert!((got[0].unwrap() - 100.0).abs() < 1e-9);
        assert_eq!(got[1], None);
        assert_eq!(got[2], Some(100.0));
        assert_eq!(got[3], Some(101.0));
    }

    #[test]
    fn test_split_correction_ignores_later_events_and_small_moves() {
        let mut points = series(&[Some(1000.0), Some(100.0), Some(110.0)]);
        let later = [SplitEvent { date: d(2024, 6, 1), ratio: 0.1 }];
        correct_splits(&mut points, &later);
        assert_eq!(closes(&points), vec![Some(1000.0), Some(100.0), Some(110.0)]);

        // a 3x move is inside the band
        let mut points = series(&[Some(10.0), Some(30.0)]);
        correct_splits(&mut points, &[SplitEvent { date: d(2024, 1, 1), ratio: 0.5 }]);
        assert_eq!(closes(&points), vec![Some(10.0), Some(30.0)]);
    }

    #[test]
    fn test_currency_conversion_uses_same_day_rate() {
        let mut points = vec![
            PricePoint::new(d(2024, 1, 2), Some(100.0)),
            PricePoint::new(d(2024, 1, 3), Some(200.0)),
        ];
        let rates = BTreeMap::from([(d(2024, 1, 2), 1.1), (d(2024, 1, 3), 1.2)]);

        convert_currency(&mut points, &rates);

        let got = closes(&points);
        assert!((got[0].unwrap() - 110.0).abs() < 1e-9);
        assert!((got[1].unwrap() - 240.0).abs() < 1e-9);
    }

    #[test]
    fn test_missing_rate_drops_price() {
        let mut points = vec![
            PricePoint::new(d(2024, 1, 2), Some(100.0)),
            PricePoint::new(d(2024, 1, 3), Some(200.0)),
        ];
        let rates = BTreeMap::from([(d(2024, 1, 2), 1.1)]);

        convert_currency(&mut points, &rates);

        assert!((points[0].close.unwrap() - 110.0).abs() < 1e-9);
        assert_eq!(points[1].close, None);
    }

    #[test]
    fn test_normalize_sorts_dedups_and_clears_non_finite() {
        let bars = vec![
            PricePoint::new(d(2024, 1, 3), Some(f64::NAN)),
            PricePoint::new(d(2024, 1, 2), Some(1.0)),
            PricePoint::new(d(2024, 1, 2), Some(2.0)),
            PricePoint::new(d(2024, 1, 4), Some(f64::INFINITY)),
            PricePoint::new(d(2024, 1, 9), Some(3.0)),
        ];

        let points = normalize_points(bars, d(2024, 1, 1), d(2024, 1, 9));

        assert_eq!(points.len(), 3);
        assert_eq!(points[0], PricePoint::new(d(2024, 1, 2), Some(1.0)));
        assert_eq!(points[1].close, None);
        assert_eq!(points[2].close, None);
    }

    #[test]
    fn test_monthly_resample_keeps_last_trading_day() {
        let points = vec![
            PricePoint::new(d(2024, 1, 30), Some(1.0)),
            PricePoint::new(d(2024, 1, 31), Some(2.0)),
            PricePoint::new(d(2024, 2, 28), Some(3.0)),
            PricePoint::new(d(2024, 2, 29), None),
            PricePoint::new(d(2024, 3, 29), None),
        ];

        let monthly = resample_monthly(&points);

        assert_eq!(
            monthly,
            vec![
                PricePoint::new(d(2024, 1, 31), Some(2.0)),
                PricePoint::new(d(2024, 2, 28), Some(3.0)),
            ]
        );
    }

    #[test]
    fn test_date_axis_is_sorted_union() {
        let a = vec![PricePoint::new(d(2024, 1, 3), Some(1.0)), PricePoint::new(d(2024, 1, 5), Some(1.0))];
        let b = vec![PricePoint::new(d(2024, 1, 2), Some(1.0)), PricePoint::new(d(2024, 1, 3), Some(1.0))];

        let axis = build_date_axis([a.as_slice(), b.as_slice()]);

        assert_eq!(axis, vec![d(2024, 1, 2), d(2024, 1, 3), d(2024, 1, 5)]);
        assert_eq!(reindex(&a, &axis), vec![None, Some(1.0), Some(1.0)]);
    }

    #[test]
    fn test_parse_ticker_list_trims_and_dedups() {
        assert_eq!(parse_ticker_list(" AAPL, MSFT,,AAPL ,SAP.DE"), vec!["AAPL", "MSFT", "SAP.DE"]);
        assert!(parse_ticker_list(" , ").is_empty());
    }

    #[test]
    fn test_symbol_validation() {
        assert!(is_valid_symbol("BRK-B"));
        assert!(is_valid_symbol("EURUSD=X"));
        assert!(is_valid_symbol("^GSPC"));
        assert!(!is_valid_symbol("AAPL; DROP"));
        assert!(!is_valid_symbol(""));
    }

    #[tokio::test]
    async fn test_align_builds_rectangular_panel() {
        let provider = MockProvider::new()
            .with_closes("AAPL", &[(d(2024, 1, 2), 185.0), (d(2024, 1, 3), 184.0)])
            .with_name("AAPL", "Apple Inc.")
            .with_closes("VOD.L", &[(d(2024, 1, 3), 70.0), (d(2024, 1, 4), 71.0)])
            .failing("BAD", PriceProviderError::BadResponse("HTTP 500".into()));
        let tickers = vec!["AAPL".to_string(), "VOD.L".to_string(), "BAD".to_string()];

        let batch = align(
            &provider,
            &tickers,
            d(2024, 1, 1),
            d(2024, 2, 1),
            &AlignmentConfig::default(),
            far_deadline(),
        )
        .await;

        let panel = &batch.panel;
        assert_eq!(panel.dates, vec![d(2024, 1, 2), d(2024, 1, 3), d(2024, 1, 4)]);
        assert!(panel.prices.values().all(|row| row.len() == panel.dates.len()));
        assert_eq!(panel.prices["AAPL"], vec![Some(185.0), Some(184.0), None]);
        assert_eq!(panel.prices["VOD.L"], vec![None, Some(70.0), Some(71.0)]);
        assert_eq!(panel.prices["BAD"], vec![None, None, None]);
        assert_eq!(panel.names["AAPL"], "Apple Inc.");
        assert_eq!(panel.names["VOD.L"], "VOD.L");
        assert!(batch.errors.contains_key("BAD"));
        assert!(!batch.all_failed());
    }

    #[tokio::test]
    async fn test_align_converts_foreign_currency() {
        let provider = MockProvider::new()
            .with_closes("SAP.DE", &[(d(2024, 1, 2), 100.0), (d(2024, 1, 3), 200.0)])
            .with_currency("SAP.DE", "EUR")
            .with_closes("EURUSD=X", &[(d(2024, 1, 2), 1.1)]);
        let tickers = vec!["SAP.DE".to_string()];

        let batch = align(
            &provider,
            &tickers,
            d(2024, 1, 1),
            d(2024, 2, 1),
            &AlignmentConfig::default(),
            far_deadline(),
        )
        .await;

        let row = &batch.panel.prices["SAP.DE"];
        assert!((row[0].unwrap() - 110.0).abs() < 1e-9);
        assert_eq!(row[1], None);
    }

    #[tokio::test]
    async fn test_align_applies_provider_splits() {
        let closes_before_and_after = [
            (d(2024, 1, 2), 1000.0),
            (d(2024, 1, 3), 1010.0),
            (d(2024, 1, 4), 101.0),
            (d(2024, 1, 5), 102.0),
        ];
        let provider = MockProvider::new()
            .with_closes("NVDA", &closes_before_and_after)
            .with_splits("NVDA", vec![SplitEvent { date: d(2024, 1, 4), ratio: 0.1 }])
            .with_closes("ABC", &closes_before_and_after)
            .failing_splits("ABC", PriceProviderError::Network("reset".into()));
        let tickers = vec!["NVDA".to_string(), "ABC".to_string()];

        let batch = align(
            &provider,
            &tickers,
            d(2024, 1, 1),
            d(2024, 2, 1),
            &AlignmentConfig::default(),
            far_deadline(),
        )
        .await;

        let nvda = &batch.panel.prices["NVDA"];
        assert!((nvda[0].unwrap() - 100.0).abs() < 1e-9);
        assert!((nvda[1].unwrap() - 101.0).abs() < 1e-9);
        assert_eq!(nvda[2], Some(101.0));
        // split lookup failure keeps the raw closes
        assert_eq!(batch.panel.prices["ABC"][0], Some(1000.0));
        assert!(batch.errors.is_empty());

        let unadjusted = align(
            &provider,
            &tickers[..1],
            d(2024, 1, 1),
            d(2024, 2, 1),
            &AlignmentConfig { split_correction: false, ..AlignmentConfig::default() },
            far_deadline(),
        )
        .await;
        assert_eq!(unadjusted.panel.prices["NVDA"][0], Some(1000.0));
    }

    #[tokio::test]
    async fn test_align_without_any_usable_price_counts_as_failure() {
        let provider = MockProvider::new()
            .with_closes("SAP.DE", &[(d(2024, 1, 2), 100.0), (d(2024, 1, 3), 200.0)])
            .with_currency("SAP.DE", "EUR");
        let tickers = vec!["SAP.DE".to_string()];

        let batch = align(
            &provider,
            &tickers,
            d(2024, 1, 1),
            d(2024, 2, 1),
            &AlignmentConfig::default(),
            far_deadline(),
        )
        .await;

        assert_eq!(batch.panel.prices["SAP.DE"], vec![None, None]);
        assert!(batch.all_failed());
    }

    #[tokio::test]
    async fn test_align_total_failure_yields_empty_axis() {
        let provider = MockProvider::new();
        let tickers = vec!["NOPE".to_string(), "bad symbol!".to_string()];

        let batch = align(
            &provider,
            &tickers,
            d(2024, 1, 1),
            d(2024, 2, 1),
            &AlignmentConfig::default(),
            far_deadline(),
        )
        .await;

        assert!(batch.panel.dates.is_empty());
        assert!(batch.panel.prices.values().all(|row| row.is_empty()));
        assert_eq!(batch.errors["bad symbol!"], "malformed symbol");
        assert!(batch.all_failed());
    }

    #[tokio::test]
    async fn test_slow_ticker_misses_deadline_without_hurting_siblings() {
        let provider = MockProvider::new()
            .with_closes("FAST", &[(d(2024, 1, 2), 1.0)])
            .with_closes("SLOW", &[(d(2024, 1, 2), 2.0)])
            .delayed("SLOW", Duration::from_secs(5));
        let tickers = vec!["FAST".to_string(), "SLOW".to_string()];

        let batch = align(
            &provider,
            &tickers,
            d(2024, 1, 1),
            d(2024, 2, 1),
            &AlignmentConfig::default(),
            Instant::now() + Duration::from_millis(50),
        )
        .await;

        assert_eq!(batch.panel.prices["FAST"], vec![Some(1.0)]);
        assert_eq!(batch.panel.prices["SLOW"], vec![None]);
        assert!(batch.errors["SLOW"].contains("timed out"));
    }
}

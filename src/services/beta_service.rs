use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use chrono::{Datelike, NaiveDate};
use tokio::time::Instant;
use tracing::{info, warn};

use crate::external::price_provider::PriceProvider;
use crate::models::{Basis, BetaResult, BetaValue, PricePoint, Tenor};
use crate::services::alignment_service::{self, AlignmentConfig, Resample};

/// Which return series get clipped before estimating beta.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ReturnClip {
    #[default]
    Off,
    MonthlyOnly,
    All,
}

impl ReturnClip {
    fn applies_to(self, basis: Basis) -> bool {
        match self {
            ReturnClip::Off => false,
            ReturnClip::MonthlyOnly => basis == Basis::Monthly,
            ReturnClip::All => true,
        }
    }
}

impl FromStr for ReturnClip {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "off" | "none" => Ok(ReturnClip::Off),
            "monthly" => Ok(ReturnClip::MonthlyOnly),
            "all" => Ok(ReturnClip::All),
            other => Err(format!("unknown clip policy '{}', expected off, monthly or all", other)),
        }
    }
}

impl fmt::Display for ReturnClip {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            ReturnClip::Off => "off",
            ReturnClip::MonthlyOnly => "monthly",
            ReturnClip::All => "all",
        };
        f.write_str(label)
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BetaConfig {
    pub clip: ReturnClip,
    /// Symmetric bound for clipped log returns
    pub clip_bound: f64,
}

impl Default for BetaConfig {
    fn default() -> Self {
        Self {
            clip: ReturnClip::Off,
            clip_bound: 0.30,
        }
    }
}

/// Betas for every tenor plus an annotation when nothing could be computed.
#[derive(Debug, Clone, PartialEq)]
pub struct BetaReport {
    pub betas: BetaResult,
    pub error: Option<String>,
}

/// Paired (subject, benchmark) log returns.
pub type ReturnPairs = Vec<(f64, f64)>;

type JoinedRow = (NaiveDate, Option<f64>, Option<f64>);

/// Estimates beta of `subject` against `benchmark` for every tenor.
///
/// Both legs run through the per-ticker alignment pipeline concurrently.
/// If either leg fails, or the two share no date on which both carry a
/// price, every tenor is "N/A" and `error` says why.
#[allow(clippy::too_many_arguments)]
pub async fn beta(
    provider: &dyn PriceProvider,
    subject: &str,
    benchmark: &str,
    start: NaiveDate,
    end: NaiveDate,
    align_config: &AlignmentConfig,
    config: &BetaConfig,
    deadline: Instant,
) -> BetaReport {
    let daily = AlignmentConfig {
        resample: Resample::Daily,
        ..*align_config
    };

    let (subject_outcome, benchmark_outcome) = tokio::join!(
        alignment_service::acquire_with_deadline(provider, subject, start, end, &daily, deadline),
        alignment_service::acquire_with_deadline(provider, benchmark, start, end, &daily, deadline),
    );

    let legs = match (subject_outcome, benchmark_outcome) {
        (Ok(s), Ok(b)) => Ok((s, b)),
        (Err(e), Ok(_)) | (Ok(_), Err(e)) => Err(format!("{}: {}", e.symbol, e.reason)),
        (Err(s), Err(b)) => Err(format!("{}: {}; {}: {}", s.symbol, s.reason, b.symbol, b.reason)),
    };

    let (subject_series, benchmark_series) = match legs {
        Ok(legs) => legs,
        Err(error) => {
            warn!("✗ Beta {} vs {} unavailable: {}", subject, benchmark, error);
            return BetaReport {
                betas: BetaResult::all_unavailable(),
                error: Some(error),
            };
        }
    };

    let joined = join_daily(&subject_series.points, &benchmark_series.points);
    if !joined.iter().any(|(_, s, b)| s.is_some() && b.is_some()) {
        warn!("✗ {} and {} share no priced trading dates", subject, benchmark);
        return BetaReport {
            betas: BetaResult::all_unavailable(),
            error: Some(format!("{} and {} have no overlapping dates with prices", subject, benchmark)),
        };
    }

    let betas = compute_betas(&subject_series.points, &benchmark_series.points, config);
    info!(
        "✓ Beta {} vs {}: {} of {} tenors available (clip={})",
        subject,
        benchmark,
        betas.iter().filter(|(_, v)| v.is_available()).count(),
        Tenor::ALL.len(),
        config.clip
    );

    BetaReport { betas, error: None }
}

/// Betas for every tenor from two normalized daily series.
pub fn compute_betas(subject: &[PricePoint], benchmark: &[PricePoint], config: &BetaConfig) -> BetaResult {
    let daily = log_returns(&join_daily(subject, benchmark));
    let monthly = log_returns(&join_monthly(
        &alignment_service::resample_monthly(subject),
        &alignment_service::resample_monthly(benchmark),
    ));

    let entries = Tenor::ALL
        .iter()
        .map(|tenor| {
            let basis = tenor.basis();
            let returns = match basis {
                Basis::Daily => &daily,
                Basis::Monthly => &monthly,
            };
            let bound = config.clip.applies_to(basis).then_some(config.clip_bound);
            (*tenor, tenor_beta(returns, tenor.required_observations(), bound))
        })
        .collect();

    BetaResult::new(entries)
}

/// Beta over the trailing `required` pairs, or "N/A" if there are fewer.
pub fn tenor_beta(returns: &[(f64, f64)], required: usize, clip_bound: Option<f64>) -> BetaValue {
    if required == 0 || returns.len() < required {
        return BetaValue::NotAvailable;
    }

    let window = &returns[returns.len() - required..];
    let (subject, bench): (Vec<f64>, Vec<f64>) = match clip_bound {
        Some(bound) => window
            .iter()
            .map(|(s, b)| (s.clamp(-bound, bound), b.clamp(-bound, bound)))
            .unzip(),
        None => window.iter().copied().unzip(),
    };

    compute_beta(&subject, &bench)
}

/// Covariance of the two series over the benchmark's variance.
pub fn compute_beta(subject: &[f64], bench: &[f64]) -> BetaValue {
    if subject.len() != bench.len() || subject.len() < 2 {
        return BetaValue::NotAvailable;
    }

    let n = subject.len() as f64;
    let mean_s = subject.iter().sum::<f64>() / n;
    let mean_b = bench.iter().sum::<f64>() / n;

    let mut cov = 0.0;
    let mut var_b = 0.0;
    for (s, b) in subject.iter().zip(bench) {
        cov += (s - mean_s) * (b - mean_b);
        var_b += (b - mean_b) * (b - mean_b);
    }

    if var_b.abs() < f64::EPSILON || !var_b.is_finite() {
        return BetaValue::NotAvailable;
    }

    BetaValue::Value(cov / var_b)
}

/// Rows for dates present in both series.
pub fn join_daily(subject: &[PricePoint], benchmark: &[PricePoint]) -> Vec<JoinedRow> {
    join_on(subject, benchmark, |d| (d.year(), d.month(), d.day()))
}

/// Rows for calendar months present in both series, dated by the subject.
pub fn join_monthly(subject: &[PricePoint], benchmark: &[PricePoint]) -> Vec<JoinedRow> {
    join_on(subject, benchmark, |d| (d.year(), d.month(), 0))
}

fn join_on<K, F>(subject: &[PricePoint], benchmark: &[PricePoint], key: F) -> Vec<JoinedRow>
where
    K: Ord,
    F: Fn(NaiveDate) -> K,
{
    let bench_by_key: BTreeMap<K, Option<f64>> = benchmark.iter().map(|p| (key(p.date), p.close)).collect();
    subject
        .iter()
        .filter_map(|p| bench_by_key.get(&key(p.date)).map(|b| (p.date, p.close, *b)))
        .collect()
}

/// `ln(p[i] / p[i-1])` for both legs over consecutive joined rows.
///
/// A step is dropped when any of its four prices is absent or not positive.
pub fn log_returns(rows: &[JoinedRow]) -> ReturnPairs {
    rows.windows(2)
        .filter_map(|w| {
            let (_, s0, b0) = w[0];
            let (_, s1, b1) = w[1];
            let (s0, s1, b0, b1) = (positive(s0)?, positive(s1)?, positive(b0)?, positive(b1)?);
            Some(((s1 / s0).ln(), (b1 / b0).ln()))
        })
        .collect()
}

fn positive(price: Option<f64>) -> Option<f64> {
    price.filter(|p| p.is_finite() && *p > 0.0)
}

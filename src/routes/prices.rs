use axum::extract::{Path, Query, State};
use axum::routing::get;
use axum::{Json, Router};
use serde::Deserialize;
use tokio::time::Instant;
use tracing::{info, warn};

use crate::errors::AppError;
use crate::models::HistoricalPricesResponse;
use crate::routes::{parse_date_range, parse_tickers};
use crate::services::alignment_service::{self, AlignmentConfig, Resample};
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new().route("/:tickers/:start_date/:end_date", get(get_historical_prices))
}

/// Per-request overrides of the configured alignment flags.
#[derive(Debug, Default, Deserialize)]
pub struct AlignmentQuery {
    pub outlier_filter: Option<bool>,
    pub split_correction: Option<bool>,
    pub currency_conversion: Option<bool>,
    pub resample: Option<Resample>,
}

impl AlignmentQuery {
    fn apply(&self, base: AlignmentConfig) -> AlignmentConfig {
        AlignmentConfig {
            outlier_filter: self.outlier_filter.unwrap_or(base.outlier_filter),
            split_correction: self.split_correction.unwrap_or(base.split_correction),
            currency_conversion: self.currency_conversion.unwrap_or(base.currency_conversion),
            resample: self.resample.unwrap_or(base.resample),
        }
    }
}

/// GET /historical-prices/:tickers/:start_date/:end_date
///
/// `tickers` is comma separated. Tickers that fail are listed under
/// `errors` with empty rows; when none succeed `error` is set and `dates`
/// is empty.
///
/// Example: GET /historical-prices/AAPL,MSFT/2024-01-01/2024-06-30?resample=monthly
pub async fn get_historical_prices(
    Path((tickers, start_date, end_date)): Path<(String, String, String)>,
    Query(params): Query<AlignmentQuery>,
    State(state): State<AppState>,
) -> Result<Json<HistoricalPricesResponse>, AppError> {
    info!(
        "GET /historical-prices/{}/{}/{} - Aligning price history",
        tickers, start_date, end_date
    );

    let (start, end) = parse_date_range(&start_date, &end_date)?;
    let tickers = parse_tickers(&tickers)?;
    let config = params.apply(state.config.alignment);
    let deadline = Instant::now() + state.config.request_timeout;

    let batch = alignment_service::align(
        state.price_provider.as_ref(),
        &tickers,
        start,
        end,
        &config,
        deadline,
    )
    .await;

    let error = if batch.all_failed() {
        warn!("✗ No price data for any of {:?}", tickers);
        Some("no price data returned for any requested ticker".to_string())
    } else {
        None
    };

    info!(
        "✓ Aligned {} tickers on {} dates ({} failed)",
        batch.panel.prices.len(),
        batch.panel.dates.len(),
        batch.errors.len()
    );

    Ok(Json(HistoricalPricesResponse {
        panel: batch.panel,
        errors: batch.errors,
        error,
    }))
}

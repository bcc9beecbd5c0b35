use axum::extract::{Path, State};
use axum::routing::get;
use axum::{Json, Router};
use tokio::time::Instant;
use tracing::info;

use crate::errors::AppError;
use crate::models::BetaResponse;
use crate::routes::parse_date_range;
use crate::services::beta_service;
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new().route("/:ticker/:benchmark/:start_date/:end_date", get(calculate_beta))
}

/// GET /calculate_beta/:ticker/:benchmark/:start_date/:end_date
///
/// Example: GET /calculate_beta/AAPL/SPY/2019-01-01/2024-01-01
pub async fn calculate_beta(
    Path((ticker, benchmark, start_date, end_date)): Path<(String, String, String, String)>,
    State(state): State<AppState>,
) -> Result<Json<BetaResponse>, AppError> {
    info!(
        "GET /calculate_beta/{}/{}/{}/{} - Calculating beta",
        ticker, benchmark, start_date, end_date
    );

    let (start, end) = parse_date_range(&start_date, &end_date)?;
    let ticker = ticker.trim().to_string();
    let benchmark = benchmark.trim().to_string();
    let deadline = Instant::now() + state.config.request_timeout;

    let report = beta_service::beta(
        state.price_provider.as_ref(),
        &ticker,
        &benchmark,
        start,
        end,
        &state.config.alignment,
        &state.config.beta,
        deadline,
    )
    .await;

    Ok(Json(BetaResponse {
        ticker,
        benchmark,
        betas: report.betas,
        error: report.error,
    }))
}

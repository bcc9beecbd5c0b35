use axum::extract::{Path, State};
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::Utc;
use tokio::time::Instant;
use tracing::info;

use crate::errors::AppError;
use crate::models::{ScrapeBatchRequest, ScrapeResult};
use crate::services::scrape_service;
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/scrape/:ticker", get(scrape_ticker))
        .route("/scrape_batch", post(scrape_batch))
}

pub async fn scrape_ticker(
    Path(ticker): Path<String>,
    State(state): State<AppState>,
) -> Result<Json<ScrapeResult>, AppError> {
    info!("GET /scrape/{} - Building metrics snapshot", ticker);

    let deadline = Instant::now() + state.config.request_timeout;
    let result = scrape_service::scrape_ticker(
        state.price_provider.as_ref(),
        ticker.trim(),
        Utc::now().date_naive(),
        deadline,
    )
    .await;

    Ok(Json(result))
}

/// POST /scrape_batch with `{"tickers": ["AAPL", "MSFT"]}`
pub async fn scrape_batch(
    State(state): State<AppState>,
    Json(request): Json<ScrapeBatchRequest>,
) -> Result<Json<Vec<ScrapeResult>>, AppError> {
    info!("POST /scrape_batch - {} tickers", request.tickers.len());

    let tickers = crate::routes::parse_tickers(&request.tickers.join(","))?;
    let deadline = Instant::now() + state.config.request_timeout;
    let results = scrape_service::scrape_batch(
        state.price_provider.as_ref(),
        &tickers,
        Utc::now().date_naive(),
        deadline,
    )
    .await;

    Ok(Json(results))
}

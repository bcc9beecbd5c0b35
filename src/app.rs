use axum::Router;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::routes::{beta, health, prices, scrape};
use crate::state::AppState;

pub fn create_app(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::<AppState>::new()
        .nest("/health", health::router())
        .nest("/historical-prices", prices::router())
        .nest("/calculate_beta", beta::router())
        .merge(scrape::router())
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

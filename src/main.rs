use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::{anyhow, bail, Context};
use tokio::net::TcpListener;

use pricegrid_backend::app;
use pricegrid_backend::config::AppConfig;
use pricegrid_backend::external::price_provider::PriceProvider;
use pricegrid_backend::external::retrying_provider::RetryingProvider;
use pricegrid_backend::external::yahoofinance::YahooFinanceProvider;
use pricegrid_backend::logging::{init_logging, LoggingConfig};
use pricegrid_backend::state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    // Initialize logging FIRST
    init_logging(LoggingConfig::from_env()).map_err(|e| anyhow!("failed to initialize logging: {}", e))?;

    let config = AppConfig::from_env()?;

    let provider: Arc<dyn PriceProvider> = match config.price_provider.as_str() {
        "yahoo" => {
            tracing::info!(
                "📊 Using price provider: Yahoo Finance ({} retries, {:?})",
                config.retry.max_retries,
                config.retry.backoff
            );
            Arc::new(RetryingProvider::new(YahooFinanceProvider::new(), config.retry))
        }
        other => bail!("Invalid PRICE_PROVIDER: {}. Must be 'yahoo'", other),
    };

    if config.openai_api_key.is_some() {
        tracing::info!("🤖 OPENAI_API_KEY configured");
    } else {
        tracing::info!("🤖 OPENAI_API_KEY not set, text generation disabled");
    }

    let addr = SocketAddr::new(config.bind_addr, config.port);
    let state = AppState {
        price_provider: provider,
        config: Arc::new(config),
    };
    let app = app::create_app(state);

    let listener = TcpListener::bind(&addr)
        .await
        .with_context(|| format!("failed to bind {}", addr))?;
    tracing::info!("🚀 Pricegrid backend running at http://{}/", addr);
    axum::serve(listener, app).await?;

    Ok(())
}

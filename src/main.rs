use std::sync::Arc;
use std::time::Duration;
use anyhow::Context;
use price_oracle::api::create_router;
use price_oracle::config::loader::AppConfig;
use price_oracle::event_log::producer::KafkaPriceStore;
use price_oracle::interfaces::price_store::{NoopPriceStore, PriceStore};
use price_oracle::observability::{metrics, tracing::init_tracing};
use price_oracle::PriceOracle;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let env = std::env::var("PRICE_ORACLE_ENV").unwrap_or_else(|_| "development".to_string());
    let config = AppConfig::load(&env).context("loading configuration")?;

    init_tracing(config.log.json);
    metrics::register_metrics()?;

    let store: Arc<dyn PriceStore> = match &config.kafka {
        Some(kafka) => Arc::new(KafkaPriceStore::new(&kafka.brokers, &kafka.topic)?),
        None => {
            tracing::warn!("No kafka section configured, aggregates will not be persisted");
            Arc::new(NoopPriceStore)
        }
    };

    let client = reqwest::Client::builder()
        .connect_timeout(Duration::from_secs(5))
        .build()
        .context("building HTTP client")?;

    let oracle = Arc::new(PriceOracle::from_config(&config.aggregator, client, store)?);
    oracle.start();

    let listener = tokio::net::TcpListener::bind(&config.server.bind_address)
        .await
        .with_context(|| format!("binding {}", config.server.bind_address))?;
    tracing::info!(address = %config.server.bind_address, env = %env, "Price oracle listening");

    axum::serve(listener, create_router(Arc::clone(&oracle)))
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            tracing::info!("Shutdown signal received");
        })
        .await?;

    oracle.stop();
    Ok(())
}

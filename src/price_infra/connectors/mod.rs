pub mod binance;
pub mod coinbase;
pub mod kraken;

use std::sync::Arc;
use async_trait::async_trait;
use crate::config::SourceConfig;
use crate::error::{Error, FetchError, Result};
use crate::types::Quote;

pub use binance::BinanceConnector;
pub use coinbase::CoinbaseConnector;
pub use kraken::KrakenConnector;

/// One external quote feed. Implementations make exactly one request per call
/// and never retry; timeouts and retries belong to `SourceRunner`.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait PriceConnector: Send + Sync {
    fn source_id(&self) -> &str;
    async fn fetch_quote(&self) -> std::result::Result<Quote, FetchError>;
}

/// Builds the connector registered under `name`.
pub fn build_connector(
    name: &str,
    config: &SourceConfig,
    client: reqwest::Client,
) -> Result<Arc<dyn PriceConnector>> {
    let base_url = config.base_url.as_deref();
    let connector: Arc<dyn PriceConnector> = match name {
        "binance" => Arc::new(BinanceConnector::new(client, &config.symbol, base_url)),
        "coinbase" => Arc::new(CoinbaseConnector::new(client, &config.symbol, base_url)),
        "kraken" => Arc::new(KrakenConnector::new(client, &config.symbol, base_url)),
        other => return Err(Error::ConfigError(format!("unknown price source: {}", other))),
    };
    Ok(connector)
}

/// Exchanges send prices as decimal strings.
pub(crate) fn parse_price(raw: &str) -> std::result::Result<f64, FetchError> {
    raw.trim()
        .parse::<f64>()
        .map_err(|_| FetchError::InvalidPrice(raw.to_string()))
}

/// Reads the body and decodes it strictly, mapping non-2xx to `FetchError::Status`
/// unless the feed reports errors in-band.
pub(crate) async fn decode_body<T: serde::de::DeserializeOwned>(
    response: reqwest::Response,
) -> std::result::Result<T, FetchError> {
    let status = response.status();
    let body = response.bytes().await?;
    match serde_json::from_slice::<T>(&body) {
        Ok(decoded) => Ok(decoded),
        Err(_) if !status.is_success() => Err(FetchError::Status(status.as_u16())),
        Err(e) => Err(FetchError::Malformed(e.to_string())),
    }
}

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use crate::price_infra::connectors::{decode_body, parse_price, PriceConnector};
use crate::error::FetchError;
use crate::types::Quote;

const COINBASE_REST_URL: &str = "https://api.exchange.coinbase.com";

pub struct CoinbaseConnector {
    source_id: String,
    url: String,
    client: reqwest::Client,
}

impl CoinbaseConnector {
    pub fn new(client: reqwest::Client, symbol: &str, base_url: Option<&str>) -> Self {
        let base = base_url.unwrap_or(COINBASE_REST_URL).trim_end_matches('/');
        CoinbaseConnector {
            source_id: "coinbase".to_string(),
            url: format!("{}/products/{}/ticker", base, symbol.to_uppercase()),
            client,
        }
    }
}

#[async_trait]
impl PriceConnector for CoinbaseConnector {
    fn source_id(&self) -> &str {
        &self.source_id
    }

    async fn fetch_quote(&self) -> Result<Quote, FetchError> {
        // Coinbase rejects requests without a User-Agent.
        let response = self.client
            .get(&self.url)
            .header(reqwest::header::USER_AGENT, "price-oracle")
            .send()
            .await?;

        match decode_body::<CoinbaseResponse>(response).await? {
            CoinbaseResponse::Ticker(ticker) => {
                let price = parse_price(&ticker.price)?;
                let bid = parse_price(&ticker.bid)?;
                let ask = parse_price(&ticker.ask)?;
                Quote::new(price, ticker.time, &self.source_id, spread_confidence(price, bid, ask))
            }
            CoinbaseResponse::Error { message } => Err(FetchError::Rejected(message)),
        }
    }
}

/// Tighter book, higher confidence. A crossed or empty book yields no confidence.
fn spread_confidence(price: f64, bid: f64, ask: f64) -> Option<f64> {
    if price <= 0.0 || bid <= 0.0 || ask < bid {
        return None;
    }
    Some((1.0 - (ask - bid) / price).clamp(0.0, 1.0))
}

#[derive(Deserialize)]
#[serde(untagged)]
enum CoinbaseResponse {
    Ticker(CoinbaseTicker),
    Error { message: String },
}

#[derive(Deserialize)]
struct CoinbaseTicker {
    price: String,
    bid: String,
    ask: String,
    time: DateTime<Utc>,
}

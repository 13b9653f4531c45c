use async_trait::async_trait;
use chrono::Utc;
use serde::Deserialize;
use crate::price_infra::connectors::{decode_body, parse_price, PriceConnector};
use crate::error::FetchError;
use crate::types::Quote;

const BINANCE_REST_URL: &str = "https://api.binance.com";

pub struct BinanceConnector {
    source_id: String,
    symbol: String,
    url: String,
    client: reqwest::Client,
}

impl BinanceConnector {
    pub fn new(client: reqwest::Client, symbol: &str, base_url: Option<&str>) -> Self {
        let base = base_url.unwrap_or(BINANCE_REST_URL).trim_end_matches('/');
        BinanceConnector {
            source_id: "binance".to_string(),
            symbol: symbol.to_uppercase(),
            url: format!("{}/api/v3/ticker/price", base),
            client,
        }
    }
}

#[async_trait]
impl PriceConnector for BinanceConnector {
    fn source_id(&self) -> &str {
        &self.source_id
    }

    async fn fetch_quote(&self) -> Result<Quote, FetchError> {
        let response = self.client
            .get(&self.url)
            .query(&[("symbol", self.symbol.as_str())])
            .send()
            .await?;

        match decode_body::<BinanceResponse>(response).await? {
            BinanceResponse::Ticker(ticker) => {
                if ticker.symbol != self.symbol {
                    return Err(FetchError::Malformed(format!(
                        "expected symbol {}, got {}",
                        self.symbol, ticker.symbol
                    )));
                }
                // The price endpoint carries no timestamp.
                Quote::new(parse_price(&ticker.price)?, Utc::now(), &self.source_id, None)
            }
            BinanceResponse::Error(err) => {
                Err(FetchError::Rejected(format!("{} (code {})", err.msg, err.code)))
            }
        }
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum BinanceResponse {
    Ticker(BinanceTicker),
    Error(BinanceError),
}

#[derive(Deserialize)]
struct BinanceTicker {
    symbol: String,
    price: String,
}

#[derive(Deserialize)]
struct BinanceError {
    code: i64,
    msg: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    async fn connector_for(server: &MockServer) -> BinanceConnector {
        BinanceConnector::new(reqwest::Client::new(), "ethusdt", Some(&server.uri()))
    }

    #[tokio::test]
    async fn test_fetch_quote() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/v3/ticker/price"))
            .and(query_param("symbol", "ETHUSDT"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "symbol": "ETHUSDT",
                "price": "3012.45000000"
            })))
            .mount(&server)
            .await;

        let quote = connector_for(&server).await.fetch_quote().await.unwrap();
        assert_eq!(quote.value(), 3012.45);
        assert_eq!(quote.source_name(), "binance");
        assert_eq!(quote.confidence(), None);
    }

    #[tokio::test]
    async fn test_in_band_error_is_rejected() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/v3/ticker/price"))
            .respond_with(ResponseTemplate::new(400).set_body_json(serde_json::json!({
                "code": -1121,
                "msg": "Invalid symbol."
            })))
            .mount(&server)
            .await;

        let err = connector_for(&server).await.fetch_quote().await.unwrap_err();
        assert!(matches!(err, FetchError::Rejected(msg) if msg.contains("Invalid symbol")));
    }

    #[tokio::test]
    async fn test_missing_price_field_is_malformed() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/v3/ticker/price"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "symbol": "ETHUSDT"
            })))
            .mount(&server)
            .await;

        let err = connector_for(&server).await.fetch_quote().await.unwrap_err();
        assert!(matches!(err, FetchError::Malformed(_)));
    }

    #[tokio::test]
    async fn test_server_error_maps_to_status() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(503).set_body_string("maintenance"))
            .mount(&server)
            .await;

        let err = connector_for(&server).await.fetch_quote().await.unwrap_err();
        assert_eq!(err, FetchError::Status(503));
    }
}

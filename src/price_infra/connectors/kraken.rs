use std::collections::HashMap;
use async_trait::async_trait;
use chrono::Utc;
use serde::Deserialize;
use crate::price_infra::connectors::{decode_body, parse_price, PriceConnector};
use crate::error::FetchError;
use crate::types::Quote;

const KRAKEN_REST_URL: &str = "https://api.kraken.com";

pub struct KrakenConnector {
    source_id: String,
    pair: String,
    url: String,
    client: reqwest::Client,
}

impl KrakenConnector {
    pub fn new(client: reqwest::Client, symbol: &str, base_url: Option<&str>) -> Self {
        let base = base_url.unwrap_or(KRAKEN_REST_URL).trim_end_matches('/');
        KrakenConnector {
            source_id: "kraken".to_string(),
            pair: symbol.to_uppercase(),
            url: format!("{}/0/public/Ticker", base),
            client,
        }
    }
}

#[async_trait]
impl PriceConnector for KrakenConnector {
    fn source_id(&self) -> &str {
        &self.source_id
    }

    async fn fetch_quote(&self) -> Result<Quote, FetchError> {
        let response = self.client
            .get(&self.url)
            .query(&[("pair", self.pair.as_str())])
            .send()
            .await?;

        let body: KrakenResponse = decode_body(response).await?;
        if !body.error.is_empty() {
            return Err(FetchError::Rejected(body.error.join("; ")));
        }

        // Kraken answers with its canonical pair name (ETHUSD -> XETHZUSD), so the
        // result must hold exactly one ticker rather than one under our key.
        let mut result = body.result.unwrap_or_default();
        if result.len() != 1 {
            return Err(FetchError::Malformed(format!("expected one ticker, got {}", result.len())));
        }
        let ticker = result.drain().map(|(_, t)| t).next()
            .ok_or_else(|| FetchError::Malformed("empty result".to_string()))?;

        let last = ticker.c.first()
            .ok_or_else(|| FetchError::Malformed("missing last trade price".to_string()))?;
        Quote::new(parse_price(last)?, Utc::now(), &self.source_id, None)
    }
}

#[derive(Deserialize)]
struct KrakenResponse {
    error: Vec<String>,
    #[serde(default)]
    result: Option<HashMap<String, KrakenTicker>>,
}

#[derive(Deserialize)]
struct KrakenTicker {
    /// Last trade closed: [price, lot volume]
    c: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn test_fetch_quote_uses_canonical_pair() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/0/public/Ticker"))
            .and(query_param("pair", "ETHUSD"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "error": [],
                "result": {
                    "XETHZUSD": {
                        "a": ["3001.00000", "1", "1.000"],
                        "b": ["3000.90000", "2", "2.000"],
                        "c": ["3000.95000", "0.01000000"]
                    }
                }
            })))
            .mount(&server)
            .await;

        let connector = KrakenConnector::new(reqwest::Client::new(), "ethusd", Some(&server.uri()));
        let quote = connector.fetch_quote().await.unwrap();
        assert_eq!(quote.value(), 3000.95);
        assert_eq!(quote.source_name(), "kraken");
    }

    #[tokio::test]
    async fn test_error_array_is_rejected() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "error": ["EQuery:Unknown asset pair"]
            })))
            .mount(&server)
            .await;

        let connector = KrakenConnector::new(reqwest::Client::new(), "FOOBAR", Some(&server.uri()));
        let err = connector.fetch_quote().await.unwrap_err();
        assert_eq!(err, FetchError::Rejected("EQuery:Unknown asset pair".to_string()));
    }

    #[tokio::test]
    async fn test_empty_last_trade_is_malformed() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "error": [],
                "result": { "XETHZUSD": { "c": [] } }
            })))
            .mount(&server)
            .await;

        let connector = KrakenConnector::new(reqwest::Client::new(), "ETHUSD", Some(&server.uri()));
        assert!(matches!(connector.fetch_quote().await, Err(FetchError::Malformed(_))));
    }
}

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::error::FetchError;

/// Source name carried by every published aggregate.
pub const AGGREGATED_SOURCE: &str = "aggregated";

/// A single reported value. Fields are private so a `Quote` can only be
/// built through [`Quote::new`], which enforces `value > 0`.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Quote {
    value: f64,
    timestamp: DateTime<Utc>,
    source_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    confidence: Option<f64>,
}

impl Quote {
    pub fn new(
        value: f64,
        timestamp: DateTime<Utc>,
        source_name: impl Into<String>,
        confidence: Option<f64>,
    ) -> Result<Self, FetchError> {
        if !value.is_finite() || value <= 0.0 {
            return Err(FetchError::InvalidPrice(value.to_string()));
        }
        Ok(Quote {
            value,
            timestamp,
            source_name: source_name.into(),
            confidence: confidence.filter(|c| c.is_finite()),
        })
    }

    pub fn value(&self) -> f64 {
        self.value
    }

    pub fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    pub fn source_name(&self) -> &str {
        &self.source_name
    }

    pub fn confidence(&self) -> Option<f64> {
        self.confidence
    }

    pub fn is_aggregate(&self) -> bool {
        self.source_name == AGGREGATED_SOURCE
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rejects_non_positive_values() {
        assert!(Quote::new(0.0, Utc::now(), "binance", None).is_err());
        assert!(Quote::new(-1.5, Utc::now(), "binance", None).is_err());
        assert!(Quote::new(f64::NAN, Utc::now(), "binance", None).is_err());
        assert!(Quote::new(f64::INFINITY, Utc::now(), "binance", None).is_err());
    }

    #[test]
    fn test_drops_non_finite_confidence() {
        let quote = Quote::new(100.0, Utc::now(), "coinbase", Some(f64::NAN)).unwrap();
        assert_eq!(quote.confidence(), None);
        assert_eq!(quote.source_name(), "coinbase");
        assert!(!quote.is_aggregate());
    }
}

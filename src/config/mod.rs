use std::collections::BTreeMap;
use std::time::Duration;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

pub mod loader;

/// Durations are written as integer milliseconds in config files.
pub(crate) mod duration_ms {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u64(d.as_millis() as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        u64::deserialize(d).map(Duration::from_millis)
    }
}

#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct SourceConfig {
    /// Lower value = preferred. Orders runners and health output; only affects the
    /// aggregate under `AggregationMethod::PriorityWeightedMedian`.
    #[serde(default = "default_priority")]
    pub priority: u32,
    #[serde(with = "duration_ms", default = "default_timeout")]
    pub timeout: Duration,
    #[serde(default = "default_retry_count")]
    pub retry_count: u32,
    #[serde(with = "duration_ms", default = "default_retry_delay")]
    pub retry_delay: Duration,
    /// Instrument code in the feed's own notation, e.g. `ETHUSDT` or `ETH-USD`.
    pub symbol: String,
    #[serde(default)]
    pub base_url: Option<String>,
}

fn default_priority() -> u32 { 1 }
fn default_timeout() -> Duration { Duration::from_millis(5_000) }
fn default_retry_count() -> u32 { 2 }
fn default_retry_delay() -> Duration { Duration::from_millis(500) }

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AggregationMethod {
    #[default]
    Median,
    PriorityWeightedMedian,
}

#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct AggregatorConfig {
    pub sources: BTreeMap<String, SourceConfig>,
    #[serde(with = "duration_ms")]
    pub update_interval: Duration,
    #[serde(with = "duration_ms")]
    pub cache_time: Duration,
    pub outlier_threshold: f64,
    pub min_sources: usize,
    #[serde(default)]
    pub aggregation_method: AggregationMethod,
}

impl Default for AggregatorConfig {
    fn default() -> Self {
        AggregatorConfig {
            sources: BTreeMap::new(),
            update_interval: Duration::from_secs(30),
            cache_time: Duration::from_secs(60),
            outlier_threshold: 0.05,  // 5%
            min_sources: 1,
            aggregation_method: AggregationMethod::Median,
        }
    }
}

impl AggregatorConfig {
    pub fn validate(&self) -> Result<()> {
        if self.sources.is_empty() {
            return Err(Error::ConfigError("at least one source must be configured".into()));
        }
        if self.min_sources == 0 {
            return Err(Error::ConfigError("min_sources must be at least 1".into()));
        }
        if !(self.outlier_threshold.is_finite() && self.outlier_threshold > 0.0) {
            return Err(Error::ConfigError(format!(
                "outlier_threshold must be a positive fraction, got {}",
                self.outlier_threshold
            )));
        }
        if self.update_interval.is_zero() || self.cache_time.is_zero() {
            return Err(Error::ConfigError("update_interval and cache_time must be non-zero".into()));
        }
        for (name, source) in &self.sources {
            if name == crate::types::AGGREGATED_SOURCE {
                return Err(Error::ConfigError(format!("source name {:?} is reserved", name)));
            }
            if source.timeout.is_zero() {
                return Err(Error::ConfigError(format!("source {}: timeout must be non-zero", name)));
            }
            if source.symbol.trim().is_empty() {
                return Err(Error::ConfigError(format!("source {}: symbol is required", name)));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn source(symbol: &str) -> SourceConfig {
        SourceConfig {
            priority: 1,
            timeout: Duration::from_secs(1),
            retry_count: 0,
            retry_delay: Duration::from_millis(10),
            symbol: symbol.to_string(),
            base_url: None,
        }
    }

    #[test]
    fn test_validate_rejects_empty_sources() {
        let config = AggregatorConfig::default();
        assert!(matches!(config.validate(), Err(Error::ConfigError(_))));
    }

    #[test]
    fn test_validate_rejects_zero_quorum() {
        let mut config = AggregatorConfig::default();
        config.sources.insert("binance".into(), source("ETHUSDT"));
        config.min_sources = 0;
        assert!(config.validate().is_err());

        config.min_sources = 1;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_source_config_defaults_from_json() {
        let parsed: SourceConfig = serde_json::from_str(r#"{"symbol":"ETH-USD","timeout":250}"#).unwrap();
        assert_eq!(parsed.timeout, Duration::from_millis(250));
        assert_eq!(parsed.retry_count, 2);
        assert_eq!(parsed.retry_delay, Duration::from_millis(500));
        assert_eq!(parsed.priority, 1);
        assert!(parsed.base_url.is_none());
    }
}

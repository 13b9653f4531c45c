use crate::config::AggregatorConfig;
use crate::error::{Error, Result};
use config::{Config, File};
use serde::Deserialize;

/// The only two settings the environment may override.
pub const UPDATE_INTERVAL_ENV: &str = "PRICE_ORACLE_UPDATE_INTERVAL_MS";
pub const CACHE_TIME_ENV: &str = "PRICE_ORACLE_CACHE_TIME_MS";

#[derive(Debug, Deserialize)]
pub struct AppConfig {
    pub aggregator: AggregatorConfig,
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub kafka: Option<KafkaConfig>,
    #[serde(default)]
    pub log: LogConfig,
}

#[derive(Debug, Deserialize)]
pub struct ServerConfig {
    pub bind_address: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        ServerConfig { bind_address: "127.0.0.1:8080".to_string() }
    }
}

#[derive(Debug, Deserialize)]
pub struct KafkaConfig {
    pub brokers: String,
    pub topic: String,
}

#[derive(Debug, Default, Deserialize)]
pub struct LogConfig {
    #[serde(default)]
    pub json: bool,
}

impl AppConfig {
    pub fn load(env: &str) -> Result<Self> {
        Self::load_from("config", env, |key| std::env::var(key).ok())
    }

    pub fn load_from(
        dir: &str,
        env: &str,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<Self> {
        let update_interval = parse_ms_override(UPDATE_INTERVAL_ENV, lookup(UPDATE_INTERVAL_ENV))?;
        let cache_time = parse_ms_override(CACHE_TIME_ENV, lookup(CACHE_TIME_ENV))?;

        let config = Config::builder()
            .add_source(File::with_name(&format!("{}/default", dir)))
            .add_source(File::with_name(&format!("{}/{}", dir, env)).required(false))
            .set_override_option("aggregator.update_interval", update_interval)
            .and_then(|b| b.set_override_option("aggregator.cache_time", cache_time))
            .and_then(|b| b.build())
            .map_err(|e| Error::ConfigError(e.to_string()))?;

        let app: AppConfig = config.try_deserialize()
            .map_err(|e| Error::ConfigError(e.to_string()))?;
        app.aggregator.validate()?;
        Ok(app)
    }
}

fn parse_ms_override(key: &str, raw: Option<String>) -> Result<Option<u64>> {
    raw.map(|v| {
        v.trim()
            .parse::<u64>()
            .map_err(|_| Error::ConfigError(format!("{} must be an integer millisecond value, got {:?}", key, v)))
    })
    .transpose()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn write_config(dir: &std::path::Path) {
        std::fs::write(
            dir.join("default.toml"),
            r#"
[aggregator]
update_interval = 30000
cache_time = 60000
outlier_threshold = 0.05
min_sources = 2

[aggregator.sources.binance]
priority = 1
timeout = 2000
retry_count = 2
retry_delay = 250
symbol = "ETHUSDT"

[aggregator.sources.coinbase]
priority = 2
timeout = 2000
retry_count = 1
retry_delay = 250
symbol = "ETH-USD"
"#,
        )
        .unwrap();
    }

    fn temp_dir(name: &str) -> std::path::PathBuf {
        let dir = std::env::temp_dir().join(format!("price-oracle-{}-{}", name, uuid::Uuid::new_v4()));
        std::fs::create_dir_all(&dir).unwrap();
        dir
    }

    #[test]
    fn test_load_defaults() {
        let dir = temp_dir("defaults");
        write_config(&dir);

        let app = AppConfig::load_from(dir.to_str().unwrap(), "test", |_| None).unwrap();
        assert_eq!(app.aggregator.sources.len(), 2);
        assert_eq!(app.aggregator.update_interval, Duration::from_secs(30));
        assert_eq!(app.aggregator.sources["coinbase"].retry_count, 1);
        assert!(app.kafka.is_none());
        assert_eq!(app.server.bind_address, "127.0.0.1:8080");
    }

    #[test]
    fn test_env_overrides_interval_and_cache_time_only() {
        let dir = temp_dir("overrides");
        write_config(&dir);

        let app = AppConfig::load_from(dir.to_str().unwrap(), "test", |key| match key {
            UPDATE_INTERVAL_ENV => Some("1500".to_string()),
            CACHE_TIME_ENV => Some("3000".to_string()),
            _ => Some("0".to_string()),
        })
        .unwrap();

        assert_eq!(app.aggregator.update_interval, Duration::from_millis(1500));
        assert_eq!(app.aggregator.cache_time, Duration::from_millis(3000));
        assert_eq!(app.aggregator.min_sources, 2);
    }

    #[test]
    fn test_rejects_non_numeric_override() {
        let dir = temp_dir("bad-override");
        write_config(&dir);

        let result = AppConfig::load_from(dir.to_str().unwrap(), "test", |key| {
            (key == CACHE_TIME_ENV).then(|| "soon".to_string())
        });
        assert!(matches!(result, Err(Error::ConfigError(_))));
    }
}

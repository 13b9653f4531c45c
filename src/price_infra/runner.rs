use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tracing::Instrument;
use crate::config::SourceConfig;
use crate::error::FetchError;
use crate::observability::metrics::{SOURCE_FETCH_FAILURES, SOURCE_FETCH_LATENCY};
use crate::observability::tracing::trace_fetch;
use crate::price_infra::connectors::PriceConnector;
use crate::price_infra::health::{SourceHealth, SourceStatus};
use crate::types::Quote;

/// Wraps a connector with a per-attempt timeout, exponential backoff between
/// attempts, and the rolling health of the source.
pub struct SourceRunner {
    name: String,
    connector: Arc<dyn PriceConnector>,
    config: SourceConfig,
    health: Mutex<SourceHealth>,
}

impl SourceRunner {
    pub fn new(name: impl Into<String>, connector: Arc<dyn PriceConnector>, config: SourceConfig) -> Self {
        SourceRunner {
            name: name.into(),
            connector,
            config,
            health: Mutex::new(SourceHealth::default()),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn priority(&self) -> u32 {
        self.config.priority
    }

    /// Makes up to `retry_count + 1` attempts. Health is updated after every attempt,
    /// so on failure the caller only has to skip this source.
    pub async fn fetch_with_retry(&self) -> Result<Quote, FetchError> {
        let attempts = self.config.retry_count + 1;
        let mut last_error = FetchError::Network("no attempt made".to_string());

        for attempt in 0..attempts {
            let started = tokio::time::Instant::now();
            let outcome = tokio::time::timeout(self.config.timeout, self.connector.fetch_quote())
                .instrument(trace_fetch(&self.name, attempt))
                .await
                .unwrap_or(Err(FetchError::Timeout(self.config.timeout)));
            SOURCE_FETCH_LATENCY
                .with_label_values(&[self.name.as_str()])
                .observe(started.elapsed().as_secs_f64());

            match outcome {
                Ok(quote) => {
                    self.health().record_success();
                    tracing::debug!(source = %self.name, attempt, value = quote.value(), "Quote fetched");
                    return Ok(quote);
                }
                Err(e) => {
                    SOURCE_FETCH_FAILURES.with_label_values(&[self.name.as_str()]).inc();
                    self.health().record_failure(e.clone());
                    tracing::warn!(source = %self.name, attempt, error = %e, "Quote fetch failed");
                    last_error = e;
                }
            }

            if attempt + 1 < attempts {
                tokio::time::sleep(backoff_delay(self.config.retry_delay, attempt)).await;
            }
        }

        Err(last_error)
    }

    pub fn is_healthy(&self) -> bool {
        self.health().is_healthy()
    }

    pub fn last_error(&self) -> Option<FetchError> {
        self.health().last_error.clone()
    }

    pub fn health_snapshot(&self) -> SourceHealth {
        self.health().clone()
    }

    pub fn status(&self) -> SourceStatus {
        let health = self.health();
        SourceStatus {
            name: self.name.clone(),
            priority: self.config.priority,
            healthy: health.is_healthy(),
            consecutive_failures: health.consecutive_failures,
            last_success_at: health.last_success_at,
            last_error: health.last_error.as_ref().map(|e| e.to_string()),
        }
    }

    fn health(&self) -> MutexGuard<'_, SourceHealth> {
        // Health is plain data; a poisoned lock still holds a usable value.
        self.health.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

/// `retry_delay * 2^attempt`, saturating instead of overflowing.
pub fn backoff_delay(retry_delay: Duration, attempt: u32) -> Duration {
    retry_delay.saturating_mul(2u32.saturating_pow(attempt))
}

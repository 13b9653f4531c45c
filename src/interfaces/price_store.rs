use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use crate::error::Result;
use crate::types::Quote;

/// Row handed to the external history store. `(timestamp, source_name)` is the
/// upsert key, so replaying the same record is harmless.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PriceRecord {
    pub timestamp: DateTime<Utc>,
    pub value: f64,
    pub source_name: String,
    pub confidence: Option<f64>,
}

impl PriceRecord {
    pub fn key(&self) -> String {
        format!("{}:{}", self.source_name, self.timestamp.timestamp_millis())
    }
}

impl From<&Quote> for PriceRecord {
    fn from(quote: &Quote) -> Self {
        PriceRecord {
            timestamp: quote.timestamp(),
            value: quote.value(),
            source_name: quote.source_name().to_string(),
            confidence: quote.confidence(),
        }
    }
}

/// Write-only persistence collaborator. Failures are reported but the
/// aggregator never lets them block serving a price.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait PriceStore: Send + Sync {
    async fn upsert(&self, record: &PriceRecord) -> Result<()>;
}

/// Used when no store is configured.
pub struct NoopPriceStore;

#[async_trait]
impl PriceStore for NoopPriceStore {
    async fn upsert(&self, record: &PriceRecord) -> Result<()> {
        tracing::trace!(key = %record.key(), "No price store configured, dropping record");
        Ok(())
    }
}

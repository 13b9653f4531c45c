use std::time::Duration;
use thiserror::Error;

/// Failure of a single fetch attempt against one quote source.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum FetchError {
    #[error("timeout after {0:?}")]
    Timeout(Duration),

    #[error("network error: {0}")]
    Network(String),

    #[error("non-success response: HTTP {0}")]
    Status(u16),

    #[error("malformed response: {0}")]
    Malformed(String),

    #[error("source rejected request: {0}")]
    Rejected(String),

    #[error("invalid price: {0}")]
    InvalidPrice(String),
}

impl From<reqwest::Error> for FetchError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_decode() {
            FetchError::Malformed(e.to_string())
        } else if let Some(status) = e.status() {
            FetchError::Status(status.as_u16())
        } else {
            FetchError::Network(e.to_string())
        }
    }
}

#[derive(Error, Debug, Clone)]
pub enum Error {
    // Aggregation Errors
    #[error("No quorum: {survivors} of {required} required sources survived outlier rejection")]
    NoQuorum {
        survivors: usize,
        required: usize,
    },

    #[error("No quorum ({survivors} of {required} required sources) and no cached fallback")]
    NoQuorumNoFallback {
        survivors: usize,
        required: usize,
    },

    #[error("Weighted median calculation failed")]
    WeightedMedianFailed,

    #[error("Aggregation cycle aborted: {0}")]
    CycleAborted(String),

    // Persistence Errors
    #[error("Persist error: {0}")]
    Persist(String),

    #[error("Kafka error: {0}")]
    KafkaError(String),

    #[error("Serialization error: {0}")]
    SerializationError(String),

    // System Errors
    #[error("Configuration error: {0}")]
    ConfigError(String),
}

impl Error {
    pub fn is_no_quorum(&self) -> bool {
        matches!(self, Error::NoQuorum { .. } | Error::NoQuorumNoFallback { .. })
    }
}

pub type Result<T> = std::result::Result<T, Error>;

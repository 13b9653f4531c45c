use std::time::Duration;
use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::time::Instant;
use crate::error::FetchError;

/// Consecutive failures at which a source stops counting as healthy.
pub const MAX_CONSECUTIVE_FAILURES: u32 = 5;

/// A source must have succeeded within this window to count as healthy.
pub const HEALTH_WINDOW: Duration = Duration::from_secs(5 * 60);

/// Rolling health of one source, owned and mutated by its `SourceRunner`.
#[derive(Clone, Debug, Default)]
pub struct SourceHealth {
    pub consecutive_failures: u32,
    pub last_success_time: Option<Instant>,
    pub last_success_at: Option<DateTime<Utc>>,
    pub last_error: Option<FetchError>,
}

impl SourceHealth {
    pub fn record_success(&mut self) {
        self.consecutive_failures = 0;
        self.last_success_time = Some(Instant::now());
        self.last_success_at = Some(Utc::now());
        self.last_error = None;
    }

    pub fn record_failure(&mut self, error: FetchError) {
        self.consecutive_failures = self.consecutive_failures.saturating_add(1);
        self.last_error = Some(error);
    }

    pub fn is_healthy(&self) -> bool {
        self.consecutive_failures < MAX_CONSECUTIVE_FAILURES
            && self.last_success_time
                .is_some_and(|t| t.elapsed() <= HEALTH_WINDOW)
    }
}

/// One row of the health report.
#[derive(Clone, Debug, Serialize)]
pub struct SourceStatus {
    pub name: String,
    pub priority: u32,
    pub healthy: bool,
    pub consecutive_failures: u32,
    pub last_success_at: Option<DateTime<Utc>>,
    pub last_error: Option<String>,
}

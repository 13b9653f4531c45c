use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};
use crate::observability::metrics::TICKS_SKIPPED;
use crate::price_infra::aggregator::PriceAggregator;

/// Drives aggregation cycles on a fixed interval. The first tick fires
/// immediately, so `start` also performs the initial cycle.
pub struct Scheduler {
    aggregator: Arc<PriceAggregator>,
    update_interval: Duration,
    ticker: Mutex<Option<JoinHandle<()>>>,
}

impl Scheduler {
    pub fn new(aggregator: Arc<PriceAggregator>, update_interval: Duration) -> Self {
        Scheduler {
            aggregator,
            update_interval,
            ticker: Mutex::new(None),
        }
    }

    /// No-op if already running.
    pub fn start(&self) {
        let mut ticker = self.ticker();
        if ticker.as_ref().is_some_and(|handle| !handle.is_finished()) {
            tracing::debug!("Scheduler already running");
            return;
        }

        let aggregator = Arc::clone(&self.aggregator);
        let period = self.update_interval;
        *ticker = Some(tokio::spawn(async move {
            let mut ticks = interval(period);
            ticks.set_missed_tick_behavior(MissedTickBehavior::Skip);

            loop {
                ticks.tick().await;

                let Some(cycle) = aggregator.try_start_cycle() else {
                    TICKS_SKIPPED.inc();
                    tracing::debug!("Cycle already in flight, skipping tick");
                    continue;
                };
                if let Err(e) = cycle.await {
                    tracing::warn!(error = %e, "Scheduled cycle failed");
                }
            }
        }));
        tracing::info!(interval_ms = period.as_millis() as u64, "Scheduler started");
    }

    /// Stops the timer. A cycle already in flight runs to completion on its own task.
    pub fn stop(&self) {
        if let Some(handle) = self.ticker().take() {
            handle.abort();
            tracing::info!("Scheduler stopped");
        }
    }

    pub fn is_running(&self) -> bool {
        self.ticker().as_ref().is_some_and(|handle| !handle.is_finished())
    }

    fn ticker(&self) -> MutexGuard<'_, Option<JoinHandle<()>>> {
        self.ticker.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl Drop for Scheduler {
    fn drop(&mut self) {
        self.stop();
    }
}

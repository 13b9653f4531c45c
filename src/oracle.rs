use std::sync::Arc;
use serde::Serialize;
use tokio::sync::broadcast;
use crate::config::AggregatorConfig;
use crate::error::Result;
use crate::interfaces::price_store::PriceStore;
use crate::price_infra::{PriceAggregator, QuoteCallback, Scheduler, SourceStatus};
use crate::types::{Quote, SubscriptionId};

#[derive(Clone, Debug, Serialize)]
pub struct OracleHealth {
    pub sources: Vec<SourceStatus>,
    pub cache_size: usize,
    pub is_running: bool,
}

/// The read/subscribe surface handed to consumers. Built once at the
/// composition root and shared behind an `Arc`.
pub struct PriceOracle {
    aggregator: Arc<PriceAggregator>,
    scheduler: Scheduler,
}

impl PriceOracle {
    pub fn new(aggregator: Arc<PriceAggregator>, config: &AggregatorConfig) -> Self {
        let scheduler = Scheduler::new(Arc::clone(&aggregator), config.update_interval);
        PriceOracle { aggregator, scheduler }
    }

    pub fn from_config(
        config: &AggregatorConfig,
        client: reqwest::Client,
        store: Arc<dyn PriceStore>,
    ) -> Result<Self> {
        let aggregator = Arc::new(PriceAggregator::from_config(config, client, store)?);
        Ok(Self::new(aggregator, config))
    }

    pub async fn get_price(&self) -> Result<f64> {
        self.get_price_with_details().await.map(|q| q.value())
    }

    pub async fn get_price_with_details(&self) -> Result<Quote> {
        self.aggregator.get_current_price().await
    }

    pub fn start(&self) {
        self.scheduler.start();
    }

    pub fn stop(&self) {
        self.scheduler.stop();
    }

    pub fn subscribe<F>(&self, callback: F) -> SubscriptionId
    where
        F: Fn(&Quote) + Send + Sync + 'static,
    {
        let callback: QuoteCallback = Arc::new(callback);
        self.aggregator.subscribers().subscribe(callback)
    }

    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        self.aggregator.subscribers().unsubscribe(id)
    }

    /// Every published aggregate, for consumers that prefer a channel to callbacks.
    pub fn watch(&self) -> broadcast::Receiver<Quote> {
        self.aggregator.subscribers().watch()
    }

    pub fn get_health(&self) -> OracleHealth {
        OracleHealth {
            sources: self.aggregator.health_status(),
            cache_size: self.aggregator.cache().size(),
            is_running: self.scheduler.is_running(),
        }
    }

    pub fn aggregator(&self) -> &Arc<PriceAggregator> {
        &self.aggregator
    }
}

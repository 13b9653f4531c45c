#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use price_oracle::config::{AggregatorConfig, SourceConfig};
use price_oracle::error::{Error, FetchError, Result};
use price_oracle::interfaces::price_store::{PriceRecord, PriceStore};
use price_oracle::price_infra::connectors::PriceConnector;
use price_oracle::price_infra::{PriceAggregator, SourceRunner};
use price_oracle::Quote;

#[derive(Clone, Debug)]
pub enum Step {
    Value(f64),
    Delayed(Duration, f64),
    Fail(FetchError),
    /// Never answers; only the runner's timeout ends the attempt.
    Hang,
}

/// Connector that replays a script, then repeats `fallback` forever.
pub struct ScriptedConnector {
    name: String,
    script: Mutex<VecDeque<Step>>,
    fallback: Mutex<Step>,
    calls: AtomicUsize,
}

impl ScriptedConnector {
    pub fn new(name: &str, script: Vec<Step>, fallback: Step) -> Arc<Self> {
        Arc::new(ScriptedConnector {
            name: name.to_string(),
            script: Mutex::new(script.into()),
            fallback: Mutex::new(fallback),
            calls: AtomicUsize::new(0),
        })
    }

    pub fn always(name: &str, step: Step) -> Arc<Self> {
        Self::new(name, Vec::new(), step)
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn set_fallback(&self, step: Step) {
        *self.fallback.lock().unwrap() = step;
    }

    fn next_step(&self) -> Step {
        self.script
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| self.fallback.lock().unwrap().clone())
    }
}

#[async_trait]
impl PriceConnector for ScriptedConnector {
    fn source_id(&self) -> &str {
        &self.name
    }

    async fn fetch_quote(&self) -> std::result::Result<Quote, FetchError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match self.next_step() {
            Step::Value(v) => Quote::new(v, Utc::now(), &self.name, None),
            Step::Delayed(d, v) => {
                tokio::time::sleep(d).await;
                Quote::new(v, Utc::now(), &self.name, None)
            }
            Step::Fail(e) => Err(e),
            Step::Hang => std::future::pending().await,
        }
    }
}

#[derive(Default)]
pub struct RecordingStore {
    pub records: Mutex<Vec<PriceRecord>>,
}

#[async_trait]
impl PriceStore for RecordingStore {
    async fn upsert(&self, record: &PriceRecord) -> Result<()> {
        self.records.lock().unwrap().push(record.clone());
        Ok(())
    }
}

pub struct FailingStore;

#[async_trait]
impl PriceStore for FailingStore {
    async fn upsert(&self, _record: &PriceRecord) -> Result<()> {
        Err(Error::Persist("store offline".to_string()))
    }
}

pub fn source_config(priority: u32, retry_count: u32) -> SourceConfig {
    SourceConfig {
        priority,
        timeout: Duration::from_millis(500),
        retry_count,
        retry_delay: Duration::from_millis(100),
        symbol: "ETHUSD".to_string(),
        base_url: None,
    }
}

pub fn aggregator_config(cache_time: Duration, outlier_threshold: f64, min_sources: usize) -> AggregatorConfig {
    AggregatorConfig {
        cache_time,
        outlier_threshold,
        min_sources,
        update_interval: Duration::from_secs(1),
        ..AggregatorConfig::default()
    }
}

/// Wires connectors into an aggregator, one runner per `(connector, config)`.
pub fn build_aggregator(
    mut config: AggregatorConfig,
    sources: Vec<(Arc<ScriptedConnector>, SourceConfig)>,
    store: Arc<dyn PriceStore>,
) -> Arc<PriceAggregator> {
    let runners = sources
        .into_iter()
        .map(|(connector, source)| {
            let name = connector.source_id().to_string();
            config.sources.insert(name.clone(), source.clone());
            Arc::new(SourceRunner::new(name, connector, source))
        })
        .collect();
    Arc::new(PriceAggregator::new(&config, runners, store))
}

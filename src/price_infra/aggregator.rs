use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use chrono::Utc;
use futures::future::{join_all, BoxFuture, FutureExt, Shared};
use tracing::Instrument;
use crate::config::{AggregationMethod, AggregatorConfig};
use crate::error::{Error, Result};
use crate::interfaces::price_store::{PriceRecord, PriceStore};
use crate::observability::metrics::{
    AGGREGATE_PRICE, CYCLES_NO_QUORUM, CYCLES_TOTAL, CYCLE_LATENCY, OUTLIERS_REJECTED, PERSIST_FAILURES,
};
use crate::observability::tracing::trace_cycle;
use crate::price_infra::cache::QuoteCache;
use crate::price_infra::connectors::build_connector;
use crate::price_infra::health::SourceStatus;
use crate::price_infra::runner::SourceRunner;
use crate::price_infra::subscribers::SubscriberRegistry;
use crate::types::{Quote, AGGREGATED_SOURCE};

pub type CycleFuture = Shared<BoxFuture<'static, Result<Quote>>>;

pub struct PriceAggregator {
    runners: Vec<Arc<SourceRunner>>,
    cache: QuoteCache,
    store: Arc<dyn PriceStore>,
    subscribers: SubscriberRegistry,
    outlier_threshold: f64,
    min_sources: usize,
    method: AggregationMethod,
    in_flight: Mutex<Option<CycleFuture>>,
    cycles_started: AtomicU64,
}

impl PriceAggregator {
    /// Runners are kept in ascending priority order.
    pub fn new(
        config: &AggregatorConfig,
        mut runners: Vec<Arc<SourceRunner>>,
        store: Arc<dyn PriceStore>,
    ) -> Self {
        runners.sort_by(|a, b| a.priority().cmp(&b.priority()).then_with(|| a.name().cmp(b.name())));
        PriceAggregator {
            runners,
            cache: QuoteCache::new(config.cache_time),
            store,
            subscribers: SubscriberRegistry::new(),
            outlier_threshold: config.outlier_threshold,
            min_sources: config.min_sources,
            method: config.aggregation_method,
            in_flight: Mutex::new(None),
            cycles_started: AtomicU64::new(0),
        }
    }

    /// Builds one REST connector per configured source, sharing one HTTP client.
    pub fn from_config(
        config: &AggregatorConfig,
        client: reqwest::Client,
        store: Arc<dyn PriceStore>,
    ) -> Result<Self> {
        config.validate()?;
        let runners = config.sources.iter()
            .map(|(name, source)| {
                let connector = build_connector(name, source, client.clone())?;
                Ok(Arc::new(SourceRunner::new(name.as_str(), connector, source.clone())))
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(Self::new(config, runners, store))
    }

    /// Runs a cycle, or joins the one already in flight and shares its outcome.
    pub async fn run_cycle(self: &Arc<Self>) -> Result<Quote> {
        let cycle = {
            let mut slot = self.slot();
            match slot.as_ref() {
                Some(running) => running.clone(),
                None => self.spawn_cycle(&mut slot),
            }
        };
        cycle.await
    }

    /// Starts a cycle only if none is running. Used by the scheduler, whose ticks
    /// are dropped rather than coalesced.
    pub fn try_start_cycle(self: &Arc<Self>) -> Option<CycleFuture> {
        let mut slot = self.slot();
        if slot.is_some() {
            return None;
        }
        Some(self.spawn_cycle(&mut slot))
    }

    /// Fresh cached aggregate if there is one, otherwise the outcome of a
    /// (possibly shared) cycle. A failed cycle falls back to whatever cached
    /// aggregate is still unexpired.
    pub async fn get_current_price(self: &Arc<Self>) -> Result<Quote> {
        if let Some(cached) = self.cache.get(AGGREGATED_SOURCE) {
            return Ok(cached);
        }

        match self.run_cycle().await {
            Ok(quote) => Ok(quote),
            Err(e) => {
                if let Some(cached) = self.cache.get(AGGREGATED_SOURCE) {
                    tracing::warn!(error = %e, "Cycle failed, serving cached aggregate");
                    return Ok(cached);
                }
                Err(match e {
                    Error::NoQuorum { survivors, required } => Error::NoQuorumNoFallback { survivors, required },
                    other => other,
                })
            }
        }
    }

    pub fn health_status(&self) -> Vec<SourceStatus> {
        self.runners.iter().map(|r| r.status()).collect()
    }

    pub fn runners(&self) -> &[Arc<SourceRunner>] {
        &self.runners
    }

    pub fn cache(&self) -> &QuoteCache {
        &self.cache
    }

    pub fn subscribers(&self) -> &SubscriberRegistry {
        &self.subscribers
    }

    pub fn is_cycle_in_flight(&self) -> bool {
        self.slot().is_some()
    }

    pub fn cycles_started(&self) -> u64 {
        self.cycles_started.load(Ordering::SeqCst)
    }

    fn slot(&self) -> MutexGuard<'_, Option<CycleFuture>> {
        self.in_flight.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Caller holds the slot lock, so the spawned task cannot clear the slot
    /// before it has been filled.
    fn spawn_cycle(self: &Arc<Self>, slot: &mut Option<CycleFuture>) -> CycleFuture {
        let cycle_id = self.cycles_started.fetch_add(1, Ordering::SeqCst) + 1;
        let this = Arc::clone(self);

        // Detached so that stop() or a dropped caller never cancels a cycle halfway.
        let handle = tokio::spawn(async move {
            let _release = InFlightGuard(Arc::clone(&this));
            this.execute_cycle().instrument(trace_cycle(cycle_id)).await
        });

        let cycle = async move {
            handle.await.unwrap_or_else(|e| Err(Error::CycleAborted(e.to_string())))
        }
        .boxed()
        .shared();
        *slot = Some(cycle.clone());
        cycle
    }

    async fn execute_cycle(&self) -> Result<Quote> {
        let timer = CYCLE_LATENCY.start_timer();
        CYCLES_TOTAL.inc();

        // Step 1-2: fetch concurrently, keep what succeeded
        let outcomes = join_all(self.runners.iter().map(|runner| async move {
            (runner, runner.fetch_with_retry().await)
        }))
        .await;

        let mut quotes = Vec::with_capacity(outcomes.len());
        let mut priorities = Vec::with_capacity(outcomes.len());
        for (runner, outcome) in outcomes {
            match outcome {
                Ok(quote) => {
                    priorities.push(runner.priority());
                    quotes.push(quote);
                }
                Err(e) => tracing::warn!(source = runner.name(), error = %e, "Source skipped this cycle"),
            }
        }

        // Step 3-4: reject outliers around the median
        let survivors = match median(&quotes.iter().map(Quote::value).collect::<Vec<_>>()) {
            Some(center) => reject_outliers(&quotes, center, self.outlier_threshold),
            None => Vec::new(),
        };
        let rejected = quotes.len() - survivors.len();
        if rejected > 0 {
            OUTLIERS_REJECTED.inc_by(rejected as u64);
            tracing::info!(rejected, fetched = quotes.len(), "Outlier quotes discarded");
        }

        // Step 5: quorum
        if survivors.len() < self.min_sources {
            CYCLES_NO_QUORUM.inc();
            timer.observe_duration();
            tracing::warn!(survivors = survivors.len(), required = self.min_sources, "Cycle failed quorum");
            return Err(Error::NoQuorum {
                survivors: survivors.len(),
                required: self.min_sources,
            });
        }

        // Step 6: aggregate
        let surviving: Vec<&Quote> = survivors.iter().map(|&i| &quotes[i]).collect();
        let value = match self.method {
            AggregationMethod::Median => {
                median(&surviving.iter().map(|q| q.value()).collect::<Vec<_>>())
                    .ok_or(Error::WeightedMedianFailed)?
            }
            AggregationMethod::PriorityWeightedMedian => {
                let weighted: Vec<(f64, f64)> = survivors.iter()
                    .map(|&i| (quotes[i].value(), priority_weight(priorities[i])))
                    .collect();
                weighted_median(weighted)?
            }
        };
        let aggregate = Quote::new(value, Utc::now(), AGGREGATED_SOURCE, mean_confidence(&surviving))
            .map_err(|e| Error::CycleAborted(e.to_string()))?;

        // Step 7: cache, persist, notify
        self.cache.set(AGGREGATED_SOURCE, aggregate.clone());
        for quote in &quotes {
            self.cache.set(quote.source_name(), quote.clone());
        }

        if let Err(e) = self.store.upsert(&PriceRecord::from(&aggregate)).await {
            PERSIST_FAILURES.inc();
            tracing::error!(error = %e, "Failed to persist aggregate, continuing");
        }

        self.subscribers.notify(&aggregate);

        AGGREGATE_PRICE.set(aggregate.value());
        timer.observe_duration();
        tracing::info!(
            value = aggregate.value(),
            sources = surviving.len(),
            "Aggregate published"
        );
        Ok(aggregate)
    }
}

/// Clears the in-flight slot when a cycle task ends, including by panic.
struct InFlightGuard(Arc<PriceAggregator>);

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        *self.0.slot() = None;
    }
}

/// Median with the lower middle value for even counts.
pub fn median(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.total_cmp(b));
    Some(sorted[(sorted.len() - 1) / 2])
}

/// Indices of quotes within `threshold` relative deviation of `center`.
pub fn reject_outliers(quotes: &[Quote], center: f64, threshold: f64) -> Vec<usize> {
    quotes.iter()
        .enumerate()
        .filter(|(_, q)| relative_deviation(q.value(), center) <= threshold)
        .map(|(i, _)| i)
        .collect()
}

pub fn relative_deviation(value: f64, center: f64) -> f64 {
    (value - center).abs() / center
}

/// Cumulative-weight median over `(value, weight)` pairs.
pub fn weighted_median(mut weighted: Vec<(f64, f64)>) -> Result<f64> {
    weighted.sort_by(|a, b| a.0.total_cmp(&b.0));

    let total_weight: f64 = weighted.iter().map(|(_, w)| w).sum();
    let target_weight = total_weight / 2.0;

    let mut cumulative = 0.0;
    for (value, weight) in weighted {
        cumulative += weight;
        if cumulative >= target_weight {
            return Ok(value);
        }
    }

    Err(Error::WeightedMedianFailed)
}

/// Priority 1 weighs 1.0, priority 2 weighs 0.5, and so on.
fn priority_weight(priority: u32) -> f64 {
    1.0 / priority.max(1) as f64
}

fn mean_confidence(quotes: &[&Quote]) -> Option<f64> {
    let provided: Vec<f64> = quotes.iter().filter_map(|q| q.confidence()).collect();
    if provided.is_empty() {
        return None;
    }
    Some(provided.iter().sum::<f64>() / provided.len() as f64)
}

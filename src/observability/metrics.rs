use lazy_static::lazy_static;
use prometheus::{
    Encoder, Gauge, Histogram, HistogramOpts, HistogramVec, IntCounter, IntCounterVec, Opts,
    Registry, TextEncoder,
};
use crate::error::{Error, Result};

lazy_static! {
    pub static ref REGISTRY: Registry = Registry::new();

    // Cycle metrics
    pub static ref CYCLES_TOTAL: IntCounter = IntCounter::new(
        "price_cycles_total",
        "Total number of aggregation cycles run"
    ).expect("valid metric");

    pub static ref CYCLES_NO_QUORUM: IntCounter = IntCounter::new(
        "price_cycles_no_quorum_total",
        "Aggregation cycles that failed quorum"
    ).expect("valid metric");

    pub static ref TICKS_SKIPPED: IntCounter = IntCounter::new(
        "price_scheduler_ticks_skipped_total",
        "Scheduler ticks skipped because a cycle was in flight"
    ).expect("valid metric");

    pub static ref AGGREGATE_PRICE: Gauge = Gauge::new(
        "price_aggregate_value",
        "Last published aggregate price"
    ).expect("valid metric");

    pub static ref OUTLIERS_REJECTED: IntCounter = IntCounter::new(
        "price_outliers_rejected_total",
        "Source quotes discarded as outliers"
    ).expect("valid metric");

    pub static ref PERSIST_FAILURES: IntCounter = IntCounter::new(
        "price_persist_failures_total",
        "Failed writes to the price store"
    ).expect("valid metric");

    // Source metrics
    pub static ref SOURCE_FETCH_FAILURES: IntCounterVec = IntCounterVec::new(
        Opts::new("price_source_fetch_failures_total", "Failed fetch attempts per source"),
        &["source"]
    ).expect("valid metric");

    pub static ref SOURCE_FETCH_LATENCY: HistogramVec = HistogramVec::new(
        HistogramOpts::new(
            "price_source_fetch_latency_seconds",
            "Latency of single fetch attempts"
        ).buckets(vec![0.01, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0]),
        &["source"]
    ).expect("valid metric");

    // Latency metrics
    pub static ref CYCLE_LATENCY: Histogram = Histogram::with_opts(
        HistogramOpts::new(
            "price_cycle_latency_seconds",
            "Duration of a full aggregation cycle"
        ).buckets(vec![0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0])
    ).expect("valid metric");
}

pub fn register_metrics() -> Result<()> {
    let collectors: Vec<Box<dyn prometheus::core::Collector>> = vec![
        Box::new(CYCLES_TOTAL.clone()),
        Box::new(CYCLES_NO_QUORUM.clone()),
        Box::new(TICKS_SKIPPED.clone()),
        Box::new(AGGREGATE_PRICE.clone()),
        Box::new(OUTLIERS_REJECTED.clone()),
        Box::new(PERSIST_FAILURES.clone()),
        Box::new(SOURCE_FETCH_FAILURES.clone()),
        Box::new(SOURCE_FETCH_LATENCY.clone()),
        Box::new(CYCLE_LATENCY.clone()),
    ];
    for collector in collectors {
        match REGISTRY.register(collector) {
            Ok(()) | Err(prometheus::Error::AlreadyReg) => {}
            Err(e) => return Err(Error::ConfigError(format!("metric registration failed: {}", e))),
        }
    }
    Ok(())
}

/// Prometheus text exposition of `REGISTRY`.
pub fn render() -> Result<String> {
    let mut buffer = Vec::new();
    TextEncoder::new()
        .encode(&REGISTRY.gather(), &mut buffer)
        .map_err(|e| Error::SerializationError(e.to_string()))?;
    String::from_utf8(buffer).map_err(|e| Error::SerializationError(e.to_string()))
}

use tracing::Span;
use tracing_subscriber::{fmt, EnvFilter};

/// Installs the global subscriber. `RUST_LOG` overrides the default filter.
pub fn init_tracing(json: bool) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,price_oracle=debug"));
    let builder = fmt().with_env_filter(filter).with_target(true);

    // A second call (e.g. from tests) keeps the first subscriber.
    let _ = if json {
        builder.json().try_init()
    } else {
        builder.try_init()
    };
}

pub fn trace_cycle(cycle: u64) -> Span {
    tracing::info_span!(
        "aggregation_cycle",
        cycle,
    )
}

pub fn trace_fetch(source: &str, attempt: u32) -> Span {
    tracing::debug_span!(
        "source_fetch",
        source = %source,
        attempt,
    )
}

use std::sync::Once;

use metrics::{Unit, describe_counter, describe_gauge, describe_histogram};
use tracing_error::ErrorLayer;
use tracing_subscriber::{
    EnvFilter, fmt,
    layer::{Layer, SubscriberExt},
    util::SubscriberInitExt,
};

use crate::config::{LogFormat, LoggingSettings};

use super::error::InfraError;

static METRIC_DESCRIPTIONS: Once = Once::new();

/// Install a global tracing subscriber using the provided logging settings.
pub fn init(logging: &LoggingSettings) -> Result<(), InfraError> {
    describe_metrics();

    let env_filter = EnvFilter::builder()
        .with_default_directive(logging.level.into())
        .from_env_lossy();

    let fmt_layer = match logging.format {
        LogFormat::Json => fmt::layer()
            .json()
            .with_current_span(true)
            .with_span_list(true)
            .with_target(true)
            .boxed(),
        LogFormat::Compact => fmt::layer().compact().with_target(true).boxed(),
    };

    tracing_subscriber::registry()
        .with(env_filter)
        .with(ErrorLayer::default())
        .with(fmt_layer)
        .try_init()
        .map_err(|err| {
            InfraError::telemetry(format!("failed to install tracing subscriber: {err}"))
        })
}

fn describe_metrics() {
    METRIC_DESCRIPTIONS.call_once(|| {
        describe_counter!(
            "bookshelf_search_cache_hit_total",
            Unit::Count,
            "Searches answered from the result cache."
        );
        describe_counter!(
            "bookshelf_search_cache_miss_total",
            Unit::Count,
            "Searches that had to consult the database."
        );
        describe_counter!(
            "bookshelf_search_cache_error_total",
            Unit::Count,
            "Cache lookups that failed and were treated as misses."
        );
        describe_counter!(
            "bookshelf_search_inflight_joined_total",
            Unit::Count,
            "Searches that awaited an identical query already in flight."
        );
        describe_histogram!(
            "bookshelf_search_db_ms",
            Unit::Milliseconds,
            "Database latency of a search in milliseconds."
        );
        describe_counter!(
            "bookshelf_rate_limited_total",
            Unit::Count,
            "GraphQL operations rejected by the rate limiter."
        );
        describe_gauge!(
            "bookshelf_rate_limit_clients",
            Unit::Count,
            "Clients currently tracked by the rate limiter."
        );
    });
}

use std::sync::Once;

use metrics::{Unit, describe_counter, describe_gauge, describe_histogram};
use tracing_error::ErrorLayer;
use tracing_subscriber::{
    EnvFilter, fmt,
    layer::{Layer, SubscriberExt},
    util::SubscriberInitExt,
};

use crate::cache::{
    METRIC_OBJECT_EVICT, METRIC_OBJECT_HIT, METRIC_OBJECT_MISS, METRIC_PATCH_BUFFER_LEN,
    METRIC_REQUEST_STALE,
};
use crate::config::{LogFormat, LoggingSettings};
use crate::data::{METRIC_FETCH_MS, METRIC_REQUEST_COALESCED, METRIC_REQUEST_SENT};

use super::error::InfraError;

static METRIC_DESCRIPTIONS: Once = Once::new();

/// Install the global tracing subscriber described by `logging`.
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
            .with_writer(std::io::stderr)
            .boxed(),
        LogFormat::Compact => fmt::layer()
            .compact()
            .with_target(true)
            .with_writer(std::io::stderr)
            .boxed(),
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

pub fn describe_metrics() {
    METRIC_DESCRIPTIONS.call_once(|| {
        describe_counter!(
            METRIC_OBJECT_HIT,
            Unit::Count,
            "Object cache lookups that found an entry."
        );
        describe_counter!(
            METRIC_OBJECT_MISS,
            Unit::Count,
            "Object cache lookups for unknown keys."
        );
        describe_counter!(
            METRIC_OBJECT_EVICT,
            Unit::Count,
            "Object cache entries evicted due to capacity."
        );
        describe_counter!(
            METRIC_REQUEST_SENT,
            Unit::Count,
            "Requests that reached the transport."
        );
        describe_counter!(
            METRIC_REQUEST_COALESCED,
            Unit::Count,
            "Requests answered by an identical in-flight request."
        );
        describe_counter!(
            METRIC_REQUEST_STALE,
            Unit::Count,
            "Completed requests marked stale by invalidation."
        );
        describe_gauge!(
            METRIC_PATCH_BUFFER_LEN,
            Unit::Count,
            "Patch batches waiting to be written back."
        );
        describe_histogram!(
            METRIC_FETCH_MS,
            Unit::Milliseconds,
            "Transport round-trip latency in milliseconds."
        );
    });
}

use std::{io, sync::Once};

use metrics::{Unit, describe_counter, describe_histogram};
use tracing_error::ErrorLayer;
use tracing_subscriber::{
    EnvFilter, fmt,
    layer::{Layer, SubscriberExt},
    util::SubscriberInitExt,
};

use crate::application::engine::{
    METRIC_CACHE_HIT, METRIC_CACHE_MISS, METRIC_DECODE_FAILED, METRIC_LOAD_DEDUPLICATED,
    METRIC_LOAD_MS,
};
use crate::config::{LogFormat, LoggingSettings};

use super::{error::InfraError, images::METRIC_DECODE_MS};

/// Filter directives in this variable override the configured level.
pub const LOG_FILTER_ENV: &str = "VITRINE_LOG";

static METRIC_DESCRIPTIONS: Once = Once::new();

/// Install the global subscriber. Logs go to stderr; stdout carries command output.
pub fn init(logging: &LoggingSettings) -> Result<(), InfraError> {
    describe_metrics();

    let env_filter = EnvFilter::builder()
        .with_default_directive(logging.level.into())
        .with_env_var(LOG_FILTER_ENV)
        .from_env_lossy();

    let fmt_layer = match logging.format {
        LogFormat::Json => fmt::layer()
            .json()
            .with_writer(io::stderr)
            .with_current_span(true)
            .with_span_list(false)
            .boxed(),
        LogFormat::Compact => fmt::layer()
            .compact()
            .with_writer(io::stderr)
            .with_target(true)
            .boxed(),
    };

    tracing_subscriber::registry()
        .with(env_filter)
        .with(ErrorLayer::default())
        .with(fmt_layer)
        .try_init()
        .map_err(|err| InfraError::telemetry(format!("tracing subscriber already set: {err}")))
}

fn describe_metrics() {
    METRIC_DESCRIPTIONS.call_once(|| {
        describe_counter!(
            METRIC_CACHE_HIT,
            Unit::Count,
            "Static backgrounds served from the decoded cache."
        );
        describe_counter!(
            METRIC_CACHE_MISS,
            Unit::Count,
            "Background loads that went to the store."
        );
        describe_counter!(
            METRIC_LOAD_DEDUPLICATED,
            Unit::Count,
            "Background loads collapsed into one already in flight."
        );
        describe_counter!(
            METRIC_DECODE_FAILED,
            Unit::Count,
            "Background candidates that could not be fetched or decoded."
        );
        describe_histogram!(
            METRIC_LOAD_MS,
            Unit::Milliseconds,
            "Full background load latency."
        );
        describe_histogram!(
            METRIC_DECODE_MS,
            Unit::Milliseconds,
            "Image fetch and decode latency."
        );
    });
}

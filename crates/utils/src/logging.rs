//! provides logging helpers

use tracing::Subscriber;
use tracing_subscriber::filter::{self};
use tracing_subscriber::fmt::layer;
use tracing_subscriber::prelude::*;
use tracing_subscriber::registry;
use tracing_subscriber::registry::LookupSpan;
use tracing_subscriber::Layer;

/// `RUST_LOG` filter defaulting to INFO
pub fn env_filter() -> filter::EnvFilter {
    filter::EnvFilter::builder()
        .with_default_directive(filter::LevelFilter::INFO.into())
        .from_env_lossy()
}

/// Human readable stderr layer, unfiltered
pub fn get_fmt_layer<S>() -> impl Layer<S>
where
    S: Subscriber + for<'a> LookupSpan<'a>,
{
    layer().with_writer(std::io::stderr).with_target(true)
}

/// initiate the global tracing subscriber with the stderr layer only
pub fn init() {
    registry()
        .with(get_fmt_layer().with_filter(env_filter()))
        .init();
}

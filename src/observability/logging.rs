//! Structured logging.
//!
//! # Design Decisions
//! - Uses tracing crate for structured logging
//! - Writes to stderr so command output on stdout stays machine readable
//! - Log level configurable via `RUST_LOG`, with a per-binary default

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Default filter when `RUST_LOG` is unset.
pub const DEFAULT_FILTER: &str = "ddc_ingest=info,qlistener=info,devadapter=info,ddc_counts=warn";

/// Install the global tracing subscriber.
pub fn init_tracing(default_filter: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| default_filter.into());

    // A second init (e.g. from tests) leaves the first subscriber in place.
    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .try_init();
}

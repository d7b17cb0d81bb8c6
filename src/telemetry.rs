//! Tracing setup helpers.
//!
//! The engine itself only emits events through the `tracing` facade; it
//! never installs a subscriber on its own. Binaries call [`init`] once at
//! startup; tests and embedders that need to capture or redirect output
//! wrap the run in [`with_sink`].

use tracing::Subscriber;
use tracing_error::ErrorLayer;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Installs the global subscriber: env-filtered fmt output (default level
/// `info`) plus span-trace capture for error reports.
///
/// Safe to call more than once; later calls are no-ops.
pub fn init() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer())
        .with(ErrorLayer::default())
        .try_init();
}

/// Runs `f` with `subscriber` installed as the thread-default, restoring
/// the previous default afterwards. Lets a caller route one run's events to
/// its own sink without touching the global subscriber.
pub fn with_sink<R>(subscriber: impl Subscriber + Send + Sync + 'static, f: impl FnOnce() -> R) -> R {
    tracing::subscriber::with_default(subscriber, f)
}

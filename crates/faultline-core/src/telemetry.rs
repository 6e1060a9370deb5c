//! Tracing initialisation for faultline binaries.
//!
//! The search engine emits structured lifecycle events (`search.started`,
//! `probe.verdict`, `search.finished`); this module wires up the global
//! subscriber that renders them.

use tracing::Level;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

/// Initialise the global tracing subscriber.
///
/// `RUST_LOG` takes precedence for filtering; `level` is the default when it
/// is unset. With `json` set, log lines are emitted as newline-delimited
/// JSON. Calling this more than once is harmless; only the first call
/// installs a subscriber.
pub fn init_tracing(json: bool, level: Level) {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level.as_str()));

    if json {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(fmt::layer().with_target(false).json())
            .try_init()
            .ok();
    } else {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(fmt::layer().with_target(false))
            .try_init()
            .ok();
    }
}

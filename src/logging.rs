//! Logging setup.
//!
//! The provider logs through `tracing`. A host process that already installs
//! a subscriber needs nothing from here; standalone binaries and tests call
//! one of the `init_*` functions. Output goes to **stderr** so that stdout
//! stays free for whatever protocol the host speaks.
//!
//! # Environment Variables
//!
//! - `RUST_LOG`: log filter, e.g. `debug` or `artifactory_provider=debug`
//!
//! ```bash
//! # request-level logging for the provider only
//! RUST_LOG=artifactory_provider=debug ./my-host
//!
//! # include the HTTP stack
//! RUST_LOG=debug,hyper=debug ./my-host
//! ```

use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Directives appended to the default level: the HTTP stack is noisy at `info`.
const QUIET_DEPENDENCIES: &str = "hyper=warn,hyper_util=warn,reqwest=warn,rustls=warn";

/// The filter used when `RUST_LOG` is unset.
pub fn default_filter(default_level: &str) -> EnvFilter {
    EnvFilter::try_new(format!("{},{}", default_level, QUIET_DEPENDENCIES))
        .unwrap_or_else(|_| EnvFilter::new("info"))
}

fn env_filter(default_level: &str) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| default_filter(default_level))
}

fn subscriber(
    default_level: &str,
) -> impl tracing::Subscriber + Send + Sync + 'static {
    tracing_subscriber::registry().with(env_filter(default_level)).with(
        fmt::layer()
            .with_writer(std::io::stderr)
            .with_target(true)
            .with_thread_ids(false)
            .with_file(false)
            .with_line_number(false),
    )
}

/// Install the stderr subscriber, defaulting to `info`.
///
/// # Panics
///
/// Panics if a global subscriber has already been set.
pub fn init_logging() {
    init_logging_with_default("info");
}

/// Install the stderr subscriber with `default_level` used when `RUST_LOG`
/// is unset.
///
/// # Panics
///
/// Panics if a global subscriber has already been set.
pub fn init_logging_with_default(default_level: &str) {
    subscriber(default_level).init();
}

/// Like [`init_logging`], but returns `false` instead of panicking when a
/// subscriber is already installed. Safe to call from every test.
pub fn try_init_logging() -> bool {
    subscriber("info").try_init().is_ok()
}

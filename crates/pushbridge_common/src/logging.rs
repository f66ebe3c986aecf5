//! Logging utilities for the pushbridge service.
//!
//! One tracing subscriber for the whole process, initialized by the
//! backend binary at startup. Feature crates only use the `tracing`
//! macros and never install their own subscriber.

use tracing::{info, Level};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Initialize the tracing subscriber with the default log level (INFO).
pub fn init() {
    init_with_level(Level::INFO);
}

/// Initialize the tracing subscriber with a specific log level.
///
/// `RUST_LOG` still wins for targets it names; the given level applies to
/// the pushbridge crates. Uses `try_init` so tests that initialize
/// logging more than once do not panic.
pub fn init_with_level(level: Level) {
    let filter = match format!("pushbridge={}", level).parse() {
        Ok(directive) => EnvFilter::from_default_env().add_directive(directive),
        Err(_) => EnvFilter::from_default_env(),
    };

    let result = tracing_subscriber::registry()
        .with(fmt::layer().with_target(true))
        .with(filter)
        .try_init();

    if result.is_ok() {
        info!("Logging initialized at level: {}", level);
    }
}

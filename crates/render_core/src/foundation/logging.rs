//! Logging utilities
//!
//! The core only emits through the `log` facade; binaries and test
//! harnesses pick the sink. These helpers wire up `env_logger` the same
//! way the rest of the engine tooling does.

pub use log::{debug, error, info, trace, warn, LevelFilter};

/// Initialize the logging system from `RUST_LOG`
pub fn init() {
    env_logger::init();
}

/// Initialize logging with a default level that `RUST_LOG` can still override.
///
/// Safe to call more than once; later calls are ignored.
pub fn init_with_level(level: LevelFilter) {
    let _ = env_logger::Builder::from_default_env()
        .filter_level(level)
        .parse_default_env()
        .try_init();
}

/// Initialize logging for unit tests (captured output, idempotent)
pub fn init_for_tests() {
    let _ = env_logger::Builder::from_default_env()
        .filter_level(LevelFilter::Debug)
        .is_test(true)
        .try_init();
}

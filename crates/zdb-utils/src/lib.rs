//! # zdb Utilities
//!
//! Logging shared by the LLDB plugin and the `zdb` command line tool.
//!
//! Both front ends log through `tracing`; this crate owns the subscriber setup
//! so that `RUST_LOG`, `ZDB_LOG_FORMAT` and `ZDB_LOG_FILE` behave the same
//! everywhere.

pub mod logging;

// Re-export commonly used logging functions for convenience
pub use logging::{
    init_logging, init_logging_with_level, init_plugin_logging, Console, LogConfig, LogFormat, LogLevel, LoggingError,
    LoggingGuard,
};
pub use tracing::{debug, error, info, trace, warn};

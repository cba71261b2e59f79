//! Shared utilities for verdict
//!
//! Logging setup and the TOML application config used by the binaries.

pub mod config;
pub mod logging;

pub use config::{Config, HarnessSection};
pub use logging::{LogConfig, init_tracing, init_tracing_with};

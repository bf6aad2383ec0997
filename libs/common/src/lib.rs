//! OneClick shared library
//!
//! Provides functions shared by the OneClick tools:
//! - layered configuration (defaults, file, environment)
//! - logging setup

pub mod config;
pub mod logging;

pub use config::{ConfigError, ContextSettings, OneClickConfig, ValidationSettings};
pub use logging::{init_logging, LoggingConfig};

//! # Configuration
//!
//! Client configuration: backend location, session storage and logging.

pub mod client;

pub use client::{ApiConfig, Config, ConfigError, LogFormat, LoggingConfig, SessionConfig};

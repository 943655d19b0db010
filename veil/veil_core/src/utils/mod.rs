//! Utility functions and types.
//!
//! This module provides configuration and logging utilities used throughout
//! the system.

pub mod config;
pub mod logging;

pub use config::{LoggingConfig, RuntimeConfig, SolverConfig};
pub use logging::{init_logging, LogLevel};

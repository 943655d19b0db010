//! Configuration utilities.
//!
//! A [`RuntimeConfig`] is handed to every runtime at construction. It can be
//! built in code or parsed from TOML:
//!
//! ```
//! use veil_core::utils::RuntimeConfig;
//!
//! let config = RuntimeConfig::from_toml_str(r#"
//!     track_implicit_flows = true
//!
//!     [solver]
//!     max_decisions = 10000
//!
//!     [logging]
//!     level = "debug"
//! "#).unwrap();
//!
//! assert_eq!(config.solver.max_decisions, Some(10000));
//! ```

use serde::{Deserialize, Serialize};

use super::logging::LogLevel;
use crate::error::{Error, Result};

/// Top-level runtime configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RuntimeConfig {
    /// Solver session settings.
    pub solver: SolverConfig,

    /// Logging settings.
    pub logging: LoggingConfig,

    /// Whether protected writes bake the active path environment into the
    /// disclosure policy of the written value.
    pub track_implicit_flows: bool,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            solver: SolverConfig::default(),
            logging: LoggingConfig::default(),
            track_implicit_flows: true,
        }
    }
}

impl RuntimeConfig {
    /// Parse a configuration from a TOML document.
    ///
    /// Missing keys take their default values; unknown keys are rejected.
    pub fn from_toml_str(source: &str) -> Result<Self> {
        toml::from_str(source).map_err(|e| Error::Config(e.to_string()))
    }

    /// Render this configuration as a TOML document.
    pub fn to_toml_string(&self) -> Result<String> {
        toml::to_string(self).map_err(|e| Error::Config(e.to_string()))
    }

    /// Set the solver decision budget.
    pub fn with_max_decisions(mut self, max_decisions: u64) -> Self {
        self.solver.max_decisions = Some(max_decisions);
        self
    }

    /// Enable or disable implicit-flow tracking for protected writes.
    pub fn with_implicit_flow_tracking(mut self, enabled: bool) -> Self {
        self.track_implicit_flows = enabled;
        self
    }
}

/// Solver session settings.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SolverConfig {
    /// Upper bound on branching decisions for a single satisfiability check.
    ///
    /// Policy formulas can be influenced by policy authors, so every check is
    /// bounded when this is set. `None` means unbounded.
    pub max_decisions: Option<u64>,
}

/// Logging settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LoggingConfig {
    /// The base log level.
    pub level: LogLevel,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: LogLevel::Info,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = RuntimeConfig::default();
        assert!(config.track_implicit_flows);
        assert_eq!(config.solver.max_decisions, None);
        assert_eq!(config.logging.level, LogLevel::Info);
    }

    #[test]
    fn test_parse_partial_document() {
        let config = RuntimeConfig::from_toml_str("[solver]\nmax_decisions = 64\n").unwrap();
        assert_eq!(config.solver.max_decisions, Some(64));
        assert!(config.track_implicit_flows);
    }

    #[test]
    fn test_unknown_keys_rejected() {
        let result = RuntimeConfig::from_toml_str("cache_size = 3\n");
        assert!(matches!(result, Err(Error::Config(_))));
    }

    #[test]
    fn test_toml_round_trip() {
        let config = RuntimeConfig::default()
            .with_max_decisions(500)
            .with_implicit_flow_tracking(false);
        let rendered = config.to_toml_string().unwrap();
        let parsed = RuntimeConfig::from_toml_str(&rendered).unwrap();
        assert_eq!(parsed, config);
    }
}

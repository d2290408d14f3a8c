mod backend;
mod engine;
mod observability;

pub use backend::*;
pub use engine::*;
pub use observability::*;

use serde::{Deserialize, Serialize};
use std::fmt;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Top-level config
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub engine: EngineConfig,
    #[serde(default)]
    pub backend: BackendConfig,
    #[serde(default)]
    pub observability: ObservabilityConfig,
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Config validation
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Severity level for a configuration issue.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigSeverity {
    Error,
    Warning,
}

/// A single configuration validation issue.
#[derive(Debug, Clone)]
pub struct ConfigError {
    pub severity: ConfigSeverity,
    pub field: String,
    pub message: String,
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let tag = match self.severity {
            ConfigSeverity::Error => "ERROR",
            ConfigSeverity::Warning => "WARN",
        };
        write!(f, "[{tag}] {}: {}", self.field, self.message)
    }
}

impl Config {
    /// Validate the configuration and return a list of issues.
    ///
    /// Returns an empty vec when everything looks good.
    pub fn validate(&self) -> Vec<ConfigError> {
        let mut errors = Vec::new();

        if self.engine.min_phase_dwell_ms == 0 {
            errors.push(ConfigError {
                severity: ConfigSeverity::Error,
                field: "engine.min_phase_dwell_ms".into(),
                message: "dwell time must be greater than 0".into(),
            });
        }

        if self.engine.snapshot_interval_ms == 0 {
            errors.push(ConfigError {
                severity: ConfigSeverity::Error,
                field: "engine.snapshot_interval_ms".into(),
                message: "snapshot interval must be greater than 0".into(),
            });
        } else if self.engine.snapshot_interval_ms > 1_000 {
            errors.push(ConfigError {
                severity: ConfigSeverity::Warning,
                field: "engine.snapshot_interval_ms".into(),
                message: "progress updates slower than 1s will look stalled".into(),
            });
        }

        if self.backend.base_url.is_empty() {
            errors.push(ConfigError {
                severity: ConfigSeverity::Error,
                field: "backend.base_url".into(),
                message: "base_url must not be empty".into(),
            });
        } else if !self.backend.base_url.starts_with("http://")
            && !self.backend.base_url.starts_with("https://")
        {
            errors.push(ConfigError {
                severity: ConfigSeverity::Error,
                field: "backend.base_url".into(),
                message: "base_url must start with http:// or https://".into(),
            });
        }

        if !self.backend.send_message_path.starts_with('/') {
            errors.push(ConfigError {
                severity: ConfigSeverity::Warning,
                field: "backend.send_message_path".into(),
                message: "path should start with '/'".into(),
            });
        }

        if self.backend.timeout_ms == 0 {
            errors.push(ConfigError {
                severity: ConfigSeverity::Error,
                field: "backend.timeout_ms".into(),
                message: "timeout must be greater than 0".into(),
            });
        }

        errors
    }
}

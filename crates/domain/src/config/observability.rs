use serde::{Deserialize, Serialize};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Logging configuration
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Logging configuration for the CLI.
///
/// `RUST_LOG` takes precedence over `log_filter` when it is set.  With
/// `json_logs = true` every event is written to stderr as one JSON object
/// per line, which is what the stream-debugging tooling ingests.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObservabilityConfig {
    #[serde(default = "d_log_filter")]
    pub log_filter: String,
    #[serde(default)]
    pub json_logs: bool,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_filter: d_log_filter(),
            json_logs: false,
        }
    }
}

fn d_log_filter() -> String {
    "warn".into()
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Tests
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_filter_is_warn() {
        let cfg = ObservabilityConfig::default();
        assert_eq!(cfg.log_filter, "warn");
        assert!(!cfg.json_logs);
    }

    #[test]
    fn deserialize_empty_uses_defaults() {
        let cfg: ObservabilityConfig = toml::from_str("").unwrap();
        assert_eq!(cfg.log_filter, "warn");
    }

    #[test]
    fn deserialize_json_logs() {
        let cfg: ObservabilityConfig = toml::from_str(
            r#"
            log_filter = "ds_engine=debug"
            json_logs = true
            "#,
        )
        .unwrap();
        assert_eq!(cfg.log_filter, "ds_engine=debug");
        assert!(cfg.json_logs);
    }

    #[test]
    fn serde_roundtrip() {
        let cfg = ObservabilityConfig {
            log_filter: "info".into(),
            json_logs: true,
        };
        let json = serde_json::to_string(&cfg).unwrap();
        let back: ObservabilityConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(back.log_filter, "info");
        assert!(back.json_logs);
    }
}

use ds_domain::config::{Config, ConfigSeverity};

#[test]
fn default_backend_is_localhost() {
    let config = Config::default();
    assert_eq!(config.backend.base_url, "http://127.0.0.1:8080");
    assert_eq!(
        config.backend.send_message_url(),
        "http://127.0.0.1:8080/chat/send-message"
    );
}

#[test]
fn empty_file_yields_defaults() {
    let config: Config = toml::from_str("").unwrap();
    assert_eq!(config.engine.min_phase_dwell_ms, 800);
    assert_eq!(config.engine.snapshot_interval_ms, 150);
    assert!(config.engine.extract_think_blocks);
    assert_eq!(config.backend.timeout_ms, 300_000);
    assert_eq!(config.backend.api_key_env, "DS_API_KEY");
    assert!(config.backend.use_agentic_search);
    assert_eq!(config.observability.log_filter, "warn");
    assert!(!config.observability.json_logs);
}

#[test]
fn partial_sections_keep_other_defaults() {
    let toml_str = r#"
[engine]
min_phase_dwell_ms = 300

[observability]
json_logs = true
"#;
    let config: Config = toml::from_str(toml_str).unwrap();
    assert_eq!(config.engine.min_phase_dwell_ms, 300);
    assert_eq!(config.engine.snapshot_interval_ms, 150);
    assert!(config.observability.json_logs);
    assert_eq!(config.observability.log_filter, "warn");
}

#[test]
fn trailing_slash_in_base_url_is_tolerated() {
    let toml_str = r#"
[backend]
base_url = "https://search.example.org/"
send_message_path = "/api/chat/send-message"
"#;
    let config: Config = toml::from_str(toml_str).unwrap();
    assert_eq!(
        config.backend.send_message_url(),
        "https://search.example.org/api/chat/send-message"
    );
    assert!(config.validate().is_empty());
}

#[test]
fn validation_collects_every_issue() {
    let toml_str = r#"
[engine]
snapshot_interval_ms = 0

[backend]
base_url = ""
send_message_path = "chat/send-message"
timeout_ms = 0
"#;
    let config: Config = toml::from_str(toml_str).unwrap();
    let issues = config.validate();
    let errors: Vec<_> = issues
        .iter()
        .filter(|i| i.severity == ConfigSeverity::Error)
        .map(|i| i.field.as_str())
        .collect();
    assert_eq!(
        errors,
        vec!["engine.snapshot_interval_ms", "backend.base_url", "backend.timeout_ms"]
    );
    assert!(issues
        .iter()
        .any(|i| i.severity == ConfigSeverity::Warning && i.field == "backend.send_message_path"));
}

use ds_domain::config::{Config, ConfigSeverity};

/// Check the config file and print a report.
///
/// Returns false when the file cannot be used as is.
pub fn validate(config: &Config, config_path: &str) -> bool {
    let (report, usable) = validation_report(config, config_path);
    print!("{report}");
    usable
}

/// Report text for `deepsearch config validate`, errors listed before
/// warnings.
pub fn validation_report(config: &Config, config_path: &str) -> (String, bool) {
    let mut issues = config.validate();
    if issues.is_empty() {
        return (format!("{config_path}: ready to stream\n"), true);
    }

    issues.sort_by_key(|i| i.severity != ConfigSeverity::Error);
    let errors = issues
        .iter()
        .filter(|i| i.severity == ConfigSeverity::Error)
        .count();

    let mut report = String::new();
    for issue in &issues {
        report.push_str(&format!("  {issue}\n"));
    }
    let verdict = if errors == 0 {
        "usable with warnings"
    } else {
        "not usable until the errors are fixed"
    };
    report.push_str(&format!(
        "{config_path}: {verdict} ({errors} blocking, {} advisory)\n",
        issues.len() - errors
    ));
    (report, errors == 0)
}

/// Render the resolved config (with all defaults filled in) as TOML.
pub fn show(config: &Config) -> anyhow::Result<String> {
    toml::to_string_pretty(config).map_err(|e| anyhow::anyhow!("serializing config: {e}"))
}

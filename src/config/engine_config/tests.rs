use super::*;
use tempfile::TempDir;

#[test]
fn test_defaults_are_valid() {
    let config = EngineConfig::default();
    assert!(config.validate().is_ok());
    assert_eq!(config.thresholds.billing_outlier.percentile, 0.99);
    assert_eq!(config.thresholds.billing_outlier.min_peer_group, 5);
    assert_eq!(config.thresholds.workforce_impossibility.hours_per_month, 176.0);
    assert_eq!(config.thresholds.shared_official.overpayment_fraction, 0.15);
    assert_eq!(config.engine.max_pairs, 10);
}

#[test]
fn test_signal_toggles() {
    let toml_content = r#"
[signals.address-clustering]
enabled = false

[signals.upcoding]
enabled = true
"#;
    let config: EngineConfig = toml::from_str(toml_content).unwrap();
    assert!(!config.is_signal_enabled(SignalKind::AddressClustering));
    assert!(config.is_signal_enabled(SignalKind::Upcoding));
    assert!(config.is_signal_enabled(SignalKind::ExcludedProvider));
    assert!(config.validate().is_ok());
}

#[test]
fn test_threshold_overrides_keep_other_defaults() {
    let toml_content = r#"
[source]
memory_limit = "8GB"

[engine]
workers = 4
detector_timeout_secs = 30

[thresholds.billing_outlier]
min_peer_group = 10

[thresholds.rapid_escalation]
growth_pct = 150.0
"#;
    let config: EngineConfig = toml::from_str(toml_content).unwrap();
    assert_eq!(config.source.memory_limit.as_deref(), Some("8GB"));
    assert_eq!(config.engine.workers, 4);
    assert_eq!(config.engine.detector_timeout_secs, Some(30));
    assert_eq!(config.thresholds.billing_outlier.min_peer_group, 10);
    assert_eq!(config.thresholds.billing_outlier.percentile, 0.99);
    assert_eq!(config.thresholds.rapid_escalation.growth_pct, 150.0);
    assert_eq!(config.thresholds.rapid_escalation.rolling_window_months, 3);
}

#[test]
fn test_invalid_percentile_rejected() {
    let mut config = EngineConfig::default();
    config.thresholds.billing_outlier.percentile = -0.5;
    let err = config.validate().unwrap_err();
    assert!(matches!(err, ScanError::Configuration(_)));
    assert!(err.to_string().contains("percentile"));
}

#[test]
fn test_zero_denominators_rejected() {
    let mut config = EngineConfig::default();
    config.thresholds.workforce_impossibility.hours_per_month = 0.0;
    assert!(config.validate().is_err());

    let mut config = EngineConfig::default();
    config.scoring.severity_divisor = 0.0;
    assert!(config.validate().is_err());

    let mut config = EngineConfig::default();
    config.thresholds.billing_outlier.min_peer_group = 0;
    assert!(config.validate().is_err());
}

#[test]
fn test_fraction_out_of_range_rejected() {
    let mut config = EngineConfig::default();
    config.thresholds.shared_official.overpayment_fraction = 1.5;
    assert!(config.validate().is_err());
}

#[test]
fn test_unknown_signal_rejected() {
    let toml_content = r#"
[signals.not-a-signal]
enabled = false
"#;
    let config: EngineConfig = toml::from_str(toml_content).unwrap();
    assert!(config.validate().is_err());
}

#[test]
fn test_severity_weights_validation() {
    let valid = SeverityWeights::default();
    assert!(valid.is_valid());
    assert_eq!(valid.weight(Severity::Critical), 10.0);

    let invalid = SeverityWeights {
        critical: 1.0,
        high: 7.0,
        medium: 4.0,
        low: 1.0,
    };
    assert!(!invalid.is_valid());
}

#[test]
fn test_signal_weight_override() {
    let toml_content = r#"
[scoring.signal_weights]
upcoding = 9.0
"#;
    let config: EngineConfig = toml::from_str(toml_content).unwrap();
    assert_eq!(config.scoring.signal_weight(SignalKind::Upcoding), 9.0);
    assert_eq!(config.scoring.signal_weight(SignalKind::ExcludedProvider), 10.0);
}

#[test]
fn test_emergency_period() {
    let period = EmergencyPeriod::default();
    assert!(period.contains(NaiveDate::from_ymd_opt(2020, 3, 1).unwrap()));
    assert!(period.contains(NaiveDate::from_ymd_opt(2021, 12, 1).unwrap()));
    assert!(!period.contains(NaiveDate::from_ymd_opt(2022, 1, 1).unwrap()));

    let mut config = EngineConfig::default();
    config.emergency_period.start = NaiveDate::from_ymd_opt(2022, 1, 1).unwrap();
    assert!(config.validate().is_err());
}

#[test]
fn test_load_config_prefers_toml() {
    let dir = TempDir::new().unwrap();
    std::fs::write(
        dir.path().join(CONFIG_TOML),
        "[engine]\nworkers = 3\n",
    )
    .unwrap();
    std::fs::write(
        dir.path().join(CONFIG_JSON),
        r#"{"engine": {"workers": 7}}"#,
    )
    .unwrap();
    assert_eq!(load_config(dir.path()).unwrap().engine.workers, 3);
}

#[test]
fn test_load_config_json_fallback() {
    let dir = TempDir::new().unwrap();
    std::fs::write(
        dir.path().join(CONFIG_JSON),
        r#"{"thresholds": {"concurrent_billing": {"min_states": 6}}}"#,
    )
    .unwrap();
    let config = load_config(dir.path()).unwrap();
    assert_eq!(config.thresholds.concurrent_billing.min_states, 6);
}

#[test]
fn test_load_config_defaults_when_missing() {
    let dir = TempDir::new().unwrap();
    let config = load_config(dir.path()).unwrap();
    assert_eq!(config.engine.workers, 0);
    assert!(config.signals.is_empty());
}

#[test]
fn test_malformed_config_is_an_error() {
    let dir = TempDir::new().unwrap();
    std::fs::write(
        dir.path().join(CONFIG_TOML),
        "[thresholds.billing_outlier]\npercentile = \"0.95\"\n",
    )
    .unwrap();
    let err = load_config(dir.path()).unwrap_err();
    assert!(format!("{err:#}").contains(CONFIG_TOML));
}

#[test]
fn test_malformed_json_config_is_an_error() {
    let dir = TempDir::new().unwrap();
    std::fs::write(dir.path().join(CONFIG_JSON), "{\"engine\": ").unwrap();
    assert!(load_config(dir.path()).is_err());
}

#[test]
fn test_sample_limit_independent_of_pair_limit() {
    let config: EngineConfig = toml::from_str("[engine]\nmax_pairs = 3\n").unwrap();
    assert_eq!(config.engine.max_pairs, 3);
    assert_eq!(config.engine.max_sample_providers, 10);
}

#[test]
fn test_load_config_file_by_extension() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("custom.json");
    std::fs::write(&path, r#"{"engine": {"max_pairs": 3}}"#).unwrap();
    assert_eq!(load_config_file(&path).unwrap().engine.max_pairs, 3);
}

#[test]
fn test_shared_official_filters_off_by_default() {
    let config = EngineConfig::default();
    assert_eq!(config.thresholds.shared_official.max_providers, None);
    assert_eq!(config.thresholds.shared_official.min_same_state_providers, None);

    let config: EngineConfig = toml::from_str(
        "[thresholds.shared_official]\nmax_providers = 50\nmin_same_state_providers = 3\n",
    )
    .unwrap();
    assert_eq!(config.thresholds.shared_official.max_providers, Some(50));
    assert_eq!(config.thresholds.shared_official.min_same_state_providers, Some(3));
    assert!(config.validate().is_ok());
}

#[test]
fn test_network_ceiling_below_minimum_rejected() {
    let mut config = EngineConfig::default();
    config.thresholds.shared_official.max_providers = Some(4);
    let err = config.validate().unwrap_err();
    assert!(err.to_string().contains("max_providers"));
}

#[test]
fn test_servicing_thresholds_override() {
    let config: EngineConfig = toml::from_str(
        "[thresholds.phantom_servicing_hub]\nmin_billing_npis = 8\n\n[thresholds.repetitive_service_abuse]\nmin_claims = 500\n",
    )
    .unwrap();
    assert_eq!(config.thresholds.phantom_servicing_hub.min_billing_npis, 8);
    assert_eq!(config.thresholds.phantom_servicing_hub.min_total_billing, 500_000.0);
    assert_eq!(config.thresholds.repetitive_service_abuse.min_claims, 500);
    assert!(config.validate().is_ok());
}

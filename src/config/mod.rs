//! Configuration module for claimscan
//!
//! This module handles:
//! - Run configuration (claimscan.toml / .claimscanrc.json)
//! - Per-signal thresholds and toggles
//! - Scoring weights
//! - Engine scheduling options

mod engine_config;

pub use engine_config::{
    load_config,
    load_config_file,
    AddressClusteringThresholds,
    BillingOutlierThresholds,
    BillingRampThresholds,
    BurstEnrollmentThresholds,
    BustOutThresholds,
    CaregiverDensityThresholds,
    ConcurrentBillingThresholds,
    DilutionThresholds,
    EmergencyPeriod,
    EngineConfig,
    EngineSettings,
    ExcludedProviderThresholds,
    GeographicThresholds,
    MonocultureThresholds,
    RapidEscalationThresholds,
    RateAnomalyThresholds,
    RepetitiveServiceThresholds,
    ScoringConfig,
    ServicingHubThresholds,
    ServicingSpreadThresholds,
    SeverityWeights,
    SharedOfficialThresholds,
    SignalToggle,
    SourceConfig,
    Thresholds,
    UpcodingThresholds,
    WorkforceThresholds,
    CONFIG_JSON,
    CONFIG_TOML,
    EMERGENCY_PROCEDURE_CODES,
    HIGH_COMPLEXITY_EM_CODES,
    HOME_HEALTH_TAXONOMIES,
};

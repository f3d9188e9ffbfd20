//! Engine configuration support
//!
//! Loads run configuration from `claimscan.toml` or `.claimscanrc.json`.
//! Every threshold, percentile and overpayment fraction used by the
//! detectors and the scorer lives here, in one immutable structure that is
//! passed explicitly into each detector.
//!
//! # Configuration Format
//!
//! ```toml
//! # claimscan.toml
//!
//! [source]
//! memory_limit = "8GB"   # passed through to the data source
//!
//! [engine]
//! workers = 8
//! detector_timeout_secs = 600
//!
//! [signals.address-clustering]
//! enabled = false
//!
//! [thresholds.billing_outlier]
//! percentile = 0.99
//! min_peer_group = 5
//!
//! [thresholds.shared_official]
//! overpayment_fraction = 0.15
//!
//! [scoring]
//! breadth_points_per_signal = 12.0
//!
//! [emergency_period]
//! start = "2020-03-01"
//! end = "2021-12-31"
//! ```

use crate::error::ScanError;
use crate::models::{Severity, SignalKind};
use anyhow::Context;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use tracing::debug;

pub const CONFIG_TOML: &str = "claimscan.toml";
pub const CONFIG_JSON: &str = ".claimscanrc.json";

/// Procedure codes tied to public-health-emergency testing, telehealth and
/// treatment. Legitimately dominant for some providers during the emergency.
pub const EMERGENCY_PROCEDURE_CODES: &[&str] = &[
    "87635", "U0003", "U0004", "99441", "99442", "99443", "0202U", "0223U", "0225U", "86328",
    "86769", "J0878",
];

/// Home health and personal care taxonomy codes
pub const HOME_HEALTH_TAXONOMIES: &[&str] =
    &["251E00000X", "251J00000X", "3747P1801X", "374U00000X"];

/// High-complexity evaluation and management codes
pub const HIGH_COMPLEXITY_EM_CODES: &[&str] =
    &["99205", "99215", "99223", "99233", "99245", "99255"];

fn owned(codes: &[&str]) -> Vec<String> {
    codes.iter().map(|c| c.to_string()).collect()
}

/// Full run configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EngineConfig {
    #[serde(default)]
    pub source: SourceConfig,

    #[serde(default)]
    pub engine: EngineSettings,

    /// Per-signal toggles, keyed by kebab-case signal name
    #[serde(default)]
    pub signals: BTreeMap<String, SignalToggle>,

    #[serde(default)]
    pub thresholds: Thresholds,

    #[serde(default)]
    pub scoring: ScoringConfig,

    #[serde(default)]
    pub emergency_period: EmergencyPeriod,
}

/// Options passed through to the data source
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SourceConfig {
    /// Resource ceiling for the data source (not enforced by the engine)
    #[serde(default)]
    pub memory_limit: Option<String>,
}

/// Detector scheduling options
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineSettings {
    /// Worker threads (0 = auto)
    #[serde(default)]
    pub workers: usize,

    /// Deadline for the whole detection phase
    #[serde(default)]
    pub detector_timeout_secs: Option<u64>,

    /// Signal pairs kept in the correlation summary
    #[serde(default = "default_max_pairs")]
    pub max_pairs: usize,

    /// Sample npis kept per signal count in the correlation summary
    #[serde(default = "default_max_sample_providers")]
    pub max_sample_providers: usize,
}

fn default_max_pairs() -> usize {
    10
}

fn default_max_sample_providers() -> usize {
    10
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            workers: 0,
            detector_timeout_secs: None,
            max_pairs: default_max_pairs(),
            max_sample_providers: default_max_sample_providers(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SignalToggle {
    #[serde(default)]
    pub enabled: Option<bool>,
}

/// Per-signal thresholds
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Thresholds {
    #[serde(default)]
    pub excluded_provider: ExcludedProviderThresholds,
    #[serde(default)]
    pub billing_outlier: BillingOutlierThresholds,
    #[serde(default)]
    pub rapid_escalation: RapidEscalationThresholds,
    #[serde(default)]
    pub workforce_impossibility: WorkforceThresholds,
    #[serde(default)]
    pub shared_official: SharedOfficialThresholds,
    #[serde(default)]
    pub geographic_implausibility: GeographicThresholds,
    #[serde(default)]
    pub address_clustering: AddressClusteringThresholds,
    #[serde(default)]
    pub upcoding: UpcodingThresholds,
    #[serde(default)]
    pub concurrent_billing: ConcurrentBillingThresholds,
    #[serde(default)]
    pub burst_enrollment: BurstEnrollmentThresholds,
    #[serde(default)]
    pub billing_monoculture: MonocultureThresholds,
    #[serde(default)]
    pub billing_bust_out: BustOutThresholds,
    #[serde(default)]
    pub rate_anomaly: RateAnomalyThresholds,
    #[serde(default)]
    pub coordinated_billing_ramp: BillingRampThresholds,
    #[serde(default)]
    pub phantom_servicing_hub: ServicingHubThresholds,
    #[serde(default)]
    pub network_beneficiary_dilution: DilutionThresholds,
    #[serde(default)]
    pub caregiver_density_anomaly: CaregiverDensityThresholds,
    #[serde(default)]
    pub repetitive_service_abuse: RepetitiveServiceThresholds,
    #[serde(default)]
    pub phantom_servicing_spread: ServicingSpreadThresholds,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExcludedProviderThresholds {
    /// Share of post-exclusion billing counted as overpayment
    #[serde(default = "default_one")]
    pub overpayment_fraction: f64,
    /// Fall back to name matching when the exclusion carries no npi
    #[serde(default = "default_true")]
    pub match_by_name: bool,
}

fn default_one() -> f64 {
    1.0
}

fn default_true() -> bool {
    true
}

impl Default for ExcludedProviderThresholds {
    fn default() -> Self {
        Self {
            overpayment_fraction: default_one(),
            match_by_name: true,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BillingOutlierThresholds {
    #[serde(default = "default_percentile")]
    pub percentile: f64,
    #[serde(default = "default_min_peer_group")]
    pub min_peer_group: usize,
    /// Multiple of the percentile above which severity is high
    #[serde(default = "default_high_multiple")]
    pub high_multiple: f64,
}

fn default_percentile() -> f64 {
    0.99
}

fn default_min_peer_group() -> usize {
    5
}

fn default_high_multiple() -> f64 {
    2.0
}

impl Default for BillingOutlierThresholds {
    fn default() -> Self {
        Self {
            percentile: default_percentile(),
            min_peer_group: default_min_peer_group(),
            high_multiple: default_high_multiple(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RapidEscalationThresholds {
    /// Enrollment must fall within this many months before first billing
    #[serde(default = "default_twelve")]
    pub enrollment_window_months: u32,
    /// Billing months examined from first billing
    #[serde(default = "default_observation_months")]
    pub observation_months: usize,
    #[serde(default = "default_rolling_window")]
    pub rolling_window_months: usize,
    /// Month-over-month growth of the rolling total, percent
    #[serde(default = "default_growth_pct")]
    pub growth_pct: f64,
    #[serde(default = "default_two_usize")]
    pub high_consecutive_months: usize,
}

fn default_twelve() -> u32 {
    12
}

fn default_observation_months() -> usize {
    12
}

fn default_rolling_window() -> usize {
    3
}

fn default_growth_pct() -> f64 {
    200.0
}

fn default_two_usize() -> usize {
    2
}

impl Default for RapidEscalationThresholds {
    fn default() -> Self {
        Self {
            enrollment_window_months: default_twelve(),
            observation_months: default_observation_months(),
            rolling_window_months: default_rolling_window(),
            growth_pct: default_growth_pct(),
            high_consecutive_months: default_two_usize(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkforceThresholds {
    #[serde(default = "default_claims_per_hour")]
    pub max_claims_per_hour: f64,
    #[serde(default = "default_high_claims_per_hour")]
    pub high_claims_per_hour: f64,
    /// Working hours per worker per month (22 days x 8 hours)
    #[serde(default = "default_hours_per_month")]
    pub hours_per_month: f64,
}

fn default_claims_per_hour() -> f64 {
    6.0
}

fn default_high_claims_per_hour() -> f64 {
    20.0
}

fn default_hours_per_month() -> f64 {
    176.0
}

impl Default for WorkforceThresholds {
    fn default() -> Self {
        Self {
            max_claims_per_hour: default_claims_per_hour(),
            high_claims_per_hour: default_high_claims_per_hour(),
            hours_per_month: default_hours_per_month(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SharedOfficialThresholds {
    #[serde(default = "default_shared_min")]
    pub min_providers: usize,
    #[serde(default = "default_million")]
    pub min_combined_billing: f64,
    #[serde(default = "default_shared_high")]
    pub high_providers: usize,
    #[serde(default = "default_five_million")]
    pub high_combined_billing: f64,
    /// Fixed share of network billing counted as overpayment (0.10 - 0.20)
    #[serde(default = "default_fifteen_pct")]
    pub overpayment_fraction: f64,
    /// Skip networks larger than this (health systems filing one officer)
    #[serde(default)]
    pub max_providers: Option<usize>,
    /// Require this many members registered in one state
    #[serde(default)]
    pub min_same_state_providers: Option<usize>,
}

fn default_shared_min() -> usize {
    5
}

fn default_shared_high() -> usize {
    10
}

fn default_million() -> f64 {
    1_000_000.0
}

fn default_five_million() -> f64 {
    5_000_000.0
}

fn default_fifteen_pct() -> f64 {
    0.15
}

impl Default for SharedOfficialThresholds {
    fn default() -> Self {
        Self {
            min_providers: default_shared_min(),
            min_combined_billing: default_million(),
            high_providers: default_shared_high(),
            high_combined_billing: default_five_million(),
            overpayment_fraction: default_fifteen_pct(),
            max_providers: None,
            min_same_state_providers: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeographicThresholds {
    #[serde(default = "default_home_health")]
    pub taxonomy_codes: Vec<String>,
    /// Flag when beneficiaries per claim falls below this
    #[serde(default = "default_min_ratio")]
    pub min_beneficiary_ratio: f64,
    #[serde(default = "default_high_ratio")]
    pub high_beneficiary_ratio: f64,
}

fn default_home_health() -> Vec<String> {
    owned(HOME_HEALTH_TAXONOMIES)
}

fn default_min_ratio() -> f64 {
    0.1
}

fn default_high_ratio() -> f64 {
    0.05
}

impl Default for GeographicThresholds {
    fn default() -> Self {
        Self {
            taxonomy_codes: default_home_health(),
            min_beneficiary_ratio: default_min_ratio(),
            high_beneficiary_ratio: default_high_ratio(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AddressClusteringThresholds {
    #[serde(default = "default_cluster_min")]
    pub min_providers: usize,
    #[serde(default = "default_five_million")]
    pub min_combined_billing: f64,
    #[serde(default = "default_cluster_high")]
    pub high_providers: usize,
    #[serde(default = "default_fifteen_pct")]
    pub overpayment_fraction: f64,
    /// Member npis listed in each finding's evidence
    #[serde(default = "default_evidence_npis")]
    pub max_listed_npis: usize,
}

fn default_cluster_min() -> usize {
    10
}

fn default_cluster_high() -> usize {
    20
}

fn default_evidence_npis() -> usize {
    20
}

impl Default for AddressClusteringThresholds {
    fn default() -> Self {
        Self {
            min_providers: default_cluster_min(),
            min_combined_billing: default_five_million(),
            high_providers: default_cluster_high(),
            overpayment_fraction: default_fifteen_pct(),
            max_listed_npis: default_evidence_npis(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpcodingThresholds {
    #[serde(default = "default_high_complexity")]
    pub high_complexity_codes: Vec<String>,
    #[serde(default = "default_min_em_claims")]
    pub min_em_claims: u64,
    #[serde(default = "default_min_upcoding_peers")]
    pub min_peer_group: usize,
    /// Provider high-complexity share, percent
    #[serde(default = "default_upcoding_share")]
    pub min_share_pct: f64,
    #[serde(default = "default_upcoding_peer")]
    pub max_peer_share_pct: f64,
    #[serde(default = "default_upcoding_high")]
    pub high_share_pct: f64,
    #[serde(default = "default_upcoding_uplift")]
    pub uplift_fraction: f64,
}

fn default_high_complexity() -> Vec<String> {
    owned(HIGH_COMPLEXITY_EM_CODES)
}

fn default_min_em_claims() -> u64 {
    50
}

fn default_min_upcoding_peers() -> usize {
    3
}

fn default_upcoding_share() -> f64 {
    80.0
}

fn default_upcoding_peer() -> f64 {
    30.0
}

fn default_upcoding_high() -> f64 {
    90.0
}

fn default_upcoding_uplift() -> f64 {
    0.30
}

impl Default for UpcodingThresholds {
    fn default() -> Self {
        Self {
            high_complexity_codes: default_high_complexity(),
            min_em_claims: default_min_em_claims(),
            min_peer_group: default_min_upcoding_peers(),
            min_share_pct: default_upcoding_share(),
            max_peer_share_pct: default_upcoding_peer(),
            high_share_pct: default_upcoding_high(),
            uplift_fraction: default_upcoding_uplift(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConcurrentBillingThresholds {
    #[serde(default = "default_min_states")]
    pub min_states: usize,
    #[serde(default = "default_high_states")]
    pub high_states: usize,
    #[serde(default = "default_phantom_fraction")]
    pub overpayment_fraction: f64,
}

fn default_min_states() -> usize {
    5
}

fn default_high_states() -> usize {
    8
}

fn default_phantom_fraction() -> f64 {
    0.60
}

impl Default for ConcurrentBillingThresholds {
    fn default() -> Self {
        Self {
            min_states: default_min_states(),
            high_states: default_high_states(),
            overpayment_fraction: default_phantom_fraction(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BurstEnrollmentThresholds {
    #[serde(default = "default_burst_min")]
    pub min_providers: usize,
    #[serde(default = "default_burst_billing")]
    pub min_combined_billing: f64,
    #[serde(default = "default_burst_high")]
    pub high_providers: usize,
    #[serde(default = "default_five_million")]
    pub high_combined_billing: f64,
    #[serde(default = "default_quarter_fraction")]
    pub overpayment_fraction: f64,
}

fn default_burst_min() -> usize {
    4
}

fn default_burst_high() -> usize {
    8
}

fn default_burst_billing() -> f64 {
    500_000.0
}

fn default_quarter_fraction() -> f64 {
    0.25
}

impl Default for BurstEnrollmentThresholds {
    fn default() -> Self {
        Self {
            min_providers: default_burst_min(),
            min_combined_billing: default_burst_billing(),
            high_providers: default_burst_high(),
            high_combined_billing: default_five_million(),
            overpayment_fraction: default_quarter_fraction(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MonocultureThresholds {
    #[serde(default = "default_mono_claims")]
    pub min_claims: u64,
    #[serde(default = "default_mono_share")]
    pub min_share_pct: f64,
    #[serde(default = "default_mono_high_share")]
    pub high_share_pct: f64,
    #[serde(default = "default_burst_billing")]
    pub high_billing: f64,
    #[serde(default = "default_quarter_fraction")]
    pub overpayment_fraction: f64,
    #[serde(default = "default_exempt_codes")]
    pub exempt_codes: Vec<String>,
}

fn default_mono_claims() -> u64 {
    500
}

fn default_mono_share() -> f64 {
    85.0
}

fn default_mono_high_share() -> f64 {
    95.0
}

fn default_exempt_codes() -> Vec<String> {
    owned(EMERGENCY_PROCEDURE_CODES)
}

impl Default for MonocultureThresholds {
    fn default() -> Self {
        Self {
            min_claims: default_mono_claims(),
            min_share_pct: default_mono_share(),
            high_share_pct: default_mono_high_share(),
            high_billing: default_burst_billing(),
            overpayment_fraction: default_quarter_fraction(),
            exempt_codes: default_exempt_codes(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BustOutThresholds {
    #[serde(default = "default_bust_peak")]
    pub min_peak_billing: f64,
    #[serde(default = "default_bust_months")]
    pub min_billing_months: usize,
    /// Post-peak average must fall below this share of peak, percent
    #[serde(default = "default_bust_post")]
    pub max_post_peak_pct: f64,
    /// Pre-peak average must stay below this share of peak, percent
    #[serde(default = "default_bust_pre")]
    pub max_pre_peak_pct: f64,
    #[serde(default = "default_bust_high")]
    pub high_peak_billing: f64,
    #[serde(default = "default_bust_fraction")]
    pub overpayment_fraction: f64,
}

fn default_bust_peak() -> f64 {
    50_000.0
}

fn default_bust_months() -> usize {
    6
}

fn default_bust_post() -> f64 {
    10.0
}

fn default_bust_pre() -> f64 {
    50.0
}

fn default_bust_high() -> f64 {
    500_000.0
}

fn default_bust_fraction() -> f64 {
    0.4
}

impl Default for BustOutThresholds {
    fn default() -> Self {
        Self {
            min_peak_billing: default_bust_peak(),
            min_billing_months: default_bust_months(),
            max_post_peak_pct: default_bust_post(),
            max_pre_peak_pct: default_bust_pre(),
            high_peak_billing: default_bust_high(),
            overpayment_fraction: default_bust_fraction(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RateAnomalyThresholds {
    /// Rows need more claims than this to count
    #[serde(default = "default_rate_claims")]
    pub min_claims: u64,
    #[serde(default = "default_rate_peers")]
    pub min_peer_group: usize,
    #[serde(default = "default_rate_ratio")]
    pub min_ratio_to_median: f64,
    #[serde(default = "default_rate_high")]
    pub high_ratio_to_median: f64,
    /// Ratio at which exceeding the code's percentile also makes it high
    #[serde(default = "default_rate_mid")]
    pub high_ratio_with_percentile: f64,
    #[serde(default = "default_percentile")]
    pub percentile: f64,
    #[serde(default = "default_rate_fraction")]
    pub overpayment_fraction: f64,
    #[serde(default = "default_exempt_codes")]
    pub exempt_codes: Vec<String>,
}

fn default_rate_claims() -> u64 {
    100
}

fn default_rate_peers() -> usize {
    10
}

fn default_rate_ratio() -> f64 {
    3.0
}

fn default_rate_high() -> f64 {
    10.0
}

fn default_rate_mid() -> f64 {
    5.0
}

fn default_rate_fraction() -> f64 {
    0.7
}

impl Default for RateAnomalyThresholds {
    fn default() -> Self {
        Self {
            min_claims: default_rate_claims(),
            min_peer_group: default_rate_peers(),
            min_ratio_to_median: default_rate_ratio(),
            high_ratio_to_median: default_rate_high(),
            high_ratio_with_percentile: default_rate_mid(),
            percentile: default_percentile(),
            overpayment_fraction: default_rate_fraction(),
            exempt_codes: default_exempt_codes(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BillingRampThresholds {
    /// Members with billing needed before peaks are compared
    #[serde(default = "default_three_usize")]
    pub min_providers: usize,
    #[serde(default = "default_three_i64")]
    pub max_peak_spread_months: i64,
    #[serde(default = "default_ramp_peak")]
    pub min_combined_peak_billing: f64,
    #[serde(default = "default_one_i64")]
    pub critical_peak_spread_months: i64,
    #[serde(default = "default_shared_min")]
    pub critical_providers: usize,
    #[serde(default = "default_two_million")]
    pub critical_network_billing: f64,
    #[serde(default = "default_thirty_pct")]
    pub overpayment_fraction: f64,
}

fn default_three_usize() -> usize {
    3
}

fn default_three_i64() -> i64 {
    3
}

fn default_one_i64() -> i64 {
    1
}

fn default_ramp_peak() -> f64 {
    200_000.0
}

fn default_two_million() -> f64 {
    2_000_000.0
}

fn default_thirty_pct() -> f64 {
    0.3
}

impl Default for BillingRampThresholds {
    fn default() -> Self {
        Self {
            min_providers: default_three_usize(),
            max_peak_spread_months: default_three_i64(),
            min_combined_peak_billing: default_ramp_peak(),
            critical_peak_spread_months: default_one_i64(),
            critical_providers: default_shared_min(),
            critical_network_billing: default_two_million(),
            overpayment_fraction: default_thirty_pct(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServicingHubThresholds {
    #[serde(default = "default_shared_min")]
    pub min_billing_npis: usize,
    #[serde(default = "default_hub_billing")]
    pub min_total_billing: f64,
    #[serde(default = "default_shared_high")]
    pub high_billing_npis: usize,
    #[serde(default = "default_two_million")]
    pub high_total_billing: f64,
    #[serde(default = "default_hub_critical")]
    pub critical_billing_npis: usize,
    /// At `high_billing_npis` or more, a ratio below this is critical
    #[serde(default = "default_min_ratio")]
    pub critical_max_beneficiary_ratio: f64,
    #[serde(default = "default_hub_fraction")]
    pub overpayment_fraction: f64,
    #[serde(default = "default_evidence_npis")]
    pub max_listed_npis: usize,
}

fn default_hub_billing() -> f64 {
    500_000.0
}

fn default_hub_critical() -> usize {
    15
}

fn default_hub_fraction() -> f64 {
    0.35
}

impl Default for ServicingHubThresholds {
    fn default() -> Self {
        Self {
            min_billing_npis: default_shared_min(),
            min_total_billing: default_hub_billing(),
            high_billing_npis: default_shared_high(),
            high_total_billing: default_two_million(),
            critical_billing_npis: default_hub_critical(),
            critical_max_beneficiary_ratio: default_min_ratio(),
            overpayment_fraction: default_hub_fraction(),
            max_listed_npis: default_evidence_npis(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DilutionThresholds {
    /// Members with billing needed for a network to count
    #[serde(default = "default_three_usize")]
    pub min_providers: usize,
    #[serde(default = "default_hub_billing")]
    pub min_combined_billing: f64,
    /// Networks above this many claims per beneficiary are flagged
    #[serde(default = "default_fifty")]
    pub max_claims_per_beneficiary: f64,
    /// Networks below this percentile of the beneficiary ratio are flagged
    #[serde(default = "default_p10")]
    pub ratio_percentile: f64,
    #[serde(default = "default_hundred")]
    pub critical_claims_per_beneficiary: f64,
    #[serde(default = "default_two_million")]
    pub critical_combined_billing: f64,
    #[serde(default = "default_dilution_ratio")]
    pub high_max_beneficiary_ratio: f64,
    #[serde(default = "default_shared_min")]
    pub high_providers: usize,
    /// Cap on the excess-claims estimate as a share of network billing
    #[serde(default = "default_eighty_pct")]
    pub max_overpayment_fraction: f64,
    /// Share of network billing used when there is no peer median
    #[serde(default = "default_half")]
    pub fallback_fraction: f64,
}

fn default_fifty() -> f64 {
    50.0
}

fn default_hundred() -> f64 {
    100.0
}

fn default_p10() -> f64 {
    0.10
}

fn default_dilution_ratio() -> f64 {
    0.02
}

fn default_eighty_pct() -> f64 {
    0.8
}

fn default_half() -> f64 {
    0.5
}

impl Default for DilutionThresholds {
    fn default() -> Self {
        Self {
            min_providers: default_three_usize(),
            min_combined_billing: default_hub_billing(),
            max_claims_per_beneficiary: default_fifty(),
            ratio_percentile: default_p10(),
            critical_claims_per_beneficiary: default_hundred(),
            critical_combined_billing: default_two_million(),
            high_max_beneficiary_ratio: default_dilution_ratio(),
            high_providers: default_shared_min(),
            max_overpayment_fraction: default_eighty_pct(),
            fallback_fraction: default_half(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CaregiverDensityThresholds {
    /// Taxonomies whose billing counts as home health
    #[serde(default = "default_home_health")]
    pub taxonomies: Vec<String>,
    /// Zips below this home health billing are not compared
    #[serde(default = "default_caregiver_zip")]
    pub min_zip_billing: f64,
    /// States need this many qualifying zips for a median
    #[serde(default = "default_three_usize")]
    pub min_zips_per_state: usize,
    #[serde(default = "default_caregiver_ratio")]
    pub min_ratio_to_state_median: f64,
    #[serde(default = "default_caregiver_high")]
    pub high_ratio_to_state_median: f64,
    #[serde(default = "default_hub_billing")]
    pub high_zip_billing: f64,
    /// Share of the zip's providers that are individuals
    #[serde(default = "default_half")]
    pub min_individual_share: f64,
    #[serde(default = "default_caregiver_benes")]
    pub max_beneficiaries_per_individual: f64,
    #[serde(default = "default_caregiver_fraction")]
    pub overpayment_fraction: f64,
    #[serde(default = "default_evidence_npis")]
    pub max_listed_npis: usize,
}

fn default_caregiver_zip() -> f64 {
    100_000.0
}

fn default_caregiver_ratio() -> f64 {
    3.0
}

fn default_caregiver_high() -> f64 {
    5.0
}

fn default_caregiver_benes() -> f64 {
    5.0
}

fn default_caregiver_fraction() -> f64 {
    0.4
}

impl Default for CaregiverDensityThresholds {
    fn default() -> Self {
        Self {
            taxonomies: default_home_health(),
            min_zip_billing: default_caregiver_zip(),
            min_zips_per_state: default_three_usize(),
            min_ratio_to_state_median: default_caregiver_ratio(),
            high_ratio_to_state_median: default_caregiver_high(),
            high_zip_billing: default_hub_billing(),
            min_individual_share: default_half(),
            max_beneficiaries_per_individual: default_caregiver_benes(),
            overpayment_fraction: default_caregiver_fraction(),
            max_listed_npis: default_evidence_npis(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RepetitiveServiceThresholds {
    /// Code rows need more claims than this to count
    #[serde(default = "default_repetitive_claims")]
    pub min_claims: u64,
    #[serde(default = "default_rate_peers")]
    pub min_peer_group: usize,
    #[serde(default = "default_percentile")]
    pub percentile: f64,
    /// Multiple of the peer percentile at which severity becomes high
    #[serde(default = "default_caregiver_ratio")]
    pub high_multiple: f64,
    #[serde(default = "default_eighty_pct")]
    pub overpayment_fraction: f64,
}

fn default_repetitive_claims() -> u64 {
    200
}

impl Default for RepetitiveServiceThresholds {
    fn default() -> Self {
        Self {
            min_claims: default_repetitive_claims(),
            min_peer_group: default_rate_peers(),
            percentile: default_percentile(),
            high_multiple: default_caregiver_ratio(),
            overpayment_fraction: default_eighty_pct(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServicingSpreadThresholds {
    #[serde(default = "default_shared_min")]
    pub min_billing_npis: usize,
    #[serde(default = "default_ramp_peak")]
    pub min_total_billing: f64,
    /// Hubs above this many claims per beneficiary are flagged
    #[serde(default = "default_hundred")]
    pub max_claims_per_beneficiary: f64,
    #[serde(default = "default_spread_high")]
    pub high_claims_per_beneficiary: f64,
    /// Hubs below this percentile of the beneficiary ratio are flagged
    #[serde(default = "default_p10")]
    pub ratio_percentile: f64,
    #[serde(default = "default_spread_fraction")]
    pub overpayment_fraction: f64,
    /// Share of hub billing used when there is no baseline ratio
    #[serde(default = "default_rate_fraction")]
    pub fallback_fraction: f64,
    #[serde(default = "default_evidence_npis")]
    pub max_listed_npis: usize,
}

fn default_spread_high() -> f64 {
    200.0
}

fn default_spread_fraction() -> f64 {
    0.65
}

impl Default for ServicingSpreadThresholds {
    fn default() -> Self {
        Self {
            min_billing_npis: default_shared_min(),
            min_total_billing: default_ramp_peak(),
            max_claims_per_beneficiary: default_hundred(),
            high_claims_per_beneficiary: default_spread_high(),
            ratio_percentile: default_p10(),
            overpayment_fraction: default_spread_fraction(),
            fallback_fraction: default_rate_fraction(),
            max_listed_npis: default_evidence_npis(),
        }
    }
}

/// Risk scorer weights and caps
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoringConfig {
    #[serde(default = "default_breadth_points")]
    pub breadth_points_per_signal: f64,
    #[serde(default = "default_thirty")]
    pub breadth_cap: f64,
    /// Weighted severity sum is divided by this before capping
    #[serde(default = "default_severity_divisor")]
    pub severity_divisor: f64,
    #[serde(default = "default_forty")]
    pub severity_cap: f64,
    #[serde(default = "default_thirty")]
    pub overpayment_cap: f64,
    #[serde(default)]
    pub severity_weights: SeverityWeights,
    /// Per-signal risk weight overrides, keyed by signal name
    #[serde(default)]
    pub signal_weights: BTreeMap<String, f64>,
}

fn default_breadth_points() -> f64 {
    12.0
}

fn default_thirty() -> f64 {
    30.0
}

fn default_forty() -> f64 {
    40.0
}

fn default_severity_divisor() -> f64 {
    2.0
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            breadth_points_per_signal: default_breadth_points(),
            breadth_cap: default_thirty(),
            severity_divisor: default_severity_divisor(),
            severity_cap: default_forty(),
            overpayment_cap: default_thirty(),
            severity_weights: SeverityWeights::default(),
            signal_weights: BTreeMap::new(),
        }
    }
}

impl ScoringConfig {
    /// Risk weight for a signal, falling back to the methodology table
    pub fn signal_weight(&self, kind: SignalKind) -> f64 {
        self.signal_weights
            .get(kind.as_str())
            .or_else(|| self.signal_weights.get(&kind.config_key()))
            .copied()
            .unwrap_or_else(|| crate::methodology::entry(kind).risk_weight)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SeverityWeights {
    #[serde(default = "default_w_critical")]
    pub critical: f64,
    #[serde(default = "default_w_high")]
    pub high: f64,
    #[serde(default = "default_w_medium")]
    pub medium: f64,
    #[serde(default = "default_w_low")]
    pub low: f64,
}

fn default_w_critical() -> f64 {
    10.0
}

fn default_w_high() -> f64 {
    7.0
}

fn default_w_medium() -> f64 {
    4.0
}

fn default_w_low() -> f64 {
    1.0
}

impl Default for SeverityWeights {
    fn default() -> Self {
        Self {
            critical: default_w_critical(),
            high: default_w_high(),
            medium: default_w_medium(),
            low: default_w_low(),
        }
    }
}

impl SeverityWeights {
    pub fn weight(&self, severity: Severity) -> f64 {
        match severity {
            Severity::Critical => self.critical,
            Severity::High => self.high,
            Severity::Medium => self.medium,
            Severity::Low => self.low,
        }
    }

    /// Weights must be non-negative and ordered critical > high > medium > low
    pub fn is_valid(&self) -> bool {
        self.low >= 0.0
            && self.critical > self.high
            && self.high > self.medium
            && self.medium > self.low
    }
}

/// Public-health-emergency window; some temporal signals are downgraded inside it
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmergencyPeriod {
    #[serde(default = "default_emergency_start")]
    pub start: NaiveDate,
    #[serde(default = "default_emergency_end")]
    pub end: NaiveDate,
}

fn default_emergency_start() -> NaiveDate {
    NaiveDate::from_ymd_opt(2020, 3, 1).unwrap_or_default()
}

fn default_emergency_end() -> NaiveDate {
    NaiveDate::from_ymd_opt(2021, 12, 31).unwrap_or_default()
}

impl Default for EmergencyPeriod {
    fn default() -> Self {
        Self {
            start: default_emergency_start(),
            end: default_emergency_end(),
        }
    }
}

impl EmergencyPeriod {
    pub fn contains(&self, date: NaiveDate) -> bool {
        date >= self.start && date <= self.end
    }
}

fn check(ok: bool, message: impl FnOnce() -> String) -> Result<(), ScanError> {
    if ok {
        Ok(())
    } else {
        Err(ScanError::Configuration(message()))
    }
}

fn is_fraction(v: f64) -> bool {
    (0.0..=1.0).contains(&v)
}

fn is_pct(v: f64) -> bool {
    (0.0..=100.0).contains(&v)
}

impl EngineConfig {
    /// Check if a signal is enabled (defaults to true if not specified)
    pub fn is_signal_enabled(&self, kind: SignalKind) -> bool {
        self.signals
            .get(&kind.config_key())
            .or_else(|| self.signals.get(kind.as_str()))
            .and_then(|t| t.enabled)
            .unwrap_or(true)
    }

    /// Reject thresholds that would make detector or scorer math unsafe
    pub fn validate(&self) -> Result<(), ScanError> {
        for name in self.signals.keys() {
            check(SignalKind::from_name(name).is_some(), || {
                format!("unknown signal '{name}' in [signals]")
            })?;
        }
        for name in self.scoring.signal_weights.keys() {
            check(SignalKind::from_name(name).is_some(), || {
                format!("unknown signal '{name}' in [scoring.signal_weights]")
            })?;
        }

        let t = &self.thresholds;
        check(is_fraction(t.excluded_provider.overpayment_fraction), || {
            "excluded_provider.overpayment_fraction must be within [0, 1]".into()
        })?;

        let p = t.billing_outlier.percentile;
        check(p > 0.0 && p < 1.0, || {
            format!("billing_outlier.percentile must be within (0, 1), got {p}")
        })?;
        check(t.billing_outlier.min_peer_group > 0, || {
            "billing_outlier.min_peer_group must be at least 1".into()
        })?;
        check(t.billing_outlier.high_multiple >= 1.0, || {
            "billing_outlier.high_multiple must be at least 1".into()
        })?;

        let re = &t.rapid_escalation;
        check(re.observation_months > 0 && re.rolling_window_months > 0, || {
            "rapid_escalation month windows must be positive".into()
        })?;
        check(re.growth_pct > 0.0, || {
            "rapid_escalation.growth_pct must be positive".into()
        })?;
        check(re.high_consecutive_months > 0, || {
            "rapid_escalation.high_consecutive_months must be at least 1".into()
        })?;

        let wf = &t.workforce_impossibility;
        check(wf.hours_per_month > 0.0, || {
            "workforce_impossibility.hours_per_month must be positive".into()
        })?;
        check(wf.max_claims_per_hour > 0.0, || {
            "workforce_impossibility.max_claims_per_hour must be positive".into()
        })?;

        let so = &t.shared_official;
        check(so.min_providers > 0, || {
            "shared_official.min_providers must be at least 1".into()
        })?;
        check(so.min_combined_billing >= 0.0, || {
            "shared_official.min_combined_billing must not be negative".into()
        })?;
        check(is_fraction(so.overpayment_fraction), || {
            "shared_official.overpayment_fraction must be within [0, 1]".into()
        })?;
        check(so.max_providers.is_none_or(|max| max >= so.min_providers), || {
            "shared_official.max_providers must not be below min_providers".into()
        })?;

        let geo = &t.geographic_implausibility;
        check(
            geo.min_beneficiary_ratio > 0.0 && geo.high_beneficiary_ratio > 0.0,
            || "geographic_implausibility ratios must be positive".into(),
        )?;

        let ac = &t.address_clustering;
        check(ac.min_providers > 0, || {
            "address_clustering.min_providers must be at least 1".into()
        })?;
        check(is_fraction(ac.overpayment_fraction), || {
            "address_clustering.overpayment_fraction must be within [0, 1]".into()
        })?;

        let up = &t.upcoding;
        check(up.min_peer_group > 0, || {
            "upcoding.min_peer_group must be at least 1".into()
        })?;
        check(
            is_pct(up.min_share_pct) && is_pct(up.max_peer_share_pct) && is_pct(up.high_share_pct),
            || "upcoding shares must be percentages within [0, 100]".into(),
        )?;
        check(is_fraction(up.uplift_fraction), || {
            "upcoding.uplift_fraction must be within [0, 1]".into()
        })?;

        let cb = &t.concurrent_billing;
        check(cb.min_states > 0, || {
            "concurrent_billing.min_states must be at least 1".into()
        })?;
        check(is_fraction(cb.overpayment_fraction), || {
            "concurrent_billing.overpayment_fraction must be within [0, 1]".into()
        })?;

        let be = &t.burst_enrollment;
        check(be.min_providers > 0, || {
            "burst_enrollment.min_providers must be at least 1".into()
        })?;
        check(is_fraction(be.overpayment_fraction), || {
            "burst_enrollment.overpayment_fraction must be within [0, 1]".into()
        })?;

        let mono = &t.billing_monoculture;
        check(is_pct(mono.min_share_pct) && is_pct(mono.high_share_pct), || {
            "billing_monoculture shares must be percentages within [0, 100]".into()
        })?;
        check(is_fraction(mono.overpayment_fraction), || {
            "billing_monoculture.overpayment_fraction must be within [0, 1]".into()
        })?;

        let bo = &t.billing_bust_out;
        check(bo.min_billing_months > 0 && bo.min_peak_billing >= 0.0, || {
            "billing_bust_out minimums must be positive".into()
        })?;
        check(is_fraction(bo.overpayment_fraction), || {
            "billing_bust_out.overpayment_fraction must be within [0, 1]".into()
        })?;

        let ra = &t.rate_anomaly;
        check(ra.min_peer_group > 0, || {
            "rate_anomaly.min_peer_group must be at least 1".into()
        })?;
        check(ra.percentile > 0.0 && ra.percentile < 1.0, || {
            format!("rate_anomaly.percentile must be within (0, 1), got {}", ra.percentile)
        })?;
        check(ra.min_ratio_to_median > 0.0, || {
            "rate_anomaly.min_ratio_to_median must be positive".into()
        })?;
        check(is_fraction(ra.overpayment_fraction), || {
            "rate_anomaly.overpayment_fraction must be within [0, 1]".into()
        })?;

        let rp = &t.coordinated_billing_ramp;
        check(rp.min_providers >= 2, || {
            "coordinated_billing_ramp.min_providers must be at least 2".into()
        })?;
        check(
            rp.max_peak_spread_months >= 0
                && rp.critical_peak_spread_months <= rp.max_peak_spread_months,
            || "coordinated_billing_ramp peak spreads must satisfy 0 <= critical <= max".into(),
        )?;
        check(is_fraction(rp.overpayment_fraction), || {
            "coordinated_billing_ramp.overpayment_fraction must be within [0, 1]".into()
        })?;

        let sh = &t.phantom_servicing_hub;
        check(sh.min_billing_npis >= 2, || {
            "phantom_servicing_hub.min_billing_npis must be at least 2".into()
        })?;
        check(
            sh.min_billing_npis <= sh.high_billing_npis
                && sh.high_billing_npis <= sh.critical_billing_npis,
            || "phantom_servicing_hub billing npi thresholds must be ordered min <= high <= critical".into(),
        )?;
        check(is_fraction(sh.overpayment_fraction), || {
            "phantom_servicing_hub.overpayment_fraction must be within [0, 1]".into()
        })?;

        let nd = &t.network_beneficiary_dilution;
        check(nd.min_providers >= 2, || {
            "network_beneficiary_dilution.min_providers must be at least 2".into()
        })?;
        check(is_fraction(nd.ratio_percentile), || {
            "network_beneficiary_dilution.ratio_percentile must be within [0, 1]".into()
        })?;
        check(
            is_fraction(nd.max_overpayment_fraction) && is_fraction(nd.fallback_fraction),
            || "network_beneficiary_dilution overpayment fractions must be within [0, 1]".into(),
        )?;

        let cd = &t.caregiver_density_anomaly;
        check(cd.min_zips_per_state > 0, || {
            "caregiver_density_anomaly.min_zips_per_state must be at least 1".into()
        })?;
        check(is_fraction(cd.min_individual_share), || {
            "caregiver_density_anomaly.min_individual_share must be within [0, 1]".into()
        })?;
        check(is_fraction(cd.overpayment_fraction), || {
            "caregiver_density_anomaly.overpayment_fraction must be within [0, 1]".into()
        })?;

        let rs = &t.repetitive_service_abuse;
        check(rs.min_peer_group > 0, || {
            "repetitive_service_abuse.min_peer_group must be at least 1".into()
        })?;
        check(rs.percentile > 0.0 && rs.percentile < 1.0, || {
            format!(
                "repetitive_service_abuse.percentile must be within (0, 1), got {}",
                rs.percentile
            )
        })?;
        check(is_fraction(rs.overpayment_fraction), || {
            "repetitive_service_abuse.overpayment_fraction must be within [0, 1]".into()
        })?;

        let sp = &t.phantom_servicing_spread;
        check(sp.min_billing_npis >= 2, || {
            "phantom_servicing_spread.min_billing_npis must be at least 2".into()
        })?;
        check(is_fraction(sp.ratio_percentile), || {
            "phantom_servicing_spread.ratio_percentile must be within [0, 1]".into()
        })?;
        check(
            is_fraction(sp.overpayment_fraction) && is_fraction(sp.fallback_fraction),
            || "phantom_servicing_spread overpayment fractions must be within [0, 1]".into(),
        )?;

        let s = &self.scoring;
        check(s.severity_divisor > 0.0, || {
            "scoring.severity_divisor must be positive".into()
        })?;
        check(
            s.breadth_points_per_signal >= 0.0
                && s.breadth_cap > 0.0
                && s.severity_cap > 0.0
                && s.overpayment_cap > 0.0,
            || "scoring caps must be positive".into(),
        )?;
        check(s.breadth_cap + s.severity_cap + s.overpayment_cap <= 100.0, || {
            "scoring caps must sum to at most 100".into()
        })?;
        check(s.severity_weights.is_valid(), || {
            "scoring.severity_weights must be ordered critical > high > medium > low >= 0".into()
        })?;
        check(s.signal_weights.values().all(|w| *w >= 0.0), || {
            "scoring.signal_weights must not be negative".into()
        })?;

        check(self.emergency_period.start <= self.emergency_period.end, || {
            "emergency_period.start must not be after end".into()
        })?;

        Ok(())
    }
}

/// Load engine configuration from a directory.
///
/// Searches for `claimscan.toml`, then `.claimscanrc.json`. Returns the
/// default configuration only when neither file exists; a file that is
/// present but unreadable or malformed is an error.
pub fn load_config(dir: &Path) -> anyhow::Result<EngineConfig> {
    let toml_path = dir.join(CONFIG_TOML);
    if toml_path.exists() {
        let config = load_toml_config(&toml_path)
            .with_context(|| format!("Failed to parse {}", toml_path.display()))?;
        debug!("Loaded config from {}", toml_path.display());
        return Ok(config);
    }

    let json_path = dir.join(CONFIG_JSON);
    if json_path.exists() {
        let config = load_json_config(&json_path)
            .with_context(|| format!("Failed to parse {}", json_path.display()))?;
        debug!("Loaded config from {}", json_path.display());
        return Ok(config);
    }

    debug!("No config found, using defaults");
    Ok(EngineConfig::default())
}

/// Load configuration from an explicit file path (TOML or JSON by extension)
pub fn load_config_file(path: &Path) -> anyhow::Result<EngineConfig> {
    match path.extension().and_then(|e| e.to_str()) {
        Some("json") => load_json_config(path),
        _ => load_toml_config(path),
    }
}

fn load_toml_config(path: &Path) -> anyhow::Result<EngineConfig> {
    let content = std::fs::read_to_string(path)?;
    let config: EngineConfig = toml::from_str(&content)?;
    Ok(config)
}

fn load_json_config(path: &Path) -> anyhow::Result<EngineConfig> {
    let content = std::fs::read_to_string(path)?;
    let config: EngineConfig = serde_json::from_str(&content)?;
    Ok(config)
}

#[cfg(test)]
mod tests;

//! Core data models for claimscan
//!
//! These models are shared by the data source, the detectors, the scorer
//! and the pipeline: the three input tables, the per-signal findings, and
//! the merged per-provider results.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;

/// Generate a deterministic finding ID based on content hash.
///
/// The same signal firing for the same provider over the same scope
/// (exclusion date, peer group, network key...) always gets the same ID,
/// so findings can be tracked and suppressed across runs.
pub fn deterministic_finding_id(signal: SignalKind, npi: &str, scope: &str) -> String {
    let input = format!("{}\n{npi}\n{scope}", signal.as_str());
    let digest = Sha256::digest(input.as_bytes());
    digest
        .iter()
        .take(8)
        .map(|b| format!("{b:02x}"))
        .collect()
}

/// Round a currency or ratio value to two decimals for reporting.
pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Round a small ratio to four decimals for reporting.
pub fn round4(value: f64) -> f64 {
    (value * 10_000.0).round() / 10_000.0
}

/// Severity levels for findings
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default,
)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    #[default]
    Low,
    Medium,
    High,
    Critical,
}

impl Severity {
    /// Parse a lowercase severity name
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "low" => Some(Severity::Low),
            "medium" => Some(Severity::Medium),
            "high" => Some(Severity::High),
            "critical" => Some(Severity::Critical),
            _ => None,
        }
    }
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Severity::Low => write!(f, "low"),
            Severity::Medium => write!(f, "medium"),
            Severity::High => write!(f, "high"),
            Severity::Critical => write!(f, "critical"),
        }
    }
}

/// The fixed set of fraud signal types.
///
/// Declaration order is the enumeration order used whenever findings are
/// accumulated (risk scoring, per-signal counts).
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum SignalKind {
    ExcludedProvider,
    BillingOutlier,
    RapidEscalation,
    WorkforceImpossibility,
    SharedOfficial,
    GeographicImplausibility,
    AddressClustering,
    Upcoding,
    ConcurrentBilling,
    BurstEnrollment,
    BillingMonoculture,
    BillingBustOut,
    RateAnomaly,
    CoordinatedBillingRamp,
    PhantomServicingHub,
    NetworkBeneficiaryDilution,
    CaregiverDensityAnomaly,
    RepetitiveServiceAbuse,
    PhantomServicingSpread,
}

impl SignalKind {
    /// Every signal kind, in enumeration order
    pub const ALL: [SignalKind; 19] = [
        SignalKind::ExcludedProvider,
        SignalKind::BillingOutlier,
        SignalKind::RapidEscalation,
        SignalKind::WorkforceImpossibility,
        SignalKind::SharedOfficial,
        SignalKind::GeographicImplausibility,
        SignalKind::AddressClustering,
        SignalKind::Upcoding,
        SignalKind::ConcurrentBilling,
        SignalKind::BurstEnrollment,
        SignalKind::BillingMonoculture,
        SignalKind::BillingBustOut,
        SignalKind::RateAnomaly,
        SignalKind::CoordinatedBillingRamp,
        SignalKind::PhantomServicingHub,
        SignalKind::NetworkBeneficiaryDilution,
        SignalKind::CaregiverDensityAnomaly,
        SignalKind::RepetitiveServiceAbuse,
        SignalKind::PhantomServicingSpread,
    ];

    /// Stable snake_case identifier (matches the serde name)
    pub fn as_str(&self) -> &'static str {
        match self {
            SignalKind::ExcludedProvider => "excluded_provider",
            SignalKind::BillingOutlier => "billing_outlier",
            SignalKind::RapidEscalation => "rapid_escalation",
            SignalKind::WorkforceImpossibility => "workforce_impossibility",
            SignalKind::SharedOfficial => "shared_official",
            SignalKind::GeographicImplausibility => "geographic_implausibility",
            SignalKind::AddressClustering => "address_clustering",
            SignalKind::Upcoding => "upcoding",
            SignalKind::ConcurrentBilling => "concurrent_billing",
            SignalKind::BurstEnrollment => "burst_enrollment",
            SignalKind::BillingMonoculture => "billing_monoculture",
            SignalKind::BillingBustOut => "billing_bust_out",
            SignalKind::RateAnomaly => "rate_anomaly",
            SignalKind::CoordinatedBillingRamp => "coordinated_billing_ramp",
            SignalKind::PhantomServicingHub => "phantom_servicing_hub",
            SignalKind::NetworkBeneficiaryDilution => "network_beneficiary_dilution",
            SignalKind::CaregiverDensityAnomaly => "caregiver_density_anomaly",
            SignalKind::RepetitiveServiceAbuse => "repetitive_service_abuse",
            SignalKind::PhantomServicingSpread => "phantom_servicing_spread",
        }
    }

    /// Kebab-case name used for `[signals.<name>]` config sections
    pub fn config_key(&self) -> String {
        self.as_str().replace('_', "-")
    }

    /// Look up a kind by snake_case or kebab-case name
    pub fn from_name(name: &str) -> Option<Self> {
        let normalized = name.trim().to_ascii_lowercase().replace('-', "_");
        Self::ALL.into_iter().find(|k| k.as_str() == normalized)
    }
}

impl std::fmt::Display for SignalKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Registry entity type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntityType {
    #[serde(alias = "1")]
    Individual,
    #[serde(alias = "2")]
    Organization,
}

/// One billing row (billing provider x servicing provider x code x month)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transaction {
    pub billing_npi: String,
    #[serde(default)]
    pub servicing_npi: Option<String>,
    pub procedure_code: String,
    /// First day of the service month
    pub service_month: NaiveDate,
    /// Unique beneficiaries served in this row
    #[serde(default)]
    pub beneficiaries: u64,
    pub claims: u64,
    /// Amount paid, USD
    pub amount: f64,
    #[serde(default)]
    pub service_state: Option<String>,
    #[serde(default)]
    pub service_zip: Option<String>,
}

impl Transaction {
    /// Servicing npi when it differs from the billing npi
    pub fn distinct_servicing_npi(&self) -> Option<&str> {
        self.servicing_npi
            .as_deref()
            .filter(|s| !s.trim().is_empty() && *s != self.billing_npi)
    }
}

/// One exclusion-list entry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExclusionRecord {
    #[serde(default)]
    pub last_name: Option<String>,
    #[serde(default)]
    pub first_name: Option<String>,
    #[serde(default)]
    pub business_name: Option<String>,
    #[serde(default)]
    pub npi: Option<String>,
    #[serde(default)]
    pub state: Option<String>,
    #[serde(default)]
    pub exclusion_type: String,
    pub effective_date: NaiveDate,
    #[serde(default)]
    pub reinstatement_date: Option<NaiveDate>,
}

impl ExclusionRecord {
    /// Exclusion npi, ignoring blank and all-zero placeholders
    pub fn usable_npi(&self) -> Option<&str> {
        self.npi
            .as_deref()
            .map(str::trim)
            .filter(|n| !n.is_empty() && n.chars().any(|c| c != '0'))
    }

    /// Candidate party names: "FIRST LAST" for individuals, business name for entities
    pub fn party_names(&self) -> Vec<String> {
        let mut names = Vec::new();
        let person = format!(
            "{} {}",
            self.first_name.as_deref().unwrap_or(""),
            self.last_name.as_deref().unwrap_or("")
        );
        if !person.trim().is_empty() {
            names.push(person.trim().to_string());
        }
        if let Some(business) = self.business_name.as_deref() {
            if !business.trim().is_empty() {
                names.push(business.trim().to_string());
            }
        }
        names
    }

    /// Whether a service month falls inside the exclusion period
    pub fn excludes(&self, month: NaiveDate) -> bool {
        month > self.effective_date && self.reinstatement_date.is_none_or(|r| month < r)
    }
}

/// One provider-identity registry entry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProviderIdentity {
    pub npi: String,
    pub entity_type: EntityType,
    pub display_name: String,
    #[serde(default)]
    pub taxonomy_code: Option<String>,
    #[serde(default)]
    pub state: Option<String>,
    #[serde(default)]
    pub postal_code: Option<String>,
    #[serde(default)]
    pub enrollment_date: Option<NaiveDate>,
    #[serde(default)]
    pub authorized_official: Option<String>,
}

impl ProviderIdentity {
    pub fn is_individual(&self) -> bool {
        self.entity_type == EntityType::Individual
    }

    pub fn is_organization(&self) -> bool {
        self.entity_type == EntityType::Organization
    }

    /// (taxonomy, state) peer-group key, when both are present
    pub fn peer_group(&self) -> Option<(String, String)> {
        let taxonomy = self.taxonomy_code.as_deref().map(str::trim)?;
        let state = self.state.as_deref().map(str::trim)?;
        if taxonomy.is_empty() || state.is_empty() {
            return None;
        }
        Some((taxonomy.to_string(), state.to_string()))
    }
}

/// Normalize a person or business name for matching:
/// uppercase, punctuation dropped, whitespace collapsed.
pub fn normalize_name(name: &str) -> String {
    name.chars()
        .map(|c| {
            if c.is_alphanumeric() {
                c.to_ascii_uppercase()
            } else {
                ' '
            }
        })
        .collect::<String>()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

/// How an exclusion record was tied to a provider
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchMethod {
    Npi,
    Name,
}

/// Signal-specific facts backing a finding.
///
/// Each variant is the fixed evidence schema for one `SignalKind`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "signal", content = "facts", rename_all = "snake_case")]
pub enum Evidence {
    ExcludedProvider {
        matched_name: String,
        match_method: MatchMethod,
        exclusion_type: String,
        exclusion_date: NaiveDate,
        reinstatement_date: Option<NaiveDate>,
        billing_after_exclusion: f64,
        claims_after_exclusion: u64,
        first_month_after_exclusion: NaiveDate,
        last_month_after_exclusion: NaiveDate,
    },
    BillingOutlier {
        total_billing: f64,
        taxonomy_code: String,
        state: String,
        peer_count: usize,
        peer_median: f64,
        percentile: f64,
        peer_percentile_value: f64,
        ratio_to_percentile: f64,
        ratio_to_median: f64,
    },
    RapidEscalation {
        enrollment_date: NaiveDate,
        first_billing_month: NaiveDate,
        monthly_billing: Vec<f64>,
        rolling_totals: Vec<f64>,
        peak_growth_pct: f64,
        trigger_months: Vec<NaiveDate>,
        longest_trigger_streak: usize,
        emergency_period: bool,
    },
    WorkforceImpossibility {
        peak_month: NaiveDate,
        peak_claims: u64,
        workers: u64,
        claims_per_worker_hour: f64,
        max_plausible_claims: f64,
        peak_month_billing: f64,
        emergency_period: bool,
    },
    SharedOfficial {
        official_name: String,
        network_size: usize,
        network_npis: Vec<String>,
        combined_billing: f64,
        network_overpayment: f64,
        provider_billing: f64,
    },
    GeographicImplausibility {
        taxonomy_code: String,
        total_claims: u64,
        total_beneficiaries: u64,
        beneficiary_claim_ratio: f64,
        excess_claims: f64,
        average_claim_value: f64,
        total_billing: f64,
    },
    AddressClustering {
        postal_code: String,
        cluster_size: usize,
        cluster_npis: Vec<String>,
        combined_billing: f64,
        cluster_overpayment: f64,
        provider_billing: f64,
    },
    Upcoding {
        em_claims: u64,
        high_complexity_claims: u64,
        high_complexity_pct: f64,
        peer_average_pct: f64,
        peer_count: usize,
        em_billing: f64,
    },
    ConcurrentBilling {
        home_state: Option<String>,
        peak_month: NaiveDate,
        max_states_in_month: usize,
        states_in_peak_month: Vec<String>,
        months_flagged: usize,
        billing_in_flagged_months: f64,
        claims_in_flagged_months: u64,
    },
    BurstEnrollment {
        taxonomy_code: String,
        state: String,
        enrollment_quarter: NaiveDate,
        cohort_size: usize,
        cohort_npis: Vec<String>,
        enrollment_span_days: i64,
        combined_billing: f64,
        provider_billing: f64,
        emergency_period: bool,
    },
    BillingMonoculture {
        dominant_code: String,
        dominant_share_pct: f64,
        dominant_code_claims: u64,
        total_claims: u64,
        total_billing: f64,
    },
    BillingBustOut {
        peak_month: NaiveDate,
        peak_billing: f64,
        pre_peak_average: f64,
        post_peak_average: f64,
        post_peak_pct_of_peak: f64,
        billing_months: usize,
        emergency_period: bool,
    },
    RateAnomaly {
        procedure_code: String,
        claims: u64,
        billing: f64,
        rate_per_claim: f64,
        median_rate: f64,
        p99_rate: f64,
        peer_count: usize,
        ratio_to_median: f64,
    },
    CoordinatedBillingRamp {
        official_name: String,
        network_size: usize,
        network_npis: Vec<String>,
        earliest_peak_month: NaiveDate,
        latest_peak_month: NaiveDate,
        peak_spread_months: i64,
        combined_peak_billing: f64,
        network_billing: f64,
        provider_billing: f64,
    },
    PhantomServicingHub {
        billing_npi_count: usize,
        billing_npis: Vec<String>,
        billing_through_hub: f64,
        claims: u64,
        beneficiaries: u64,
        beneficiary_claim_ratio: f64,
    },
    NetworkBeneficiaryDilution {
        official_name: String,
        network_size: usize,
        network_npis: Vec<String>,
        combined_billing: f64,
        combined_claims: u64,
        combined_beneficiaries: u64,
        claims_per_beneficiary: f64,
        beneficiary_claim_ratio: f64,
        peer_p10_ratio: f64,
        peer_median_claims_per_beneficiary: f64,
        network_overpayment: f64,
        provider_billing: f64,
    },
    CaregiverDensityAnomaly {
        postal_code: String,
        state: String,
        provider_count: usize,
        individual_count: usize,
        individual_share: f64,
        zip_billing: f64,
        zip_claims: u64,
        zip_beneficiaries: u64,
        beneficiaries_per_individual: f64,
        state_median_billing: f64,
        ratio_to_state_median: f64,
        flagged_npis: Vec<String>,
    },
    RepetitiveServiceAbuse {
        procedure_code: String,
        claims: u64,
        beneficiaries: u64,
        billing: f64,
        claims_per_beneficiary: f64,
        peer_p99_claims_per_beneficiary: f64,
        peer_median_claims_per_beneficiary: f64,
        peer_count: usize,
    },
    PhantomServicingSpread {
        billing_npi_count: usize,
        billing_npis: Vec<String>,
        billing_through_hub: f64,
        claims: u64,
        beneficiaries: u64,
        beneficiary_claim_ratio: f64,
        claims_per_beneficiary: f64,
        peer_p10_ratio: f64,
    },
}

impl Evidence {
    /// The signal kind this evidence schema belongs to
    pub fn kind(&self) -> SignalKind {
        match self {
            Evidence::ExcludedProvider { .. } => SignalKind::ExcludedProvider,
            Evidence::BillingOutlier { .. } => SignalKind::BillingOutlier,
            Evidence::RapidEscalation { .. } => SignalKind::RapidEscalation,
            Evidence::WorkforceImpossibility { .. } => SignalKind::WorkforceImpossibility,
            Evidence::SharedOfficial { .. } => SignalKind::SharedOfficial,
            Evidence::GeographicImplausibility { .. } => SignalKind::GeographicImplausibility,
            Evidence::AddressClustering { .. } => SignalKind::AddressClustering,
            Evidence::Upcoding { .. } => SignalKind::Upcoding,
            Evidence::ConcurrentBilling { .. } => SignalKind::ConcurrentBilling,
            Evidence::BurstEnrollment { .. } => SignalKind::BurstEnrollment,
            Evidence::BillingMonoculture { .. } => SignalKind::BillingMonoculture,
            Evidence::BillingBustOut { .. } => SignalKind::BillingBustOut,
            Evidence::RateAnomaly { .. } => SignalKind::RateAnomaly,
            Evidence::CoordinatedBillingRamp { .. } => SignalKind::CoordinatedBillingRamp,
            Evidence::PhantomServicingHub { .. } => SignalKind::PhantomServicingHub,
            Evidence::NetworkBeneficiaryDilution { .. } => SignalKind::NetworkBeneficiaryDilution,
            Evidence::CaregiverDensityAnomaly { .. } => SignalKind::CaregiverDensityAnomaly,
            Evidence::RepetitiveServiceAbuse { .. } => SignalKind::RepetitiveServiceAbuse,
            Evidence::PhantomServicingSpread { .. } => SignalKind::PhantomServicingSpread,
        }
    }
}

/// One instance of a signal triggering for one provider
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SignalFinding {
    pub id: String,
    pub npi: String,
    pub signal_type: SignalKind,
    pub severity: Severity,
    pub evidence: Evidence,
    /// Estimated overpayment, USD (never negative)
    pub estimated_overpayment: f64,
    pub statute: String,
}

impl SignalFinding {
    /// Build a finding; the signal type and statute follow from the evidence.
    ///
    /// `scope` distinguishes independent findings of the same signal for the
    /// same provider (peer group, network, window) in the deterministic ID.
    pub fn new(
        npi: impl Into<String>,
        severity: Severity,
        evidence: Evidence,
        estimated_overpayment: f64,
        scope: &str,
    ) -> Self {
        let npi = npi.into();
        let signal_type = evidence.kind();
        let overpayment = if estimated_overpayment.is_finite() {
            round2(estimated_overpayment.max(0.0))
        } else {
            0.0
        };
        Self {
            id: deterministic_finding_id(signal_type, &npi, scope),
            npi,
            signal_type,
            severity,
            evidence,
            estimated_overpayment: overpayment,
            statute: crate::methodology::entry(signal_type).statute.to_string(),
        }
    }
}

/// Risk tier derived from the composite score
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default,
)]
#[serde(rename_all = "lowercase")]
pub enum RiskTier {
    #[default]
    Low,
    Medium,
    High,
    Critical,
}

impl RiskTier {
    /// Tier for a score; each boundary is inclusive at its lower edge
    pub fn from_score(score: f64) -> Self {
        match score {
            s if s >= 75.0 => RiskTier::Critical,
            s if s >= 50.0 => RiskTier::High,
            s if s >= 25.0 => RiskTier::Medium,
            _ => RiskTier::Low,
        }
    }
}

impl std::fmt::Display for RiskTier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RiskTier::Low => write!(f, "low"),
            RiskTier::Medium => write!(f, "medium"),
            RiskTier::High => write!(f, "high"),
            RiskTier::Critical => write!(f, "critical"),
        }
    }
}

/// Which component of the composite score a factor describes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScoreComponent {
    SignalBreadth,
    SeverityWeight,
    OverpaymentRatio,
}

/// One component's raw value and awarded points
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoreFactor {
    pub component: ScoreComponent,
    pub value: f64,
    pub points: f64,
}

/// Composite risk score with its breakdown
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct RiskScore {
    pub score: f64,
    pub tier: RiskTier,
    pub factors: Vec<ScoreFactor>,
}

/// FCA framing for a provider's primary signal
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FcaRelevance {
    pub primary_signal: SignalKind,
    pub claim_type: String,
    pub statute_reference: String,
    pub suggested_next_steps: Vec<String>,
}

/// Merged, scored view of one flagged provider
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProviderResult {
    pub identity: ProviderIdentity,
    pub findings: Vec<SignalFinding>,
    /// All billing attributed to the provider as billing or servicing npi
    pub total_billing: f64,
    pub total_claims: u64,
    pub total_estimated_overpayment: f64,
    pub signal_types: Vec<SignalKind>,
    pub risk: RiskScore,
    pub fca_relevance: FcaRelevance,
}

impl ProviderResult {
    pub fn npi(&self) -> &str {
        &self.identity.npi
    }
}

/// Count of findings by risk tier
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TierDistribution {
    pub critical: usize,
    pub high: usize,
    pub medium: usize,
    pub low: usize,
}

impl TierDistribution {
    pub fn from_results(results: &[ProviderResult]) -> Self {
        let mut dist = Self::default();
        for r in results {
            match r.risk.tier {
                RiskTier::Critical => dist.critical += 1,
                RiskTier::High => dist.high += 1,
                RiskTier::Medium => dist.medium += 1,
                RiskTier::Low => dist.low += 1,
            }
        }
        dist
    }
}

/// A detector that did not contribute findings to the run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetectorFailureRecord {
    pub detector: String,
    pub message: String,
}

/// Auditable totals for one run
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RunStatistics {
    pub providers_scanned: usize,
    pub providers_flagged: usize,
    pub total_estimated_overpayment: f64,
    pub findings_emitted: usize,
    /// Emitted findings per severity, before unresolved npis are dropped
    pub findings_emitted_by_severity: BTreeMap<Severity, usize>,
    pub findings_dropped: usize,
    /// Npis whose findings were dropped for lack of a unique identity record
    pub unresolved_npis: Vec<String>,
    pub detectors_run: usize,
    pub detectors_succeeded: usize,
    pub detectors_failed: usize,
    pub detector_failures: Vec<DetectorFailureRecord>,
    pub findings_by_signal: BTreeMap<SignalKind, usize>,
    pub tier_distribution: TierDistribution,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_finding_id_is_stable() {
        let a = deterministic_finding_id(SignalKind::Upcoding, "123", "scope");
        let b = deterministic_finding_id(SignalKind::Upcoding, "123", "scope");
        let c = deterministic_finding_id(SignalKind::Upcoding, "124", "scope");
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_eq!(a.len(), 16);
    }

    #[test]
    fn test_severity_ordering() {
        assert!(Severity::Critical > Severity::High);
        assert!(Severity::High > Severity::Medium);
        assert!(Severity::Medium > Severity::Low);
        assert_eq!(Severity::parse("HIGH"), Some(Severity::High));
        assert_eq!(Severity::parse("info"), None);
    }

    #[test]
    fn test_tier_boundaries_inclusive_at_lower_edge() {
        assert_eq!(RiskTier::from_score(75.0), RiskTier::Critical);
        assert_eq!(RiskTier::from_score(74.9), RiskTier::High);
        assert_eq!(RiskTier::from_score(50.0), RiskTier::High);
        assert_eq!(RiskTier::from_score(49.9), RiskTier::Medium);
        assert_eq!(RiskTier::from_score(25.0), RiskTier::Medium);
        assert_eq!(RiskTier::from_score(24.9), RiskTier::Low);
        assert_eq!(RiskTier::from_score(0.0), RiskTier::Low);
    }

    #[test]
    fn test_signal_kind_names_round_trip() {
        for kind in SignalKind::ALL {
            assert_eq!(SignalKind::from_name(kind.as_str()), Some(kind));
            assert_eq!(SignalKind::from_name(&kind.config_key()), Some(kind));
        }
        assert_eq!(SignalKind::from_name("nope"), None);
    }

    #[test]
    fn test_normalize_name() {
        assert_eq!(normalize_name("  j.  smith "), "J SMITH");
        assert_eq!(normalize_name("Acme Health, L.L.C."), "ACME HEALTH L L C");
    }

    #[test]
    fn test_exclusion_window() {
        let record = ExclusionRecord {
            last_name: Some("DOE".into()),
            first_name: Some("JOHN".into()),
            business_name: None,
            npi: Some("0000000000".into()),
            state: None,
            exclusion_type: "1128a1".into(),
            effective_date: NaiveDate::from_ymd_opt(2023, 1, 1).unwrap(),
            reinstatement_date: NaiveDate::from_ymd_opt(2023, 6, 1),
        };
        assert!(record.usable_npi().is_none());
        assert!(!record.excludes(NaiveDate::from_ymd_opt(2023, 1, 1).unwrap()));
        assert!(record.excludes(NaiveDate::from_ymd_opt(2023, 3, 1).unwrap()));
        assert!(!record.excludes(NaiveDate::from_ymd_opt(2023, 6, 1).unwrap()));
        assert_eq!(record.party_names(), vec!["JOHN DOE".to_string()]);
    }

    #[test]
    fn test_finding_overpayment_never_negative() {
        let f = SignalFinding::new(
            "1",
            Severity::Medium,
            Evidence::BillingMonoculture {
                dominant_code: "T1019".into(),
                dominant_share_pct: 90.0,
                dominant_code_claims: 900,
                total_claims: 1000,
                total_billing: 1.0,
            },
            -5.0,
            "T1019",
        );
        assert_eq!(f.estimated_overpayment, 0.0);
        assert_eq!(f.signal_type, SignalKind::BillingMonoculture);
    }
}

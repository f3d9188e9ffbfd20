//! Network beneficiary dilution detector
//!
//! Networks of entities sharing an authorized official are compared on
//! combined claims per beneficiary. A network billing far more claims per
//! patient than its peers, or sitting in their bottom decile of
//! beneficiaries per claim, suggests the same beneficiaries are being
//! recycled across shell entities.
//!
//! The network estimate is the cost of claims above the peer median claims
//! per beneficiary, capped at a share of network billing. Each member's
//! finding carries that estimate in proportion to its own billing.

use crate::config::EngineConfig;
use crate::detectors::base::{bounded_overpayment, official_networks, Detector};
use crate::models::{round2, round4, Evidence, Severity, SignalFinding, SignalKind};
use crate::source::BillingSource;
use crate::stats::{median, percentile_cont};
use anyhow::Result;
use tracing::debug;

#[derive(Debug, Default)]
pub struct NetworkBeneficiaryDilutionDetector;

impl NetworkBeneficiaryDilutionDetector {
    pub fn new() -> Self {
        Self
    }
}

struct Network<'a> {
    official: &'a str,
    /// Members with billing, with their own billing
    members: Vec<(&'a str, f64)>,
    billing: f64,
    claims: u64,
    beneficiaries: u64,
}

impl Network<'_> {
    fn beneficiary_ratio(&self) -> f64 {
        self.beneficiaries as f64 / self.claims as f64
    }

    /// `None` when the network reports no beneficiaries
    fn claims_per_beneficiary(&self) -> Option<f64> {
        (self.beneficiaries > 0).then(|| self.claims as f64 / self.beneficiaries as f64)
    }
}

impl Detector for NetworkBeneficiaryDilutionDetector {
    fn name(&self) -> &'static str {
        "NetworkBeneficiaryDilutionDetector"
    }

    fn description(&self) -> &'static str {
        "Detects commonly controlled networks billing many claims over few beneficiaries"
    }

    fn signal(&self) -> SignalKind {
        SignalKind::NetworkBeneficiaryDilution
    }

    fn category(&self) -> &'static str {
        "supplemental"
    }

    fn detect(&self, source: &dyn BillingSource, config: &EngineConfig) -> Result<Vec<SignalFinding>> {
        let thresholds = &config.thresholds.network_beneficiary_dilution;
        let index = source.identity_index()?;
        let totals = source.billing_totals()?;
        let networks = official_networks(&index);

        let mut qualifying = Vec::new();
        for (official, npis) in &networks {
            let mut network = Network {
                official,
                members: Vec::new(),
                billing: 0.0,
                claims: 0,
                beneficiaries: 0,
            };
            for npi in npis {
                let Some(t) = totals.get(*npi) else {
                    continue;
                };
                network.members.push((*npi, t.billing));
                network.billing += t.billing;
                network.claims += t.claims;
                network.beneficiaries += t.beneficiaries;
            }
            if network.members.len() >= thresholds.min_providers
                && network.billing > thresholds.min_combined_billing
                && network.claims > 0
            {
                qualifying.push(network);
            }
        }

        let ratios: Vec<f64> = qualifying.iter().map(Network::beneficiary_ratio).collect();
        let per_beneficiary: Vec<f64> = qualifying
            .iter()
            .filter_map(Network::claims_per_beneficiary)
            .collect();
        let p10_ratio = percentile_cont(&ratios, thresholds.ratio_percentile);
        // A missing or zero median falls back to one claim per beneficiary
        let median_cpb = Some(median(&per_beneficiary))
            .filter(|m| *m > 0.0)
            .unwrap_or(1.0);

        let mut findings = Vec::new();
        let mut flagged = 0usize;
        for network in &qualifying {
            let ratio = network.beneficiary_ratio();
            let cpb = network.claims_per_beneficiary();
            let too_many = cpb.is_some_and(|c| c > thresholds.max_claims_per_beneficiary);
            if !too_many && ratio >= p10_ratio {
                continue;
            }
            flagged += 1;

            let cpb = cpb.unwrap_or(0.0);
            let size = network.members.len();
            let severity = if cpb > thresholds.critical_claims_per_beneficiary
                && network.billing > thresholds.critical_combined_billing
            {
                Severity::Critical
            } else if too_many
                || (ratio < thresholds.high_max_beneficiary_ratio && size >= thresholds.high_providers)
            {
                Severity::High
            } else {
                Severity::Medium
            };

            let network_overpayment = if network.beneficiaries > 0 {
                let expected_claims = network.beneficiaries as f64 * median_cpb;
                let excess_claims = (network.claims as f64 - expected_claims).max(0.0);
                let cost_per_claim = network.billing / network.claims as f64;
                (excess_claims * cost_per_claim)
                    .min(network.billing * thresholds.max_overpayment_fraction)
            } else {
                network.billing * thresholds.fallback_fraction
            };
            let network_npis: Vec<String> =
                network.members.iter().map(|(npi, _)| npi.to_string()).collect();

            for (npi, own) in &network.members {
                if *own <= 0.0 {
                    continue;
                }
                let share = own / network.billing;
                let evidence = Evidence::NetworkBeneficiaryDilution {
                    official_name: network.official.to_string(),
                    network_size: size,
                    network_npis: network_npis.clone(),
                    combined_billing: round2(network.billing),
                    combined_claims: network.claims,
                    combined_beneficiaries: network.beneficiaries,
                    claims_per_beneficiary: round2(cpb),
                    beneficiary_claim_ratio: round4(ratio),
                    peer_p10_ratio: round4(p10_ratio),
                    peer_median_claims_per_beneficiary: round2(median_cpb),
                    network_overpayment: round2(network_overpayment),
                    provider_billing: round2(*own),
                };
                findings.push(SignalFinding::new(
                    *npi,
                    severity,
                    evidence,
                    bounded_overpayment(network_overpayment * share, *own),
                    network.official,
                ));
            }
        }

        debug!(
            "NetworkBeneficiaryDilutionDetector: {} networks compared, {} flagged, {} findings",
            qualifying.len(),
            flagged,
            findings.len()
        );
        Ok(findings)
    }
}

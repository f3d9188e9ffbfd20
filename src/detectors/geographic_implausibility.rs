//! Geographic implausibility detector
//!
//! Home health providers see the same patients repeatedly, but fewer than
//! one beneficiary per ten claims suggests services that could not have
//! been delivered. Claims beyond the ten-per-beneficiary bound, at the
//! provider's average claim value, are the overpayment estimate.

use crate::config::EngineConfig;
use crate::detectors::base::{bounded_overpayment, Detector};
use crate::models::{round2, Evidence, Severity, SignalFinding, SignalKind};
use crate::source::BillingSource;
use anyhow::Result;
use tracing::debug;

#[derive(Debug, Default)]
pub struct GeographicImplausibilityDetector;

impl GeographicImplausibilityDetector {
    pub fn new() -> Self {
        Self
    }
}

impl Detector for GeographicImplausibilityDetector {
    fn name(&self) -> &'static str {
        "GeographicImplausibilityDetector"
    }

    fn description(&self) -> &'static str {
        "Detects home health providers billing many claims per beneficiary"
    }

    fn signal(&self) -> SignalKind {
        SignalKind::GeographicImplausibility
    }

    fn detect(&self, source: &dyn BillingSource, config: &EngineConfig) -> Result<Vec<SignalFinding>> {
        let thresholds = &config.thresholds.geographic_implausibility;
        let totals = source.billing_totals()?;
        let index = source.identity_index()?;

        let mut findings = Vec::new();
        for (npi, t) in totals.iter() {
            let Some(taxonomy) = index.get(npi).and_then(|i| i.taxonomy_code.as_deref()) else {
                continue;
            };
            if !thresholds.taxonomy_codes.iter().any(|c| c == taxonomy.trim()) {
                continue;
            }
            if t.claims == 0 {
                continue;
            }

            let ratio = t.beneficiaries as f64 / t.claims as f64;
            if ratio >= thresholds.min_beneficiary_ratio {
                continue;
            }
            let severity = if ratio < thresholds.high_beneficiary_ratio {
                Severity::High
            } else {
                Severity::Medium
            };

            let claims_per_beneficiary = 1.0 / thresholds.min_beneficiary_ratio;
            let excess_claims = t.claims as f64 - t.beneficiaries as f64 * claims_per_beneficiary;
            let average_claim_value = t.billing / t.claims as f64;

            let evidence = Evidence::GeographicImplausibility {
                taxonomy_code: taxonomy.trim().to_string(),
                total_claims: t.claims,
                total_beneficiaries: t.beneficiaries,
                beneficiary_claim_ratio: (ratio * 10_000.0).round() / 10_000.0,
                excess_claims: round2(excess_claims),
                average_claim_value: round2(average_claim_value),
                total_billing: round2(t.billing),
            };
            findings.push(SignalFinding::new(
                npi.as_str(),
                severity,
                evidence,
                bounded_overpayment(excess_claims * average_claim_value, t.billing),
                taxonomy.trim(),
            ));
        }

        debug!("GeographicImplausibilityDetector found {} findings", findings.len());
        Ok(findings)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{identity, org, source, tx};

    fn home_health(claims: u64, beneficiaries: u64, amount: f64) -> Vec<SignalFinding> {
        let mut row = tx("1000000001", "2023-01", amount, claims);
        row.beneficiaries = beneficiaries;
        let src = source(vec![row], vec![], vec![org("1000000001")]);
        GeographicImplausibilityDetector::new()
            .detect(&src, &EngineConfig::default())
            .unwrap()
    }

    #[test]
    fn test_low_ratio_flagged() {
        // 1000 claims, 8 beneficiaries: ratio 0.008, 920 excess claims at $50
        let findings = home_health(1_000, 8, 50_000.0);
        assert_eq!(findings.len(), 1);
        assert_eq!(findings[0].severity, Severity::High);
        assert_eq!(findings[0].estimated_overpayment, 46_000.0);
    }

    #[test]
    fn test_ratio_at_threshold_not_flagged() {
        assert!(home_health(1_000, 100, 50_000.0).is_empty());
    }

    #[test]
    fn test_medium_band() {
        let findings = home_health(1_000, 70, 10_000.0);
        assert_eq!(findings[0].severity, Severity::Medium);
        assert_eq!(findings[0].estimated_overpayment, 3_000.0);
    }

    #[test]
    fn test_other_taxonomies_ignored() {
        let mut row = tx("1000000001", "2023-01", 50_000.0, 1_000);
        row.beneficiaries = 1;
        let src = source(vec![row], vec![], vec![identity("1000000001")]);
        let findings = GeographicImplausibilityDetector::new()
            .detect(&src, &EngineConfig::default())
            .unwrap();
        assert!(findings.is_empty());
    }
}

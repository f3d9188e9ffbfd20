//! Repetitive service abuse detector
//!
//! Within each procedure code, providers are compared on claims per
//! beneficiary. Billing the same service to the same patients far more
//! often than the 99th percentile of peers suggests unbundling or services
//! that were never delivered.

use crate::config::EngineConfig;
use crate::detectors::base::{bounded_overpayment, Detector};
use crate::models::{round2, Evidence, Severity, SignalFinding, SignalKind};
use crate::source::BillingSource;
use crate::stats::{median, percentile_cont};
use anyhow::Result;
use std::collections::BTreeMap;
use tracing::debug;

#[derive(Debug, Default)]
pub struct RepetitiveServiceAbuseDetector;

impl RepetitiveServiceAbuseDetector {
    pub fn new() -> Self {
        Self
    }
}

struct CodeUse<'a> {
    npi: &'a str,
    claims: u64,
    beneficiaries: u64,
    billing: f64,
    per_beneficiary: f64,
}

impl Detector for RepetitiveServiceAbuseDetector {
    fn name(&self) -> &'static str {
        "RepetitiveServiceAbuseDetector"
    }

    fn description(&self) -> &'static str {
        "Detects providers billing a procedure far more often per patient than peers"
    }

    fn signal(&self) -> SignalKind {
        SignalKind::RepetitiveServiceAbuse
    }

    fn category(&self) -> &'static str {
        "supplemental"
    }

    fn detect(&self, source: &dyn BillingSource, config: &EngineConfig) -> Result<Vec<SignalFinding>> {
        let thresholds = &config.thresholds.repetitive_service_abuse;
        let codes = source.provider_codes()?;

        let mut by_code: BTreeMap<&str, Vec<CodeUse<'_>>> = BTreeMap::new();
        for (npi, per_code) in codes.iter() {
            for (code, totals) in per_code {
                if totals.beneficiaries == 0 || totals.claims <= thresholds.min_claims {
                    continue;
                }
                by_code.entry(code.as_str()).or_default().push(CodeUse {
                    npi: npi.as_str(),
                    claims: totals.claims,
                    beneficiaries: totals.beneficiaries,
                    billing: totals.billing,
                    per_beneficiary: totals.claims as f64 / totals.beneficiaries as f64,
                });
            }
        }

        let mut findings = Vec::new();
        for (code, uses) in &by_code {
            if uses.len() < thresholds.min_peer_group {
                continue;
            }
            let values: Vec<f64> = uses.iter().map(|u| u.per_beneficiary).collect();
            let high = percentile_cont(&values, thresholds.percentile);
            let typical = median(&values);

            for usage in uses {
                if usage.per_beneficiary <= high {
                    continue;
                }
                let severity =
                    if high > 0.0 && usage.per_beneficiary > high * thresholds.high_multiple {
                        Severity::High
                    } else {
                        Severity::Medium
                    };
                let excess_claims =
                    (usage.claims as f64 - high * usage.beneficiaries as f64).max(0.0);
                let cost_per_claim = usage.billing / usage.claims.max(1) as f64;

                let evidence = Evidence::RepetitiveServiceAbuse {
                    procedure_code: code.to_string(),
                    claims: usage.claims,
                    beneficiaries: usage.beneficiaries,
                    billing: round2(usage.billing),
                    claims_per_beneficiary: round2(usage.per_beneficiary),
                    peer_p99_claims_per_beneficiary: round2(high),
                    peer_median_claims_per_beneficiary: round2(typical),
                    peer_count: uses.len(),
                };
                findings.push(SignalFinding::new(
                    usage.npi,
                    severity,
                    evidence,
                    bounded_overpayment(
                        excess_claims * cost_per_claim * thresholds.overpayment_fraction,
                        usage.billing,
                    ),
                    code,
                ));
            }
        }

        debug!(
            "RepetitiveServiceAbuseDetector: {} codes compared, {} findings",
            by_code.len(),
            findings.len()
        );
        Ok(findings)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{source, tx_code};

    /// `peers` providers at 3 claims per patient plus one outlier on code 97110
    fn detect(peers: usize, outlier_claims: u64, outlier_benes: u64) -> Vec<SignalFinding> {
        let mut txs: Vec<_> = (0..peers)
            .map(|i| {
                let mut row = tx_code(&format!("1{i:09}"), "2023-01", "97110", 30_000.0, 300);
                row.beneficiaries = 100;
                row
            })
            .collect();
        let mut outlier = tx_code("2000000000", "2023-01", "97110", 300_000.0, outlier_claims);
        outlier.beneficiaries = outlier_benes;
        txs.push(outlier);
        RepetitiveServiceAbuseDetector::new()
            .detect(&source(txs, vec![], vec![]), &EngineConfig::default())
            .unwrap()
    }

    #[test]
    fn test_outlier_above_peer_percentile() {
        let findings = detect(10, 3_000, 10);
        assert_eq!(findings.len(), 1);
        let f = &findings[0];
        assert_eq!(f.npi, "2000000000");
        assert_eq!(f.severity, Severity::Medium);
        // p99 interpolates to 270.3: 297 excess claims at $100 x 0.8
        assert!((f.estimated_overpayment - 23_760.0).abs() < 0.01);
        match &f.evidence {
            Evidence::RepetitiveServiceAbuse {
                claims_per_beneficiary,
                peer_p99_claims_per_beneficiary,
                peer_median_claims_per_beneficiary,
                peer_count,
                ..
            } => {
                assert_eq!(*claims_per_beneficiary, 300.0);
                assert_eq!(*peer_p99_claims_per_beneficiary, 270.3);
                assert_eq!(*peer_median_claims_per_beneficiary, 3.0);
                assert_eq!(*peer_count, 11);
            }
            other => panic!("unexpected evidence {other:?}"),
        }
    }

    #[test]
    fn test_far_above_percentile_is_high() {
        let findings = detect(100, 3_000, 10);
        assert_eq!(findings.len(), 1);
        assert_eq!(findings[0].severity, Severity::High);
    }

    #[test]
    fn test_low_volume_rows_skipped() {
        assert!(detect(10, 200, 1).is_empty());
    }

    #[test]
    fn test_small_peer_group_skipped() {
        assert!(detect(5, 3_000, 10).is_empty());
    }
}

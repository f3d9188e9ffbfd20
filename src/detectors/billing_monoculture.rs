//! Billing monoculture detector
//!
//! Legitimate practices bill a spread of procedure codes. Providers whose
//! single most-billed code (by claims) carries nearly all their claims are
//! flagged, unless that code is one of the exempt emergency codes.

use crate::config::EngineConfig;
use crate::detectors::base::{bounded_overpayment, Detector};
use crate::models::{round2, Evidence, Severity, SignalFinding, SignalKind};
use crate::source::{BillingSource, CodeTotals};
use anyhow::Result;
use tracing::debug;

#[derive(Debug, Default)]
pub struct BillingMonocultureDetector;

impl BillingMonocultureDetector {
    pub fn new() -> Self {
        Self
    }
}

impl Detector for BillingMonocultureDetector {
    fn name(&self) -> &'static str {
        "BillingMonocultureDetector"
    }

    fn description(&self) -> &'static str {
        "Detects providers billing almost exclusively one procedure code"
    }

    fn signal(&self) -> SignalKind {
        SignalKind::BillingMonoculture
    }

    fn category(&self) -> &'static str {
        "supplemental"
    }

    fn detect(&self, source: &dyn BillingSource, config: &EngineConfig) -> Result<Vec<SignalFinding>> {
        let thresholds = &config.thresholds.billing_monoculture;
        let codes = source.provider_codes()?;

        let mut findings = Vec::new();
        let mut exempted = 0usize;
        for (npi, by_code) in codes.iter() {
            let total_claims: u64 = by_code.values().map(|c| c.claims).sum();
            if total_claims <= thresholds.min_claims {
                continue;
            }
            let total_billing: f64 = by_code.values().map(|c| c.billing).sum();

            // Lowest code wins ties
            let mut dominant: Option<(&String, &CodeTotals)> = None;
            for (code, totals) in by_code {
                if dominant.is_none_or(|(_, best)| totals.claims > best.claims) {
                    dominant = Some((code, totals));
                }
            }
            let Some((code, dominant_totals)) = dominant else {
                continue;
            };

            let share = dominant_totals.claims as f64 * 100.0 / total_claims as f64;
            if share <= thresholds.min_share_pct {
                continue;
            }
            if thresholds.exempt_codes.iter().any(|e| e == code.trim()) {
                exempted += 1;
                continue;
            }

            let severity = if share > thresholds.high_share_pct && total_billing > thresholds.high_billing {
                Severity::High
            } else {
                Severity::Medium
            };
            let excess = (share - thresholds.min_share_pct) / 100.0;

            let evidence = Evidence::BillingMonoculture {
                dominant_code: code.clone(),
                dominant_share_pct: round2(share),
                dominant_code_claims: dominant_totals.claims,
                total_claims,
                total_billing: round2(total_billing),
            };
            findings.push(SignalFinding::new(
                npi.as_str(),
                severity,
                evidence,
                bounded_overpayment(
                    total_billing * excess * thresholds.overpayment_fraction,
                    total_billing,
                ),
                code,
            ));
        }

        debug!(
            "BillingMonocultureDetector: {} findings, {} exempt dominant codes",
            findings.len(),
            exempted
        );
        Ok(findings)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{source, tx_code};

    fn detect(rows: &[(&str, f64, u64)]) -> Vec<SignalFinding> {
        let txs = rows
            .iter()
            .map(|(code, amount, claims)| tx_code("1000000001", "2023-01", code, *amount, *claims))
            .collect();
        BillingMonocultureDetector::new()
            .detect(&source(txs, vec![], vec![]), &EngineConfig::default())
            .unwrap()
    }

    #[test]
    fn test_dominant_code_flagged() {
        // 900 of 1000 claims: share 90%, excess 5%
        let findings = detect(&[("97110", 90_000.0, 900), ("97140", 10_000.0, 100)]);
        assert_eq!(findings.len(), 1);
        let f = &findings[0];
        assert_eq!(f.severity, Severity::Medium);
        assert!((f.estimated_overpayment - 1_250.0).abs() < 1e-6);
    }

    #[test]
    fn test_high_requires_share_and_billing() {
        let findings = detect(&[("97110", 980_000.0, 980), ("97140", 20_000.0, 20)]);
        assert_eq!(findings[0].severity, Severity::High);
        let findings = detect(&[("97110", 9_800.0, 980), ("97140", 200.0, 20)]);
        assert_eq!(findings[0].severity, Severity::Medium);
    }

    #[test]
    fn test_exempt_code_skipped() {
        assert!(detect(&[("87635", 90_000.0, 900), ("97140", 10_000.0, 100)]).is_empty());
    }

    #[test]
    fn test_small_volume_skipped() {
        assert!(detect(&[("97110", 50_000.0, 500)]).is_empty());
    }

    #[test]
    fn test_share_at_threshold_not_flagged() {
        assert!(detect(&[("97110", 85_000.0, 850), ("97140", 15_000.0, 150)]).is_empty());
    }
}

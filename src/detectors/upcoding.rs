//! Upcoding detector
//!
//! Compares each provider's share of high-complexity evaluation and
//! management claims with the average share across its (taxonomy, state)
//! peer group. The peer average includes the provider itself.

use crate::config::EngineConfig;
use crate::detectors::base::{bounded_overpayment, Detector};
use crate::models::{round2, Evidence, Severity, SignalFinding, SignalKind};
use crate::source::BillingSource;
use crate::stats::mean;
use anyhow::Result;
use std::collections::BTreeMap;
use tracing::debug;

const EM_CODE_RANGE: std::ops::RangeInclusive<u32> = 99201..=99499;

/// Evaluation and management procedure code
pub(crate) fn is_em_code(code: &str) -> bool {
    let code = code.trim();
    code.len() == 5 && code.parse::<u32>().is_ok_and(|n| EM_CODE_RANGE.contains(&n))
}

#[derive(Debug, Default)]
pub struct UpcodingDetector;

impl UpcodingDetector {
    pub fn new() -> Self {
        Self
    }
}

struct EmProfile<'a> {
    npi: &'a str,
    em_claims: u64,
    high_claims: u64,
    em_billing: f64,
    share_pct: f64,
}

impl Detector for UpcodingDetector {
    fn name(&self) -> &'static str {
        "UpcodingDetector"
    }

    fn description(&self) -> &'static str {
        "Detects providers billing far more high-complexity E&M visits than peers"
    }

    fn signal(&self) -> SignalKind {
        SignalKind::Upcoding
    }

    fn detect(&self, source: &dyn BillingSource, config: &EngineConfig) -> Result<Vec<SignalFinding>> {
        let thresholds = &config.thresholds.upcoding;
        let codes = source.provider_codes()?;
        let index = source.identity_index()?;

        let mut groups: BTreeMap<(String, String), Vec<EmProfile<'_>>> = BTreeMap::new();
        for (npi, by_code) in codes.iter() {
            let mut profile = EmProfile {
                npi: npi.as_str(),
                em_claims: 0,
                high_claims: 0,
                em_billing: 0.0,
                share_pct: 0.0,
            };
            for (code, totals) in by_code.iter().filter(|(c, _)| is_em_code(c)) {
                profile.em_claims += totals.claims;
                profile.em_billing += totals.billing;
                if thresholds.high_complexity_codes.iter().any(|h| h == code.trim()) {
                    profile.high_claims += totals.claims;
                }
            }
            if profile.em_claims < thresholds.min_em_claims {
                continue;
            }
            profile.share_pct = profile.high_claims as f64 * 100.0 / profile.em_claims as f64;
            if let Some(key) = index.get(npi).and_then(|i| i.peer_group()) {
                groups.entry(key).or_default().push(profile);
            }
        }

        let mut findings = Vec::new();
        for ((taxonomy, state), members) in &groups {
            if members.len() < thresholds.min_peer_group {
                continue;
            }
            let shares: Vec<f64> = members.iter().map(|m| m.share_pct).collect();
            let peer_average = mean(&shares);
            if peer_average >= thresholds.max_peer_share_pct {
                continue;
            }

            for member in members.iter().filter(|m| m.share_pct > thresholds.min_share_pct) {
                let severity = if member.share_pct > thresholds.high_share_pct {
                    Severity::High
                } else {
                    Severity::Medium
                };
                let excess = (member.share_pct - peer_average).max(0.0) / 100.0;
                let evidence = Evidence::Upcoding {
                    em_claims: member.em_claims,
                    high_complexity_claims: member.high_claims,
                    high_complexity_pct: round2(member.share_pct),
                    peer_average_pct: round2(peer_average),
                    peer_count: members.len(),
                    em_billing: round2(member.em_billing),
                };
                findings.push(SignalFinding::new(
                    member.npi,
                    severity,
                    evidence,
                    bounded_overpayment(
                        member.em_billing * excess * thresholds.uplift_fraction,
                        member.em_billing,
                    ),
                    &format!("{taxonomy}|{state}"),
                ));
            }
        }

        debug!("UpcodingDetector: {} peer groups, {} findings", groups.len(), findings.len());
        Ok(findings)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{identity, source, tx_code};

    #[test]
    fn test_is_em_code() {
        assert!(is_em_code("99213"));
        assert!(is_em_code("99499"));
        assert!(!is_em_code("99500"));
        assert!(!is_em_code("87635"));
        assert!(!is_em_code("G0101"));
    }

    fn scenario(top_high: u64, top_low: u64) -> Vec<SignalFinding> {
        let mut txs = Vec::new();
        let mut ids = Vec::new();
        for i in 0..4 {
            let npi = format!("100000000{i}");
            if i == 0 {
                txs.push(tx_code(&npi, "2023-01", "99215", top_high as f64 * 100.0, top_high));
                txs.push(tx_code(&npi, "2023-01", "99213", top_low as f64 * 100.0, top_low));
            } else {
                txs.push(tx_code(&npi, "2023-01", "99215", 500.0, 5));
                txs.push(tx_code(&npi, "2023-01", "99213", 9_500.0, 95));
            }
            ids.push(identity(&npi));
        }
        UpcodingDetector::new()
            .detect(&source(txs, vec![], ids), &EngineConfig::default())
            .unwrap()
    }

    #[test]
    fn test_high_share_against_low_peers() {
        // shares 95, 5, 5, 5: peer average 27.5
        let findings = scenario(95, 5);
        assert_eq!(findings.len(), 1);
        let f = &findings[0];
        assert_eq!(f.npi, "1000000000");
        assert_eq!(f.severity, Severity::High);
        // 10000 x 0.675 x 0.30
        assert!((f.estimated_overpayment - 2_025.0).abs() < 1e-6);
    }

    #[test]
    fn test_share_at_threshold_not_flagged() {
        assert!(scenario(80, 20).is_empty());
    }

    #[test]
    fn test_small_peer_group_skipped() {
        let txs = vec![tx_code("1000000000", "2023-01", "99215", 10_000.0, 100)];
        let findings = UpcodingDetector::new()
            .detect(
                &source(txs, vec![], vec![identity("1000000000")]),
                &EngineConfig::default(),
            )
            .unwrap();
        assert!(findings.is_empty());
    }
}

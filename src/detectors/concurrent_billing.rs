//! Concurrent billing detector
//!
//! An individual practitioner cannot deliver services in five states in the
//! same month. Every month at or above the state threshold is flagged and
//! the provider gets one finding aggregating those months.

use crate::config::EngineConfig;
use crate::detectors::base::{bounded_overpayment, Detector};
use crate::models::{round2, Evidence, Severity, SignalFinding, SignalKind};
use crate::source::BillingSource;
use anyhow::Result;
use tracing::debug;

#[derive(Debug, Default)]
pub struct ConcurrentBillingDetector;

impl ConcurrentBillingDetector {
    pub fn new() -> Self {
        Self
    }
}

impl Detector for ConcurrentBillingDetector {
    fn name(&self) -> &'static str {
        "ConcurrentBillingDetector"
    }

    fn description(&self) -> &'static str {
        "Detects individual practitioners billing in many states in one month"
    }

    fn signal(&self) -> SignalKind {
        SignalKind::ConcurrentBilling
    }

    fn detect(&self, source: &dyn BillingSource, config: &EngineConfig) -> Result<Vec<SignalFinding>> {
        let thresholds = &config.thresholds.concurrent_billing;
        let states = source.provider_month_states()?;
        let index = source.identity_index()?;

        let mut findings = Vec::new();
        for (npi, months) in states.iter() {
            let Some(identity) = index.get(npi) else {
                continue;
            };
            if !identity.is_individual() {
                continue;
            }

            let flagged: Vec<_> = months
                .iter()
                .filter(|(_, m)| m.states.len() >= thresholds.min_states)
                .collect();
            // Earliest month wins ties
            let Some((peak_month, peak)) = flagged
                .iter()
                .copied()
                .reduce(|best, next| if next.1.states.len() > best.1.states.len() { next } else { best })
            else {
                continue;
            };

            let max_states = peak.states.len();
            let severity = if max_states >= thresholds.high_states {
                Severity::High
            } else {
                Severity::Medium
            };
            let billing: f64 = flagged.iter().map(|(_, m)| m.billing).sum();
            let claims: u64 = flagged.iter().map(|(_, m)| m.claims).sum();

            let evidence = Evidence::ConcurrentBilling {
                home_state: identity.state.clone(),
                peak_month: *peak_month,
                max_states_in_month: max_states,
                states_in_peak_month: peak.states.iter().cloned().collect(),
                months_flagged: flagged.len(),
                billing_in_flagged_months: round2(billing),
                claims_in_flagged_months: claims,
            };
            findings.push(SignalFinding::new(
                npi.as_str(),
                severity,
                evidence,
                bounded_overpayment(billing * thresholds.overpayment_fraction, billing),
                &peak_month.to_string(),
            ));
        }

        debug!("ConcurrentBillingDetector found {} findings", findings.len());
        Ok(findings)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Transaction;
    use crate::testing::{identity, org, source, tx};

    const STATES: [&str; 9] = ["NY", "NJ", "CT", "PA", "MA", "VT", "NH", "ME", "RI"];

    fn spread(npi: &str, ym: &str, count: usize) -> Vec<Transaction> {
        STATES[..count]
            .iter()
            .map(|s| {
                let mut row = tx(npi, ym, 1_000.0, 10);
                row.service_state = Some(s.to_string());
                row
            })
            .collect()
    }

    fn detect(txs: Vec<Transaction>, ids: Vec<crate::models::ProviderIdentity>) -> Vec<SignalFinding> {
        ConcurrentBillingDetector::new()
            .detect(&source(txs, vec![], ids), &EngineConfig::default())
            .unwrap()
    }

    #[test]
    fn test_five_states_flagged() {
        let mut txs = spread("1000000001", "2023-01", 5);
        txs.extend(spread("1000000001", "2023-02", 2));
        let findings = detect(txs, vec![identity("1000000001")]);
        assert_eq!(findings.len(), 1);
        let f = &findings[0];
        assert_eq!(f.severity, Severity::Medium);
        assert_eq!(f.estimated_overpayment, 3_000.0);
        assert!(matches!(
            f.evidence,
            Evidence::ConcurrentBilling {
                max_states_in_month: 5,
                months_flagged: 1,
                ..
            }
        ));
    }

    #[test]
    fn test_four_states_not_flagged() {
        let findings = detect(spread("1000000001", "2023-01", 4), vec![identity("1000000001")]);
        assert!(findings.is_empty());
    }

    #[test]
    fn test_organizations_ignored() {
        let findings = detect(spread("1000000001", "2023-01", 9), vec![org("1000000001")]);
        assert!(findings.is_empty());
    }

    #[test]
    fn test_eight_states_is_high() {
        let mut txs = spread("1000000001", "2023-01", 6);
        txs.extend(spread("1000000001", "2023-03", 8));
        let findings = detect(txs, vec![identity("1000000001")]);
        assert_eq!(findings[0].severity, Severity::High);
        assert_eq!(findings[0].estimated_overpayment, 8_400.0);
    }
}

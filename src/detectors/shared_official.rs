//! Shared official detector - one person controlling many billing entities
//!
//! Identities are grouped by normalized authorized-official name. A network
//! with enough distinct npis and enough combined billing is flagged, and
//! every member gets its own finding. Each member's overpayment is the
//! network fraction applied to that member's own billing, so the members'
//! estimates add up to the network estimate. Members with no billing stay
//! in the network count and evidence but get no finding of their own.
//!
//! Two optional filters trim false positives: an upper bound on network
//! size (large health systems file one officer for every npi) and a minimum
//! number of members registered in one state (common names scattered
//! across the country).

use crate::config::EngineConfig;
use crate::detectors::base::{bounded_overpayment, official_networks, Detector};
use crate::models::{round2, Evidence, Severity, SignalFinding, SignalKind};
use crate::source::{BillingSource, IdentityIndex};
use anyhow::Result;
use std::collections::{BTreeMap, BTreeSet};
use tracing::debug;

#[derive(Debug, Default)]
pub struct SharedOfficialDetector;

impl SharedOfficialDetector {
    pub fn new() -> Self {
        Self
    }
}

impl Detector for SharedOfficialDetector {
    fn name(&self) -> &'static str {
        "SharedOfficialDetector"
    }

    fn description(&self) -> &'static str {
        "Detects authorized officials controlling many high-billing entities"
    }

    fn signal(&self) -> SignalKind {
        SignalKind::SharedOfficial
    }

    fn detect(&self, source: &dyn BillingSource, config: &EngineConfig) -> Result<Vec<SignalFinding>> {
        let thresholds = &config.thresholds.shared_official;
        let index = source.identity_index()?;
        let totals = source.billing_totals()?;

        let networks = official_networks(&index);

        let mut findings = Vec::new();
        let mut flagged = 0usize;
        for (official, members) in &networks {
            if members.len() < thresholds.min_providers {
                continue;
            }
            if thresholds.max_providers.is_some_and(|max| members.len() > max) {
                continue;
            }
            if let Some(min_same_state) = thresholds.min_same_state_providers {
                if largest_state_group(members, &index) < min_same_state {
                    continue;
                }
            }
            let billing = |npi: &str| totals.get(npi).map_or(0.0, |t| t.billing);
            let combined: f64 = members.iter().map(|npi| billing(*npi)).sum();
            if combined <= thresholds.min_combined_billing {
                continue;
            }
            flagged += 1;

            let severity = if members.len() >= thresholds.high_providers
                || combined > thresholds.high_combined_billing
            {
                Severity::High
            } else {
                Severity::Medium
            };
            let network_overpayment = combined * thresholds.overpayment_fraction;
            let member_list: Vec<String> = members.iter().map(|s| s.to_string()).collect();

            for npi in members {
                let own = billing(*npi);
                if own <= 0.0 {
                    continue;
                }
                let evidence = Evidence::SharedOfficial {
                    official_name: official.clone(),
                    network_size: members.len(),
                    network_npis: member_list.clone(),
                    combined_billing: round2(combined),
                    network_overpayment: round2(network_overpayment),
                    provider_billing: round2(own),
                };
                findings.push(SignalFinding::new(
                    *npi,
                    severity,
                    evidence,
                    bounded_overpayment(own * thresholds.overpayment_fraction, own),
                    official,
                ));
            }
        }

        debug!(
            "SharedOfficialDetector: {} networks, {} flagged, {} findings",
            networks.len(),
            flagged,
            findings.len()
        );
        Ok(findings)
    }
}

/// Members registered in the network's most common state
fn largest_state_group(members: &BTreeSet<&str>, index: &IdentityIndex) -> usize {
    let mut counts: BTreeMap<String, usize> = BTreeMap::new();
    for npi in members {
        let state = index
            .get(npi)
            .and_then(|id| id.state.as_deref())
            .map(|s| s.trim().to_ascii_uppercase())
            .filter(|s| !s.is_empty());
        if let Some(state) = state {
            *counts.entry(state).or_default() += 1;
        }
    }
    counts.into_values().max().unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ProviderIdentity, Transaction};
    use crate::testing::{org, source, tx};

    fn members(size: usize, official: &str) -> (Vec<String>, Vec<ProviderIdentity>) {
        let npis: Vec<String> = (0..size).map(|i| format!("1{i:09}")).collect();
        let ids = npis
            .iter()
            .map(|n| {
                let mut id = org(n);
                id.authorized_official = Some(official.to_string());
                id
            })
            .collect();
        (npis, ids)
    }

    fn detect_with(
        txs: Vec<Transaction>,
        ids: Vec<ProviderIdentity>,
        config: &EngineConfig,
    ) -> Vec<SignalFinding> {
        SharedOfficialDetector::new()
            .detect(&source(txs, vec![], ids), config)
            .unwrap()
    }

    fn network(size: usize, each: f64, official: &str) -> Vec<SignalFinding> {
        let (npis, ids) = members(size, official);
        let txs = npis.iter().map(|n| tx(n, "2023-01", each, 10)).collect();
        detect_with(txs, ids, &EngineConfig::default())
    }

    #[test]
    fn test_exactly_at_bounds_does_not_trigger() {
        assert!(network(5, 200_000.0, "J. Smith").is_empty());
    }

    #[test]
    fn test_one_finding_per_member() {
        let findings = network(5, 240_000.0, "J. Smith");
        assert_eq!(findings.len(), 5);
        let total: f64 = findings.iter().map(|f| f.estimated_overpayment).sum();
        assert!((total - 180_000.0).abs() < 1e-6);
        for f in &findings {
            assert_eq!(f.severity, Severity::Medium);
            match &f.evidence {
                Evidence::SharedOfficial {
                    official_name,
                    network_size,
                    network_overpayment,
                    ..
                } => {
                    assert_eq!(official_name, "J SMITH");
                    assert_eq!(*network_size, 5);
                    assert_eq!(*network_overpayment, 180_000.0);
                }
                other => panic!("unexpected evidence {other:?}"),
            }
        }
    }

    #[test]
    fn test_too_few_members() {
        assert!(network(4, 1_000_000.0, "J. Smith").is_empty());
    }

    #[test]
    fn test_large_network_is_high() {
        let findings = network(10, 150_000.0, "Jane Roe");
        assert_eq!(findings.len(), 10);
        assert!(findings.iter().all(|f| f.severity == Severity::High));
    }

    #[test]
    fn test_non_billing_member_counts_but_is_not_flagged() {
        let (npis, ids) = members(6, "J. Smith");
        let txs = npis[..5].iter().map(|n| tx(n, "2023-01", 240_000.0, 10)).collect();
        let findings = detect_with(txs, ids, &EngineConfig::default());
        assert_eq!(findings.len(), 5);
        assert!(findings.iter().all(|f| f.npi != npis[5]));
        match &findings[0].evidence {
            Evidence::SharedOfficial {
                network_size,
                network_npis,
                ..
            } => {
                assert_eq!(*network_size, 6);
                assert!(network_npis.contains(&npis[5]));
            }
            other => panic!("unexpected evidence {other:?}"),
        }
    }

    #[test]
    fn test_network_size_ceiling() {
        let (npis, ids) = members(12, "J. Smith");
        let txs: Vec<Transaction> = npis.iter().map(|n| tx(n, "2023-01", 200_000.0, 10)).collect();
        let mut config = EngineConfig::default();
        config.thresholds.shared_official.max_providers = Some(10);
        assert!(detect_with(txs.clone(), ids.clone(), &config).is_empty());
        assert_eq!(detect_with(txs, ids, &EngineConfig::default()).len(), 12);
    }

    #[test]
    fn test_same_state_requirement() {
        let (npis, mut ids) = members(5, "J. Smith");
        for (id, state) in ids.iter_mut().zip(["NY", "NY", "CA", "TX", "FL"]) {
            id.state = Some(state.to_string());
        }
        let txs: Vec<Transaction> = npis.iter().map(|n| tx(n, "2023-01", 240_000.0, 10)).collect();
        let mut config = EngineConfig::default();
        config.thresholds.shared_official.min_same_state_providers = Some(3);
        assert!(detect_with(txs.clone(), ids.clone(), &config).is_empty());

        ids[2].state = Some("NY".to_string());
        assert_eq!(detect_with(txs, ids, &config).len(), 5);
    }
}

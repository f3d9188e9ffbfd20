//! Address clustering detector
//!
//! Many providers sharing one postal code with large combined billing
//! points at shell entities registered to a single mail drop. Postal codes
//! are compared on their five-digit prefix. Only providers with billing
//! count toward a cluster.

use crate::config::EngineConfig;
use crate::detectors::base::{bounded_overpayment, zip5, Detector};
use crate::models::{round2, Evidence, Severity, SignalFinding, SignalKind};
use crate::source::BillingSource;
use anyhow::Result;
use std::collections::{BTreeMap, BTreeSet};
use tracing::debug;

#[derive(Debug, Default)]
pub struct AddressClusteringDetector;

impl AddressClusteringDetector {
    pub fn new() -> Self {
        Self
    }
}

impl Detector for AddressClusteringDetector {
    fn name(&self) -> &'static str {
        "AddressClusteringDetector"
    }

    fn description(&self) -> &'static str {
        "Detects many high-billing providers registered at one postal code"
    }

    fn signal(&self) -> SignalKind {
        SignalKind::AddressClustering
    }

    fn detect(&self, source: &dyn BillingSource, config: &EngineConfig) -> Result<Vec<SignalFinding>> {
        let thresholds = &config.thresholds.address_clustering;
        let index = source.identity_index()?;
        let totals = source.billing_totals()?;

        let mut clusters: BTreeMap<&str, BTreeSet<&str>> = BTreeMap::new();
        for identity in index.by_npi.values() {
            if !totals.get(&identity.npi).is_some_and(|t| t.billing > 0.0) {
                continue;
            }
            if let Some(zip) = identity.postal_code.as_deref().and_then(zip5) {
                clusters.entry(zip).or_default().insert(identity.npi.as_str());
            }
        }

        let billing = |npi: &str| totals.get(npi).map_or(0.0, |t| t.billing);
        let mut findings = Vec::new();
        for (zip, members) in &clusters {
            if members.len() < thresholds.min_providers {
                continue;
            }
            let combined: f64 = members.iter().map(|npi| billing(*npi)).sum();
            if combined <= thresholds.min_combined_billing {
                continue;
            }
            let severity = if members.len() >= thresholds.high_providers {
                Severity::High
            } else {
                Severity::Medium
            };
            let listed: Vec<String> = members
                .iter()
                .take(thresholds.max_listed_npis)
                .map(|s| s.to_string())
                .collect();

            for npi in members {
                let own = billing(*npi);
                let evidence = Evidence::AddressClustering {
                    postal_code: zip.to_string(),
                    cluster_size: members.len(),
                    cluster_npis: listed.clone(),
                    combined_billing: round2(combined),
                    cluster_overpayment: round2(combined * thresholds.overpayment_fraction),
                    provider_billing: round2(own),
                };
                findings.push(SignalFinding::new(
                    *npi,
                    severity,
                    evidence,
                    bounded_overpayment(own * thresholds.overpayment_fraction, own),
                    zip,
                ));
            }
        }

        debug!(
            "AddressClusteringDetector: {} postal codes, {} findings",
            clusters.len(),
            findings.len()
        );
        Ok(findings)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{identity, source, tx};

    /// `billed` providers at `each` dollars plus `idle` registered ones with no claims
    fn cluster_with_idle(billed: usize, idle: usize, each: f64) -> Vec<SignalFinding> {
        let npis: Vec<String> = (0..billed + idle).map(|i| format!("1{i:09}")).collect();
        let ids = npis
            .iter()
            .map(|n| {
                let mut id = identity(n);
                id.postal_code = Some("33101-4420".to_string());
                id
            })
            .collect();
        let txs = npis[..billed].iter().map(|n| tx(n, "2023-01", each, 10)).collect();
        AddressClusteringDetector::new()
            .detect(&source(txs, vec![], ids), &EngineConfig::default())
            .unwrap()
    }

    fn cluster(size: usize, each: f64) -> Vec<SignalFinding> {
        cluster_with_idle(size, 0, each)
    }

    #[test]
    fn test_cluster_flagged() {
        let findings = cluster(10, 600_000.0);
        assert_eq!(findings.len(), 10);
        assert!(findings.iter().all(|f| f.severity == Severity::Medium));
        assert!(findings.iter().all(|f| f.estimated_overpayment == 90_000.0));
    }

    #[test]
    fn test_combined_at_threshold_not_flagged() {
        assert!(cluster(10, 500_000.0).is_empty());
    }

    #[test]
    fn test_large_cluster_lists_capped_npis() {
        let findings = cluster(25, 300_000.0);
        assert_eq!(findings.len(), 25);
        assert_eq!(findings[0].severity, Severity::High);
        match &findings[0].evidence {
            Evidence::AddressClustering {
                cluster_size,
                cluster_npis,
                ..
            } => {
                assert_eq!(*cluster_size, 25);
                assert_eq!(cluster_npis.len(), 20);
            }
            other => panic!("unexpected evidence {other:?}"),
        }
    }

    #[test]
    fn test_registered_without_billing_not_counted() {
        assert!(cluster_with_idle(9, 1, 600_000.0).is_empty());
        let findings = cluster_with_idle(10, 3, 600_000.0);
        assert_eq!(findings.len(), 10);
        match &findings[0].evidence {
            Evidence::AddressClustering { cluster_size, .. } => assert_eq!(*cluster_size, 10),
            other => panic!("unexpected evidence {other:?}"),
        }
    }
}

//! Billing outlier detector - finds providers far above their peer group
//!
//! Peer group = providers sharing a taxonomy code and state. Within each
//! group large enough to give a stable percentile, any provider whose total
//! billing strictly exceeds the configured percentile (p99 by default) is
//! flagged. Everything above the percentile is the overpayment estimate.

use crate::config::EngineConfig;
use crate::detectors::base::{bounded_overpayment, Detector};
use crate::models::{round2, Evidence, Severity, SignalFinding, SignalKind};
use crate::source::BillingSource;
use crate::stats::{median, percentile_cont, safe_ratio};
use anyhow::Result;
use std::collections::BTreeMap;
use tracing::debug;

/// Detects providers billing above their peer-group percentile
#[derive(Debug, Default)]
pub struct BillingOutlierDetector;

impl BillingOutlierDetector {
    pub fn new() -> Self {
        Self
    }
}

impl Detector for BillingOutlierDetector {
    fn name(&self) -> &'static str {
        "BillingOutlierDetector"
    }

    fn description(&self) -> &'static str {
        "Detects providers whose total billing exceeds the 99th percentile of their peers"
    }

    fn signal(&self) -> SignalKind {
        SignalKind::BillingOutlier
    }

    fn detect(&self, source: &dyn BillingSource, config: &EngineConfig) -> Result<Vec<SignalFinding>> {
        let thresholds = &config.thresholds.billing_outlier;
        let totals = source.billing_totals()?;
        let index = source.identity_index()?;

        let mut groups: BTreeMap<(String, String), Vec<(&str, f64)>> = BTreeMap::new();
        for (npi, t) in totals.iter() {
            if let Some(key) = index.get(npi).and_then(|i| i.peer_group()) {
                groups.entry(key).or_default().push((npi.as_str(), t.billing));
            }
        }

        let mut findings = Vec::new();
        let mut skipped = 0usize;
        for ((taxonomy, state), members) in &groups {
            if members.len() < thresholds.min_peer_group {
                skipped += 1;
                continue;
            }
            let values: Vec<f64> = members.iter().map(|(_, b)| *b).collect();
            let cutoff = percentile_cont(&values, thresholds.percentile);
            let peer_median = median(&values);

            for (npi, billing) in members {
                if *billing <= cutoff {
                    continue;
                }
                let severity = if *billing > cutoff * thresholds.high_multiple {
                    Severity::High
                } else {
                    Severity::Medium
                };
                let evidence = Evidence::BillingOutlier {
                    total_billing: round2(*billing),
                    taxonomy_code: taxonomy.clone(),
                    state: state.clone(),
                    peer_count: members.len(),
                    peer_median: round2(peer_median),
                    percentile: thresholds.percentile,
                    peer_percentile_value: round2(cutoff),
                    ratio_to_percentile: round2(safe_ratio(*billing, cutoff)),
                    ratio_to_median: round2(safe_ratio(*billing, peer_median)),
                };
                findings.push(SignalFinding::new(
                    *npi,
                    severity,
                    evidence,
                    bounded_overpayment(billing - cutoff, *billing),
                    &format!("{taxonomy}|{state}"),
                ));
            }
        }

        debug!(
            "BillingOutlierDetector: {} peer groups, {} below minimum size, {} findings",
            groups.len(),
            skipped,
            findings.len()
        );
        Ok(findings)
    }
}

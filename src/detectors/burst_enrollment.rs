//! Burst enrollment detector
//!
//! Shell-company rings register many organizations in quick succession.
//! Billing organizations are grouped by (taxonomy, state, enrollment
//! quarter); a cohort large enough with enough combined billing is flagged
//! and every member gets its own finding.

use crate::config::EngineConfig;
use crate::detectors::base::{bounded_overpayment, emergency_adjusted, quarter_start, Detector};
use crate::models::{round2, Evidence, ProviderIdentity, Severity, SignalFinding, SignalKind};
use crate::source::BillingSource;
use anyhow::Result;
use chrono::NaiveDate;
use std::collections::BTreeMap;
use tracing::debug;

#[derive(Debug, Default)]
pub struct BurstEnrollmentDetector;

impl BurstEnrollmentDetector {
    pub fn new() -> Self {
        Self
    }
}

type CohortKey = (String, String, NaiveDate);

impl Detector for BurstEnrollmentDetector {
    fn name(&self) -> &'static str {
        "BurstEnrollmentDetector"
    }

    fn description(&self) -> &'static str {
        "Detects cohorts of organizations enrolled together that bill heavily"
    }

    fn signal(&self) -> SignalKind {
        SignalKind::BurstEnrollment
    }

    fn category(&self) -> &'static str {
        "supplemental"
    }

    fn detect(&self, source: &dyn BillingSource, config: &EngineConfig) -> Result<Vec<SignalFinding>> {
        let thresholds = &config.thresholds.burst_enrollment;
        let index = source.identity_index()?;
        let totals = source.billing_totals()?;

        let mut cohorts: BTreeMap<CohortKey, Vec<(&ProviderIdentity, f64)>> = BTreeMap::new();
        for identity in index.by_npi.values().filter(|i| i.is_organization()) {
            let billing = totals.get(&identity.npi).map_or(0.0, |t| t.billing);
            if billing <= 0.0 {
                continue;
            }
            let (Some((taxonomy, state)), Some(enrolled)) =
                (identity.peer_group(), identity.enrollment_date)
            else {
                continue;
            };
            cohorts
                .entry((taxonomy, state, quarter_start(enrolled)))
                .or_default()
                .push((identity, billing));
        }

        let mut findings = Vec::new();
        for ((taxonomy, state, quarter), members) in &cohorts {
            if members.len() < thresholds.min_providers {
                continue;
            }
            let combined: f64 = members.iter().map(|(_, b)| b).sum();
            if combined <= thresholds.min_combined_billing {
                continue;
            }

            let severity = if members.len() >= thresholds.high_providers
                || combined > thresholds.high_combined_billing
            {
                Severity::High
            } else {
                Severity::Medium
            };
            let (severity, emergency) = emergency_adjusted(severity, config, *quarter);

            let dates = members.iter().filter_map(|(i, _)| i.enrollment_date);
            let span = match (dates.clone().min(), dates.max()) {
                (Some(first), Some(last)) => (last - first).num_days(),
                _ => 0,
            };
            let npis: Vec<String> = members.iter().map(|(i, _)| i.npi.clone()).collect();

            for (identity, billing) in members {
                let evidence = Evidence::BurstEnrollment {
                    taxonomy_code: taxonomy.clone(),
                    state: state.clone(),
                    enrollment_quarter: *quarter,
                    cohort_size: members.len(),
                    cohort_npis: npis.clone(),
                    enrollment_span_days: span,
                    combined_billing: round2(combined),
                    provider_billing: round2(*billing),
                    emergency_period: emergency,
                };
                findings.push(SignalFinding::new(
                    identity.npi.as_str(),
                    severity,
                    evidence,
                    bounded_overpayment(billing * thresholds.overpayment_fraction, *billing),
                    &format!("{taxonomy}|{state}|{quarter}"),
                ));
            }
        }

        debug!(
            "BurstEnrollmentDetector: {} cohorts, {} findings",
            cohorts.len(),
            findings.len()
        );
        Ok(findings)
    }
}

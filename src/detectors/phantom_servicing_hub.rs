//! Phantom servicing hub detector
//!
//! A single servicing npi that shows up on the claims of many distinct
//! billing entities points at a fabricated servicing relationship, a
//! referral hub or a kickback arrangement. The finding goes to the
//! servicing provider.

use crate::config::EngineConfig;
use crate::detectors::base::{bounded_overpayment, Detector};
use crate::models::{round2, round4, Evidence, Severity, SignalFinding, SignalKind};
use crate::source::BillingSource;
use crate::stats::safe_ratio;
use anyhow::Result;
use tracing::debug;

#[derive(Debug, Default)]
pub struct PhantomServicingHubDetector;

impl PhantomServicingHubDetector {
    pub fn new() -> Self {
        Self
    }
}

impl Detector for PhantomServicingHubDetector {
    fn name(&self) -> &'static str {
        "PhantomServicingHubDetector"
    }

    fn description(&self) -> &'static str {
        "Detects servicing providers that appear across many billing entities"
    }

    fn signal(&self) -> SignalKind {
        SignalKind::PhantomServicingHub
    }

    fn category(&self) -> &'static str {
        "supplemental"
    }

    fn detect(&self, source: &dyn BillingSource, config: &EngineConfig) -> Result<Vec<SignalFinding>> {
        let thresholds = &config.thresholds.phantom_servicing_hub;
        let hubs = source.servicing_hubs()?;

        let mut findings = Vec::new();
        for (npi, hub) in hubs.iter() {
            let billing_count = hub.billing_npis.len();
            if billing_count < thresholds.min_billing_npis
                || hub.billing <= thresholds.min_total_billing
            {
                continue;
            }
            let ratio = safe_ratio(hub.beneficiaries as f64, hub.claims as f64);
            let severity = if billing_count >= thresholds.critical_billing_npis
                || (billing_count >= thresholds.high_billing_npis
                    && ratio < thresholds.critical_max_beneficiary_ratio)
            {
                Severity::Critical
            } else if billing_count >= thresholds.high_billing_npis
                || hub.billing > thresholds.high_total_billing
            {
                Severity::High
            } else {
                Severity::Medium
            };

            let evidence = Evidence::PhantomServicingHub {
                billing_npi_count: billing_count,
                billing_npis: hub
                    .billing_npis
                    .iter()
                    .take(thresholds.max_listed_npis)
                    .cloned()
                    .collect(),
                billing_through_hub: round2(hub.billing),
                claims: hub.claims,
                beneficiaries: hub.beneficiaries,
                beneficiary_claim_ratio: round4(ratio),
            };
            findings.push(SignalFinding::new(
                npi.as_str(),
                severity,
                evidence,
                bounded_overpayment(hub.billing * thresholds.overpayment_fraction, hub.billing),
                "hub",
            ));
        }

        debug!(
            "PhantomServicingHubDetector: {} servicing npis, {} findings",
            hubs.len(),
            findings.len()
        );
        Ok(findings)
    }
}

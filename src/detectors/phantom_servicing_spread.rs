//! Phantom servicing spread detector
//!
//! Servicing providers spread across many billing entities are compared
//! with each other on beneficiaries per claim. A hub billing hundreds of
//! claims per beneficiary, or sitting in the bottom decile of hubs, is
//! billing volume that one practitioner could not have delivered.

use crate::config::EngineConfig;
use crate::detectors::base::{bounded_overpayment, Detector};
use crate::models::{round2, round4, Evidence, Severity, SignalFinding, SignalKind};
use crate::source::{BillingSource, ServicingHub};
use crate::stats::{percentile_cont, safe_ratio};
use anyhow::Result;
use tracing::debug;

#[derive(Debug, Default)]
pub struct PhantomServicingSpreadDetector;

impl PhantomServicingSpreadDetector {
    pub fn new() -> Self {
        Self
    }
}

impl Detector for PhantomServicingSpreadDetector {
    fn name(&self) -> &'static str {
        "PhantomServicingSpreadDetector"
    }

    fn description(&self) -> &'static str {
        "Detects servicing providers spread across many billers with implausibly few beneficiaries"
    }

    fn signal(&self) -> SignalKind {
        SignalKind::PhantomServicingSpread
    }

    fn category(&self) -> &'static str {
        "supplemental"
    }

    fn detect(&self, source: &dyn BillingSource, config: &EngineConfig) -> Result<Vec<SignalFinding>> {
        let thresholds = &config.thresholds.phantom_servicing_spread;
        let hubs = source.servicing_hubs()?;

        let candidates: Vec<(&String, &ServicingHub)> = hubs
            .iter()
            .filter(|(_, hub)| {
                hub.billing_npis.len() >= thresholds.min_billing_npis
                    && hub.billing > thresholds.min_total_billing
                    && hub.claims > 0
            })
            .collect();

        let ratios: Vec<f64> = candidates
            .iter()
            .map(|(_, hub)| hub.beneficiaries as f64 / hub.claims as f64)
            .filter(|r| *r > 0.0)
            .collect();
        let baseline = (!ratios.is_empty()).then(|| percentile_cont(&ratios, thresholds.ratio_percentile));

        let mut findings = Vec::new();
        for (npi, hub) in &candidates {
            let ratio = hub.beneficiaries as f64 / hub.claims as f64;
            let claims_per_beneficiary = safe_ratio(hub.claims as f64, hub.beneficiaries as f64);
            let too_many = hub.beneficiaries > 0
                && claims_per_beneficiary > thresholds.max_claims_per_beneficiary;
            let below_baseline = baseline.is_some_and(|p| ratio < p);
            if !too_many && !below_baseline {
                continue;
            }
            let severity = if claims_per_beneficiary > thresholds.high_claims_per_beneficiary {
                Severity::High
            } else {
                Severity::Medium
            };

            let p10 = baseline.unwrap_or(0.0);
            let estimate = if hub.beneficiaries > 0 && p10 > 0.0 {
                let expected_claims = hub.beneficiaries as f64 / p10;
                let excess_claims = (hub.claims as f64 - expected_claims).max(0.0);
                excess_claims * (hub.billing / hub.claims as f64) * thresholds.overpayment_fraction
            } else {
                hub.billing * thresholds.fallback_fraction
            };

            let evidence = Evidence::PhantomServicingSpread {
                billing_npi_count: hub.billing_npis.len(),
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
                claims_per_beneficiary: round2(claims_per_beneficiary),
                peer_p10_ratio: round4(p10),
            };
            findings.push(SignalFinding::new(
                npi.as_str(),
                severity,
                evidence,
                bounded_overpayment(estimate, hub.billing),
                "spread",
            ));
        }

        debug!(
            "PhantomServicingSpreadDetector: {} hubs compared, {} findings",
            candidates.len(),
            findings.len()
        );
        Ok(findings)
    }
}

//! Caregiver density anomaly detector
//!
//! Home health billing is summed per registry postal code (five-digit
//! prefix) and state. A zip whose billing is several times its state's
//! median, where most billers are individuals each serving only a handful
//! of beneficiaries, matches family members billing as caregivers for a
//! relative. Every home health biller in a flagged zip gets a finding and
//! an even share of the zip's excess over the state median.

use crate::config::EngineConfig;
use crate::detectors::base::{bounded_overpayment, zip5, Detector};
use crate::models::{round2, Evidence, Severity, SignalFinding, SignalKind};
use crate::source::BillingSource;
use crate::stats::median;
use anyhow::Result;
use std::collections::BTreeMap;
use tracing::debug;

#[derive(Debug, Default)]
pub struct CaregiverDensityAnomalyDetector;

impl CaregiverDensityAnomalyDetector {
    pub fn new() -> Self {
        Self
    }
}

#[derive(Default)]
struct ZipTotals<'a> {
    /// Home health billers with their own billing
    providers: Vec<(&'a str, f64)>,
    individuals: usize,
    billing: f64,
    claims: u64,
    beneficiaries: u64,
}

impl Detector for CaregiverDensityAnomalyDetector {
    fn name(&self) -> &'static str {
        "CaregiverDensityAnomalyDetector"
    }

    fn description(&self) -> &'static str {
        "Detects postal codes with home health billing concentrated in individuals serving few patients"
    }

    fn signal(&self) -> SignalKind {
        SignalKind::CaregiverDensityAnomaly
    }

    fn category(&self) -> &'static str {
        "supplemental"
    }

    fn detect(&self, source: &dyn BillingSource, config: &EngineConfig) -> Result<Vec<SignalFinding>> {
        let thresholds = &config.thresholds.caregiver_density_anomaly;
        let index = source.identity_index()?;
        let totals = source.billing_totals()?;

        let mut zips: BTreeMap<(String, &str), ZipTotals<'_>> = BTreeMap::new();
        for identity in index.by_npi.values() {
            let home_health = identity
                .taxonomy_code
                .as_deref()
                .is_some_and(|t| thresholds.taxonomies.iter().any(|h| h == t.trim()));
            if !home_health {
                continue;
            }
            let Some(t) = totals.get(&identity.npi).filter(|t| t.billing > 0.0) else {
                continue;
            };
            let Some(zip) = identity.postal_code.as_deref().and_then(zip5) else {
                continue;
            };
            let Some(state) = identity.state.as_deref().map(str::trim).filter(|s| !s.is_empty())
            else {
                continue;
            };
            let entry = zips.entry((state.to_ascii_uppercase(), zip)).or_default();
            entry.providers.push((identity.npi.as_str(), t.billing));
            if identity.is_individual() {
                entry.individuals += 1;
            }
            entry.billing += t.billing;
            entry.claims += t.claims;
            entry.beneficiaries += t.beneficiaries;
        }
        zips.retain(|_, z| z.billing >= thresholds.min_zip_billing);

        let mut by_state: BTreeMap<&str, Vec<f64>> = BTreeMap::new();
        for ((state, _), z) in &zips {
            by_state.entry(state.as_str()).or_default().push(z.billing);
        }
        let state_medians: BTreeMap<&str, f64> = by_state
            .into_iter()
            .filter(|(_, values)| values.len() >= thresholds.min_zips_per_state)
            .map(|(state, values)| (state, median(&values)))
            .collect();

        let mut findings = Vec::new();
        let mut flagged = 0usize;
        for ((state, zip), z) in &zips {
            let Some(&state_median) = state_medians.get(state.as_str()) else {
                continue;
            };
            if state_median <= 0.0 || z.individuals == 0 {
                continue;
            }
            let ratio = z.billing / state_median;
            let individual_share = z.individuals as f64 / z.providers.len() as f64;
            let per_individual = z.beneficiaries as f64 / z.individuals as f64;
            if ratio <= thresholds.min_ratio_to_state_median
                || individual_share <= thresholds.min_individual_share
                || per_individual >= thresholds.max_beneficiaries_per_individual
            {
                continue;
            }
            flagged += 1;

            let severity = if ratio > thresholds.high_ratio_to_state_median
                || z.billing > thresholds.high_zip_billing
            {
                Severity::High
            } else {
                Severity::Medium
            };
            let zip_overpayment =
                (z.billing - state_median).max(0.0) * thresholds.overpayment_fraction;
            let per_provider = zip_overpayment / z.providers.len() as f64;
            let evidence = Evidence::CaregiverDensityAnomaly {
                postal_code: zip.to_string(),
                state: state.clone(),
                provider_count: z.providers.len(),
                individual_count: z.individuals,
                individual_share: round2(individual_share),
                zip_billing: round2(z.billing),
                zip_claims: z.claims,
                zip_beneficiaries: z.beneficiaries,
                beneficiaries_per_individual: round2(per_individual),
                state_median_billing: round2(state_median),
                ratio_to_state_median: round2(ratio),
                flagged_npis: z
                    .providers
                    .iter()
                    .take(thresholds.max_listed_npis)
                    .map(|(npi, _)| npi.to_string())
                    .collect(),
            };

            for (npi, own) in &z.providers {
                findings.push(SignalFinding::new(
                    *npi,
                    severity,
                    evidence.clone(),
                    bounded_overpayment(per_provider, *own),
                    zip,
                ));
            }
        }

        debug!(
            "CaregiverDensityAnomalyDetector: {} zips, {} states with a median, {} flagged, {} findings",
            zips.len(),
            state_medians.len(),
            flagged,
            findings.len()
        );
        Ok(findings)
    }
}

//! Coordinated billing ramp detector
//!
//! Entities controlled by one authorized official that all reach their
//! peak billing month within a short window carry a coordination
//! fingerprint that per-provider escalation checks miss. Each member with
//! billing gets a finding sized on its own billing.

use crate::config::EngineConfig;
use crate::detectors::base::{bounded_overpayment, months_between, official_networks, Detector};
use crate::models::{round2, Evidence, Severity, SignalFinding, SignalKind};
use crate::source::BillingSource;
use anyhow::Result;
use chrono::NaiveDate;
use tracing::debug;

#[derive(Debug, Default)]
pub struct CoordinatedBillingRampDetector;

impl CoordinatedBillingRampDetector {
    pub fn new() -> Self {
        Self
    }
}

struct Peak<'a> {
    npi: &'a str,
    month: NaiveDate,
    billing: f64,
}

impl Detector for CoordinatedBillingRampDetector {
    fn name(&self) -> &'static str {
        "CoordinatedBillingRampDetector"
    }

    fn description(&self) -> &'static str {
        "Detects commonly controlled entities whose billing peaks in the same few months"
    }

    fn signal(&self) -> SignalKind {
        SignalKind::CoordinatedBillingRamp
    }

    fn category(&self) -> &'static str {
        "supplemental"
    }

    fn detect(&self, source: &dyn BillingSource, config: &EngineConfig) -> Result<Vec<SignalFinding>> {
        let thresholds = &config.thresholds.coordinated_billing_ramp;
        let index = source.identity_index()?;
        let months = source.provider_months()?;
        let totals = source.billing_totals()?;
        let networks = official_networks(&index);

        let mut findings = Vec::new();
        let mut flagged = 0usize;
        for (official, members) in &networks {
            // Earliest month wins a tie for the peak
            let peaks: Vec<Peak<'_>> = members
                .iter()
                .filter_map(|npi| {
                    let by_month = months.get(*npi)?;
                    let (month, peak) = by_month
                        .iter()
                        .reduce(|best, m| if m.1.billing > best.1.billing { m } else { best })?;
                    Some(Peak {
                        npi: *npi,
                        month: *month,
                        billing: peak.billing,
                    })
                })
                .collect();
            if peaks.len() < thresholds.min_providers {
                continue;
            }
            let (Some(earliest), Some(latest)) = (
                peaks.iter().map(|p| p.month).min(),
                peaks.iter().map(|p| p.month).max(),
            ) else {
                continue;
            };
            let spread = months_between(earliest, latest);
            let combined_peak: f64 = peaks.iter().map(|p| p.billing).sum();
            if spread > thresholds.max_peak_spread_months
                || combined_peak <= thresholds.min_combined_peak_billing
            {
                continue;
            }
            flagged += 1;

            let billing = |npi: &str| totals.get(npi).map_or(0.0, |t| t.billing);
            let network_billing: f64 = members.iter().map(|npi| billing(*npi)).sum();
            let severity = if spread <= thresholds.critical_peak_spread_months
                && peaks.len() >= thresholds.critical_providers
                && network_billing > thresholds.critical_network_billing
            {
                Severity::Critical
            } else {
                Severity::High
            };
            let network_npis: Vec<String> = peaks.iter().map(|p| p.npi.to_string()).collect();

            for peak in &peaks {
                let own = billing(peak.npi);
                if own <= 0.0 {
                    continue;
                }
                let evidence = Evidence::CoordinatedBillingRamp {
                    official_name: official.clone(),
                    network_size: peaks.len(),
                    network_npis: network_npis.clone(),
                    earliest_peak_month: earliest,
                    latest_peak_month: latest,
                    peak_spread_months: spread,
                    combined_peak_billing: round2(combined_peak),
                    network_billing: round2(network_billing),
                    provider_billing: round2(own),
                };
                findings.push(SignalFinding::new(
                    peak.npi,
                    severity,
                    evidence,
                    bounded_overpayment(own * thresholds.overpayment_fraction, own),
                    official,
                ));
            }
        }

        debug!(
            "CoordinatedBillingRampDetector: {} networks, {} flagged, {} findings",
            networks.len(),
            flagged,
            findings.len()
        );
        Ok(findings)
    }
}

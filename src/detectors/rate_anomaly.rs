//! Reimbursement rate anomaly detector
//!
//! For every procedure code, providers with enough claims are compared on
//! their paid amount per claim. A rate several times the code's median
//! suggests modifier abuse or place-of-service manipulation.

use crate::config::EngineConfig;
use crate::detectors::base::{bounded_overpayment, Detector};
use crate::models::{round2, Evidence, Severity, SignalFinding, SignalKind};
use crate::source::BillingSource;
use crate::stats::{median, percentile_cont, safe_ratio};
use anyhow::Result;
use std::collections::BTreeMap;
use tracing::debug;

#[derive(Debug, Default)]
pub struct RateAnomalyDetector;

impl RateAnomalyDetector {
    pub fn new() -> Self {
        Self
    }
}

struct CodeRate<'a> {
    npi: &'a str,
    claims: u64,
    billing: f64,
    rate: f64,
}

impl Detector for RateAnomalyDetector {
    fn name(&self) -> &'static str {
        "RateAnomalyDetector"
    }

    fn description(&self) -> &'static str {
        "Detects per-claim payments far above the median for the same procedure code"
    }

    fn signal(&self) -> SignalKind {
        SignalKind::RateAnomaly
    }

    fn category(&self) -> &'static str {
        "supplemental"
    }

    fn detect(&self, source: &dyn BillingSource, config: &EngineConfig) -> Result<Vec<SignalFinding>> {
        let thresholds = &config.thresholds.rate_anomaly;
        let codes = source.provider_codes()?;

        let mut by_code: BTreeMap<&str, Vec<CodeRate<'_>>> = BTreeMap::new();
        for (npi, per_code) in codes.iter() {
            for (code, totals) in per_code {
                if totals.claims <= thresholds.min_claims {
                    continue;
                }
                if thresholds.exempt_codes.iter().any(|e| e == code.trim()) {
                    continue;
                }
                by_code.entry(code.as_str()).or_default().push(CodeRate {
                    npi: npi.as_str(),
                    claims: totals.claims,
                    billing: totals.billing,
                    rate: totals.billing / totals.claims as f64,
                });
            }
        }

        let mut findings = Vec::new();
        for (code, rates) in &by_code {
            if rates.len() < thresholds.min_peer_group {
                continue;
            }
            let values: Vec<f64> = rates.iter().map(|r| r.rate).collect();
            let median_rate = median(&values);
            if median_rate <= 0.0 {
                continue;
            }
            let high_rate = percentile_cont(&values, thresholds.percentile);

            for rate in rates {
                if rate.rate <= median_rate * thresholds.min_ratio_to_median {
                    continue;
                }
                let ratio = safe_ratio(rate.rate, median_rate);
                let severity = if ratio > thresholds.high_ratio_to_median
                    || (ratio > thresholds.high_ratio_with_percentile && rate.rate > high_rate)
                {
                    Severity::High
                } else {
                    Severity::Medium
                };
                let excess_per_claim = (rate.rate - median_rate).max(0.0);

                let evidence = Evidence::RateAnomaly {
                    procedure_code: code.to_string(),
                    claims: rate.claims,
                    billing: round2(rate.billing),
                    rate_per_claim: round2(rate.rate),
                    median_rate: round2(median_rate),
                    p99_rate: round2(high_rate),
                    peer_count: rates.len(),
                    ratio_to_median: round2(ratio),
                };
                findings.push(SignalFinding::new(
                    rate.npi,
                    severity,
                    evidence,
                    bounded_overpayment(
                        excess_per_claim * rate.claims as f64 * thresholds.overpayment_fraction,
                        rate.billing,
                    ),
                    code,
                ));
            }
        }

        debug!("RateAnomalyDetector: {} codes compared, {} findings", by_code.len(), findings.len());
        Ok(findings)
    }
}

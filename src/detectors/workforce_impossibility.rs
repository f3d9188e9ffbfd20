//! Workforce impossibility detector
//!
//! An organization's workforce in a month is the number of distinct
//! servicing npis on its claims (at least one). Dividing the month's claims
//! by workers and working hours gives claims per worker-hour; the peak
//! month above the plausible rate is flagged. Claims beyond the plausible
//! rate, at the month's average claim cost, are the overpayment estimate.

use crate::config::EngineConfig;
use crate::detectors::base::{bounded_overpayment, emergency_adjusted, Detector};
use crate::models::{round2, Evidence, Severity, SignalFinding, SignalKind};
use crate::source::{BillingSource, WorkforceMonth};
use anyhow::Result;
use chrono::NaiveDate;
use tracing::debug;

#[derive(Debug, Default)]
pub struct WorkforceImpossibilityDetector;

impl WorkforceImpossibilityDetector {
    pub fn new() -> Self {
        Self
    }
}

fn claims_per_worker_hour(month: &WorkforceMonth, hours: f64) -> f64 {
    month.claims as f64 / month.workers.max(1) as f64 / hours
}

impl Detector for WorkforceImpossibilityDetector {
    fn name(&self) -> &'static str {
        "WorkforceImpossibilityDetector"
    }

    fn description(&self) -> &'static str {
        "Detects organizations billing more claims than their workforce could deliver"
    }

    fn signal(&self) -> SignalKind {
        SignalKind::WorkforceImpossibility
    }

    fn detect(&self, source: &dyn BillingSource, config: &EngineConfig) -> Result<Vec<SignalFinding>> {
        let thresholds = &config.thresholds.workforce_impossibility;
        let hours = thresholds.hours_per_month;
        let workforce = source.workforce_months()?;
        let index = source.identity_index()?;

        let mut findings = Vec::new();
        for (npi, months) in workforce.iter() {
            if !index.get(npi).is_some_and(|i| i.is_organization()) {
                continue;
            }

            // Earliest month wins ties
            let mut peak: Option<(NaiveDate, &WorkforceMonth, f64)> = None;
            for (month, totals) in months {
                let rate = claims_per_worker_hour(totals, hours);
                if peak.is_none_or(|(_, _, best)| rate > best) {
                    peak = Some((*month, totals, rate));
                }
            }
            let Some((peak_month, totals, rate)) = peak else {
                continue;
            };
            if rate <= thresholds.max_claims_per_hour {
                continue;
            }

            let severity = if rate > thresholds.high_claims_per_hour {
                Severity::High
            } else {
                Severity::Medium
            };
            let (severity, emergency) = emergency_adjusted(severity, config, peak_month);

            let workers = totals.workers.max(1);
            let max_plausible = workers as f64 * thresholds.max_claims_per_hour * hours;
            let excess_claims = totals.claims as f64 - max_plausible;
            let avg_claim_cost = if totals.claims > 0 {
                totals.billing / totals.claims as f64
            } else {
                0.0
            };

            let evidence = Evidence::WorkforceImpossibility {
                peak_month,
                peak_claims: totals.claims,
                workers,
                claims_per_worker_hour: round2(rate),
                max_plausible_claims: round2(max_plausible),
                peak_month_billing: round2(totals.billing),
                emergency_period: emergency,
            };
            findings.push(SignalFinding::new(
                npi.as_str(),
                severity,
                evidence,
                bounded_overpayment(excess_claims * avg_claim_cost, totals.billing),
                &peak_month.to_string(),
            ));
        }

        debug!("WorkforceImpossibilityDetector found {} findings", findings.len());
        Ok(findings)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{identity, org, source, tx};

    fn detect(src: &dyn BillingSource) -> Vec<SignalFinding> {
        WorkforceImpossibilityDetector::new()
            .detect(src, &EngineConfig::default())
            .unwrap()
    }

    #[test]
    fn test_single_worker_over_capacity() {
        // 176 h * 6/h = 1056 plausible claims; 2112 billed at $10 each
        let src = source(
            vec![
                tx("1000000001", "2023-01", 500.0, 50),
                tx("1000000001", "2023-02", 21_120.0, 2_112),
            ],
            vec![],
            vec![org("1000000001")],
        );
        let findings = detect(&src);
        assert_eq!(findings.len(), 1);
        let f = &findings[0];
        assert_eq!(f.severity, Severity::Medium);
        assert_eq!(f.estimated_overpayment, 10_560.0);
        assert!(matches!(
            f.evidence,
            Evidence::WorkforceImpossibility { peak_claims: 2112, workers: 1, .. }
        ));
    }

    #[test]
    fn test_more_workers_raise_capacity() {
        let rows = (0..3)
            .map(|i| {
                let mut row = tx("1000000001", "2023-02", 7_000.0, 700);
                row.servicing_npi = Some(format!("200000000{i}"));
                row
            })
            .collect();
        // 2100 claims over 3 workers = 3.98/h
        let src = source(rows, vec![], vec![org("1000000001")]);
        assert!(detect(&src).is_empty());
    }

    #[test]
    fn test_individuals_ignored() {
        let src = source(
            vec![tx("1000000001", "2023-02", 50_000.0, 5_000)],
            vec![],
            vec![identity("1000000001")],
        );
        assert!(detect(&src).is_empty());
    }

    #[test]
    fn test_extreme_rate_is_high() {
        let src = source(
            vec![tx("1000000001", "2023-02", 40_000.0, 4_000)],
            vec![],
            vec![org("1000000001")],
        );
        let findings = detect(&src);
        assert_eq!(findings[0].severity, Severity::High);
        assert!(findings[0].estimated_overpayment <= 40_000.0);
    }
}

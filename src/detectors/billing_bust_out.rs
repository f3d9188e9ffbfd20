//! Billing bust-out detector
//!
//! The ramp-and-abandon pattern: billing climbs to a large peak, then
//! collapses within three months. Neighbouring windows are averaged over
//! the months actually billed.
//!
//! ```text
//!   billing
//!     ^            peak
//!     |             #
//!     |          #  #
//!     |       #  #  #
//!     |    #  #  #  #  .  .
//!     +----[pre 3mo]-^-[post 3mo]--> month
//! ```

use crate::config::EngineConfig;
use crate::detectors::base::{bounded_overpayment, emergency_adjusted, Detector};
use crate::models::{round2, Evidence, Severity, SignalFinding, SignalKind};
use crate::source::{BillingSource, MonthTotals};
use anyhow::Result;
use chrono::{Months, NaiveDate};
use std::collections::BTreeMap;
use tracing::debug;

const WINDOW_MONTHS: u32 = 3;
const MIN_POST_PEAK_MONTHS: usize = 1;
const MIN_PRE_PEAK_MONTHS: usize = 2;

#[derive(Debug, Default)]
pub struct BillingBustOutDetector;

impl BillingBustOutDetector {
    pub fn new() -> Self {
        Self
    }
}

/// Average billing over the billed months in `[from, to]`, with the count
fn window_average(months: &BTreeMap<NaiveDate, MonthTotals>, from: NaiveDate, to: NaiveDate) -> (f64, usize) {
    let billed: Vec<f64> = months.range(from..=to).map(|(_, t)| t.billing).collect();
    if billed.is_empty() {
        return (0.0, 0);
    }
    (billed.iter().sum::<f64>() / billed.len() as f64, billed.len())
}

impl Detector for BillingBustOutDetector {
    fn name(&self) -> &'static str {
        "BillingBustOutDetector"
    }

    fn description(&self) -> &'static str {
        "Detects billing that ramps to a large peak and then collapses"
    }

    fn signal(&self) -> SignalKind {
        SignalKind::BillingBustOut
    }

    fn category(&self) -> &'static str {
        "supplemental"
    }

    fn detect(&self, source: &dyn BillingSource, config: &EngineConfig) -> Result<Vec<SignalFinding>> {
        let thresholds = &config.thresholds.billing_bust_out;
        let months = source.provider_months()?;

        let mut findings = Vec::new();
        for (npi, by_month) in months.iter() {
            if by_month.len() < thresholds.min_billing_months {
                continue;
            }
            // Earliest month wins ties
            let Some((peak_month, peak)) = by_month
                .iter()
                .reduce(|best, next| if next.1.billing > best.1.billing { next } else { best })
            else {
                continue;
            };
            let peak_month = *peak_month;
            let peak_billing = peak.billing;
            if peak_billing <= thresholds.min_peak_billing {
                continue;
            }

            let (Some(post_from), Some(post_to), Some(pre_from), Some(pre_to)) = (
                peak_month.checked_add_months(Months::new(1)),
                peak_month.checked_add_months(Months::new(WINDOW_MONTHS)),
                peak_month.checked_sub_months(Months::new(WINDOW_MONTHS)),
                peak_month.checked_sub_months(Months::new(1)),
            ) else {
                continue;
            };

            let (post_average, post_count) = window_average(by_month, post_from, post_to);
            if post_count < MIN_POST_PEAK_MONTHS {
                continue;
            }
            let post_pct = post_average / peak_billing * 100.0;
            if post_pct >= thresholds.max_post_peak_pct {
                continue;
            }

            let (pre_average, pre_count) = window_average(by_month, pre_from, pre_to);
            if pre_count < MIN_PRE_PEAK_MONTHS {
                continue;
            }
            if pre_average / peak_billing * 100.0 >= thresholds.max_pre_peak_pct {
                continue;
            }

            let severity = if peak_billing > thresholds.high_peak_billing {
                Severity::High
            } else {
                Severity::Medium
            };
            let (severity, emergency) = emergency_adjusted(severity, config, peak_month);

            let total_billing: f64 = by_month.values().map(|t| t.billing).sum();
            let estimate =
                (pre_average * f64::from(WINDOW_MONTHS) + peak_billing) * thresholds.overpayment_fraction;

            let evidence = Evidence::BillingBustOut {
                peak_month,
                peak_billing: round2(peak_billing),
                pre_peak_average: round2(pre_average),
                post_peak_average: round2(post_average),
                post_peak_pct_of_peak: round2(post_pct),
                billing_months: by_month.len(),
                emergency_period: emergency,
            };
            findings.push(SignalFinding::new(
                npi.as_str(),
                severity,
                evidence,
                bounded_overpayment(estimate, total_billing),
                &peak_month.to_string(),
            ));
        }

        debug!("BillingBustOutDetector found {} findings", findings.len());
        Ok(findings)
    }
}

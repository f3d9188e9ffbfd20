//! Rapid escalation detector - finds new providers whose billing explodes
//!
//! A provider is new when its enrollment date falls within the configured
//! window before its first billing month. Over its first year of billing
//! (calendar months, idle months count as zero) we take rolling 3-month
//! totals and flag every month whose rolling total grows by more than the
//! configured percentage over the previous month's rolling total.

use crate::config::EngineConfig;
use crate::detectors::base::{bounded_overpayment, emergency_adjusted, month_start, months_between, Detector};
use crate::models::{round2, Evidence, Severity, SignalFinding, SignalKind};
use crate::source::BillingSource;
use anyhow::Result;
use chrono::{Months, NaiveDate};
use tracing::debug;

/// Detects newly enrolled providers with explosive billing growth
#[derive(Debug, Default)]
pub struct RapidEscalationDetector;

impl RapidEscalationDetector {
    pub fn new() -> Self {
        Self
    }
}

/// Rolling totals over `window` months; the first months use partial windows
fn rolling_totals(monthly: &[f64], window: usize) -> Vec<f64> {
    (0..monthly.len())
        .map(|i| {
            let from = (i + 1).saturating_sub(window);
            monthly[from..=i].iter().sum()
        })
        .collect()
}

/// Longest run of consecutive indexes in an ascending list
fn longest_streak(indexes: &[usize]) -> usize {
    let mut best = 0;
    let mut current = 0;
    let mut prev: Option<usize> = None;
    for &i in indexes {
        current = match prev {
            Some(p) if p + 1 == i => current + 1,
            _ => 1,
        };
        best = best.max(current);
        prev = Some(i);
    }
    best
}

impl Detector for RapidEscalationDetector {
    fn name(&self) -> &'static str {
        "RapidEscalationDetector"
    }

    fn description(&self) -> &'static str {
        "Detects newly enrolled providers whose rolling billing grows explosively"
    }

    fn signal(&self) -> SignalKind {
        SignalKind::RapidEscalation
    }

    fn detect(&self, source: &dyn BillingSource, config: &EngineConfig) -> Result<Vec<SignalFinding>> {
        let thresholds = &config.thresholds.rapid_escalation;
        let months = source.provider_months()?;
        let index = source.identity_index()?;

        let mut findings = Vec::new();
        let mut candidates = 0usize;
        for (npi, by_month) in months.iter() {
            let Some(enrolled) = index.get(npi).and_then(|i| i.enrollment_date) else {
                continue;
            };
            let Some(first_month) = by_month.keys().next().copied() else {
                continue;
            };
            let gap = months_between(month_start(enrolled), first_month);
            if gap < 0 || gap > i64::from(thresholds.enrollment_window_months) {
                continue;
            }
            candidates += 1;

            let calendar: Vec<NaiveDate> = (0..thresholds.observation_months)
                .filter_map(|i| first_month.checked_add_months(Months::new(i as u32)))
                .collect();
            let monthly: Vec<f64> = calendar
                .iter()
                .map(|m| by_month.get(m).map_or(0.0, |t| t.billing))
                .collect();
            let rolling = rolling_totals(&monthly, thresholds.rolling_window_months);

            let mut triggers = Vec::new();
            let mut peak_growth = 0.0f64;
            for i in 1..rolling.len() {
                let prev = rolling[i - 1];
                if prev <= 0.0 {
                    continue;
                }
                let growth = (rolling[i] - prev) / prev * 100.0;
                peak_growth = peak_growth.max(growth);
                if growth > thresholds.growth_pct {
                    triggers.push(i);
                }
            }
            if triggers.is_empty() {
                continue;
            }

            let streak = longest_streak(&triggers);
            let severity = if streak >= thresholds.high_consecutive_months {
                Severity::High
            } else {
                Severity::Medium
            };
            let (severity, emergency) = emergency_adjusted(severity, config, first_month);

            let window_billing: f64 = monthly.iter().sum();
            let trigger_billing: f64 = triggers.iter().map(|&i| monthly[i]).sum();

            let evidence = Evidence::RapidEscalation {
                enrollment_date: enrolled,
                first_billing_month: first_month,
                monthly_billing: monthly.iter().map(|v| round2(*v)).collect(),
                rolling_totals: rolling.iter().map(|v| round2(*v)).collect(),
                peak_growth_pct: round2(peak_growth),
                trigger_months: triggers.iter().map(|&i| calendar[i]).collect(),
                longest_trigger_streak: streak,
                emergency_period: emergency,
            };
            findings.push(SignalFinding::new(
                npi.as_str(),
                severity,
                evidence,
                bounded_overpayment(trigger_billing, window_billing),
                &first_month.to_string(),
            ));
        }

        debug!(
            "RapidEscalationDetector: {} new providers examined, {} findings",
            candidates,
            findings.len()
        );
        Ok(findings)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{date, identity, source, tx};

    fn new_provider(npi: &str, enrolled: &str) -> crate::models::ProviderIdentity {
        let mut id = identity(npi);
        id.enrollment_date = Some(date(enrolled));
        id
    }

    fn detect(series: &[(&str, f64)], enrolled: &str) -> Vec<SignalFinding> {
        let txs = series
            .iter()
            .map(|(m, amount)| tx("1000000001", m, *amount, 10))
            .collect();
        let src = source(txs, vec![], vec![new_provider("1000000001", enrolled)]);
        RapidEscalationDetector::new()
            .detect(&src, &EngineConfig::default())
            .unwrap()
    }

    #[test]
    fn test_rolling_totals_partial_windows() {
        assert_eq!(
            rolling_totals(&[1.0, 2.0, 3.0, 4.0], 3),
            vec![1.0, 3.0, 6.0, 9.0]
        );
    }

    #[test]
    fn test_longest_streak() {
        assert_eq!(longest_streak(&[1, 2, 3, 7, 8]), 3);
        assert_eq!(longest_streak(&[4]), 1);
        assert_eq!(longest_streak(&[]), 0);
    }

    #[test]
    fn test_sustained_escalation_is_high() {
        // rolling: 1000, 5000, 25000 -> growth 400%, 400%
        let findings = detect(
            &[("2023-01", 1_000.0), ("2023-02", 4_000.0), ("2023-03", 20_000.0)],
            "2022-10-15",
        );
        assert_eq!(findings.len(), 1);
        let f = &findings[0];
        assert_eq!(f.severity, Severity::High);
        assert_eq!(f.estimated_overpayment, 24_000.0);
    }

    #[test]
    fn test_single_jump_is_medium() {
        // rolling: 1000, 4000 (300%), 4500 (12.5%)
        let findings = detect(
            &[("2023-01", 1_000.0), ("2023-02", 3_000.0), ("2023-03", 500.0)],
            "2022-12-01",
        );
        assert_eq!(findings.len(), 1);
        assert_eq!(findings[0].severity, Severity::Medium);
        assert_eq!(findings[0].estimated_overpayment, 3_000.0);
    }

    #[test]
    fn test_growth_exactly_at_threshold_does_not_trigger() {
        // rolling: 1000, 3000 -> exactly 200%
        let findings = detect(&[("2023-01", 1_000.0), ("2023-02", 2_000.0)], "2022-12-01");
        assert!(findings.is_empty());
    }

    #[test]
    fn test_established_provider_ignored() {
        let findings = detect(
            &[("2023-01", 1_000.0), ("2023-02", 4_000.0), ("2023-03", 20_000.0)],
            "2019-01-01",
        );
        assert!(findings.is_empty());
    }

    #[test]
    fn test_emergency_period_downgrades() {
        let findings = detect(
            &[("2020-05", 1_000.0), ("2020-06", 4_000.0), ("2020-07", 20_000.0)],
            "2020-04-01",
        );
        assert_eq!(findings.len(), 1);
        assert_eq!(findings[0].severity, Severity::Low);
        assert!(matches!(
            findings[0].evidence,
            Evidence::RapidEscalation {
                emergency_period: true,
                ..
            }
        ));
    }
}

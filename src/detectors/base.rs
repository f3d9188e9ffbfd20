//! Base detector trait and types
//!
//! This module defines the core abstractions for fraud signal detection:
//! - `Detector` trait that all signal detectors must implement
//! - `DetectorResult` for capturing execution results
//! - Shared helpers for months, severities and overpayment bounds

use crate::config::EngineConfig;
use crate::models::{normalize_name, DetectorFailureRecord, Severity, SignalFinding, SignalKind};
use crate::source::{BillingSource, IdentityIndex};
use anyhow::Result;
use chrono::{Datelike, NaiveDate};
use std::collections::{BTreeMap, BTreeSet};

/// Result from running a single detector
#[derive(Debug, Clone)]
pub struct DetectorResult {
    /// Name of the detector that produced these results
    pub detector_name: String,
    /// Findings produced by the detector
    pub findings: Vec<SignalFinding>,
    /// Execution time in milliseconds
    pub duration_ms: u64,
    /// Whether the detector completed successfully
    pub success: bool,
    /// Error message if the detector failed
    pub error: Option<String>,
}

impl DetectorResult {
    /// Create a successful result
    pub fn success(detector_name: String, findings: Vec<SignalFinding>, duration_ms: u64) -> Self {
        Self {
            detector_name,
            findings,
            duration_ms,
            success: true,
            error: None,
        }
    }

    /// Create a failed result
    pub fn failure(detector_name: String, error: String, duration_ms: u64) -> Self {
        Self {
            detector_name,
            findings: Vec::new(),
            duration_ms,
            success: false,
            error: Some(error),
        }
    }
}

/// Trait for all fraud signal detectors
///
/// Each detector inspects the billing source for one fraud pattern and
/// returns zero or more per-provider findings. Detectors hold no state
/// between runs and never see each other's output.
///
/// # Example Implementation
///
/// ```ignore
/// pub struct MyDetector;
///
/// impl Detector for MyDetector {
///     fn name(&self) -> &'static str {
///         "MyDetector"
///     }
///
///     fn description(&self) -> &'static str {
///         "Detects one billing pattern"
///     }
///
///     fn signal(&self) -> SignalKind {
///         SignalKind::BillingOutlier
///     }
///
///     fn detect(&self, source: &dyn BillingSource, config: &EngineConfig) -> Result<Vec<SignalFinding>> {
///         let totals = source.billing_totals()?;
///         Ok(vec![])
///     }
/// }
/// ```
pub trait Detector: Send + Sync {
    /// Unique identifier for this detector (e.g. "BillingOutlierDetector")
    fn name(&self) -> &'static str;

    /// Human-readable description of what this detector finds
    fn description(&self) -> &'static str;

    /// The signal type every finding from this detector carries
    fn signal(&self) -> SignalKind;

    /// Run detection and return findings
    ///
    /// # Arguments
    /// * `source` - Read-only billing tables and derived views
    /// * `config` - Thresholds for this run
    fn detect(&self, source: &dyn BillingSource, config: &EngineConfig)
        -> Result<Vec<SignalFinding>>;

    /// "core" for the nine base signals, "supplemental" for the rest
    fn category(&self) -> &'static str {
        "core"
    }
}

/// Progress callback for detector execution
pub type ProgressCallback = Box<dyn Fn(&str, usize, usize) + Send + Sync>;

/// Summary statistics from running all detectors
#[derive(Debug, Clone, Default)]
pub struct DetectionSummary {
    /// Total number of detectors run
    pub detectors_run: usize,
    /// Number of detectors that succeeded
    pub detectors_succeeded: usize,
    /// Number of detectors that failed
    pub detectors_failed: usize,
    /// Total findings across all detectors
    pub total_findings: usize,
    /// Findings by severity
    pub by_severity: BTreeMap<Severity, usize>,
    /// Per-detector failure messages
    pub failures: Vec<DetectorFailureRecord>,
    /// Total execution time in milliseconds
    pub total_duration_ms: u64,
}

impl DetectionSummary {
    /// Update summary with a detector result
    pub fn add_result(&mut self, result: &DetectorResult) {
        self.detectors_run += 1;
        self.total_duration_ms += result.duration_ms;

        if result.success {
            self.detectors_succeeded += 1;
            self.total_findings += result.findings.len();

            for finding in &result.findings {
                *self.by_severity.entry(finding.severity).or_insert(0) += 1;
            }
        } else {
            self.detectors_failed += 1;
            self.failures.push(DetectorFailureRecord {
                detector: result.detector_name.clone(),
                message: result.error.clone().unwrap_or_default(),
            });
        }
    }
}

/// Number of whole months from `from` to `to` (negative when `to` is earlier)
pub fn months_between(from: NaiveDate, to: NaiveDate) -> i64 {
    (to.year() as i64 - from.year() as i64) * 12 + (to.month() as i64 - from.month() as i64)
}

/// First day of the date's month
pub fn month_start(date: NaiveDate) -> NaiveDate {
    date.with_day(1).unwrap_or(date)
}

/// First day of the date's calendar quarter
pub fn quarter_start(date: NaiveDate) -> NaiveDate {
    let month = (date.month0() / 3) * 3 + 1;
    NaiveDate::from_ymd_opt(date.year(), month, 1).unwrap_or(date)
}

/// Temporal signals are downgraded to low inside the emergency window
pub fn emergency_adjusted(severity: Severity, config: &EngineConfig, month: NaiveDate) -> (Severity, bool) {
    if config.emergency_period.contains(month) {
        (Severity::Low, true)
    } else {
        (severity, false)
    }
}

/// Keep an overpayment estimate within `[0, billed]`
pub fn bounded_overpayment(estimate: f64, billed: f64) -> f64 {
    if !estimate.is_finite() {
        return 0.0;
    }
    estimate.clamp(0.0, billed.max(0.0))
}

/// Registry npis grouped by normalized authorized-official name
pub fn official_networks(index: &IdentityIndex) -> BTreeMap<String, BTreeSet<&str>> {
    let mut networks: BTreeMap<String, BTreeSet<&str>> = BTreeMap::new();
    for identity in index.by_npi.values() {
        let Some(official) = identity.authorized_official.as_deref() else {
            continue;
        };
        let key = normalize_name(official);
        if key.is_empty() {
            continue;
        }
        networks.entry(key).or_default().insert(identity.npi.as_str());
    }
    networks
}

/// Five-digit prefix of a postal code, `None` when it is too short
pub fn zip5(postal_code: &str) -> Option<&str> {
    let trimmed = postal_code.trim();
    let prefix = trimmed.get(..5)?;
    prefix.bytes().all(|b| b.is_ascii_digit()).then_some(prefix)
}

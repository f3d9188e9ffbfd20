//! Fraud signal detectors
//!
//! This module provides the detector framework and the nineteen signal
//! detectors that scan billing data for fraud patterns.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                     DetectorEngine                          │
//! │  - Registers detectors                                      │
//! │  - Runs enabled detectors in parallel (rayon)               │
//! │  - Isolates failures, panics and timeouts                   │
//! │  - Returns results in registration order                    │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//!                              ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │                      Detector Trait                         │
//! │  - name(): Unique identifier                                │
//! │  - signal(): The signal kind every finding carries          │
//! │  - detect(source, config): Run detection, return findings   │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//!              ┌───────────────┴───────────────┐
//!              ▼                               ▼
//! ┌──────────────────────────┐   ┌──────────────────────────┐
//! │ Core                     │   │ Supplemental             │
//! │ (ExcludedProvider,       │   │ (BurstEnrollment,        │
//! │  BillingOutlier, ...)    │   │  RateAnomaly, ...)       │
//! └──────────────────────────┘   └──────────────────────────┘
//! ```
//!
//! # Detector Categories
//!
//! ## Core detectors
//! - `ExcludedProviderDetector` - Billing after an exclusion took effect
//! - `BillingOutlierDetector` - Billing above the peer-group 99th percentile
//! - `RapidEscalationDetector` - New entities with explosive billing growth
//! - `WorkforceImpossibilityDetector` - More claims than staff could deliver
//! - `SharedOfficialDetector` - One official behind many billing entities
//! - `GeographicImplausibilityDetector` - Too many claims per beneficiary
//! - `AddressClusteringDetector` - Many billing entities at one postal code
//! - `UpcodingDetector` - High-complexity E&M share far above peers
//! - `ConcurrentBillingDetector` - One practitioner in many states at once
//!
//! ## Supplemental detectors
//! - `BurstEnrollmentDetector` - Organizations enrolled together, billing together
//! - `BillingMonocultureDetector` - One procedure code dominating claims
//! - `BillingBustOutDetector` - Ramp to a peak, then abrupt collapse
//! - `RateAnomalyDetector` - Per-claim payment far above the code median
//! - `CoordinatedBillingRampDetector` - Controlled entities peaking together
//! - `PhantomServicingHubDetector` - One servicing npi across many billers
//! - `NetworkBeneficiaryDilutionDetector` - Networks recycling few beneficiaries
//! - `CaregiverDensityAnomalyDetector` - Home health zips dense with caregivers
//! - `RepetitiveServiceAbuseDetector` - Claims per beneficiary above code peers
//! - `PhantomServicingSpreadDetector` - Servicing hubs with implausibly few patients
//!
//! # Usage
//!
//! ```ignore
//! use claimscan::detectors::{DetectorEngineBuilder, default_detectors};
//! use std::sync::Arc;
//!
//! let engine = DetectorEngineBuilder::new()
//!     .workers(4)
//!     .detectors(default_detectors())
//!     .build();
//!
//! let (results, summary) = engine.run(source, Arc::new(config))?;
//! ```

mod base;
mod engine;

// Core detectors
mod address_clustering;
mod billing_outlier;
mod concurrent_billing;
mod excluded_provider;
mod geographic_implausibility;
mod rapid_escalation;
mod shared_official;
mod upcoding;
mod workforce_impossibility;

// Supplemental detectors
mod billing_bust_out;
mod billing_monoculture;
mod burst_enrollment;
mod caregiver_density_anomaly;
mod coordinated_billing_ramp;
mod network_beneficiary_dilution;
mod phantom_servicing_hub;
mod phantom_servicing_spread;
mod rate_anomaly;
mod repetitive_service_abuse;

// Cross-signal analysis
mod cross_signal;

pub use base::{
    bounded_overpayment, emergency_adjusted, month_start, months_between, quarter_start,
    DetectionSummary, Detector, DetectorResult, ProgressCallback,
};
pub use engine::{DetectorEngine, DetectorEngineBuilder};

pub use address_clustering::AddressClusteringDetector;
pub use billing_outlier::BillingOutlierDetector;
pub use concurrent_billing::ConcurrentBillingDetector;
pub use excluded_provider::ExcludedProviderDetector;
pub use geographic_implausibility::GeographicImplausibilityDetector;
pub use rapid_escalation::RapidEscalationDetector;
pub use shared_official::SharedOfficialDetector;
pub use upcoding::UpcodingDetector;
pub use workforce_impossibility::WorkforceImpossibilityDetector;

pub use billing_bust_out::BillingBustOutDetector;
pub use billing_monoculture::BillingMonocultureDetector;
pub use burst_enrollment::BurstEnrollmentDetector;
pub use caregiver_density_anomaly::CaregiverDensityAnomalyDetector;
pub use coordinated_billing_ramp::CoordinatedBillingRampDetector;
pub use network_beneficiary_dilution::NetworkBeneficiaryDilutionDetector;
pub use phantom_servicing_hub::PhantomServicingHubDetector;
pub use phantom_servicing_spread::PhantomServicingSpreadDetector;
pub use rate_anomaly::RateAnomalyDetector;
pub use repetitive_service_abuse::RepetitiveServiceAbuseDetector;

pub use cross_signal::{correlate, CorrelationSummary, SignalPairCount};

use std::sync::Arc;
use std::time::Duration;

/// Create the full detector set, one per signal kind, in signal order
pub fn default_detectors() -> Vec<Arc<dyn Detector>> {
    vec![
        // Core detectors
        Arc::new(ExcludedProviderDetector::new()),
        Arc::new(BillingOutlierDetector::new()),
        Arc::new(RapidEscalationDetector::new()),
        Arc::new(WorkforceImpossibilityDetector::new()),
        Arc::new(SharedOfficialDetector::new()),
        Arc::new(GeographicImplausibilityDetector::new()),
        Arc::new(AddressClusteringDetector::new()),
        Arc::new(UpcodingDetector::new()),
        Arc::new(ConcurrentBillingDetector::new()),
        // Supplemental detectors
        Arc::new(BurstEnrollmentDetector::new()),
        Arc::new(BillingMonocultureDetector::new()),
        Arc::new(BillingBustOutDetector::new()),
        Arc::new(RateAnomalyDetector::new()),
        Arc::new(CoordinatedBillingRampDetector::new()),
        Arc::new(PhantomServicingHubDetector::new()),
        Arc::new(NetworkBeneficiaryDilutionDetector::new()),
        Arc::new(CaregiverDensityAnomalyDetector::new()),
        Arc::new(RepetitiveServiceAbuseDetector::new()),
        Arc::new(PhantomServicingSpreadDetector::new()),
    ]
}

/// Create a detector engine with all default detectors
///
/// Convenience function for quickly setting up detection.
pub fn create_default_engine(workers: usize, timeout: Option<Duration>) -> DetectorEngine {
    DetectorEngineBuilder::new()
        .workers(workers)
        .timeout(timeout)
        .detectors(default_detectors())
        .build()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::SignalKind;

    #[test]
    fn test_one_detector_per_signal() {
        let detectors = default_detectors();
        let signals: Vec<SignalKind> = detectors.iter().map(|d| d.signal()).collect();
        assert_eq!(signals, SignalKind::ALL.to_vec());
    }

    #[test]
    fn test_detector_names_unique() {
        let engine = create_default_engine(2, None);
        let mut names = engine.detector_names();
        names.sort_unstable();
        names.dedup();
        assert_eq!(names.len(), 19);
    }

    #[test]
    fn test_supplemental_category() {
        let supplemental: Vec<_> = default_detectors()
            .into_iter()
            .filter(|d| d.category() == "supplemental")
            .map(|d| d.signal())
            .collect();
        assert_eq!(
            supplemental,
            vec![
                SignalKind::BurstEnrollment,
                SignalKind::BillingMonoculture,
                SignalKind::BillingBustOut,
                SignalKind::RateAnomaly,
                SignalKind::CoordinatedBillingRamp,
                SignalKind::PhantomServicingHub,
                SignalKind::NetworkBeneficiaryDilution,
                SignalKind::CaregiverDensityAnomaly,
                SignalKind::RepetitiveServiceAbuse,
                SignalKind::PhantomServicingSpread,
            ]
        );
    }
}

//! Scan pipeline
//!
//! Orchestrates one full scan:
//! 1. Validate configuration
//! 2. Health-check the data source
//! 3. Run every enabled detector in parallel
//! 4. Merge findings per provider, dropping npis with no unique identity
//! 5. Score each provider and attach its FCA framing
//! 6. Correlate signals across the flagged population
//!
//! The run is a pure function of the source contents and the configuration:
//! two runs over the same data produce byte-identical serialized output.

use crate::config::EngineConfig;
use crate::detectors::{correlate, create_default_engine, CorrelationSummary, ProgressCallback};
use crate::error::{ScanError, ScanResult};
use crate::models::{round2, ProviderResult, RunStatistics, SignalFinding, SignalKind, TierDistribution};
use crate::scoring::RiskScorer;
use crate::source::BillingSource;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Everything one scan produces
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunOutput {
    /// Sorted by score desc, overpayment desc, npi asc
    pub providers: Vec<ProviderResult>,
    pub correlation: CorrelationSummary,
    pub statistics: RunStatistics,
}

/// Run a full scan over `source`.
///
/// Fails only when the configuration is invalid or the source is
/// unavailable. Detector failures and unresolved npis are recorded in the
/// statistics and the run continues.
pub fn run_scan(
    source: Arc<dyn BillingSource>,
    config: EngineConfig,
    progress: Option<ProgressCallback>,
) -> ScanResult<RunOutput> {
    let start = Instant::now();
    config.validate()?;
    source.health_check()?;

    let timeout = config.engine.detector_timeout_secs.map(Duration::from_secs);
    let mut engine = create_default_engine(config.engine.workers, timeout);
    if let Some(callback) = progress {
        engine = engine.with_progress_callback(callback);
    }

    let config = Arc::new(config);
    let (results, summary) = engine
        .run(Arc::clone(&source), Arc::clone(&config))
        .map_err(|e| ScanError::Configuration(format!("Cannot start detector pool: {e:#}")))?;

    for failure in &summary.failures {
        let err = ScanError::DetectorFailure {
            detector: failure.detector.clone(),
            message: failure.message.clone(),
        };
        warn!("{}", err);
    }

    // Detector registration order within each provider
    let mut by_npi: BTreeMap<String, Vec<SignalFinding>> = BTreeMap::new();
    for result in results {
        for finding in result.findings {
            by_npi.entry(finding.npi.clone()).or_default().push(finding);
        }
    }

    let index = source.identity_index()?;
    let mut dropped = 0usize;
    let mut unresolved = Vec::new();
    by_npi.retain(|npi, findings| {
        if index.get(npi).is_some() {
            return true;
        }
        let err = ScanError::IdentityLookupFailure { npi: npi.clone() };
        if index.is_ambiguous(npi) {
            warn!("{} (duplicate registry rows); dropping {} findings", err, findings.len());
        } else {
            warn!("{}; dropping {} findings", err, findings.len());
        }
        dropped += findings.len();
        unresolved.push(npi.clone());
        false
    });

    let attributed = source.attributed_totals()?;
    let scorer = RiskScorer::new(&config.scoring);
    let mut providers = Vec::with_capacity(by_npi.len());
    for (npi, findings) in &by_npi {
        let (Some(identity), Some(fca_relevance)) = (index.get(npi), scorer.fca_relevance(findings))
        else {
            continue;
        };
        let totals = attributed.get(npi).cloned().unwrap_or_default();
        let overpayment: f64 = findings.iter().map(|f| f.estimated_overpayment).sum();
        let signal_types: Vec<SignalKind> = findings
            .iter()
            .map(|f| f.signal_type)
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();

        providers.push(ProviderResult {
            identity: identity.clone(),
            findings: findings.clone(),
            total_billing: round2(totals.billing),
            total_claims: totals.claims,
            total_estimated_overpayment: round2(overpayment),
            signal_types,
            risk: scorer.score(findings, totals.billing),
            fca_relevance,
        });
    }

    providers.sort_by(|a, b| {
        b.risk
            .score
            .total_cmp(&a.risk.score)
            .then_with(|| b.total_estimated_overpayment.total_cmp(&a.total_estimated_overpayment))
            .then_with(|| a.npi().cmp(b.npi()))
    });

    let correlation = correlate(
        &by_npi,
        config.engine.max_pairs,
        config.engine.max_sample_providers,
    );

    let mut findings_by_signal: BTreeMap<SignalKind, usize> = BTreeMap::new();
    for finding in by_npi.values().flatten() {
        *findings_by_signal.entry(finding.signal_type).or_default() += 1;
    }

    let statistics = RunStatistics {
        providers_scanned: source.billing_totals()?.len(),
        providers_flagged: providers.len(),
        total_estimated_overpayment: round2(
            providers.iter().map(|p| p.total_estimated_overpayment).sum(),
        ),
        findings_emitted: summary.total_findings,
        findings_emitted_by_severity: summary.by_severity.clone(),
        findings_dropped: dropped,
        unresolved_npis: unresolved,
        detectors_run: summary.detectors_run,
        detectors_succeeded: summary.detectors_succeeded,
        detectors_failed: summary.detectors_failed,
        detector_failures: summary.failures.clone(),
        findings_by_signal,
        tier_distribution: TierDistribution::from_results(&providers),
    };

    debug!("Tier distribution: {:?}", statistics.tier_distribution);
    info!(
        "Scan complete: {} of {} providers flagged, ${:.2} estimated overpayment in {:?}",
        statistics.providers_flagged,
        statistics.providers_scanned,
        statistics.total_estimated_overpayment,
        start.elapsed()
    );

    Ok(RunOutput {
        providers,
        correlation,
        statistics,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Severity;
    use crate::testing::{exclusion, identity, source, tx};

    fn scan(src: crate::source::MemorySource) -> RunOutput {
        run_scan(Arc::new(src), EngineConfig::default(), None).unwrap()
    }

    #[test]
    fn test_empty_input() {
        let output = scan(source(vec![], vec![], vec![]));
        assert!(output.providers.is_empty());
        assert_eq!(output.correlation, CorrelationSummary::default());
        assert_eq!(output.statistics.providers_flagged, 0);
        assert_eq!(output.statistics.detectors_run, 19);
        assert_eq!(output.statistics.detectors_failed, 0);
        assert_eq!(output.statistics.total_estimated_overpayment, 0.0);
    }

    #[test]
    fn test_excluded_provider_scored() {
        let src = source(
            vec![
                tx("1000000001", "2022-02", 10_000.0, 20),
                tx("1000000001", "2022-05", 10_000.0, 20),
            ],
            vec![exclusion(Some("1000000001"), "John", "Doe", "2022-03-15")],
            vec![identity("1000000001")],
        );
        let output = scan(src);
        assert_eq!(output.providers.len(), 1);
        let provider = &output.providers[0];
        assert_eq!(provider.total_billing, 20_000.0);
        assert_eq!(provider.total_estimated_overpayment, 10_000.0);
        assert_eq!(provider.signal_types, vec![SignalKind::ExcludedProvider]);
        assert_eq!(provider.fca_relevance.primary_signal, SignalKind::ExcludedProvider);
        // 12 + 40 + 15
        assert_eq!(provider.risk.score, 67.0);
    }

    #[test]
    fn test_unresolved_npi_dropped_and_counted() {
        // Excluded by npi but absent from the identity registry
        let src = source(
            vec![tx("1000000009", "2022-05", 5_000.0, 10)],
            vec![exclusion(Some("1000000009"), "Jane", "Roe", "2022-01-01")],
            vec![],
        );
        let output = scan(src);
        assert!(output.providers.is_empty());
        assert_eq!(output.statistics.findings_emitted, 1);
        assert_eq!(output.statistics.findings_dropped, 1);
        assert_eq!(output.statistics.unresolved_npis, vec!["1000000009".to_string()]);
    }

    #[test]
    fn test_duplicate_identity_rows_drop_findings() {
        let src = source(
            vec![tx("1000000001", "2023-03", 50_000.0, 100)],
            vec![exclusion(Some("1000000001"), "John", "Doe", "2023-01-01")],
            vec![identity("1000000001"), identity("1000000001")],
        );
        let output = scan(src);
        assert!(output.providers.is_empty());
        assert_eq!(output.statistics.findings_emitted, 1);
        assert_eq!(output.statistics.findings_dropped, 1);
        assert_eq!(output.statistics.unresolved_npis, vec!["1000000001".to_string()]);
        assert_eq!(
            output.statistics.findings_emitted_by_severity.get(&Severity::Critical),
            Some(&1)
        );
    }

    #[test]
    fn test_invalid_config_rejected_before_detection() {
        let mut config = EngineConfig::default();
        config.thresholds.billing_outlier.percentile = 1.5;
        let err = run_scan(Arc::new(source(vec![], vec![], vec![])), config, None).unwrap_err();
        assert!(matches!(err, ScanError::Configuration(_)));
    }
}

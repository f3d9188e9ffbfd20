//! Detector execution engine with parallel support
//!
//! The DetectorEngine orchestrates the execution of all registered detectors:
//! - Skips signals disabled in the configuration
//! - Runs enabled detectors in parallel on a rayon pool
//! - Collects every result over a channel before returning
//! - Reports progress through callbacks
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────┐
//! │                    DetectorEngine                       │
//! ├─────────────────────────────────────────────────────────┤
//! │  1. Register detectors                                  │
//! │  2. Filter by [signals.<name>] enabled                  │
//! │  3. Spawn each detector on the pool (rayon)             │
//! │  4. Receive results until done or the deadline passes   │
//! │  5. Missing results become timed-out failures           │
//! └─────────────────────────────────────────────────────────┘
//! ```
//!
//! Collection is the single synchronization point of a run: nothing
//! downstream sees a finding until every detector has reported or been
//! written off.

use crate::config::EngineConfig;
use crate::detectors::base::{DetectionSummary, Detector, DetectorResult, ProgressCallback};
use crate::source::BillingSource;
use anyhow::Result;
use crossbeam_channel::RecvTimeoutError;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};

/// Orchestrates fraud signal detection across all registered detectors
pub struct DetectorEngine {
    /// Registered detectors
    detectors: Vec<Arc<dyn Detector>>,
    /// Number of worker threads for parallel execution
    workers: usize,
    /// Deadline for the whole detection phase
    timeout: Option<Duration>,
    /// Progress callback for reporting execution status
    progress_callback: Option<ProgressCallback>,
}

impl DetectorEngine {
    /// Create a new detector engine
    ///
    /// # Arguments
    /// * `workers` - Number of worker threads (0 = auto-detect)
    pub fn new(workers: usize) -> Self {
        let actual_workers = if workers == 0 {
            std::thread::available_parallelism()
                .map(|p| p.get())
                .unwrap_or(4)
                .min(16) // Cap at 16 threads
        } else {
            workers
        };

        Self {
            detectors: Vec::new(),
            workers: actual_workers,
            timeout: None,
            progress_callback: None,
        }
    }

    /// Bound the detection phase; late detectors are recorded as failures
    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    /// Set a progress callback
    pub fn with_progress_callback(mut self, callback: ProgressCallback) -> Self {
        self.progress_callback = Some(callback);
        self
    }

    /// Register a detector
    pub fn register(&mut self, detector: Arc<dyn Detector>) {
        debug!("Registering detector: {}", detector.name());
        self.detectors.push(detector);
    }

    /// Register multiple detectors at once
    pub fn register_all(&mut self, detectors: impl IntoIterator<Item = Arc<dyn Detector>>) {
        for detector in detectors {
            self.register(detector);
        }
    }

    /// Get the number of registered detectors
    pub fn detector_count(&self) -> usize {
        self.detectors.len()
    }

    /// Get names of all registered detectors
    pub fn detector_names(&self) -> Vec<&'static str> {
        self.detectors.iter().map(|d| d.name()).collect()
    }

    pub fn workers(&self) -> usize {
        self.workers
    }

    /// Run all enabled detectors and return one result per detector
    ///
    /// Results come back in registration order regardless of completion
    /// order. A detector that errors, panics or misses the deadline yields
    /// a failed result; the others are unaffected.
    pub fn run(
        &self,
        source: Arc<dyn BillingSource>,
        config: Arc<EngineConfig>,
    ) -> Result<(Vec<DetectorResult>, DetectionSummary)> {
        let start = Instant::now();

        let enabled: Vec<Arc<dyn Detector>> = self
            .detectors
            .iter()
            .filter(|d| {
                let on = config.is_signal_enabled(d.signal());
                if !on {
                    debug!("Skipping disabled detector: {}", d.name());
                }
                on
            })
            .cloned()
            .collect();

        info!(
            "Starting detection with {} detectors on {} workers",
            enabled.len(),
            self.workers
        );

        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(self.workers)
            .build()?;

        let (tx, rx) = crossbeam_channel::unbounded::<(usize, DetectorResult)>();
        for (idx, detector) in enabled.iter().enumerate() {
            let tx = tx.clone();
            let detector = Arc::clone(detector);
            let source = Arc::clone(&source);
            let config = Arc::clone(&config);
            pool.spawn(move || {
                let result = run_single_detector(&detector, source.as_ref(), &config);
                // Receiver is gone once the deadline has passed
                let _ = tx.send((idx, result));
            });
        }
        drop(tx);

        let total = enabled.len();
        let deadline = self.timeout.map(|t| start + t);
        let mut slots: Vec<Option<DetectorResult>> = vec![None; total];
        let mut received = 0;

        while received < total {
            let message = match deadline {
                Some(deadline) => match rx.recv_deadline(deadline) {
                    Ok(message) => message,
                    Err(RecvTimeoutError::Timeout) => {
                        warn!(
                            "Detection deadline reached with {} of {} detectors outstanding",
                            total - received,
                            total
                        );
                        break;
                    }
                    Err(RecvTimeoutError::Disconnected) => break,
                },
                None => match rx.recv() {
                    Ok(message) => message,
                    Err(_) => break,
                },
            };

            let (idx, result) = message;
            received += 1;
            if let Some(ref callback) = self.progress_callback {
                callback(&result.detector_name, received, total);
            }
            slots[idx] = Some(result);
        }

        let elapsed_ms = start.elapsed().as_millis() as u64;
        let mut results = Vec::with_capacity(total);
        let mut summary = DetectionSummary::default();

        for (slot, detector) in slots.into_iter().zip(&enabled) {
            let result = slot.unwrap_or_else(|| {
                let message = match self.timeout {
                    Some(t) => format!("Timed out after {}s", t.as_secs_f64()),
                    None => "Detector did not report a result".to_string(),
                };
                DetectorResult::failure(detector.name().to_string(), message, elapsed_ms)
            });
            if let Some(err) = &result.error {
                warn!("Detector {} failed: {}", result.detector_name, err);
            }
            summary.add_result(&result);
            results.push(result);
        }
        summary.total_duration_ms = elapsed_ms;

        info!(
            "Detection complete: {} findings from {}/{} detectors in {}ms",
            summary.total_findings,
            summary.detectors_succeeded,
            summary.detectors_run,
            summary.total_duration_ms
        );

        Ok((results, summary))
    }
}

/// Run a single detector with error handling and timing
fn run_single_detector(
    detector: &Arc<dyn Detector>,
    source: &dyn BillingSource,
    config: &EngineConfig,
) -> DetectorResult {
    let name = detector.name().to_string();
    let start = Instant::now();

    debug!("Running detector: {}", name);

    // Wrap in catch_unwind to handle panics
    let detect_result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
        detector.detect(source, config)
    }));

    let duration = start.elapsed().as_millis() as u64;
    match detect_result {
        Ok(Ok(findings)) => {
            let expected = detector.signal();
            if let Some(stray) = findings.iter().find(|f| f.signal_type != expected) {
                let message = format!(
                    "Emitted a {} finding, expected {}",
                    stray.signal_type, expected
                );
                error!("Detector {} returned malformed findings: {}", name, message);
                return DetectorResult::failure(name, message, duration);
            }

            debug!(
                "Detector {} found {} findings in {}ms",
                name,
                findings.len(),
                duration
            );

            DetectorResult::success(name, findings, duration)
        }
        Ok(Err(e)) => {
            warn!("Detector {} failed (query error): {:#}", name, e);
            DetectorResult::failure(name, format!("{e:#}"), duration)
        }
        Err(panic_info) => {
            let panic_msg = if let Some(s) = panic_info.downcast_ref::<&str>() {
                s.to_string()
            } else if let Some(s) = panic_info.downcast_ref::<String>() {
                s.clone()
            } else {
                "Unknown panic".to_string()
            };
            error!("Detector {} panicked: {}", name, panic_msg);
            DetectorResult::failure(name, format!("Panic: {}", panic_msg), duration)
        }
    }
}

impl Default for DetectorEngine {
    fn default() -> Self {
        Self::new(0)
    }
}

/// Builder for DetectorEngine with fluent API
pub struct DetectorEngineBuilder {
    workers: usize,
    timeout: Option<Duration>,
    detectors: Vec<Arc<dyn Detector>>,
    progress_callback: Option<ProgressCallback>,
}

impl DetectorEngineBuilder {
    /// Create a new builder
    pub fn new() -> Self {
        Self {
            workers: 0,
            timeout: None,
            detectors: Vec::new(),
            progress_callback: None,
        }
    }

    /// Set number of worker threads
    pub fn workers(mut self, workers: usize) -> Self {
        self.workers = workers;
        self
    }

    /// Set the detection-phase deadline
    pub fn timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    /// Add a detector
    pub fn detector(mut self, detector: Arc<dyn Detector>) -> Self {
        self.detectors.push(detector);
        self
    }

    /// Add multiple detectors
    pub fn detectors(mut self, detectors: impl IntoIterator<Item = Arc<dyn Detector>>) -> Self {
        self.detectors.extend(detectors);
        self
    }

    /// Set progress callback
    pub fn on_progress(mut self, callback: ProgressCallback) -> Self {
        self.progress_callback = Some(callback);
        self
    }

    /// Build the engine
    pub fn build(self) -> DetectorEngine {
        let mut engine = DetectorEngine::new(self.workers).with_timeout(self.timeout);

        if let Some(callback) = self.progress_callback {
            engine = engine.with_progress_callback(callback);
        }

        engine.register_all(self.detectors);
        engine
    }
}

impl Default for DetectorEngineBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Evidence, Severity, SignalFinding, SignalKind};
    use crate::source::MemorySource;
    use std::sync::atomic::{AtomicUsize, Ordering};

    enum Behavior {
        Findings(usize),
        Fail,
        Panic,
        Sleep(Duration),
        WrongSignal,
    }

    // Mock detector for testing
    struct MockDetector {
        name: &'static str,
        signal: SignalKind,
        behavior: Behavior,
    }

    fn monoculture_finding(npi: &str) -> SignalFinding {
        SignalFinding::new(
            npi,
            Severity::Medium,
            Evidence::BillingMonoculture {
                dominant_code: "T1019".into(),
                dominant_share_pct: 90.0,
                dominant_code_claims: 900,
                total_claims: 1000,
                total_billing: 1000.0,
            },
            10.0,
            "T1019",
        )
    }

    impl Detector for MockDetector {
        fn name(&self) -> &'static str {
            self.name
        }

        fn description(&self) -> &'static str {
            "Mock detector for testing"
        }

        fn signal(&self) -> SignalKind {
            self.signal
        }

        fn detect(
            &self,
            _source: &dyn BillingSource,
            _config: &EngineConfig,
        ) -> Result<Vec<SignalFinding>> {
            match &self.behavior {
                Behavior::Findings(n) => Ok((0..*n)
                    .map(|i| monoculture_finding(&format!("{}", 1000 + i)))
                    .collect()),
                Behavior::Fail => anyhow::bail!("query failed"),
                Behavior::Panic => panic!("boom"),
                Behavior::Sleep(d) => {
                    std::thread::sleep(*d);
                    Ok(vec![])
                }
                Behavior::WrongSignal => Ok(vec![monoculture_finding("1")]),
            }
        }
    }

    fn mock(name: &'static str, behavior: Behavior) -> Arc<dyn Detector> {
        let signal = match behavior {
            Behavior::WrongSignal => SignalKind::Upcoding,
            _ => SignalKind::BillingMonoculture,
        };
        Arc::new(MockDetector {
            name,
            signal,
            behavior,
        })
    }

    fn run(engine: &DetectorEngine, config: EngineConfig) -> (Vec<DetectorResult>, DetectionSummary) {
        engine
            .run(Arc::new(MemorySource::empty()), Arc::new(config))
            .unwrap()
    }

    #[test]
    fn test_engine_creation() {
        let engine = DetectorEngine::new(4);
        assert_eq!(engine.workers, 4);
        assert_eq!(engine.detector_count(), 0);
    }

    #[test]
    fn test_engine_default_workers() {
        let engine = DetectorEngine::new(0);
        assert!(engine.workers > 0);
        assert!(engine.workers <= 16);
    }

    #[test]
    fn test_register_detectors() {
        let mut engine = DetectorEngine::new(2);
        engine.register(mock("Detector1", Behavior::Findings(5)));
        engine.register(mock("Detector2", Behavior::Findings(3)));

        assert_eq!(engine.detector_count(), 2);
        assert_eq!(engine.detector_names(), vec!["Detector1", "Detector2"]);
    }

    #[test]
    fn test_results_in_registration_order() {
        let engine = DetectorEngineBuilder::new()
            .workers(4)
            .detector(mock("Slow", Behavior::Sleep(Duration::from_millis(50))))
            .detector(mock("Fast", Behavior::Findings(2)))
            .build();
        let (results, summary) = run(&engine, EngineConfig::default());
        assert_eq!(results[0].detector_name, "Slow");
        assert_eq!(results[1].detector_name, "Fast");
        assert_eq!(results[1].findings.len(), 2);
        assert_eq!(summary.detectors_succeeded, 2);
    }

    #[test]
    fn test_failures_are_isolated() {
        let engine = DetectorEngineBuilder::new()
            .workers(2)
            .detector(mock("Good", Behavior::Findings(1)))
            .detector(mock("Erroring", Behavior::Fail))
            .detector(mock("Panicking", Behavior::Panic))
            .build();
        let (results, summary) = run(&engine, EngineConfig::default());
        assert!(results[0].success);
        assert!(!results[1].success);
        assert!(results[1].error.as_deref().unwrap_or("").contains("query failed"));
        assert!(!results[2].success);
        assert!(results[2].error.as_deref().unwrap_or("").contains("boom"));
        assert_eq!(summary.detectors_run, 3);
        assert_eq!(summary.detectors_failed, 2);
        assert_eq!(summary.total_findings, 1);
    }

    #[test]
    fn test_mismatched_signal_is_failure() {
        let engine = DetectorEngineBuilder::new()
            .detector(mock("Confused", Behavior::WrongSignal))
            .build();
        let (results, _) = run(&engine, EngineConfig::default());
        assert!(!results[0].success);
    }

    #[test]
    fn test_timeout_records_failure() {
        let engine = DetectorEngineBuilder::new()
            .workers(2)
            .timeout(Some(Duration::from_millis(100)))
            .detector(mock("Quick", Behavior::Findings(1)))
            .detector(mock("Stuck", Behavior::Sleep(Duration::from_secs(3))))
            .build();
        let (results, summary) = run(&engine, EngineConfig::default());
        assert!(results[0].success);
        assert!(!results[1].success);
        assert!(results[1].error.as_deref().unwrap_or("").contains("Timed out"));
        assert_eq!(summary.detectors_failed, 1);
    }

    #[test]
    fn test_disabled_signals_are_skipped() {
        let config: EngineConfig =
            toml::from_str("[signals.billing-monoculture]\nenabled = false\n").unwrap();
        let engine = DetectorEngineBuilder::new()
            .detector(mock("Off", Behavior::Findings(1)))
            .build();
        let (results, summary) = run(&engine, config);
        assert!(results.is_empty());
        assert_eq!(summary.detectors_run, 0);
    }

    #[test]
    fn test_progress_callback() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        let engine = DetectorEngineBuilder::new()
            .detector(mock("A", Behavior::Findings(0)))
            .detector(mock("B", Behavior::Findings(0)))
            .on_progress(Box::new(move |_, _, total| {
                assert_eq!(total, 2);
                counter.fetch_add(1, Ordering::SeqCst);
            }))
            .build();
        run(&engine, EngineConfig::default());
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }
}

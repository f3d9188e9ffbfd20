//! Cross-signal correlation
//!
//! Providers flagged by several independent signals are the strongest
//! investigation leads. This module summarizes how signals co-occur across
//! the flagged population.
//!
//! # Example
//!
//! ```ignore
//! let summary = correlate(&findings_by_npi, 10, 10);
//! for pair in &summary.signal_pairs {
//!     println!("{} + {}: {}", pair.first, pair.second, pair.count);
//! }
//! ```

use crate::models::{SignalFinding, SignalKind};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use tracing::debug;

/// Number of providers flagged by both signals of a pair
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignalPairCount {
    /// Lexically smaller signal name
    pub first: SignalKind,
    pub second: SignalKind,
    pub count: usize,
}

/// Population-level co-occurrence statistics
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CorrelationSummary {
    pub total_providers_flagged: usize,
    /// Distinct signal count -> providers with that many signals
    pub providers_by_signal_count: BTreeMap<usize, usize>,
    /// Most frequent pairs, descending by count
    pub signal_pairs: Vec<SignalPairCount>,
    /// Distinct signal count (>= 2) -> sample of npis, ascending
    pub multi_signal_providers: BTreeMap<usize, Vec<String>>,
}

/// Correlate findings grouped by npi.
///
/// Pure function of its input: the same findings always produce the same
/// summary, whatever order they were produced in.
pub fn correlate(
    findings_by_npi: &BTreeMap<String, Vec<SignalFinding>>,
    max_pairs: usize,
    max_sample_providers: usize,
) -> CorrelationSummary {
    let mut summary = CorrelationSummary::default();
    let mut pair_counts: BTreeMap<(SignalKind, SignalKind), usize> = BTreeMap::new();

    for (npi, findings) in findings_by_npi {
        let mut kinds: Vec<SignalKind> = findings
            .iter()
            .map(|f| f.signal_type)
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();
        if kinds.is_empty() {
            continue;
        }
        kinds.sort_by_key(|k| k.as_str());

        summary.total_providers_flagged += 1;
        *summary.providers_by_signal_count.entry(kinds.len()).or_default() += 1;
        if kinds.len() >= 2 {
            let sample = summary.multi_signal_providers.entry(kinds.len()).or_default();
            if sample.len() < max_sample_providers {
                sample.push(npi.clone());
            }
        }

        for (i, first) in kinds.iter().enumerate() {
            for second in &kinds[i + 1..] {
                *pair_counts.entry((*first, *second)).or_default() += 1;
            }
        }
    }

    let mut pairs: Vec<SignalPairCount> = pair_counts
        .into_iter()
        .map(|((first, second), count)| SignalPairCount { first, second, count })
        .collect();
    pairs.sort_by(|a, b| {
        b.count
            .cmp(&a.count)
            .then_with(|| a.first.as_str().cmp(b.first.as_str()))
            .then_with(|| a.second.as_str().cmp(b.second.as_str()))
    });
    pairs.truncate(max_pairs);
    summary.signal_pairs = pairs;

    debug!(
        "Correlated {} flagged providers into {} signal pairs",
        summary.total_providers_flagged,
        summary.signal_pairs.len()
    );
    summary
}

//! Composite provider risk scorer

use crate::config::ScoringConfig;
use crate::methodology;
use crate::models::{FcaRelevance, RiskScore, RiskTier, ScoreComponent, ScoreFactor, SignalFinding, SignalKind};
use std::collections::BTreeSet;
use tracing::debug;

/// Maximum composite score
const MAX_SCORE: f64 = 100.0;

/// Scores one provider's findings against its billing
pub struct RiskScorer<'a> {
    config: &'a ScoringConfig,
}

impl<'a> RiskScorer<'a> {
    pub fn new(config: &'a ScoringConfig) -> Self {
        Self { config }
    }

    /// Calculate the composite score with its factor breakdown.
    ///
    /// Findings are put in a canonical order before anything is summed, so
    /// the result does not depend on the order detectors emitted them.
    pub fn score(&self, findings: &[SignalFinding], total_billing: f64) -> RiskScore {
        let mut ordered: Vec<&SignalFinding> = findings.iter().collect();
        ordered.sort_by(|a, b| {
            a.signal_type
                .cmp(&b.signal_type)
                .then_with(|| a.severity.cmp(&b.severity))
                .then_with(|| a.estimated_overpayment.total_cmp(&b.estimated_overpayment))
        });

        let distinct: BTreeSet<SignalKind> = ordered.iter().map(|f| f.signal_type).collect();
        let breadth = (distinct.len() as f64 * self.config.breadth_points_per_signal)
            .min(self.config.breadth_cap);

        let weighted: f64 = ordered
            .iter()
            .map(|f| {
                self.config.severity_weights.weight(f.severity) * self.config.signal_weight(f.signal_type)
            })
            .sum();
        let severity = (weighted / self.config.severity_divisor).min(self.config.severity_cap);

        let overpayment: f64 = ordered.iter().map(|f| f.estimated_overpayment).sum();
        let ratio = if total_billing > 0.0 {
            (overpayment / total_billing).min(1.0)
        } else {
            0.0
        };
        let overpayment_points = ratio * self.config.overpayment_cap;

        let raw = breadth + severity + overpayment_points;
        let score = (raw.clamp(0.0, MAX_SCORE) * 10.0).round() / 10.0;

        debug!(
            "Risk score {:.1}: breadth={:.1}, severity={:.1}, overpayment={:.1}",
            score, breadth, severity, overpayment_points
        );

        RiskScore {
            score,
            tier: RiskTier::from_score(score),
            factors: vec![
                ScoreFactor {
                    component: ScoreComponent::SignalBreadth,
                    value: distinct.len() as f64,
                    points: round_points(breadth),
                },
                ScoreFactor {
                    component: ScoreComponent::SeverityWeight,
                    value: round_points(weighted),
                    points: round_points(severity),
                },
                ScoreFactor {
                    component: ScoreComponent::OverpaymentRatio,
                    value: (ratio * 10_000.0).round() / 10_000.0,
                    points: round_points(overpayment_points),
                },
            ],
        }
    }

    /// Signal with the highest configured weight; enumeration order breaks ties
    pub fn primary_signal(&self, findings: &[SignalFinding]) -> Option<SignalKind> {
        let distinct: BTreeSet<SignalKind> = findings.iter().map(|f| f.signal_type).collect();
        distinct.into_iter().fold(None, |best, kind| match best {
            Some(b) if self.config.signal_weight(b) >= self.config.signal_weight(kind) => Some(b),
            _ => Some(kind),
        })
    }

    /// FCA framing keyed on the primary signal
    pub fn fca_relevance(&self, findings: &[SignalFinding]) -> Option<FcaRelevance> {
        self.primary_signal(findings).map(fca_relevance_for)
    }
}

fn round_points(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Methodology registry framing for one signal
pub fn fca_relevance_for(kind: SignalKind) -> FcaRelevance {
    let entry = methodology::entry(kind);
    FcaRelevance {
        primary_signal: kind,
        claim_type: entry.claim_type.to_string(),
        statute_reference: entry.statute.to_string(),
        suggested_next_steps: entry.next_steps.iter().map(|s| s.to_string()).collect(),
    }
}

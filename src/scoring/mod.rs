//! Provider Risk Scoring
//!
//! Every flagged provider gets a composite 0-100 score built from three
//! capped components, plus the False Claims Act framing of its primary
//! signal.
//!
//! # Scoring Formula
//!
//! ```text
//! Score = Breadth + Severity + Overpayment        (clamped to 0..=100)
//!
//!   Breadth     = min(distinct signals × 12, 30)
//!   Severity    = min(Σ severity_weight × signal_weight / 2, 40)
//!   Overpayment = min(overpayment / billing, 1.0) × 30
//! ```
//!
//! # Severity Weights
//!
//! - Critical: 10
//! - High: 7
//! - Medium: 4
//! - Low: 1
//!
//! Signal weights come from the methodology registry and can be overridden
//! under `[scoring.signal_weights]`.
//!
//! # Tiers
//!
//! Critical >= 75, High >= 50, Medium >= 25, otherwise Low. The tier is
//! computed on the score after rounding to one decimal.

mod risk_scorer;

pub use risk_scorer::{fca_relevance_for, RiskScorer};

//! Claimscan - fraud signal detection for healthcare billing data
//!
//! Runs independent fraud signal detectors over billing transactions,
//! exclusion records and a provider identity registry, then merges the
//! findings into a scored, correlated, FCA-framed view per provider.
//!
//! ```ignore
//! use claimscan::{config::EngineConfig, pipeline::run_scan, source::load_dir};
//! use std::sync::Arc;
//!
//! let source = load_dir(Path::new("./data"))?;
//! let output = run_scan(Arc::new(source), EngineConfig::default(), None)?;
//! ```

pub mod cli;
pub mod config;
pub mod detectors;
pub mod error;
pub mod methodology;
pub mod models;
pub mod pipeline;
pub mod scoring;
pub mod source;
pub mod stats;

#[cfg(test)]
mod testing;

pub use error::{ScanError, ScanResult, SourceError, SourceResult};
pub use pipeline::{run_scan, RunOutput};

//! Error types for claimscan

use thiserror::Error;

/// Errors surfaced by a scan run
#[derive(Error, Debug)]
pub enum ScanError {
    /// The data source failed its health check; nothing ran
    #[error("Data source unavailable: {0}")]
    DataSourceUnavailable(#[from] SourceError),

    /// A detector errored, panicked or missed the deadline; the run continues
    #[error("Detector '{detector}' failed: {message}")]
    DetectorFailure { detector: String, message: String },

    /// A finding referenced an npi with no identity record
    #[error("No provider identity for npi {npi}")]
    IdentityLookupFailure { npi: String },

    #[error("Invalid configuration: {0}")]
    Configuration(String),
}

pub type ScanResult<T> = Result<T, ScanError>;

/// Errors from the tabular data source seam
#[derive(Error, Debug)]
pub enum SourceError {
    #[error("Table '{table}' could not be read: {message}")]
    TableUnavailable { table: String, message: String },

    #[error("Malformed row in '{table}' at record {record}: {message}")]
    MalformedRow {
        table: String,
        record: u64,
        message: String,
    },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type SourceResult<T> = Result<T, SourceError>;

//! CSV loading for the command-line driver
//!
//! Expects `transactions.csv`, `exclusions.csv` and `identities.csv` in one
//! directory, with headers matching the model field names. Dates are
//! `YYYY-MM-DD`; service months use the first of the month.

use super::MemorySource;
use crate::error::{SourceError, SourceResult};
use crate::models::{ExclusionRecord, ProviderIdentity, Transaction};
use serde::de::DeserializeOwned;
use std::path::Path;

pub const TRANSACTIONS_FILE: &str = "transactions.csv";
pub const EXCLUSIONS_FILE: &str = "exclusions.csv";
pub const IDENTITIES_FILE: &str = "identities.csv";

/// Load the three tables from `dir` into a `MemorySource`
pub fn load_dir(dir: &Path) -> SourceResult<MemorySource> {
    let transactions: Vec<Transaction> = read_table(&dir.join(TRANSACTIONS_FILE), "transactions")?;
    let exclusions: Vec<ExclusionRecord> = read_table(&dir.join(EXCLUSIONS_FILE), "exclusions")?;
    let identities: Vec<ProviderIdentity> = read_table(&dir.join(IDENTITIES_FILE), "identities")?;

    tracing::info!(
        "Loaded {} transactions, {} exclusions, {} identities from {}",
        transactions.len(),
        exclusions.len(),
        identities.len(),
        dir.display()
    );

    Ok(MemorySource::new(transactions, exclusions, identities))
}

fn read_table<T: DeserializeOwned>(path: &Path, table: &str) -> SourceResult<Vec<T>> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .trim(csv::Trim::All)
        .from_path(path)
        .map_err(|e| SourceError::TableUnavailable {
            table: table.to_string(),
            message: format!("{}: {e}", path.display()),
        })?;

    let mut rows = Vec::new();
    for (i, result) in reader.deserialize().enumerate() {
        let row: T = result.map_err(|e| SourceError::MalformedRow {
            table: table.to_string(),
            record: i as u64 + 1,
            message: e.to_string(),
        })?;
        rows.push(row);
    }
    tracing::debug!("Read {} rows from {}", rows.len(), path.display());
    Ok(rows)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::BillingSource;
    use tempfile::TempDir;

    fn write(dir: &Path, name: &str, body: &str) {
        std::fs::write(dir.join(name), body).unwrap();
    }

    #[test]
    fn test_load_dir_reads_all_tables() {
        let dir = TempDir::new().unwrap();
        write(
            dir.path(),
            TRANSACTIONS_FILE,
            "billing_npi,servicing_npi,procedure_code,service_month,beneficiaries,claims,amount,service_state,service_zip\n\
             1000000001,,99213,2023-03-01,5,10,1500.50,,\n\
             1000000001,1000000002,T1019,2023-04-01,3,40,800,NY,10001\n",
        );
        write(
            dir.path(),
            EXCLUSIONS_FILE,
            "last_name,first_name,business_name,npi,state,exclusion_type,effective_date,reinstatement_date\n\
             DOE,JOHN,,1000000001,NY,1128a1,2023-01-01,\n",
        );
        write(
            dir.path(),
            IDENTITIES_FILE,
            "npi,entity_type,display_name,taxonomy_code,state,postal_code,enrollment_date,authorized_official\n\
             1000000001,1,JOHN DOE,207Q00000X,NY,10001,2019-05-01,\n\
             1000000002,organization,ACME HOME CARE,251E00000X,NY,10001,,JANE ROE\n",
        );

        let source = load_dir(dir.path()).unwrap();
        let txs = source.transactions().unwrap();
        assert_eq!(txs.len(), 2);
        assert!(txs[0].servicing_npi.is_none());
        assert_eq!(txs[1].service_state.as_deref(), Some("NY"));

        let exclusions = source.exclusions().unwrap();
        assert!(exclusions[0].reinstatement_date.is_none());

        let index = source.identity_index().unwrap();
        assert!(index.get("1000000001").unwrap().is_individual());
        assert!(index.get("1000000002").unwrap().is_organization());
        assert!(index.get("1000000002").unwrap().enrollment_date.is_none());
    }

    #[test]
    fn test_missing_table_is_unavailable() {
        let dir = TempDir::new().unwrap();
        let err = load_dir(dir.path()).unwrap_err();
        assert!(matches!(err, SourceError::TableUnavailable { .. }));
    }
}

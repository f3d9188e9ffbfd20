//! Shared fixtures for unit tests

use crate::models::{EntityType, ExclusionRecord, ProviderIdentity, Transaction};
use crate::source::MemorySource;
use chrono::NaiveDate;

/// First day of a "YYYY-MM" month
pub fn month(ym: &str) -> NaiveDate {
    NaiveDate::parse_from_str(&format!("{ym}-01"), "%Y-%m-%d").unwrap()
}

/// A "YYYY-MM-DD" date
pub fn date(ymd: &str) -> NaiveDate {
    NaiveDate::parse_from_str(ymd, "%Y-%m-%d").unwrap()
}

/// Office visit row with one beneficiary per claim
pub fn tx(billing_npi: &str, ym: &str, amount: f64, claims: u64) -> Transaction {
    tx_code(billing_npi, ym, "99213", amount, claims)
}

pub fn tx_code(billing_npi: &str, ym: &str, code: &str, amount: f64, claims: u64) -> Transaction {
    Transaction {
        billing_npi: billing_npi.to_string(),
        servicing_npi: None,
        procedure_code: code.to_string(),
        service_month: month(ym),
        beneficiaries: claims,
        claims,
        amount,
        service_state: None,
        service_zip: None,
    }
}

/// Individual practitioner in NY, enrolled long ago
pub fn identity(npi: &str) -> ProviderIdentity {
    ProviderIdentity {
        npi: npi.to_string(),
        entity_type: EntityType::Individual,
        display_name: format!("PROVIDER {npi}"),
        taxonomy_code: Some("207Q00000X".to_string()),
        state: Some("NY".to_string()),
        postal_code: Some("10001".to_string()),
        enrollment_date: Some(date("2010-01-01")),
        authorized_official: None,
    }
}

/// Home health organization in NY, enrolled long ago
pub fn org(npi: &str) -> ProviderIdentity {
    ProviderIdentity {
        entity_type: EntityType::Organization,
        display_name: format!("AGENCY {npi}"),
        taxonomy_code: Some("251E00000X".to_string()),
        ..identity(npi)
    }
}

pub fn exclusion(npi: Option<&str>, first: &str, last: &str, effective: &str) -> ExclusionRecord {
    ExclusionRecord {
        last_name: Some(last.to_string()),
        first_name: Some(first.to_string()),
        business_name: None,
        npi: npi.map(str::to_string),
        state: None,
        exclusion_type: "1128a1".to_string(),
        effective_date: date(effective),
        reinstatement_date: None,
    }
}

pub fn source(
    transactions: Vec<Transaction>,
    exclusions: Vec<ExclusionRecord>,
    identities: Vec<ProviderIdentity>,
) -> MemorySource {
    MemorySource::new(transactions, exclusions, identities)
}

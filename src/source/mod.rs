//! Tabular data source seam
//!
//! Detectors never touch storage directly. They read the three logical
//! tables and a handful of derived relational views through the
//! `BillingSource` trait:
//!
//! ```text
//!   transactions ──┬── billing_totals        (per billing npi)
//!                  ├── attributed_totals     (billing or servicing npi)
//!                  ├── provider_months       (npi x month)
//!                  ├── provider_codes        (npi x procedure code)
//!                  ├── provider_month_states (npi x month -> service states)
//!                  ├── workforce_months      (npi x month -> distinct workers)
//!                  └── servicing_hubs        (servicing npi -> billing npis)
//!   identities ────── identity_index         (npi -> unique identity row)
//!   exclusions
//! ```
//!
//! Every derived view has a default implementation computed from the raw
//! tables, so a backend only has to supply rows. A backend with query
//! pushdown may override any view.

mod csv_loader;
mod memory;

pub use csv_loader::load_dir;
pub use memory::MemorySource;

use crate::error::SourceResult;
use crate::models::{ExclusionRecord, ProviderIdentity, Transaction};
use chrono::NaiveDate;
use rustc_hash::{FxHashMap, FxHashSet};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

/// Lifetime totals for one npi
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProviderTotals {
    pub billing: f64,
    pub claims: u64,
    pub beneficiaries: u64,
    pub active_months: usize,
}

/// Billing for one npi in one month
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MonthTotals {
    pub billing: f64,
    pub claims: u64,
    pub beneficiaries: u64,
}

/// Billing for one npi under one procedure code
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CodeTotals {
    pub billing: f64,
    pub claims: u64,
    pub beneficiaries: u64,
}

/// Service states for one npi in one month
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StateMonth {
    pub states: BTreeSet<String>,
    pub billing: f64,
    pub claims: u64,
}

/// Claims and distinct servicing workers for one billing npi in one month
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WorkforceMonth {
    pub claims: u64,
    pub billing: f64,
    pub workers: u64,
}

/// Everything billed under one servicing npi by other billing npis
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ServicingHub {
    pub billing_npis: BTreeSet<String>,
    pub billing: f64,
    pub claims: u64,
    pub beneficiaries: u64,
}

/// Identity rows keyed by npi
///
/// An npi with more than one registry row cannot be resolved to a single
/// identity. It is left out of `by_npi` and recorded in `ambiguous`, so
/// lookups for it fail the same way a missing npi does.
#[derive(Debug, Clone, Default)]
pub struct IdentityIndex {
    pub by_npi: BTreeMap<String, ProviderIdentity>,
    /// Npis that appear on more than one identity row
    pub ambiguous: BTreeSet<String>,
    /// Identity rows beyond the first for each ambiguous npi
    pub duplicates: usize,
}

impl IdentityIndex {
    pub fn get(&self, npi: &str) -> Option<&ProviderIdentity> {
        self.by_npi.get(npi)
    }

    pub fn is_ambiguous(&self, npi: &str) -> bool {
        self.ambiguous.contains(npi)
    }

    pub fn len(&self) -> usize {
        self.by_npi.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_npi.is_empty()
    }
}

pub type TotalsByNpi = BTreeMap<String, ProviderTotals>;
pub type MonthsByNpi = BTreeMap<String, BTreeMap<NaiveDate, MonthTotals>>;
pub type CodesByNpi = BTreeMap<String, BTreeMap<String, CodeTotals>>;
pub type StatesByNpi = BTreeMap<String, BTreeMap<NaiveDate, StateMonth>>;
pub type WorkforceByNpi = BTreeMap<String, BTreeMap<NaiveDate, WorkforceMonth>>;
pub type HubsByNpi = BTreeMap<String, ServicingHub>;

/// Query interface over the billing dataset and its reference registries
pub trait BillingSource: Send + Sync {
    /// Verify the source can serve queries before any detector runs
    fn health_check(&self) -> SourceResult<()>;

    fn transactions(&self) -> SourceResult<Arc<[Transaction]>>;

    fn exclusions(&self) -> SourceResult<Arc<[ExclusionRecord]>>;

    fn identities(&self) -> SourceResult<Arc<[ProviderIdentity]>>;

    /// Identity rows keyed by npi
    fn identity_index(&self) -> SourceResult<Arc<IdentityIndex>> {
        Ok(Arc::new(build_identity_index(&self.identities()?)))
    }

    /// Totals keyed by billing npi
    fn billing_totals(&self) -> SourceResult<Arc<TotalsByNpi>> {
        Ok(Arc::new(build_billing_totals(&self.transactions()?)))
    }

    /// Totals for every npi appearing as billing or distinct servicing npi
    fn attributed_totals(&self) -> SourceResult<Arc<TotalsByNpi>> {
        Ok(Arc::new(build_attributed_totals(&self.transactions()?)))
    }

    /// Monthly totals keyed by billing npi
    fn provider_months(&self) -> SourceResult<Arc<MonthsByNpi>> {
        Ok(Arc::new(build_provider_months(&self.transactions()?)))
    }

    /// Procedure-code totals keyed by billing npi
    fn provider_codes(&self) -> SourceResult<Arc<CodesByNpi>> {
        Ok(Arc::new(build_provider_codes(&self.transactions()?)))
    }

    /// Distinct service states per billing npi and month
    fn provider_month_states(&self) -> SourceResult<Arc<StatesByNpi>> {
        let index = self.identity_index()?;
        Ok(Arc::new(build_provider_month_states(
            &self.transactions()?,
            &index,
        )))
    }

    /// Claims and distinct servicing workers per billing npi and month
    fn workforce_months(&self) -> SourceResult<Arc<WorkforceByNpi>> {
        Ok(Arc::new(build_workforce_months(&self.transactions()?)))
    }

    /// Rows with a distinct servicing npi, keyed by that servicing npi
    fn servicing_hubs(&self) -> SourceResult<Arc<HubsByNpi>> {
        Ok(Arc::new(build_servicing_hubs(&self.transactions()?)))
    }
}

pub(crate) fn build_identity_index(identities: &[ProviderIdentity]) -> IdentityIndex {
    let mut index = IdentityIndex::default();
    for identity in identities {
        if index.ambiguous.contains(&identity.npi) {
            index.duplicates += 1;
            continue;
        }
        if index.by_npi.remove(&identity.npi).is_some() {
            index.duplicates += 1;
            index.ambiguous.insert(identity.npi.clone());
            continue;
        }
        index.by_npi.insert(identity.npi.clone(), identity.clone());
    }
    if !index.ambiguous.is_empty() {
        tracing::warn!(
            "Identity registry has {} npis with duplicate rows ({} extra rows); their findings will be dropped",
            index.ambiguous.len(),
            index.duplicates
        );
    }
    index
}

fn add_to_totals(
    totals: &mut TotalsByNpi,
    months: &mut FxHashMap<String, FxHashSet<NaiveDate>>,
    npi: &str,
    tx: &Transaction,
) {
    let entry = totals.entry(npi.to_string()).or_default();
    entry.billing += tx.amount;
    entry.claims += tx.claims;
    entry.beneficiaries += tx.beneficiaries;
    months
        .entry(npi.to_string())
        .or_default()
        .insert(tx.service_month);
}

fn finish_totals(
    mut totals: TotalsByNpi,
    months: FxHashMap<String, FxHashSet<NaiveDate>>,
) -> TotalsByNpi {
    for (npi, set) in months {
        if let Some(t) = totals.get_mut(&npi) {
            t.active_months = set.len();
        }
    }
    totals
}

pub(crate) fn build_billing_totals(transactions: &[Transaction]) -> TotalsByNpi {
    let mut totals = TotalsByNpi::new();
    let mut months: FxHashMap<String, FxHashSet<NaiveDate>> = FxHashMap::default();
    for tx in transactions {
        add_to_totals(&mut totals, &mut months, &tx.billing_npi, tx);
    }
    finish_totals(totals, months)
}

pub(crate) fn build_attributed_totals(transactions: &[Transaction]) -> TotalsByNpi {
    let mut totals = TotalsByNpi::new();
    let mut months: FxHashMap<String, FxHashSet<NaiveDate>> = FxHashMap::default();
    for tx in transactions {
        add_to_totals(&mut totals, &mut months, &tx.billing_npi, tx);
        if let Some(servicing) = tx.distinct_servicing_npi() {
            add_to_totals(&mut totals, &mut months, servicing, tx);
        }
    }
    finish_totals(totals, months)
}

pub(crate) fn build_provider_months(transactions: &[Transaction]) -> MonthsByNpi {
    let mut out = MonthsByNpi::new();
    for tx in transactions {
        let month = out
            .entry(tx.billing_npi.clone())
            .or_default()
            .entry(tx.service_month)
            .or_default();
        month.billing += tx.amount;
        month.claims += tx.claims;
        month.beneficiaries += tx.beneficiaries;
    }
    out
}

pub(crate) fn build_provider_codes(transactions: &[Transaction]) -> CodesByNpi {
    let mut out = CodesByNpi::new();
    for tx in transactions {
        let code = out
            .entry(tx.billing_npi.clone())
            .or_default()
            .entry(tx.procedure_code.trim().to_string())
            .or_default();
        code.billing += tx.amount;
        code.claims += tx.claims;
        code.beneficiaries += tx.beneficiaries;
    }
    out
}

/// Service state of a row: its own state, else the servicing provider's
/// registry state (the billing provider when no servicing npi is given).
fn resolve_service_state(tx: &Transaction, index: &IdentityIndex) -> Option<String> {
    if let Some(state) = tx.service_state.as_deref().map(str::trim) {
        if !state.is_empty() {
            return Some(state.to_ascii_uppercase());
        }
    }
    let npi = tx
        .servicing_npi
        .as_deref()
        .filter(|s| !s.trim().is_empty())
        .unwrap_or(&tx.billing_npi);
    index
        .get(npi)
        .and_then(|id| id.state.as_deref())
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_ascii_uppercase)
}

pub(crate) fn build_provider_month_states(
    transactions: &[Transaction],
    index: &IdentityIndex,
) -> StatesByNpi {
    let mut out = StatesByNpi::new();
    for tx in transactions {
        let month = out
            .entry(tx.billing_npi.clone())
            .or_default()
            .entry(tx.service_month)
            .or_default();
        if let Some(state) = resolve_service_state(tx, index) {
            month.states.insert(state);
        }
        month.billing += tx.amount;
        month.claims += tx.claims;
    }
    out
}

pub(crate) fn build_workforce_months(transactions: &[Transaction]) -> WorkforceByNpi {
    let mut workers: FxHashMap<(&str, NaiveDate), FxHashSet<&str>> = FxHashMap::default();
    let mut out = WorkforceByNpi::new();
    for tx in transactions {
        let month = out
            .entry(tx.billing_npi.clone())
            .or_default()
            .entry(tx.service_month)
            .or_default();
        month.claims += tx.claims;
        month.billing += tx.amount;
        let worker = tx
            .servicing_npi
            .as_deref()
            .filter(|s| !s.trim().is_empty())
            .unwrap_or(&tx.billing_npi);
        workers
            .entry((tx.billing_npi.as_str(), tx.service_month))
            .or_default()
            .insert(worker);
    }
    for ((npi, month), set) in workers {
        if let Some(m) = out.get_mut(npi).and_then(|months| months.get_mut(&month)) {
            m.workers = (set.len() as u64).max(1);
        }
    }
    out
}

pub(crate) fn build_servicing_hubs(transactions: &[Transaction]) -> HubsByNpi {
    let mut out = HubsByNpi::new();
    for tx in transactions {
        let Some(servicing) = tx.distinct_servicing_npi() else {
            continue;
        };
        let hub = out.entry(servicing.to_string()).or_default();
        if !hub.billing_npis.contains(&tx.billing_npi) {
            hub.billing_npis.insert(tx.billing_npi.clone());
        }
        hub.billing += tx.amount;
        hub.claims += tx.claims;
        hub.beneficiaries += tx.beneficiaries;
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{identity, month, org, tx};

    #[test]
    fn test_attributed_totals_include_servicing_npi() {
        let mut row = tx("1", "2023-01", 100.0, 10);
        row.servicing_npi = Some("2".into());
        let same = tx("1", "2023-02", 50.0, 5);
        let totals = build_attributed_totals(&[row, same]);
        assert_eq!(totals["1"].billing, 150.0);
        assert_eq!(totals["1"].active_months, 2);
        assert_eq!(totals["2"].billing, 100.0);
        assert_eq!(totals["2"].claims, 10);
    }

    #[test]
    fn test_identity_index_duplicate_npi_is_ambiguous() {
        let mut second = identity("1");
        second.display_name = "DUPLICATE".into();
        let third = identity("1");
        let index = build_identity_index(&[identity("1"), second, identity("2"), third]);
        assert_eq!(index.len(), 1);
        assert_eq!(index.duplicates, 2);
        assert!(index.get("1").is_none());
        assert!(index.is_ambiguous("1"));
        assert!(index.get("2").is_some());
        assert!(!index.is_ambiguous("2"));
    }

    #[test]
    fn test_service_state_falls_back_to_registry() {
        let mut servicing = identity("2");
        servicing.state = Some("TX".into());
        let index = build_identity_index(&[org("1"), servicing]);
        let mut a = tx("1", "2023-01", 10.0, 1);
        a.servicing_npi = Some("2".into());
        let mut b = tx("1", "2023-01", 10.0, 1);
        b.service_state = Some("ca".into());
        let states = build_provider_month_states(&[a, b], &index);
        let m = &states["1"][&month("2023-01")];
        assert_eq!(
            m.states.iter().cloned().collect::<Vec<_>>(),
            vec!["CA".to_string(), "TX".to_string()]
        );
    }

    #[test]
    fn test_workforce_counts_distinct_servicing_npis() {
        let rows: Vec<Transaction> = ["a", "b", "b"]
            .iter()
            .map(|s| {
                let mut row = tx("1", "2023-01", 10.0, 100);
                row.servicing_npi = Some((*s).into());
                row
            })
            .collect();
        let wf = build_workforce_months(&rows);
        let m = &wf["1"][&month("2023-01")];
        assert_eq!(m.workers, 2);
        assert_eq!(m.claims, 300);
    }

    #[test]
    fn test_servicing_hubs_skip_self_servicing_rows() {
        let serviced = |billing: &str, servicing: &str| {
            let mut row = tx(billing, "2023-01", 100.0, 10);
            row.servicing_npi = Some(servicing.into());
            row
        };
        let rows = vec![
            serviced("1", "9"),
            serviced("2", "9"),
            serviced("2", "9"),
            serviced("3", "3"),
            tx("4", "2023-01", 100.0, 10),
        ];
        let hubs = build_servicing_hubs(&rows);
        assert_eq!(hubs.len(), 1);
        let hub = &hubs["9"];
        assert_eq!(hub.billing_npis.len(), 2);
        assert_eq!(hub.billing, 300.0);
        assert_eq!(hub.claims, 30);
    }
}

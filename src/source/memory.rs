//! In-memory billing source with memoised derived views

use super::{
    build_attributed_totals, build_billing_totals, build_identity_index,
    build_provider_codes, build_provider_month_states, build_provider_months,
    build_servicing_hubs, build_workforce_months, BillingSource, CodesByNpi, HubsByNpi,
    IdentityIndex, MonthsByNpi, StatesByNpi, TotalsByNpi, WorkforceByNpi,
};
use crate::error::SourceResult;
use crate::models::{ExclusionRecord, ProviderIdentity, Transaction};
use std::sync::{Arc, OnceLock};

/// Billing source over tables held in memory.
///
/// Each derived view is computed once, on first request, and shared
/// between detectors afterwards.
pub struct MemorySource {
    transactions: Arc<[Transaction]>,
    exclusions: Arc<[ExclusionRecord]>,
    identities: Arc<[ProviderIdentity]>,
    identity_index: OnceLock<Arc<IdentityIndex>>,
    billing_totals: OnceLock<Arc<TotalsByNpi>>,
    attributed_totals: OnceLock<Arc<TotalsByNpi>>,
    provider_months: OnceLock<Arc<MonthsByNpi>>,
    provider_codes: OnceLock<Arc<CodesByNpi>>,
    provider_month_states: OnceLock<Arc<StatesByNpi>>,
    workforce_months: OnceLock<Arc<WorkforceByNpi>>,
    servicing_hubs: OnceLock<Arc<HubsByNpi>>,
}

impl MemorySource {
    pub fn new(
        transactions: Vec<Transaction>,
        exclusions: Vec<ExclusionRecord>,
        identities: Vec<ProviderIdentity>,
    ) -> Self {
        Self {
            transactions: transactions.into(),
            exclusions: exclusions.into(),
            identities: identities.into(),
            identity_index: OnceLock::new(),
            billing_totals: OnceLock::new(),
            attributed_totals: OnceLock::new(),
            provider_months: OnceLock::new(),
            provider_codes: OnceLock::new(),
            provider_month_states: OnceLock::new(),
            workforce_months: OnceLock::new(),
            servicing_hubs: OnceLock::new(),
        }
    }

    /// A source with no rows in any table
    pub fn empty() -> Self {
        Self::new(Vec::new(), Vec::new(), Vec::new())
    }

    pub fn transaction_count(&self) -> usize {
        self.transactions.len()
    }
}

impl std::fmt::Debug for MemorySource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemorySource")
            .field("transactions", &self.transactions.len())
            .field("exclusions", &self.exclusions.len())
            .field("identities", &self.identities.len())
            .finish()
    }
}

impl BillingSource for MemorySource {
    fn health_check(&self) -> SourceResult<()> {
        Ok(())
    }

    fn transactions(&self) -> SourceResult<Arc<[Transaction]>> {
        Ok(Arc::clone(&self.transactions))
    }

    fn exclusions(&self) -> SourceResult<Arc<[ExclusionRecord]>> {
        Ok(Arc::clone(&self.exclusions))
    }

    fn identities(&self) -> SourceResult<Arc<[ProviderIdentity]>> {
        Ok(Arc::clone(&self.identities))
    }

    fn identity_index(&self) -> SourceResult<Arc<IdentityIndex>> {
        Ok(Arc::clone(self.identity_index.get_or_init(|| {
            Arc::new(build_identity_index(&self.identities))
        })))
    }

    fn billing_totals(&self) -> SourceResult<Arc<TotalsByNpi>> {
        Ok(Arc::clone(self.billing_totals.get_or_init(|| {
            Arc::new(build_billing_totals(&self.transactions))
        })))
    }

    fn attributed_totals(&self) -> SourceResult<Arc<TotalsByNpi>> {
        Ok(Arc::clone(self.attributed_totals.get_or_init(|| {
            Arc::new(build_attributed_totals(&self.transactions))
        })))
    }

    fn provider_months(&self) -> SourceResult<Arc<MonthsByNpi>> {
        Ok(Arc::clone(self.provider_months.get_or_init(|| {
            Arc::new(build_provider_months(&self.transactions))
        })))
    }

    fn provider_codes(&self) -> SourceResult<Arc<CodesByNpi>> {
        Ok(Arc::clone(self.provider_codes.get_or_init(|| {
            Arc::new(build_provider_codes(&self.transactions))
        })))
    }

    fn provider_month_states(&self) -> SourceResult<Arc<StatesByNpi>> {
        let index = self.identity_index()?;
        Ok(Arc::clone(self.provider_month_states.get_or_init(|| {
            Arc::new(build_provider_month_states(&self.transactions, &index))
        })))
    }

    fn workforce_months(&self) -> SourceResult<Arc<WorkforceByNpi>> {
        Ok(Arc::clone(self.workforce_months.get_or_init(|| {
            Arc::new(build_workforce_months(&self.transactions))
        })))
    }

    fn servicing_hubs(&self) -> SourceResult<Arc<HubsByNpi>> {
        Ok(Arc::clone(self.servicing_hubs.get_or_init(|| {
            Arc::new(build_servicing_hubs(&self.transactions))
        })))
    }
}

//! Ledger facade.
//!
//! [`LedgerEngine`] ties the pure rules to a [`LedgerStore`]. Every mutating
//! operation reads what it needs, validates it, and writes a single
//! [`WriteBatch`]; a rejected request never reaches the store.

mod accounts;
mod entries;
mod periods;
mod reports;

use quire_shared::types::{AccountId, FiscalYearId, JournalEntryId, MonthlyPeriodId};
use tracing::{error, warn};

use crate::accounts::{Account, ChartOfAccounts};
use crate::clock::{Clock, SystemClock};
use crate::error::LedgerError;
use crate::fiscal::{FiscalYear, MonthlyPeriod};
use crate::ledger::JournalEntry;
use crate::policy::LedgerPolicy;
use crate::store::{CommitReceipt, LedgerStore, WriteBatch};

/// Entry point for every ledger operation.
#[derive(Debug)]
pub struct LedgerEngine<S, C = SystemClock> {
    store: S,
    clock: C,
    policy: LedgerPolicy,
}

impl<S: LedgerStore> LedgerEngine<S> {
    /// Creates an engine on the wall clock.
    #[must_use]
    pub const fn new(store: S, policy: LedgerPolicy) -> Self {
        Self::with_clock(store, SystemClock, policy)
    }
}

impl<S: LedgerStore, C: Clock> LedgerEngine<S, C> {
    /// Creates an engine with an explicit clock.
    #[must_use]
    pub const fn with_clock(store: S, clock: C, policy: LedgerPolicy) -> Self {
        Self {
            store,
            clock,
            policy,
        }
    }

    /// The underlying store.
    #[must_use]
    pub const fn store(&self) -> &S {
        &self.store
    }

    /// Active behaviour switches.
    #[must_use]
    pub const fn policy(&self) -> &LedgerPolicy {
        &self.policy
    }

    async fn load_chart(&self) -> Result<ChartOfAccounts, LedgerError> {
        let accounts = self.store.accounts().await.map_err(LedgerError::storage)?;
        ChartOfAccounts::build(accounts)
    }

    async fn require_account(&self, id: AccountId) -> Result<Account, LedgerError> {
        self.store
            .account(id)
            .await
            .map_err(LedgerError::storage)?
            .ok_or(LedgerError::AccountNotFound(id))
    }

    async fn require_year(&self, id: FiscalYearId) -> Result<FiscalYear, LedgerError> {
        self.store
            .fiscal_year(id)
            .await
            .map_err(LedgerError::storage)?
            .ok_or(LedgerError::FiscalYearNotFound(id))
    }

    async fn require_period(&self, id: MonthlyPeriodId) -> Result<MonthlyPeriod, LedgerError> {
        self.store
            .period(id)
            .await
            .map_err(LedgerError::storage)?
            .ok_or(LedgerError::PeriodNotFound(id))
    }

    async fn require_entry(&self, id: JournalEntryId) -> Result<JournalEntry, LedgerError> {
        self.store
            .entry(id)
            .await
            .map_err(LedgerError::storage)?
            .ok_or(LedgerError::EntryNotFound(id))
    }

    /// Fiscal year and month containing `date`. Active years win over
    /// inactive ones covering the same date.
    async fn find_month(
        &self,
        date: chrono::NaiveDate,
    ) -> Result<Option<(FiscalYear, MonthlyPeriod)>, LedgerError> {
        let mut years: Vec<FiscalYear> = self
            .store
            .fiscal_years()
            .await
            .map_err(LedgerError::storage)?
            .into_iter()
            .filter(|y| y.contains_date(date))
            .collect();
        years.sort_by_key(|y| !y.is_active);

        for year in years {
            let periods = self
                .store
                .periods(year.id)
                .await
                .map_err(LedgerError::storage)?;
            if let Some(month) = periods.into_iter().find(|m| m.contains_date(date)) {
                return Ok(Some((year, month)));
            }
        }
        Ok(None)
    }

    async fn commit(&self, batch: WriteBatch) -> Result<CommitReceipt, LedgerError> {
        self.store.commit(batch).await.map_err(LedgerError::commit)
    }
}

/// Logs a failed operation: rejections at warn, infrastructure failures at
/// error.
fn log_failure(operation: &'static str, err: &LedgerError) {
    if err.is_caller_fixable() {
        warn!(operation, code = err.error_code(), error = %err, "Ledger operation rejected");
    } else {
        error!(operation, code = err.error_code(), error = %err, "Ledger operation failed");
    }
}

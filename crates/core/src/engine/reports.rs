//! Read-only queries: balances, trial balance, account ledgers, readiness.

use quire_shared::types::AccountId;
use tracing::debug;

use super::{LedgerEngine, log_failure};
use crate::accounts::ChartOfAccounts;
use crate::clock::Clock;
use crate::error::LedgerError;
use crate::fiscal::{DateWindow, PeriodScope, ReadinessReport};
use crate::ledger::{AccountBalances, AccountLedger, BalanceAggregator, MovementProcessor, TrialBalance};
use crate::store::{EntryQuery, LedgerStore};

impl<S: LedgerStore, C: Clock> LedgerEngine<S, C> {
    /// Current chart of accounts.
    ///
    /// # Errors
    ///
    /// Returns a storage error, or `AccountCycle`/`AccountNotFound` if the
    /// stored tree is corrupt.
    pub async fn chart_of_accounts(&self) -> Result<ChartOfAccounts, LedgerError> {
        self.load_chart()
            .await
            .inspect_err(|e| log_failure("chart_of_accounts", e))
    }

    /// Balances of every account over a fiscal year or month, rolled up the
    /// tree.
    ///
    /// # Errors
    ///
    /// Returns `FiscalYearNotFound`/`PeriodNotFound` or a storage error.
    pub async fn compute_account_balances(
        &self,
        scope: PeriodScope,
    ) -> Result<AccountBalances, LedgerError> {
        self.balances(scope)
            .await
            .map(|(_, balances)| balances)
            .inspect_err(|e| log_failure("compute_account_balances", e))
    }

    /// Net debit/credit position of every account with activity in scope.
    ///
    /// # Errors
    ///
    /// Same as [`LedgerEngine::compute_account_balances`].
    pub async fn trial_balance(&self, scope: PeriodScope) -> Result<TrialBalance, LedgerError> {
        self.balances(scope)
            .await
            .map(|(chart, balances)| TrialBalance::from_balances(&chart, &balances))
            .inspect_err(|e| log_failure("trial_balance", e))
    }

    async fn balances(
        &self,
        scope: PeriodScope,
    ) -> Result<(ChartOfAccounts, AccountBalances), LedgerError> {
        let window = self.scope_window(scope).await?;
        let chart = self.load_chart().await?;
        let entries = self
            .store
            .entries(&EntryQuery::approved_in(window))
            .await
            .map_err(LedgerError::storage)?;
        debug!(?scope, entries = entries.len(), "Aggregating balances");
        let balances = BalanceAggregator::aggregate(&chart, &entries, &window);
        Ok((chart, balances))
    }

    /// Ordered movements of an account (and its subtree) over `window`, with
    /// running balances.
    ///
    /// The opening balance covers approved movement from the start of the
    /// fiscal year containing `window.start`; earlier years arrive through
    /// their opening entries.
    ///
    /// # Errors
    ///
    /// Returns `AccountNotFound` or a storage error.
    pub async fn get_account_ledger(
        &self,
        account_id: AccountId,
        window: DateWindow,
    ) -> Result<AccountLedger, LedgerError> {
        self.account_ledger(account_id, window)
            .await
            .inspect_err(|e| log_failure("get_account_ledger", e))
    }

    async fn account_ledger(
        &self,
        account_id: AccountId,
        window: DateWindow,
    ) -> Result<AccountLedger, LedgerError> {
        let chart = self.load_chart().await?;
        let opening_from = self
            .find_month(window.start)
            .await?
            .map_or(window.start, |(year, _)| year.start_date);
        let span = DateWindow::new(opening_from.min(window.start), window.end)?;
        let entries = self
            .store
            .entries(&EntryQuery::approved_in(span))
            .await
            .map_err(LedgerError::storage)?;
        MovementProcessor::build(&chart, account_id, &entries, window, opening_from)
    }

    /// Every unmet precondition for closing a fiscal year or month.
    ///
    /// # Errors
    ///
    /// Returns `FiscalYearNotFound`/`PeriodNotFound` or a storage error.
    pub async fn check_period_ready_to_close(
        &self,
        scope: PeriodScope,
    ) -> Result<ReadinessReport, LedgerError> {
        self.readiness(scope)
            .await
            .inspect_err(|e| log_failure("check_period_ready_to_close", e))
    }

    pub(super) async fn readiness(&self, scope: PeriodScope) -> Result<ReadinessReport, LedgerError> {
        let (status, is_active, query) = match scope {
            PeriodScope::Year(id) => {
                let year = self.require_year(id).await?;
                (year.status, year.is_active, EntryQuery::for_year(id))
            }
            PeriodScope::Month(id) => {
                let month = self.require_period(id).await?;
                (month.status, month.is_active, EntryQuery::for_period(id))
            }
        };
        let chart = self.load_chart().await?;
        let entries = self.store.entries(&query).await.map_err(LedgerError::storage)?;
        Ok(ReadinessReport::assess(scope, status, is_active, &entries, &chart))
    }

    async fn scope_window(&self, scope: PeriodScope) -> Result<DateWindow, LedgerError> {
        match scope {
            PeriodScope::Year(id) => Ok(self.require_year(id).await?.window()),
            PeriodScope::Month(id) => Ok(self.require_period(id).await?.window()),
        }
    }
}

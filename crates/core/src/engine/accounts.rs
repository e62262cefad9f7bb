//! Chart-of-accounts maintenance.

use quire_shared::types::AccountId;
use tracing::info;

use super::{LedgerEngine, log_failure};
use crate::accounts::{Account, AccountService, AccountUpdate, ChartOfAccounts, NewAccount};
use crate::clock::Clock;
use crate::error::LedgerError;
use crate::store::{LedgerStore, WriteBatch, WriteOp};

impl<S: LedgerStore, C: Clock> LedgerEngine<S, C> {
    /// Adds an account to the chart.
    ///
    /// A leaf parent without postings is promoted to a summary account in
    /// the same commit.
    ///
    /// # Errors
    ///
    /// Returns an error for a malformed or duplicate code, an empty name, an
    /// unknown parent, or a parent leaf that already carries postings.
    pub async fn create_account(&self, input: NewAccount) -> Result<Account, LedgerError> {
        self.add_account(input)
            .await
            .inspect_err(|e| log_failure("create_account", e))
    }

    async fn add_account(&self, input: NewAccount) -> Result<Account, LedgerError> {
        let chart = self.load_chart().await?;
        let now = self.clock.now();
        let account = AccountService::prepare_new(input, &chart, now)?;

        let mut batch = WriteBatch::new();
        self.promote_parent(&chart, account.parent_id, &mut batch).await?;
        batch.push(WriteOp::InsertAccount(account.clone()));
        self.commit(batch).await?;

        info!(
            account_id = %account.id,
            code = %account.code,
            account_type = %account.account_type,
            parent_id = ?account.parent_id,
            "Account created"
        );
        Ok(account)
    }

    /// Applies a partial update to an account.
    ///
    /// # Errors
    ///
    /// Returns `AccountNotFound`, `AccountCycle` if the new parent is a
    /// descendant, `AccountHasPostings` when changing type or nature of an
    /// account with postings, or `AccountHasChildren` when demoting a parent.
    pub async fn update_account(
        &self,
        account_id: AccountId,
        update: AccountUpdate,
    ) -> Result<Account, LedgerError> {
        self.change_account(account_id, update)
            .await
            .inspect_err(|e| log_failure("update_account", e))
    }

    async fn change_account(
        &self,
        account_id: AccountId,
        update: AccountUpdate,
    ) -> Result<Account, LedgerError> {
        let chart = self.load_chart().await?;
        let current = chart
            .get(account_id)
            .ok_or(LedgerError::AccountNotFound(account_id))?;
        let has_postings = self
            .store
            .account_has_postings(account_id)
            .await
            .map_err(LedgerError::storage)?;
        let account = AccountService::apply_update(current, update, &chart, has_postings, self.clock.now())?;

        let mut batch = WriteBatch::new();
        if account.parent_id != current.parent_id {
            self.promote_parent(&chart, account.parent_id, &mut batch).await?;
        }
        batch.push(WriteOp::UpdateAccount(account.clone()));
        self.commit(batch).await?;

        info!(account_id = %account.id, code = %account.code, "Account updated");
        Ok(account)
    }

    /// Activates or deactivates an account. Inactive accounts keep their
    /// history but reject new postings.
    ///
    /// # Errors
    ///
    /// Returns `AccountNotFound` or a storage error.
    pub async fn set_account_active(
        &self,
        account_id: AccountId,
        active: bool,
    ) -> Result<Account, LedgerError> {
        self.toggle_account(account_id, active)
            .await
            .inspect_err(|e| log_failure("set_account_active", e))
    }

    async fn toggle_account(&self, account_id: AccountId, active: bool) -> Result<Account, LedgerError> {
        let mut account = self.require_account(account_id).await?;
        if account.is_active == active {
            return Ok(account);
        }
        account.is_active = active;
        account.updated_at = self.clock.now();
        self.commit(WriteBatch::from(WriteOp::UpdateAccount(account.clone())))
            .await?;

        info!(account_id = %account.id, code = %account.code, active, "Account activation changed");
        Ok(account)
    }

    /// Deletes an account that has neither postings nor children.
    ///
    /// # Errors
    ///
    /// Returns `AccountNotFound`, `AccountHasPostings` or
    /// `AccountHasChildren`.
    pub async fn delete_account(&self, account_id: AccountId) -> Result<(), LedgerError> {
        self.remove_account(account_id)
            .await
            .inspect_err(|e| log_failure("delete_account", e))
    }

    async fn remove_account(&self, account_id: AccountId) -> Result<(), LedgerError> {
        let chart = self.load_chart().await?;
        let account = chart
            .get(account_id)
            .ok_or(LedgerError::AccountNotFound(account_id))?;
        let has_postings = self
            .store
            .account_has_postings(account_id)
            .await
            .map_err(LedgerError::storage)?;
        AccountService::check_deletable(account, &chart, has_postings)?;
        self.commit(WriteBatch::from(WriteOp::DeleteAccount(account_id)))
            .await?;

        info!(account_id = %account_id, code = %account.code, "Account deleted");
        Ok(())
    }

    async fn promote_parent(
        &self,
        chart: &ChartOfAccounts,
        parent_id: Option<AccountId>,
        batch: &mut WriteBatch,
    ) -> Result<(), LedgerError> {
        let Some(parent) = parent_id.and_then(|id| chart.get(id)) else {
            return Ok(());
        };
        if parent.is_parent {
            return Ok(());
        }
        let has_postings = self
            .store
            .account_has_postings(parent.id)
            .await
            .map_err(LedgerError::storage)?;
        if let Some(promoted) = AccountService::promotion_needed(parent, has_postings, self.clock.now())? {
            info!(account_id = %promoted.id, code = %promoted.code, "Parent promoted to summary account");
            batch.push(WriteOp::UpdateAccount(promoted));
        }
        Ok(())
    }
}

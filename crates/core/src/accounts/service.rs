//! Chart-of-accounts maintenance rules.

use chrono::{DateTime, Utc};
use quire_shared::types::AccountId;

use super::code::AccountCode;
use super::tree::ChartOfAccounts;
use super::types::{Account, AccountUpdate, NewAccount};
use crate::error::LedgerError;

/// Stateless service validating account changes against the chart.
pub struct AccountService;

impl AccountService {
    /// Validates a new account and builds it.
    ///
    /// The parent must exist. Promoting a leaf parent to a summary account is
    /// the caller's job; see [`AccountService::promotion_needed`].
    ///
    /// # Errors
    ///
    /// Returns an error for a malformed or duplicate code, an empty name, or
    /// an unknown parent.
    pub fn prepare_new(
        input: NewAccount,
        chart: &ChartOfAccounts,
        now: DateTime<Utc>,
    ) -> Result<Account, LedgerError> {
        let code = AccountCode::parse(&input.code)?;
        let name = input.name.trim().to_string();
        if name.is_empty() {
            return Err(LedgerError::EmptyName);
        }
        if chart.find_by_code(code.as_str()).is_some() {
            return Err(LedgerError::DuplicateAccountCode(code.to_string()));
        }
        if let Some(parent_id) = input.parent_id {
            chart
                .get(parent_id)
                .ok_or(LedgerError::AccountNotFound(parent_id))?;
        }

        Ok(Account {
            id: AccountId::new(),
            code,
            name,
            account_type: input.account_type,
            nature: input
                .nature
                .unwrap_or_else(|| input.account_type.default_nature()),
            parent_id: input.parent_id,
            is_parent: input.is_parent,
            is_active: true,
            created_at: now,
            updated_at: now,
        })
    }

    /// Returns the parent if it must become a summary account to accept a
    /// child.
    ///
    /// # Errors
    ///
    /// Returns `AccountHasPostings` if the parent is a leaf that already
    /// carries postings.
    pub fn promotion_needed(
        parent: &Account,
        parent_has_postings: bool,
        now: DateTime<Utc>,
    ) -> Result<Option<Account>, LedgerError> {
        if parent.is_parent {
            return Ok(None);
        }
        if parent_has_postings {
            return Err(LedgerError::AccountHasPostings(parent.id));
        }
        let mut promoted = parent.clone();
        promoted.is_parent = true;
        promoted.updated_at = now;
        Ok(Some(promoted))
    }

    /// Applies a partial update.
    ///
    /// # Errors
    ///
    /// Returns an error if the new code is malformed or taken, the new parent
    /// is unknown or would create a cycle, the type or nature changes while
    /// postings exist, or the summary flag conflicts with postings/children.
    pub fn apply_update(
        current: &Account,
        update: AccountUpdate,
        chart: &ChartOfAccounts,
        has_postings: bool,
        now: DateTime<Utc>,
    ) -> Result<Account, LedgerError> {
        let mut account = current.clone();

        if let Some(raw) = update.code {
            let code = AccountCode::parse(&raw)?;
            if chart
                .find_by_code(code.as_str())
                .is_some_and(|other| other.id != current.id)
            {
                return Err(LedgerError::DuplicateAccountCode(code.to_string()));
            }
            account.code = code;
        }

        if let Some(name) = update.name {
            let name = name.trim().to_string();
            if name.is_empty() {
                return Err(LedgerError::EmptyName);
            }
            account.name = name;
        }

        if let Some(account_type) = update.account_type {
            if account_type != current.account_type && has_postings {
                return Err(LedgerError::AccountHasPostings(current.id));
            }
            account.account_type = account_type;
        }

        if let Some(nature) = update.nature {
            if nature != current.nature && has_postings {
                return Err(LedgerError::AccountHasPostings(current.id));
            }
            account.nature = nature;
        }

        if let Some(parent_id) = update.parent_id {
            if let Some(parent_id) = parent_id {
                chart
                    .get(parent_id)
                    .ok_or(LedgerError::AccountNotFound(parent_id))?;
                if chart.would_create_cycle(current.id, parent_id) {
                    return Err(LedgerError::AccountCycle(current.id));
                }
            }
            account.parent_id = parent_id;
        }

        if let Some(is_parent) = update.is_parent {
            if is_parent && !current.is_parent && has_postings {
                return Err(LedgerError::AccountHasPostings(current.id));
            }
            if !is_parent && chart.has_children(current.id) {
                return Err(LedgerError::AccountHasChildren(current.id));
            }
            account.is_parent = is_parent;
        }

        account.updated_at = now;
        Ok(account)
    }

    /// Checks that an account can be deleted.
    ///
    /// # Errors
    ///
    /// Returns `AccountHasPostings` or `AccountHasChildren`.
    pub fn check_deletable(
        account: &Account,
        chart: &ChartOfAccounts,
        has_postings: bool,
    ) -> Result<(), LedgerError> {
        if has_postings {
            return Err(LedgerError::AccountHasPostings(account.id));
        }
        if chart.has_children(account.id) {
            return Err(LedgerError::AccountHasChildren(account.id));
        }
        Ok(())
    }
}

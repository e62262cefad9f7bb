//! In-memory store.
//!
//! State sits behind one mutex. A commit works on a copy of the state and
//! swaps it in only after every operation succeeded, so a failed batch
//! leaves nothing behind. Holding the lock for the whole batch also makes
//! the period and revision guards exact.

use std::collections::{BTreeMap, HashMap};
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use quire_shared::types::{AccountId, FiscalYearId, JournalEntryId, MonthlyPeriodId};

use super::{CommitReceipt, EntryQuery, LedgerStore, StoreError, WriteBatch, WriteOp};
use crate::accounts::Account;
use crate::fiscal::{FiscalYear, MonthlyPeriod};
use crate::ledger::{EntryKind, EntryStatus, JournalEntry};

#[derive(Debug, Clone, Default)]
struct State {
    accounts: BTreeMap<AccountId, Account>,
    fiscal_years: BTreeMap<FiscalYearId, FiscalYear>,
    periods: BTreeMap<MonthlyPeriodId, MonthlyPeriod>,
    entries: BTreeMap<JournalEntryId, JournalEntry>,
    counters: HashMap<FiscalYearId, YearCounters>,
}

/// Per-year entry numbering and write revision.
#[derive(Debug, Clone, Copy, Default)]
struct YearCounters {
    last_number: i64,
    revision: i64,
}

impl State {
    fn apply(&mut self, op: WriteOp, receipt: &mut CommitReceipt) -> Result<(), StoreError> {
        match op {
            WriteOp::InsertAccount(account) => {
                if self.accounts.contains_key(&account.id) {
                    return Err(StoreError::Conflict(format!("account {} exists", account.id)));
                }
                self.ensure_code_free(&account)?;
                self.accounts.insert(account.id, account);
            }
            WriteOp::UpdateAccount(account) => {
                if !self.accounts.contains_key(&account.id) {
                    return Err(StoreError::NotFound(format!("account {}", account.id)));
                }
                self.ensure_code_free(&account)?;
                self.accounts.insert(account.id, account);
            }
            WriteOp::DeleteAccount(id) => {
                let referenced = self
                    .entries
                    .values()
                    .any(|e| e.lines.iter().any(|l| l.account_id == id));
                let parent = self.accounts.values().any(|a| a.parent_id == Some(id));
                if referenced || parent {
                    return Err(StoreError::Conflict(format!("account {id} is referenced")));
                }
                self.accounts
                    .remove(&id)
                    .ok_or_else(|| StoreError::NotFound(format!("account {id}")))?;
            }
            WriteOp::InsertFiscalYear(year) => {
                if self.fiscal_years.contains_key(&year.id) {
                    return Err(StoreError::Conflict(format!("fiscal year {} exists", year.id)));
                }
                self.counters.insert(year.id, YearCounters::default());
                self.fiscal_years.insert(year.id, year);
            }
            WriteOp::UpdateFiscalYear { expected, year } => {
                let current = self
                    .fiscal_years
                    .get_mut(&year.id)
                    .ok_or_else(|| StoreError::NotFound(format!("fiscal year {}", year.id)))?;
                if current.status != expected {
                    return Err(StoreError::Conflict(format!(
                        "fiscal year {} is {}, expected {expected}",
                        year.id, current.status
                    )));
                }
                *current = year;
            }
            WriteOp::InsertPeriod(period) => {
                if !self.fiscal_years.contains_key(&period.fiscal_year_id) {
                    return Err(StoreError::NotFound(format!(
                        "fiscal year {}",
                        period.fiscal_year_id
                    )));
                }
                self.periods.insert(period.id, period);
            }
            WriteOp::UpdatePeriod { expected, period } => {
                let current = self
                    .periods
                    .get_mut(&period.id)
                    .ok_or_else(|| StoreError::NotFound(format!("period {}", period.id)))?;
                if current.status != expected {
                    return Err(StoreError::Conflict(format!(
                        "period {} is {}, expected {expected}",
                        period.id, current.status
                    )));
                }
                *current = period;
            }
            WriteOp::ExpectEntryRevision {
                fiscal_year_id,
                revision,
            } => {
                let current = self.counters_mut(fiscal_year_id)?.revision;
                if current != revision {
                    return Err(StoreError::Conflict(format!(
                        "entries of fiscal year {fiscal_year_id} changed (revision {current}, expected {revision})"
                    )));
                }
            }
            WriteOp::InsertEntry(new_entry) => {
                if self.entries.contains_key(&new_entry.id) {
                    return Err(StoreError::Conflict(format!("entry {} exists", new_entry.id)));
                }
                if new_entry.kind == EntryKind::Regular {
                    self.ensure_postable(new_entry.fiscal_year_id, new_entry.period_id)?;
                }
                let counters = self.counters_mut(new_entry.fiscal_year_id)?;
                counters.last_number += 1;
                counters.revision += 1;
                let number = counters.last_number;
                receipt.entry_numbers.push((new_entry.id, number));
                let entry = new_entry.into_entry(number);
                self.entries.insert(entry.id, entry);
            }
            WriteOp::ReplaceLines {
                entry_id,
                expected,
                lines,
                totals,
            } => {
                let entry = self.entry_for_write(entry_id, expected)?;
                entry.lines = lines;
                entry.totals = totals;
            }
            WriteOp::UpdateEntryStatus {
                entry_id,
                expected,
                change,
            } => {
                let entry = self.entry_for_write(entry_id, expected)?;
                change.apply(entry);
            }
        }
        Ok(())
    }

    fn ensure_code_free(&self, account: &Account) -> Result<(), StoreError> {
        if self
            .accounts
            .values()
            .any(|a| a.id != account.id && a.code == account.code)
        {
            return Err(StoreError::Conflict(format!(
                "account code {} in use",
                account.code
            )));
        }
        Ok(())
    }

    fn counters_mut(&mut self, fiscal_year_id: FiscalYearId) -> Result<&mut YearCounters, StoreError> {
        self.counters
            .get_mut(&fiscal_year_id)
            .ok_or_else(|| StoreError::NotFound(format!("fiscal year {fiscal_year_id}")))
    }

    /// Regular entries only move while their month and year are not closed.
    fn ensure_postable(
        &self,
        fiscal_year_id: FiscalYearId,
        period_id: MonthlyPeriodId,
    ) -> Result<(), StoreError> {
        let year = self
            .fiscal_years
            .get(&fiscal_year_id)
            .ok_or_else(|| StoreError::NotFound(format!("fiscal year {fiscal_year_id}")))?;
        let month = self
            .periods
            .get(&period_id)
            .ok_or_else(|| StoreError::NotFound(format!("period {period_id}")))?;
        if year.status.is_closed() || month.status.is_closed() {
            return Err(StoreError::Conflict(format!(
                "period {} of fiscal year {} is closed",
                month.name, year.name
            )));
        }
        Ok(())
    }

    /// Checks the guards for changing an existing entry, bumps its year's
    /// revision and hands the entry out for the change.
    fn entry_for_write(
        &mut self,
        id: JournalEntryId,
        expected: EntryStatus,
    ) -> Result<&mut JournalEntry, StoreError> {
        let (fiscal_year_id, period_id, kind, status) = self
            .entries
            .get(&id)
            .map(|e| (e.fiscal_year_id, e.period_id, e.kind, e.status))
            .ok_or_else(|| StoreError::NotFound(format!("entry {id}")))?;
        if status != expected {
            return Err(StoreError::Conflict(format!(
                "entry {id} is {status}, expected {expected}"
            )));
        }
        if kind == EntryKind::Regular {
            self.ensure_postable(fiscal_year_id, period_id)?;
        }
        self.counters_mut(fiscal_year_id)?.revision += 1;
        self.entries
            .get_mut(&id)
            .ok_or_else(|| StoreError::NotFound(format!("entry {id}")))
    }
}

/// Thread-safe in-memory [`LedgerStore`].
#[derive(Debug, Default)]
pub struct MemoryStore {
    state: Mutex<State>,
    fail_after: Mutex<Option<usize>>,
}

impl MemoryStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes the next commit fail after applying `ops` operations.
    ///
    /// The failed commit must leave the store unchanged.
    pub fn fail_next_commit_after(&self, ops: usize) {
        if let Ok(mut slot) = self.fail_after.lock() {
            *slot = Some(ops);
        }
    }

    fn state(&self) -> Result<MutexGuard<'_, State>, StoreError> {
        self.state
            .lock()
            .map_err(|_| StoreError::Backend("memory store lock poisoned".into()))
    }

    fn take_injected_failure(&self) -> Option<usize> {
        self.fail_after.lock().ok().and_then(|mut slot| slot.take())
    }
}

#[async_trait]
impl LedgerStore for MemoryStore {
    async fn accounts(&self) -> Result<Vec<Account>, StoreError> {
        Ok(self.state()?.accounts.values().cloned().collect())
    }

    async fn account(&self, id: AccountId) -> Result<Option<Account>, StoreError> {
        Ok(self.state()?.accounts.get(&id).cloned())
    }

    async fn accounts_by_ids(&self, ids: &[AccountId]) -> Result<Vec<Account>, StoreError> {
        let state = self.state()?;
        Ok(ids
            .iter()
            .filter_map(|id| state.accounts.get(id).cloned())
            .collect())
    }

    async fn account_has_postings(&self, id: AccountId) -> Result<bool, StoreError> {
        Ok(self
            .state()?
            .entries
            .values()
            .any(|e| e.lines.iter().any(|l| l.account_id == id)))
    }

    async fn fiscal_years(&self) -> Result<Vec<FiscalYear>, StoreError> {
        let mut years: Vec<FiscalYear> = self.state()?.fiscal_years.values().cloned().collect();
        years.sort_by_key(|y| y.start_date);
        Ok(years)
    }

    async fn fiscal_year(&self, id: FiscalYearId) -> Result<Option<FiscalYear>, StoreError> {
        Ok(self.state()?.fiscal_years.get(&id).cloned())
    }

    async fn periods(&self, fiscal_year_id: FiscalYearId) -> Result<Vec<MonthlyPeriod>, StoreError> {
        let mut periods: Vec<MonthlyPeriod> = self
            .state()?
            .periods
            .values()
            .filter(|p| p.fiscal_year_id == fiscal_year_id)
            .cloned()
            .collect();
        periods.sort_by_key(|p| p.period_number);
        Ok(periods)
    }

    async fn period(&self, id: MonthlyPeriodId) -> Result<Option<MonthlyPeriod>, StoreError> {
        Ok(self.state()?.periods.get(&id).cloned())
    }

    async fn entry(&self, id: JournalEntryId) -> Result<Option<JournalEntry>, StoreError> {
        Ok(self.state()?.entries.get(&id).cloned())
    }

    async fn entries(&self, query: &EntryQuery) -> Result<Vec<JournalEntry>, StoreError> {
        let mut entries: Vec<JournalEntry> = self
            .state()?
            .entries
            .values()
            .filter(|e| query.matches(e))
            .cloned()
            .collect();
        entries.sort_by(|a, b| a.date.cmp(&b.date).then(a.number.cmp(&b.number)));
        Ok(entries)
    }

    async fn entry_revision(&self, fiscal_year_id: FiscalYearId) -> Result<Option<i64>, StoreError> {
        Ok(self.state()?.counters.get(&fiscal_year_id).map(|c| c.revision))
    }

    async fn commit(&self, batch: WriteBatch) -> Result<CommitReceipt, StoreError> {
        let fail_after = self.take_injected_failure();
        let mut guard = self.state()?;
        let mut working = guard.clone();
        let mut receipt = CommitReceipt::default();

        for (applied, op) in batch.into_ops().into_iter().enumerate() {
            if fail_after == Some(applied) {
                return Err(StoreError::Injected(applied));
            }
            working.apply(op, &mut receipt)?;
        }

        *guard = working;
        Ok(receipt)
    }
}

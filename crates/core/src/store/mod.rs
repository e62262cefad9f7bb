//! Persistence seam.
//!
//! The engine reads through [`LedgerStore`] and writes exclusively through
//! [`LedgerStore::commit`], which applies a [`WriteBatch`] atomically: every
//! operation lands or none does. Status-changing operations carry the status
//! the engine observed; a store that finds a different status aborts the
//! whole batch with [`StoreError::Conflict`].
//!
//! Stores also enforce two guards of their own inside every commit:
//!
//! - regular entries can only be inserted, edited or change status while
//!   their month and fiscal year are not closed; closing and opening entries
//!   are exempt
//! - every entry write bumps its fiscal year's entry revision, so a batch
//!   planned from a snapshot can assert nothing moved since with
//!   [`WriteOp::ExpectEntryRevision`]

pub mod memory;

use async_trait::async_trait;
use quire_shared::types::{AccountId, FiscalYearId, JournalEntryId, MonthlyPeriodId};
use thiserror::Error;

use crate::accounts::Account;
use crate::fiscal::{DateWindow, FiscalYear, MonthlyPeriod, PeriodStatus};
use crate::ledger::{EntryStatus, EntryTotals, JournalEntry, JournalLine, NewEntry, StatusChange};

pub use memory::MemoryStore;

/// Errors reported by a store.
#[derive(Debug, Error)]
pub enum StoreError {
    /// An expected status or uniqueness condition did not hold.
    #[error("Conflict: {0}")]
    Conflict(String),

    /// A row the batch refers to does not exist.
    #[error("Not found: {0}")]
    NotFound(String),

    /// The backend failed.
    #[error("Backend error: {0}")]
    Backend(String),

    /// Failure injected by a test double.
    #[error("Injected failure after {0} operations")]
    Injected(usize),
}

/// One write inside a batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WriteOp {
    /// Create an account.
    InsertAccount(Account),
    /// Overwrite an account.
    UpdateAccount(Account),
    /// Remove an account without postings or children.
    DeleteAccount(AccountId),
    /// Create a fiscal year and its entry counter.
    InsertFiscalYear(FiscalYear),
    /// Overwrite a fiscal year if its status is still `expected`.
    UpdateFiscalYear {
        /// Status observed before the change.
        expected: PeriodStatus,
        /// New state.
        year: FiscalYear,
    },
    /// Create a monthly period.
    InsertPeriod(MonthlyPeriod),
    /// Overwrite a monthly period if its status is still `expected`.
    UpdatePeriod {
        /// Status observed before the change.
        expected: PeriodStatus,
        /// New state.
        period: MonthlyPeriod,
    },
    /// Abort the batch unless the fiscal year's entry revision still equals
    /// `revision`. Must precede the batch's own entry writes.
    ExpectEntryRevision {
        /// Year whose entries the batch was planned from.
        fiscal_year_id: FiscalYearId,
        /// Revision read before the snapshot.
        revision: i64,
    },
    /// Insert an entry, drawing its number from the fiscal year counter.
    InsertEntry(NewEntry),
    /// Replace the lines of an entry that is still `expected`.
    ReplaceLines {
        /// Target entry.
        entry_id: JournalEntryId,
        /// Status observed before the change.
        expected: EntryStatus,
        /// New lines.
        lines: Vec<JournalLine>,
        /// Totals of the new lines.
        totals: EntryTotals,
    },
    /// Change an entry's status if it is still `expected`.
    UpdateEntryStatus {
        /// Target entry.
        entry_id: JournalEntryId,
        /// Status observed before the change.
        expected: EntryStatus,
        /// The change to apply.
        change: StatusChange,
    },
}

/// Ordered set of writes applied atomically.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WriteBatch {
    ops: Vec<WriteOp>,
}

impl WriteBatch {
    /// Creates an empty batch.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a write.
    pub fn push(&mut self, op: WriteOp) -> &mut Self {
        self.ops.push(op);
        self
    }

    /// Number of writes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.ops.len()
    }

    /// Returns true if there is nothing to write.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }

    /// The writes, in order.
    #[must_use]
    pub fn ops(&self) -> &[WriteOp] {
        &self.ops
    }

    /// Consumes the batch.
    #[must_use]
    pub fn into_ops(self) -> Vec<WriteOp> {
        self.ops
    }
}

impl From<WriteOp> for WriteBatch {
    fn from(op: WriteOp) -> Self {
        Self { ops: vec![op] }
    }
}

/// What a successful commit produced.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommitReceipt {
    /// Numbers assigned to inserted entries, in batch order.
    pub entry_numbers: Vec<(JournalEntryId, i64)>,
}

impl CommitReceipt {
    /// Number assigned to an inserted entry.
    #[must_use]
    pub fn number_of(&self, id: JournalEntryId) -> Option<i64> {
        self.entry_numbers
            .iter()
            .find(|(entry_id, _)| *entry_id == id)
            .map(|(_, number)| *number)
    }
}

/// Filter for entry queries. Empty fields match everything.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EntryQuery {
    /// Entries dated inside this window.
    pub window: Option<DateWindow>,
    /// Entries of this fiscal year.
    pub fiscal_year_id: Option<FiscalYearId>,
    /// Entries filed under this month.
    pub period_id: Option<MonthlyPeriodId>,
    /// Entries with one of these statuses.
    pub statuses: Vec<EntryStatus>,
}

impl EntryQuery {
    /// Approved entries dated inside `window`.
    #[must_use]
    pub fn approved_in(window: DateWindow) -> Self {
        Self {
            window: Some(window),
            statuses: vec![EntryStatus::Approved],
            ..Self::default()
        }
    }

    /// All entries of a fiscal year.
    #[must_use]
    pub fn for_year(fiscal_year_id: FiscalYearId) -> Self {
        Self {
            fiscal_year_id: Some(fiscal_year_id),
            ..Self::default()
        }
    }

    /// All entries filed under a month.
    #[must_use]
    pub fn for_period(period_id: MonthlyPeriodId) -> Self {
        Self {
            period_id: Some(period_id),
            ..Self::default()
        }
    }

    /// Returns true if the entry passes the filter.
    #[must_use]
    pub fn matches(&self, entry: &JournalEntry) -> bool {
        self.window.is_none_or(|w| w.contains(entry.date))
            && self.fiscal_year_id.is_none_or(|id| id == entry.fiscal_year_id)
            && self.period_id.is_none_or(|id| id == entry.period_id)
            && (self.statuses.is_empty() || self.statuses.contains(&entry.status))
    }
}

/// Storage for the ledger.
#[async_trait]
pub trait LedgerStore: Send + Sync {
    /// Every account.
    async fn accounts(&self) -> Result<Vec<Account>, StoreError>;

    /// One account.
    async fn account(&self, id: AccountId) -> Result<Option<Account>, StoreError>;

    /// The accounts among `ids` that exist.
    async fn accounts_by_ids(&self, ids: &[AccountId]) -> Result<Vec<Account>, StoreError>;

    /// Returns true if any journal line references the account.
    async fn account_has_postings(&self, id: AccountId) -> Result<bool, StoreError>;

    /// Every fiscal year, ordered by start date.
    async fn fiscal_years(&self) -> Result<Vec<FiscalYear>, StoreError>;

    /// One fiscal year.
    async fn fiscal_year(&self, id: FiscalYearId) -> Result<Option<FiscalYear>, StoreError>;

    /// Months of a fiscal year, ordered by period number.
    async fn periods(&self, fiscal_year_id: FiscalYearId) -> Result<Vec<MonthlyPeriod>, StoreError>;

    /// One month.
    async fn period(&self, id: MonthlyPeriodId) -> Result<Option<MonthlyPeriod>, StoreError>;

    /// One entry with its lines.
    async fn entry(&self, id: JournalEntryId) -> Result<Option<JournalEntry>, StoreError>;

    /// Entries with their lines, ordered by date then number.
    async fn entries(&self, query: &EntryQuery) -> Result<Vec<JournalEntry>, StoreError>;

    /// Count of entry writes committed in a fiscal year so far.
    async fn entry_revision(&self, fiscal_year_id: FiscalYearId) -> Result<Option<i64>, StoreError>;

    /// Applies every write in the batch, or none.
    async fn commit(&self, batch: WriteBatch) -> Result<CommitReceipt, StoreError>;
}

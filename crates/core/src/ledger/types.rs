//! Journal entry types.

use chrono::{DateTime, NaiveDate, Utc};
use quire_shared::types::{
    AccountId, ActorId, Amount, FiscalYearId, JournalEntryId, JournalLineId, MonthlyPeriodId,
};
use serde::{Deserialize, Serialize};

/// Journal entry status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntryStatus {
    /// Created, lines may still be replaced.
    Pending,
    /// Immutable, counts toward balances.
    Approved,
    /// Terminal, ignored by balances.
    Voided,
}

impl EntryStatus {
    /// Lowercase name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Approved => "approved",
            Self::Voided => "voided",
        }
    }
}

impl std::fmt::Display for EntryStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Origin of a journal entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntryKind {
    /// Entered by a user.
    Regular,
    /// Generated when a fiscal year closes; zeroes temporary accounts.
    Closing,
    /// Generated in the next fiscal year; carries permanent balances forward.
    Opening,
}

impl EntryKind {
    /// Lowercase name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Regular => "regular",
            Self::Closing => "closing",
            Self::Opening => "opening",
        }
    }
}

/// A single debit or credit line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JournalLine {
    /// Unique identifier.
    pub id: JournalLineId,
    /// Owning entry.
    pub entry_id: JournalEntryId,
    /// Posted account (active leaf at the time of posting).
    pub account_id: AccountId,
    /// Debit amount, zero on credit lines.
    pub debit: Amount,
    /// Credit amount, zero on debit lines.
    pub credit: Amount,
    /// Optional line note.
    pub memo: Option<String>,
    /// Zero-based input order.
    pub position: u32,
}

/// Cached debit and credit totals of an entry.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntryTotals {
    /// Sum of debits.
    pub debit: Amount,
    /// Sum of credits.
    pub credit: Amount,
}

impl EntryTotals {
    /// Sums a set of lines. Stored lines are bounded, so the clamp only
    /// matters for lines that never went through validation.
    #[must_use]
    pub fn from_lines(lines: &[JournalLine]) -> Self {
        lines.iter().fold(Self::default(), |totals, line| Self {
            debit: totals.debit.saturating_add(line.debit),
            credit: totals.credit.saturating_add(line.credit),
        })
    }

    /// Debit minus credit, both rounded to two decimals.
    #[must_use]
    pub fn difference(&self) -> Amount {
        self.debit.round_money() - self.credit.round_money()
    }

    /// True if both sums agree after banker's rounding to two decimals.
    #[must_use]
    pub fn is_balanced(&self) -> bool {
        self.difference().is_zero()
    }
}

/// Who did what to an entry, and when.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntryAudit {
    /// Creator.
    pub created_by: ActorId,
    /// Creation time.
    pub created_at: DateTime<Utc>,
    /// Approver.
    pub approved_by: Option<ActorId>,
    /// Approval time.
    pub approved_at: Option<DateTime<Utc>>,
    /// Actor who voided the entry.
    pub voided_by: Option<ActorId>,
    /// Void time.
    pub voided_at: Option<DateTime<Utc>>,
    /// Why the entry was voided.
    pub void_reason: Option<String>,
}

impl EntryAudit {
    /// Audit trail of a freshly created entry.
    #[must_use]
    pub const fn created(by: ActorId, at: DateTime<Utc>) -> Self {
        Self {
            created_by: by,
            created_at: at,
            approved_by: None,
            approved_at: None,
            voided_by: None,
            voided_at: None,
            void_reason: None,
        }
    }
}

/// A persisted journal entry with its lines.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JournalEntry {
    /// Unique identifier.
    pub id: JournalEntryId,
    /// Sequence number, unique within the fiscal year.
    pub number: i64,
    /// Fiscal year of the entry's month.
    pub fiscal_year_id: FiscalYearId,
    /// Month the entry is filed under.
    pub period_id: MonthlyPeriodId,
    /// Accounting date.
    pub date: NaiveDate,
    /// Free-text description.
    pub description: String,
    /// Lifecycle status.
    pub status: EntryStatus,
    /// Origin.
    pub kind: EntryKind,
    /// Cached totals of `lines`.
    pub totals: EntryTotals,
    /// Lines in input order.
    pub lines: Vec<JournalLine>,
    /// Audit trail.
    pub audit: EntryAudit,
}

impl JournalEntry {
    /// Human-readable number, e.g. `JE-000042`.
    #[must_use]
    pub fn display_number(&self) -> String {
        format!("JE-{:06}", self.number)
    }

    /// Returns true for the entry generated by closing a fiscal year.
    #[must_use]
    pub const fn is_closing_entry(&self) -> bool {
        matches!(self.kind, EntryKind::Closing)
    }

    /// Closing and opening entries are owned by the closing protocol.
    #[must_use]
    pub const fn is_system(&self) -> bool {
        !matches!(self.kind, EntryKind::Regular)
    }

    /// Only approved entries contribute to balances.
    #[must_use]
    pub const fn counts_in_balances(&self) -> bool {
        matches!(self.status, EntryStatus::Approved)
    }
}

/// An entry about to be inserted. The store assigns the number.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewEntry {
    /// Unique identifier.
    pub id: JournalEntryId,
    /// Fiscal year whose counter supplies the number.
    pub fiscal_year_id: FiscalYearId,
    /// Month the entry is filed under.
    pub period_id: MonthlyPeriodId,
    /// Accounting date.
    pub date: NaiveDate,
    /// Free-text description.
    pub description: String,
    /// Initial status.
    pub status: EntryStatus,
    /// Origin.
    pub kind: EntryKind,
    /// Lines in input order.
    pub lines: Vec<JournalLine>,
    /// Audit trail.
    pub audit: EntryAudit,
}

impl NewEntry {
    /// Totals of the lines.
    #[must_use]
    pub fn totals(&self) -> EntryTotals {
        EntryTotals::from_lines(&self.lines)
    }

    /// Turns the draft into a persisted entry carrying `number`.
    #[must_use]
    pub fn into_entry(self, number: i64) -> JournalEntry {
        let totals = self.totals();
        JournalEntry {
            id: self.id,
            number,
            fiscal_year_id: self.fiscal_year_id,
            period_id: self.period_id,
            date: self.date,
            description: self.description,
            status: self.status,
            kind: self.kind,
            totals,
            lines: self.lines,
            audit: self.audit,
        }
    }
}

/// One line of a candidate entry, before validation.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LineInput {
    /// Target account.
    pub account_id: Option<AccountId>,
    /// Debit amount.
    pub debit: Option<Amount>,
    /// Credit amount.
    pub credit: Option<Amount>,
    /// Optional note.
    pub memo: Option<String>,
}

impl LineInput {
    /// A debit line.
    #[must_use]
    pub fn debit(account_id: AccountId, amount: Amount) -> Self {
        Self {
            account_id: Some(account_id),
            debit: Some(amount),
            ..Self::default()
        }
    }

    /// A credit line.
    #[must_use]
    pub fn credit(account_id: AccountId, amount: Amount) -> Self {
        Self {
            account_id: Some(account_id),
            credit: Some(amount),
            ..Self::default()
        }
    }

    /// Attaches a memo.
    #[must_use]
    pub fn with_memo(mut self, memo: impl Into<String>) -> Self {
        self.memo = Some(memo.into());
        self
    }
}

/// A candidate journal entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewEntryInput {
    /// Accounting date.
    pub date: NaiveDate,
    /// Description; must not be blank.
    pub description: String,
    /// Month to file under; resolved from the date when absent.
    pub period_id: Option<MonthlyPeriodId>,
    /// Lines in input order.
    pub lines: Vec<LineInput>,
    /// Authenticated actor creating the entry.
    pub actor: ActorId,
}

/// Non-fatal findings attached to an accepted entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind")]
pub enum EntryWarning {
    /// Date outside the chosen month, accepted under the lenient policy.
    DateOutsidePeriod {
        /// Entry date.
        date: NaiveDate,
        /// Month start.
        period_start: NaiveDate,
        /// Month end.
        period_end: NaiveDate,
    },
}

/// Result of a successful entry creation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EntryReceipt {
    /// The stored entry, with its assigned number.
    pub entry: JournalEntry,
    /// Warnings raised during validation.
    pub warnings: Vec<EntryWarning>,
}

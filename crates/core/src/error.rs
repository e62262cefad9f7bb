//! Ledger error types.
//!
//! Every rejection the core produces is a variant of [`LedgerError`]. Each
//! variant maps to exactly one [`ErrorCategory`], so callers can branch on
//! the category and still show the detailed message.

use chrono::NaiveDate;
use quire_shared::ErrorCategory;
use quire_shared::types::{AccountId, Amount, FiscalYearId, JournalEntryId, MonthlyPeriodId};
use thiserror::Error;

use crate::accounts::{AccountIssue, InvalidAccountCode};
use crate::fiscal::{DateWindow, NotReadyReason, PeriodStatus};
use crate::ledger::EntryStatus;
use crate::store::StoreError;

/// Errors that can occur during ledger operations.
#[derive(Debug, Error)]
pub enum LedgerError {
    // ========== Structural Errors ==========
    /// Entry has no lines.
    #[error("Journal entry must have at least one line")]
    NoLines,

    /// A line does not reference an account.
    #[error("Line {position} has no account")]
    MissingAccount {
        /// Zero-based line position.
        position: usize,
    },

    /// A line carries neither a debit nor a credit amount.
    #[error("Line {position} has no amount")]
    MissingAmount {
        /// Zero-based line position.
        position: usize,
    },

    /// A line carries a negative amount.
    #[error("Line {position} has a negative amount")]
    NegativeAmount {
        /// Zero-based line position.
        position: usize,
    },

    /// A line has both a positive debit and a positive credit.
    #[error("Line {position} must specify either debit or credit, not both")]
    BothSides {
        /// Zero-based line position.
        position: usize,
    },

    /// A line amount, or a running total, exceeds fifteen integer digits.
    #[error("Line {position} amount is out of range")]
    AmountOutOfRange {
        /// Zero-based line position.
        position: usize,
    },

    /// A line amount carries more than four fractional digits.
    #[error("Line {position} amount has more than four decimal places")]
    ExcessPrecision {
        /// Zero-based line position.
        position: usize,
    },

    /// Entry has only debit lines or only credit lines.
    #[error("Journal entry must have both debit and credit lines")]
    SingleSided,

    /// Entry description is empty.
    #[error("Journal entry description cannot be empty")]
    EmptyDescription,

    /// A void or reopen was requested without a justification.
    #[error("A non-empty reason is required")]
    ReasonRequired,

    /// Account code is malformed.
    #[error(transparent)]
    AccountCode(#[from] InvalidAccountCode),

    /// Account or fiscal year name is empty.
    #[error("Name cannot be empty")]
    EmptyName,

    /// Start date is not before end date.
    #[error("Invalid date range: {start} must be before {end}")]
    InvalidDateRange {
        /// Range start.
        start: NaiveDate,
        /// Range end.
        end: NaiveDate,
    },

    // ========== Balance Errors ==========
    /// Debits and credits differ after rounding to two decimals.
    #[error("Journal entry is not balanced. Debit: {debit}, Credit: {credit}, Difference: {difference}")]
    Unbalanced {
        /// Rounded debit total.
        debit: Amount,
        /// Rounded credit total.
        credit: Amount,
        /// Debit minus credit.
        difference: Amount,
    },

    // ========== Account Eligibility Errors ==========
    /// One or more accounts cannot receive postings.
    #[error("Accounts cannot receive postings: {}", format_issues(.0))]
    IneligibleAccounts(Vec<AccountIssue>),

    /// Account carries postings, so it cannot be changed this way.
    #[error("Account {0} has postings")]
    AccountHasPostings(AccountId),

    /// Account has children, so it cannot be removed or made a leaf.
    #[error("Account {0} has child accounts")]
    AccountHasChildren(AccountId),

    /// Parent link would make the account its own ancestor.
    #[error("Account {0} would become its own ancestor")]
    AccountCycle(AccountId),

    /// Account code already used.
    #[error("Account code {0} is already in use")]
    DuplicateAccountCode(String),

    /// The period result account is not an active equity leaf.
    #[error("Account {0} cannot receive the period result: it must be an active equity leaf account")]
    InvalidResultAccount(AccountId),

    // ========== Period State Errors ==========
    /// Month or fiscal year is closed.
    #[error("Period {name} ({start} to {end}) is closed, no posting allowed")]
    PeriodClosed {
        /// Period name.
        name: String,
        /// First day of the period.
        start: NaiveDate,
        /// Last day of the period.
        end: NaiveDate,
    },

    /// Month or fiscal year is inactive.
    #[error("Period {name} ({start} to {end}) is inactive")]
    PeriodInactive {
        /// Period name.
        name: String,
        /// First day of the period.
        start: NaiveDate,
        /// Last day of the period.
        end: NaiveDate,
    },

    /// Entry date lies outside the chosen month.
    #[error("Date {date} is outside period {start} to {end}")]
    DateOutsidePeriod {
        /// Entry date.
        date: NaiveDate,
        /// Month start.
        start: NaiveDate,
        /// Month end.
        end: NaiveDate,
    },

    /// No monthly period contains the entry date.
    #[error("No monthly period found for date {0}")]
    NoPeriodForDate(NaiveDate),

    /// Entry is dated after today.
    #[error("Date {date} is in the future (today is {today})")]
    FutureDate {
        /// Entry date.
        date: NaiveDate,
        /// Current date according to the clock.
        today: NaiveDate,
    },

    /// Another active fiscal year overlaps the requested range.
    #[error("Date range overlaps active fiscal year {0}")]
    OverlappingFiscalYear(FiscalYearId),

    // ========== Transition Errors ==========
    /// Period cannot be closed yet.
    #[error("Period is not ready to close: {}", format_reasons(.0))]
    NotReadyToClose(Vec<NotReadyReason>),

    /// Period status change not allowed by the lifecycle.
    #[error("Invalid period transition from {from} to {to}")]
    InvalidPeriodTransition {
        /// Current status.
        from: PeriodStatus,
        /// Requested status.
        to: PeriodStatus,
    },

    /// Reopening the fiscal year would leave two active years overlapping.
    #[error("Cannot reopen: active fiscal year {0} overlaps")]
    ReopenOverlap(FiscalYearId),

    /// Month cannot be reopened while its fiscal year is closed.
    #[error("Fiscal year {0} is closed")]
    ParentYearClosed(FiscalYearId),

    /// Entry status change not allowed by the lifecycle.
    #[error("Invalid entry transition from {from} to {to}")]
    InvalidEntryTransition {
        /// Current status.
        from: EntryStatus,
        /// Requested status.
        to: EntryStatus,
    },

    /// Entry lines can only change while pending.
    #[error("Journal entry {0} is not pending and cannot be edited")]
    EntryNotEditable(JournalEntryId),

    /// Closing and opening entries are managed by the closing protocol.
    #[error("Journal entry {0} is a system entry")]
    SystemEntry(JournalEntryId),

    // ========== Not Found Errors ==========
    /// Account not found.
    #[error("Account not found: {0}")]
    AccountNotFound(AccountId),

    /// No account with this code.
    #[error("Account with code {0} not found")]
    AccountCodeNotFound(String),

    /// Journal entry not found.
    #[error("Journal entry not found: {0}")]
    EntryNotFound(JournalEntryId),

    /// Monthly period not found.
    #[error("Monthly period not found: {0}")]
    PeriodNotFound(MonthlyPeriodId),

    /// Fiscal year not found.
    #[error("Fiscal year not found: {0}")]
    FiscalYearNotFound(FiscalYearId),

    // ========== Consistency Errors ==========
    /// A concurrent writer changed the data first; nothing was written.
    #[error("Concurrent modification: {0}")]
    Conflict(String),

    /// The atomic write failed and was rolled back.
    #[error("Commit failed and was rolled back: {0}")]
    CommitFailed(String),

    // ========== Storage Errors ==========
    /// Reading from the store failed.
    #[error("Storage error: {0}")]
    Storage(String),
}

impl LedgerError {
    /// Returns the category of this error.
    #[must_use]
    pub const fn category(&self) -> ErrorCategory {
        match self {
            Self::NoLines
            | Self::MissingAccount { .. }
            | Self::MissingAmount { .. }
            | Self::NegativeAmount { .. }
            | Self::BothSides { .. }
            | Self::AmountOutOfRange { .. }
            | Self::ExcessPrecision { .. }
            | Self::SingleSided
            | Self::EmptyDescription
            | Self::ReasonRequired
            | Self::AccountCode(_)
            | Self::EmptyName
            | Self::InvalidDateRange { .. } => ErrorCategory::Structural,
            Self::Unbalanced { .. } => ErrorCategory::Balance,
            Self::IneligibleAccounts(_)
            | Self::AccountHasPostings(_)
            | Self::AccountHasChildren(_)
            | Self::AccountCycle(_)
            | Self::DuplicateAccountCode(_)
            | Self::InvalidResultAccount(_) => ErrorCategory::AccountEligibility,
            Self::PeriodClosed { .. }
            | Self::PeriodInactive { .. }
            | Self::DateOutsidePeriod { .. }
            | Self::NoPeriodForDate(_)
            | Self::FutureDate { .. }
            | Self::OverlappingFiscalYear(_) => ErrorCategory::PeriodState,
            Self::NotReadyToClose(_)
            | Self::InvalidPeriodTransition { .. }
            | Self::ReopenOverlap(_)
            | Self::ParentYearClosed(_)
            | Self::InvalidEntryTransition { .. }
            | Self::EntryNotEditable(_)
            | Self::SystemEntry(_) => ErrorCategory::Transition,
            Self::AccountNotFound(_)
            | Self::AccountCodeNotFound(_)
            | Self::EntryNotFound(_)
            | Self::PeriodNotFound(_)
            | Self::FiscalYearNotFound(_) => ErrorCategory::NotFound,
            Self::Conflict(_) | Self::CommitFailed(_) => ErrorCategory::Consistency,
            Self::Storage(_) => ErrorCategory::Storage,
        }
    }

    /// Returns the error code for API responses.
    #[must_use]
    pub const fn error_code(&self) -> &'static str {
        match self {
            Self::NoLines => "NO_LINES",
            Self::MissingAccount { .. } => "MISSING_ACCOUNT",
            Self::MissingAmount { .. } => "MISSING_AMOUNT",
            Self::NegativeAmount { .. } => "NEGATIVE_AMOUNT",
            Self::BothSides { .. } => "BOTH_SIDES",
            Self::AmountOutOfRange { .. } => "AMOUNT_OUT_OF_RANGE",
            Self::ExcessPrecision { .. } => "EXCESS_PRECISION",
            Self::SingleSided => "SINGLE_SIDED",
            Self::EmptyDescription => "EMPTY_DESCRIPTION",
            Self::ReasonRequired => "REASON_REQUIRED",
            Self::AccountCode(_) => "INVALID_ACCOUNT_CODE",
            Self::EmptyName => "EMPTY_NAME",
            Self::InvalidDateRange { .. } => "INVALID_DATE_RANGE",
            Self::Unbalanced { .. } => "UNBALANCED_ENTRY",
            Self::IneligibleAccounts(_) => "INELIGIBLE_ACCOUNTS",
            Self::AccountHasPostings(_) => "ACCOUNT_HAS_POSTINGS",
            Self::AccountHasChildren(_) => "ACCOUNT_HAS_CHILDREN",
            Self::AccountCycle(_) => "ACCOUNT_CYCLE",
            Self::DuplicateAccountCode(_) => "DUPLICATE_ACCOUNT_CODE",
            Self::InvalidResultAccount(_) => "INVALID_RESULT_ACCOUNT",
            Self::PeriodClosed { .. } => "PERIOD_CLOSED",
            Self::PeriodInactive { .. } => "PERIOD_INACTIVE",
            Self::DateOutsidePeriod { .. } => "DATE_OUTSIDE_PERIOD",
            Self::NoPeriodForDate(_) => "NO_PERIOD_FOR_DATE",
            Self::FutureDate { .. } => "FUTURE_DATE",
            Self::OverlappingFiscalYear(_) => "OVERLAPPING_FISCAL_YEAR",
            Self::NotReadyToClose(_) => "NOT_READY_TO_CLOSE",
            Self::InvalidPeriodTransition { .. } => "INVALID_PERIOD_TRANSITION",
            Self::ReopenOverlap(_) => "REOPEN_OVERLAP",
            Self::ParentYearClosed(_) => "PARENT_YEAR_CLOSED",
            Self::InvalidEntryTransition { .. } => "INVALID_ENTRY_TRANSITION",
            Self::EntryNotEditable(_) => "ENTRY_NOT_EDITABLE",
            Self::SystemEntry(_) => "SYSTEM_ENTRY",
            Self::AccountNotFound(_) => "ACCOUNT_NOT_FOUND",
            Self::AccountCodeNotFound(_) => "ACCOUNT_CODE_NOT_FOUND",
            Self::EntryNotFound(_) => "ENTRY_NOT_FOUND",
            Self::PeriodNotFound(_) => "PERIOD_NOT_FOUND",
            Self::FiscalYearNotFound(_) => "FISCAL_YEAR_NOT_FOUND",
            Self::Conflict(_) => "CONFLICT",
            Self::CommitFailed(_) => "COMMIT_FAILED",
            Self::Storage(_) => "STORAGE_ERROR",
        }
    }

    /// Returns true if the caller can correct the request and retry.
    #[must_use]
    pub const fn is_caller_fixable(&self) -> bool {
        self.category().is_caller_fixable()
    }

    /// A closed month or fiscal year.
    pub(crate) fn period_closed(name: &str, window: DateWindow) -> Self {
        Self::PeriodClosed {
            name: name.to_string(),
            start: window.start,
            end: window.end,
        }
    }

    /// An inactive month or fiscal year.
    pub(crate) fn period_inactive(name: &str, window: DateWindow) -> Self {
        Self::PeriodInactive {
            name: name.to_string(),
            start: window.start,
            end: window.end,
        }
    }

    /// Maps a failed store read.
    pub(crate) fn storage(err: StoreError) -> Self {
        Self::Storage(err.to_string())
    }

    /// Maps a failed commit. Nothing from the batch was persisted.
    pub(crate) fn commit(err: StoreError) -> Self {
        match err {
            StoreError::Conflict(detail) => Self::Conflict(detail),
            other => Self::CommitFailed(other.to_string()),
        }
    }
}

fn format_issues(issues: &[AccountIssue]) -> String {
    issues
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

fn format_reasons(reasons: &[NotReadyReason]) -> String {
    reasons
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

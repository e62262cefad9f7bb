//! Double-entry journal: entries, validation, balances and movements.

pub mod balance;
pub mod movement;
pub mod types;
pub mod validation;
pub mod workflow;

#[cfg(test)]
mod balance_props;
#[cfg(test)]
mod validation_props;

pub use balance::{
    AccountBalance, AccountBalances, BalanceAggregator, LineSums, RunningBalance, TrialBalance,
    TrialBalanceRow,
};
pub use movement::{AccountLedger, Movement, MovementProcessor};
pub use types::{
    EntryAudit, EntryKind, EntryReceipt, EntryStatus, EntryTotals, EntryWarning, JournalEntry,
    JournalLine, LineInput, NewEntry, NewEntryInput,
};
pub use validation::{JournalValidator, PeriodContext, ValidatedEntry, ValidatedLine};
pub use workflow::{EntryWorkflow, StatusChange};

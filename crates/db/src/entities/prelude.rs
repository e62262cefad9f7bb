//! Entity re-exports.

pub use super::accounts::Entity as Accounts;
pub use super::entry_sequences::Entity as EntrySequences;
pub use super::fiscal_years::Entity as FiscalYears;
pub use super::journal_entries::Entity as JournalEntries;
pub use super::journal_lines::Entity as JournalLines;
pub use super::monthly_periods::Entity as MonthlyPeriods;

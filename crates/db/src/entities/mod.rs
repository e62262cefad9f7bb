//! `SeaORM` entities for the ledger schema.

pub mod prelude;

pub mod accounts;
pub mod entry_sequences;
pub mod fiscal_years;
pub mod journal_entries;
pub mod journal_lines;
pub mod monthly_periods;
pub mod sea_orm_active_enums;

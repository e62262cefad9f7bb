//! Conversions between `SeaORM` models and ledger domain types.
//!
//! Rows that no longer satisfy domain rules (an unparsable account code, a
//! negative line position) surface as [`StoreError::Backend`]; the schema
//! constraints are meant to make them unreachable.

use quire_core::accounts::{self, Account, AccountCode};
use quire_core::fiscal::{self, FiscalYear, MonthlyPeriod, PeriodAudit};
use quire_core::ledger::{self, EntryAudit, EntryTotals, JournalEntry, JournalLine, NewEntry};
use quire_core::store::StoreError;
use quire_shared::types::{
    AccountId, ActorId, Amount, FiscalYearId, JournalEntryId, JournalLineId, MonthlyPeriodId,
};
use sea_orm::ActiveValue::Set;

use crate::entities::{
    accounts as account_rows, fiscal_years, journal_entries, journal_lines, monthly_periods,
    sea_orm_active_enums::{AccountNature, AccountType, EntryKind, EntryStatus, PeriodStatus},
};

// ============================================================
// ENUMS
// ============================================================

impl From<accounts::AccountType> for AccountType {
    fn from(value: accounts::AccountType) -> Self {
        match value {
            accounts::AccountType::Asset => Self::Asset,
            accounts::AccountType::Liability => Self::Liability,
            accounts::AccountType::Equity => Self::Equity,
            accounts::AccountType::Revenue => Self::Revenue,
            accounts::AccountType::Expense => Self::Expense,
            accounts::AccountType::Cost => Self::Cost,
        }
    }
}

impl From<AccountType> for accounts::AccountType {
    fn from(value: AccountType) -> Self {
        match value {
            AccountType::Asset => Self::Asset,
            AccountType::Liability => Self::Liability,
            AccountType::Equity => Self::Equity,
            AccountType::Revenue => Self::Revenue,
            AccountType::Expense => Self::Expense,
            AccountType::Cost => Self::Cost,
        }
    }
}

impl From<accounts::Nature> for AccountNature {
    fn from(value: accounts::Nature) -> Self {
        match value {
            accounts::Nature::DebitIncreasing => Self::DebitIncreasing,
            accounts::Nature::CreditIncreasing => Self::CreditIncreasing,
        }
    }
}

impl From<AccountNature> for accounts::Nature {
    fn from(value: AccountNature) -> Self {
        match value {
            AccountNature::DebitIncreasing => Self::DebitIncreasing,
            AccountNature::CreditIncreasing => Self::CreditIncreasing,
        }
    }
}

impl From<fiscal::PeriodStatus> for PeriodStatus {
    fn from(value: fiscal::PeriodStatus) -> Self {
        match value {
            fiscal::PeriodStatus::Open => Self::Open,
            fiscal::PeriodStatus::Closed => Self::Closed,
            fiscal::PeriodStatus::Reopened => Self::Reopened,
        }
    }
}

impl From<PeriodStatus> for fiscal::PeriodStatus {
    fn from(value: PeriodStatus) -> Self {
        match value {
            PeriodStatus::Open => Self::Open,
            PeriodStatus::Closed => Self::Closed,
            PeriodStatus::Reopened => Self::Reopened,
        }
    }
}

impl From<ledger::EntryStatus> for EntryStatus {
    fn from(value: ledger::EntryStatus) -> Self {
        match value {
            ledger::EntryStatus::Pending => Self::Pending,
            ledger::EntryStatus::Approved => Self::Approved,
            ledger::EntryStatus::Voided => Self::Voided,
        }
    }
}

impl From<EntryStatus> for ledger::EntryStatus {
    fn from(value: EntryStatus) -> Self {
        match value {
            EntryStatus::Pending => Self::Pending,
            EntryStatus::Approved => Self::Approved,
            EntryStatus::Voided => Self::Voided,
        }
    }
}

impl From<ledger::EntryKind> for EntryKind {
    fn from(value: ledger::EntryKind) -> Self {
        match value {
            ledger::EntryKind::Regular => Self::Regular,
            ledger::EntryKind::Closing => Self::Closing,
            ledger::EntryKind::Opening => Self::Opening,
        }
    }
}

impl From<EntryKind> for ledger::EntryKind {
    fn from(value: EntryKind) -> Self {
        match value {
            EntryKind::Regular => Self::Regular,
            EntryKind::Closing => Self::Closing,
            EntryKind::Opening => Self::Opening,
        }
    }
}

// ============================================================
// ACCOUNTS
// ============================================================

pub(crate) fn account_from_model(model: account_rows::Model) -> Result<Account, StoreError> {
    let code = AccountCode::parse(&model.code)
        .map_err(|e| StoreError::Backend(format!("account {}: {e}", model.id)))?;
    Ok(Account {
        id: AccountId::from(model.id),
        code,
        name: model.name,
        account_type: model.account_type.into(),
        nature: model.nature.into(),
        parent_id: model.parent_id.map(AccountId::from),
        is_parent: model.is_parent,
        is_active: model.is_active,
        created_at: model.created_at,
        updated_at: model.updated_at,
    })
}

pub(crate) fn account_to_active(account: &Account) -> account_rows::ActiveModel {
    account_rows::ActiveModel {
        id: Set(account.id.0),
        code: Set(account.code.as_str().to_string()),
        name: Set(account.name.clone()),
        account_type: Set(account.account_type.into()),
        nature: Set(account.nature.into()),
        parent_id: Set(account.parent_id.map(|id| id.0)),
        is_parent: Set(account.is_parent),
        is_active: Set(account.is_active),
        created_at: Set(account.created_at),
        updated_at: Set(account.updated_at),
    }
}

// ============================================================
// FISCAL YEARS & MONTHS
// ============================================================

/// Builds a [`PeriodAudit`] from a row carrying the shared audit columns.
macro_rules! period_audit {
    ($model:expr) => {
        PeriodAudit {
            closed_by: $model.closed_by.map(ActorId::from),
            closed_at: $model.closed_at,
            reopened_by: $model.reopened_by.map(ActorId::from),
            reopened_at: $model.reopened_at,
            reopen_reason: $model.reopen_reason,
            reclosed_by: $model.reclosed_by.map(ActorId::from),
            reclosed_at: $model.reclosed_at,
        }
    };
}

pub(crate) fn year_from_model(model: fiscal_years::Model) -> FiscalYear {
    FiscalYear {
        id: FiscalYearId::from(model.id),
        name: model.name,
        start_date: model.start_date,
        end_date: model.end_date,
        status: model.status.into(),
        is_active: model.is_active,
        created_at: model.created_at,
        audit: period_audit!(model),
    }
}

pub(crate) fn year_to_active(year: &FiscalYear) -> fiscal_years::ActiveModel {
    let audit = &year.audit;
    fiscal_years::ActiveModel {
        id: Set(year.id.0),
        name: Set(year.name.clone()),
        start_date: Set(year.start_date),
        end_date: Set(year.end_date),
        status: Set(year.status.into()),
        is_active: Set(year.is_active),
        closed_by: Set(audit.closed_by.map(|a| a.0)),
        closed_at: Set(audit.closed_at),
        reopened_by: Set(audit.reopened_by.map(|a| a.0)),
        reopened_at: Set(audit.reopened_at),
        reopen_reason: Set(audit.reopen_reason.clone()),
        reclosed_by: Set(audit.reclosed_by.map(|a| a.0)),
        reclosed_at: Set(audit.reclosed_at),
        created_at: Set(year.created_at),
    }
}

pub(crate) fn period_from_model(model: monthly_periods::Model) -> Result<MonthlyPeriod, StoreError> {
    let period_number = u32::try_from(model.period_number).map_err(|_| {
        StoreError::Backend(format!(
            "period {} has number {}",
            model.id, model.period_number
        ))
    })?;
    Ok(MonthlyPeriod {
        id: MonthlyPeriodId::from(model.id),
        fiscal_year_id: FiscalYearId::from(model.fiscal_year_id),
        period_number,
        name: model.name,
        start_date: model.start_date,
        end_date: model.end_date,
        status: model.status.into(),
        is_active: model.is_active,
        audit: period_audit!(model),
    })
}

pub(crate) fn period_to_active(period: &MonthlyPeriod) -> Result<monthly_periods::ActiveModel, StoreError> {
    let period_number = i32::try_from(period.period_number)
        .map_err(|_| StoreError::Backend(format!("period number {} out of range", period.period_number)))?;
    let audit = &period.audit;
    Ok(monthly_periods::ActiveModel {
        id: Set(period.id.0),
        fiscal_year_id: Set(period.fiscal_year_id.0),
        period_number: Set(period_number),
        name: Set(period.name.clone()),
        start_date: Set(period.start_date),
        end_date: Set(period.end_date),
        status: Set(period.status.into()),
        is_active: Set(period.is_active),
        closed_by: Set(audit.closed_by.map(|a| a.0)),
        closed_at: Set(audit.closed_at),
        reopened_by: Set(audit.reopened_by.map(|a| a.0)),
        reopened_at: Set(audit.reopened_at),
        reopen_reason: Set(audit.reopen_reason.clone()),
        reclosed_by: Set(audit.reclosed_by.map(|a| a.0)),
        reclosed_at: Set(audit.reclosed_at),
    })
}

// ============================================================
// JOURNAL
// ============================================================

pub(crate) fn entry_from_models(
    header: journal_entries::Model,
    lines: Vec<journal_lines::Model>,
) -> Result<JournalEntry, StoreError> {
    let lines = lines
        .into_iter()
        .map(line_from_model)
        .collect::<Result<Vec<_>, _>>()?;
    Ok(JournalEntry {
        id: JournalEntryId::from(header.id),
        number: header.entry_number,
        fiscal_year_id: FiscalYearId::from(header.fiscal_year_id),
        period_id: MonthlyPeriodId::from(header.period_id),
        date: header.entry_date,
        description: header.description,
        status: header.status.into(),
        kind: header.kind.into(),
        totals: EntryTotals {
            debit: Amount::new(header.total_debit),
            credit: Amount::new(header.total_credit),
        },
        lines,
        audit: EntryAudit {
            created_by: ActorId::from(header.created_by),
            created_at: header.created_at,
            approved_by: header.approved_by.map(ActorId::from),
            approved_at: header.approved_at,
            voided_by: header.voided_by.map(ActorId::from),
            voided_at: header.voided_at,
            void_reason: header.void_reason,
        },
    })
}

fn line_from_model(model: journal_lines::Model) -> Result<JournalLine, StoreError> {
    let position = u32::try_from(model.position)
        .map_err(|_| StoreError::Backend(format!("line {} has position {}", model.id, model.position)))?;
    Ok(JournalLine {
        id: JournalLineId::from(model.id),
        entry_id: JournalEntryId::from(model.entry_id),
        account_id: AccountId::from(model.account_id),
        debit: Amount::new(model.debit),
        credit: Amount::new(model.credit),
        memo: model.memo,
        position,
    })
}

pub(crate) fn new_entry_to_active(entry: &NewEntry, number: i64) -> journal_entries::ActiveModel {
    let totals = entry.totals();
    let audit = &entry.audit;
    journal_entries::ActiveModel {
        id: Set(entry.id.0),
        entry_number: Set(number),
        fiscal_year_id: Set(entry.fiscal_year_id.0),
        period_id: Set(entry.period_id.0),
        entry_date: Set(entry.date),
        description: Set(entry.description.clone()),
        status: Set(entry.status.into()),
        kind: Set(entry.kind.into()),
        total_debit: Set(totals.debit.into()),
        total_credit: Set(totals.credit.into()),
        created_by: Set(audit.created_by.0),
        created_at: Set(audit.created_at),
        approved_by: Set(audit.approved_by.map(|a| a.0)),
        approved_at: Set(audit.approved_at),
        voided_by: Set(audit.voided_by.map(|a| a.0)),
        voided_at: Set(audit.voided_at),
        void_reason: Set(audit.void_reason.clone()),
    }
}

pub(crate) fn line_to_active(line: &JournalLine) -> Result<journal_lines::ActiveModel, StoreError> {
    let position = i32::try_from(line.position)
        .map_err(|_| StoreError::Backend(format!("line position {} out of range", line.position)))?;
    Ok(journal_lines::ActiveModel {
        id: Set(line.id.0),
        entry_id: Set(line.entry_id.0),
        account_id: Set(line.account_id.0),
        debit: Set(line.debit.into()),
        credit: Set(line.credit.into()),
        memo: Set(line.memo.clone()),
        position: Set(position),
    })
}

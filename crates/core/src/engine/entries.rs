//! Journal entry operations.

use std::collections::HashMap;

use chrono::NaiveDate;
use quire_shared::types::{AccountId, ActorId, JournalEntryId, JournalLineId, MonthlyPeriodId};
use tracing::{info, warn};

use super::{LedgerEngine, log_failure};
use crate::accounts::Account;
use crate::clock::Clock;
use crate::error::LedgerError;
use crate::fiscal::{FiscalYear, MonthlyPeriod};
use crate::ledger::{
    EntryAudit, EntryKind, EntryReceipt, EntryStatus, EntryTotals, EntryWarning, EntryWorkflow,
    JournalEntry, JournalLine, JournalValidator, LineInput, NewEntry, NewEntryInput,
    PeriodContext, ValidatedLine,
};
use crate::store::{LedgerStore, WriteBatch, WriteOp};

/// The month an entry is filed under, its year, and the month that really
/// contains the date when the two differ.
struct ResolvedPeriod {
    year: FiscalYear,
    month: MonthlyPeriod,
    containing_month: Option<(FiscalYear, MonthlyPeriod)>,
}

impl ResolvedPeriod {
    fn context(&self) -> PeriodContext<'_> {
        PeriodContext {
            year: &self.year,
            month: &self.month,
            containing_month: self.containing_month.as_ref().map(|(y, m)| (y, m)),
        }
    }
}

impl<S: LedgerStore, C: Clock> LedgerEngine<S, C> {
    /// Validates a candidate entry and stores it as pending.
    ///
    /// Structure and balance are checked before anything is read from the
    /// store. The entry number is drawn from its fiscal year's counter inside
    /// the same commit that inserts the entry.
    ///
    /// # Errors
    ///
    /// Returns the rejection of the first failing validation stage, or a
    /// storage/consistency error.
    pub async fn validate_and_create_entry(
        &self,
        input: NewEntryInput,
    ) -> Result<EntryReceipt, LedgerError> {
        self.create_entry(input)
            .await
            .inspect_err(|e| log_failure("validate_and_create_entry", e))
    }

    async fn create_entry(&self, input: NewEntryInput) -> Result<EntryReceipt, LedgerError> {
        let lines = JournalValidator::check_structure(&input.description, &input.lines)?;
        let totals = JournalValidator::check_balance(&lines)?;

        let accounts = self.accounts_for(&lines).await?;
        JournalValidator::check_accounts(&lines, &accounts)?;

        let resolved = self.resolve_period(input.date, input.period_id).await?;
        let warnings = JournalValidator::new(&self.policy, self.clock.today())
            .check_period(input.date, resolved.context())?;
        log_warnings(&warnings);

        let id = JournalEntryId::new();
        let new_entry = NewEntry {
            id,
            fiscal_year_id: resolved.year.id,
            period_id: resolved.month.id,
            date: input.date,
            description: input.description.trim().to_string(),
            status: EntryStatus::Pending,
            kind: EntryKind::Regular,
            lines: journal_lines(id, lines),
            audit: EntryAudit::created(input.actor, self.clock.now()),
        };

        let receipt = self
            .commit(WriteBatch::from(WriteOp::InsertEntry(new_entry.clone())))
            .await?;
        let number = receipt
            .number_of(id)
            .ok_or_else(|| LedgerError::CommitFailed(format!("no number assigned to entry {id}")))?;
        let entry = new_entry.into_entry(number);

        info!(
            entry_id = %entry.id,
            number = %entry.display_number(),
            fiscal_year_id = %entry.fiscal_year_id,
            period_id = %entry.period_id,
            total = %totals.debit.round_money(),
            created_by = %input.actor,
            "Journal entry created"
        );

        Ok(EntryReceipt { entry, warnings })
    }

    /// Replaces every line of a pending entry.
    ///
    /// # Errors
    ///
    /// Returns `EntryNotEditable` unless the entry is pending, `SystemEntry`
    /// for closing/opening entries, or the first failing validation stage.
    pub async fn replace_entry_lines(
        &self,
        entry_id: JournalEntryId,
        lines: Vec<LineInput>,
        actor: ActorId,
    ) -> Result<EntryReceipt, LedgerError> {
        self.replace_lines(entry_id, lines, actor)
            .await
            .inspect_err(|e| log_failure("replace_entry_lines", e))
    }

    async fn replace_lines(
        &self,
        entry_id: JournalEntryId,
        lines: Vec<LineInput>,
        actor: ActorId,
    ) -> Result<EntryReceipt, LedgerError> {
        let mut entry = self.require_entry(entry_id).await?;
        EntryWorkflow::ensure_editable(&entry)?;

        let lines = JournalValidator::check_structure(&entry.description, &lines)?;
        JournalValidator::check_balance(&lines)?;
        let accounts = self.accounts_for(&lines).await?;
        JournalValidator::check_accounts(&lines, &accounts)?;

        let resolved = self.resolve_period(entry.date, Some(entry.period_id)).await?;
        let warnings = JournalValidator::new(&self.policy, self.clock.today())
            .check_period(entry.date, resolved.context())?;
        log_warnings(&warnings);

        let lines = journal_lines(entry.id, lines);
        let totals = EntryTotals::from_lines(&lines);
        self.commit(WriteBatch::from(WriteOp::ReplaceLines {
            entry_id,
            expected: entry.status,
            lines: lines.clone(),
            totals,
        }))
        .await?;

        entry.lines = lines;
        entry.totals = totals;
        info!(
            entry_id = %entry.id,
            number = %entry.display_number(),
            lines = entry.lines.len(),
            replaced_by = %actor,
            "Journal entry lines replaced"
        );

        Ok(EntryReceipt { entry, warnings })
    }

    /// Approves a pending entry, making it immutable and counted in
    /// balances.
    ///
    /// # Errors
    ///
    /// Returns `InvalidEntryTransition` unless the entry is pending,
    /// `PeriodClosed` if its month or year is closed, or
    /// `IneligibleAccounts` if an account has since become unusable.
    pub async fn approve_entry(
        &self,
        entry_id: JournalEntryId,
        actor: ActorId,
    ) -> Result<JournalEntry, LedgerError> {
        self.approve(entry_id, actor)
            .await
            .inspect_err(|e| log_failure("approve_entry", e))
    }

    async fn approve(&self, entry_id: JournalEntryId, actor: ActorId) -> Result<JournalEntry, LedgerError> {
        let mut entry = self.require_entry(entry_id).await?;
        let change = EntryWorkflow::approve(&entry, actor, self.clock.now())?;
        self.ensure_period_writable(&entry).await?;

        let lines: Vec<ValidatedLine> = entry
            .lines
            .iter()
            .map(|l| ValidatedLine {
                account_id: l.account_id,
                debit: l.debit,
                credit: l.credit,
                memo: l.memo.clone(),
                position: l.position,
            })
            .collect();
        let accounts = self.accounts_for(&lines).await?;
        JournalValidator::check_accounts(&lines, &accounts)?;

        self.commit(WriteBatch::from(WriteOp::UpdateEntryStatus {
            entry_id,
            expected: entry.status,
            change: change.clone(),
        }))
        .await?;
        change.apply(&mut entry);

        info!(
            entry_id = %entry.id,
            number = %entry.display_number(),
            approved_by = %actor,
            "Journal entry approved"
        );
        Ok(entry)
    }

    /// Voids a pending or approved entry.
    ///
    /// # Errors
    ///
    /// Returns `ReasonRequired` for a blank reason, `SystemEntry` for
    /// closing/opening entries, `InvalidEntryTransition` if already voided,
    /// or `PeriodClosed` if its month or year is closed.
    pub async fn void_entry(
        &self,
        entry_id: JournalEntryId,
        actor: ActorId,
        reason: &str,
    ) -> Result<JournalEntry, LedgerError> {
        self.void(entry_id, actor, reason)
            .await
            .inspect_err(|e| log_failure("void_entry", e))
    }

    async fn void(
        &self,
        entry_id: JournalEntryId,
        actor: ActorId,
        reason: &str,
    ) -> Result<JournalEntry, LedgerError> {
        let mut entry = self.require_entry(entry_id).await?;
        let change = EntryWorkflow::void(&entry, actor, self.clock.now(), reason)?;
        self.ensure_period_writable(&entry).await?;

        self.commit(WriteBatch::from(WriteOp::UpdateEntryStatus {
            entry_id,
            expected: entry.status,
            change: change.clone(),
        }))
        .await?;
        change.apply(&mut entry);

        info!(
            entry_id = %entry.id,
            number = %entry.display_number(),
            voided_by = %actor,
            reason = entry.audit.void_reason.as_deref().unwrap_or_default(),
            "Journal entry voided"
        );
        Ok(entry)
    }

    async fn accounts_for(
        &self,
        lines: &[ValidatedLine],
    ) -> Result<HashMap<AccountId, Account>, LedgerError> {
        let mut ids: Vec<AccountId> = lines.iter().map(|l| l.account_id).collect();
        ids.sort();
        ids.dedup();
        let accounts = self
            .store
            .accounts_by_ids(&ids)
            .await
            .map_err(LedgerError::storage)?;
        Ok(accounts.into_iter().map(|a| (a.id, a)).collect())
    }

    async fn resolve_period(
        &self,
        date: NaiveDate,
        period_id: Option<MonthlyPeriodId>,
    ) -> Result<ResolvedPeriod, LedgerError> {
        match period_id {
            Some(id) => {
                let month = self.require_period(id).await?;
                let year = self.require_year(month.fiscal_year_id).await?;
                let containing_month = if month.contains_date(date) {
                    None
                } else {
                    self.find_month(date).await?
                };
                Ok(ResolvedPeriod {
                    year,
                    month,
                    containing_month,
                })
            }
            None => {
                let (year, month) = self
                    .find_month(date)
                    .await?
                    .ok_or(LedgerError::NoPeriodForDate(date))?;
                Ok(ResolvedPeriod {
                    year,
                    month,
                    containing_month: None,
                })
            }
        }
    }

    /// Closed periods are immutable: no approvals or voids inside them.
    /// A date filed outside its month also needs its own month open.
    async fn ensure_period_writable(&self, entry: &JournalEntry) -> Result<(), LedgerError> {
        let month = self.require_period(entry.period_id).await?;
        if month.status.is_closed() {
            return Err(LedgerError::period_closed(&month.name, month.window()));
        }
        if !month.contains_date(entry.date) {
            if let Some((_, other)) = self.find_month(entry.date).await? {
                if other.status.is_closed() {
                    return Err(LedgerError::period_closed(&other.name, other.window()));
                }
            }
        }
        let year = self.require_year(entry.fiscal_year_id).await?;
        if year.status.is_closed() {
            return Err(LedgerError::period_closed(&year.name, year.window()));
        }
        Ok(())
    }
}

fn journal_lines(entry_id: JournalEntryId, lines: Vec<ValidatedLine>) -> Vec<JournalLine> {
    lines
        .into_iter()
        .map(|line| JournalLine {
            id: JournalLineId::new(),
            entry_id,
            account_id: line.account_id,
            debit: line.debit,
            credit: line.credit,
            memo: line.memo,
            position: line.position,
        })
        .collect()
}

fn log_warnings(warnings: &[EntryWarning]) {
    for warning in warnings {
        match warning {
            EntryWarning::DateOutsidePeriod {
                date,
                period_start,
                period_end,
            } => warn!(
                %date,
                %period_start,
                %period_end,
                "Entry date outside its period accepted under lenient policy"
            ),
        }
    }
}

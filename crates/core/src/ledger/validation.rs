//! Journal entry validation.
//!
//! Stages run in a fixed order and the first failing stage rejects:
//! structure, balance, account eligibility, then period and date.

use std::collections::HashMap;

use chrono::NaiveDate;
use quire_shared::config::DatePolicy;
use quire_shared::types::{AccountId, Amount};

use super::types::{EntryTotals, EntryWarning, LineInput};
use crate::accounts::{Account, AccountIssue, AccountProblem};
use crate::error::LedgerError;
use crate::fiscal::{FiscalYear, MonthlyPeriod};
use crate::policy::LedgerPolicy;

/// A line that passed the structural stage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidatedLine {
    /// Target account.
    pub account_id: AccountId,
    /// Debit amount, zero on credit lines.
    pub debit: Amount,
    /// Credit amount, zero on debit lines.
    pub credit: Amount,
    /// Optional note, trimmed; blank notes are dropped.
    pub memo: Option<String>,
    /// Zero-based input order.
    pub position: u32,
}

/// Output of a successful validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidatedEntry {
    /// Normalised lines.
    pub lines: Vec<ValidatedLine>,
    /// Unrounded totals.
    pub totals: EntryTotals,
    /// Non-fatal findings.
    pub warnings: Vec<EntryWarning>,
}

/// The periods an entry date is checked against.
#[derive(Debug, Clone, Copy)]
pub struct PeriodContext<'a> {
    /// Fiscal year of `month`.
    pub year: &'a FiscalYear,
    /// Month the entry is filed under.
    pub month: &'a MonthlyPeriod,
    /// Month that actually contains the date, with its year, when the date
    /// lies outside `month`. `None` there means no month contains the date.
    pub containing_month: Option<(&'a FiscalYear, &'a MonthlyPeriod)>,
}

/// Validates candidate journal entries.
#[derive(Debug, Clone, Copy)]
pub struct JournalValidator<'a> {
    policy: &'a LedgerPolicy,
    today: NaiveDate,
}

impl<'a> JournalValidator<'a> {
    /// Creates a validator for the given policy and current date.
    #[must_use]
    pub const fn new(policy: &'a LedgerPolicy, today: NaiveDate) -> Self {
        Self { policy, today }
    }

    /// Runs every stage.
    ///
    /// # Errors
    ///
    /// Returns the rejection of the first failing stage.
    pub fn validate(
        &self,
        date: NaiveDate,
        description: &str,
        lines: &[LineInput],
        accounts: &HashMap<AccountId, Account>,
        period: PeriodContext<'_>,
    ) -> Result<ValidatedEntry, LedgerError> {
        let lines = Self::check_structure(description, lines)?;
        let totals = Self::check_balance(&lines)?;
        Self::check_accounts(&lines, accounts)?;
        let warnings = self.check_period(date, period)?;
        Ok(ValidatedEntry {
            lines,
            totals,
            warnings,
        })
    }

    /// Stage 1: shape of the entry and of every line.
    ///
    /// # Errors
    ///
    /// Returns the first structural problem found.
    pub fn check_structure(
        description: &str,
        lines: &[LineInput],
    ) -> Result<Vec<ValidatedLine>, LedgerError> {
        if description.trim().is_empty() {
            return Err(LedgerError::EmptyDescription);
        }
        if lines.is_empty() {
            return Err(LedgerError::NoLines);
        }

        let mut validated = Vec::with_capacity(lines.len());
        for (position, line) in lines.iter().enumerate() {
            let account_id = line
                .account_id
                .ok_or(LedgerError::MissingAccount { position })?;
            let debit = line.debit.unwrap_or(Amount::ZERO);
            let credit = line.credit.unwrap_or(Amount::ZERO);

            if debit.is_negative() || credit.is_negative() {
                return Err(LedgerError::NegativeAmount { position });
            }
            if !debit.fits_storage_magnitude() || !credit.fits_storage_magnitude() {
                return Err(LedgerError::AmountOutOfRange { position });
            }
            if !debit.fits_storage_scale() || !credit.fits_storage_scale() {
                return Err(LedgerError::ExcessPrecision { position });
            }
            if debit.is_zero() && credit.is_zero() {
                return Err(LedgerError::MissingAmount { position });
            }
            if debit.is_positive() && credit.is_positive() {
                return Err(LedgerError::BothSides { position });
            }

            validated.push(ValidatedLine {
                account_id,
                debit,
                credit,
                memo: line
                    .memo
                    .as_deref()
                    .map(str::trim)
                    .filter(|m| !m.is_empty())
                    .map(str::to_string),
                position: u32::try_from(position).unwrap_or(u32::MAX),
            });
        }

        let has_debit = validated.iter().any(|l| l.debit.is_positive());
        let has_credit = validated.iter().any(|l| l.credit.is_positive());
        if !has_debit || !has_credit {
            return Err(LedgerError::SingleSided);
        }

        Ok(validated)
    }

    /// Stage 2: debits equal credits after rounding both to two decimals.
    ///
    /// # Errors
    ///
    /// Returns `Unbalanced` with both rounded totals and their difference.
    pub fn check_balance(lines: &[ValidatedLine]) -> Result<EntryTotals, LedgerError> {
        let mut totals = EntryTotals::default();
        for line in lines {
            let out_of_range = || LedgerError::AmountOutOfRange {
                position: line.position as usize,
            };
            totals.debit = totals.debit.checked_add(line.debit).ok_or_else(out_of_range)?;
            totals.credit = totals.credit.checked_add(line.credit).ok_or_else(out_of_range)?;
        }

        if totals.is_balanced() {
            Ok(totals)
        } else {
            Err(LedgerError::Unbalanced {
                debit: totals.debit.round_money(),
                credit: totals.credit.round_money(),
                difference: totals.difference(),
            })
        }
    }

    /// Stage 3: every account exists, is active and is a leaf.
    ///
    /// # Errors
    ///
    /// Returns `IneligibleAccounts` listing every offending account once.
    pub fn check_accounts(
        lines: &[ValidatedLine],
        accounts: &HashMap<AccountId, Account>,
    ) -> Result<(), LedgerError> {
        let mut issues: Vec<AccountIssue> = Vec::new();
        for line in lines {
            if issues.iter().any(|i| i.account_id == line.account_id) {
                continue;
            }
            let problem = match accounts.get(&line.account_id) {
                None => Some(AccountProblem::Missing),
                Some(account) if !account.is_active => Some(AccountProblem::Inactive),
                Some(account) if account.is_parent => Some(AccountProblem::Summary),
                Some(_) => None,
            };
            if let Some(problem) = problem {
                issues.push(AccountIssue {
                    account_id: line.account_id,
                    problem,
                });
            }
        }

        if issues.is_empty() {
            Ok(())
        } else {
            Err(LedgerError::IneligibleAccounts(issues))
        }
    }

    /// Stage 4: the date fits the month and both periods accept postings.
    ///
    /// # Errors
    ///
    /// Returns a period-state rejection.
    pub fn check_period(
        &self,
        date: NaiveDate,
        period: PeriodContext<'_>,
    ) -> Result<Vec<EntryWarning>, LedgerError> {
        let PeriodContext {
            year,
            month,
            containing_month,
        } = period;
        let mut warnings = Vec::new();

        if !month.contains_date(date) {
            match self.policy.date_policy {
                DatePolicy::Strict => {
                    return Err(LedgerError::DateOutsidePeriod {
                        date,
                        start: month.start_date,
                        end: month.end_date,
                    });
                }
                DatePolicy::Lenient => {
                    let (other_year, other) =
                        containing_month.ok_or(LedgerError::NoPeriodForDate(date))?;
                    // Entries stay inside the fiscal year they are filed under.
                    if other_year.id != year.id {
                        return Err(LedgerError::DateOutsidePeriod {
                            date,
                            start: year.start_date,
                            end: year.end_date,
                        });
                    }
                    if other.status.is_closed() {
                        return Err(LedgerError::period_closed(&other.name, other.window()));
                    }
                    if !other.is_active {
                        return Err(LedgerError::period_inactive(&other.name, other.window()));
                    }
                    warnings.push(EntryWarning::DateOutsidePeriod {
                        date,
                        period_start: month.start_date,
                        period_end: month.end_date,
                    });
                }
            }
        }

        if month.status.is_closed() {
            return Err(LedgerError::period_closed(&month.name, month.window()));
        }
        if year.status.is_closed() {
            return Err(LedgerError::period_closed(&year.name, year.window()));
        }
        if !month.is_active {
            return Err(LedgerError::period_inactive(&month.name, month.window()));
        }
        if !year.is_active {
            return Err(LedgerError::period_inactive(&year.name, year.window()));
        }

        if !self.policy.allow_future_dates && date > self.today {
            return Err(LedgerError::FutureDate {
                date,
                today: self.today,
            });
        }

        Ok(warnings)
    }
}

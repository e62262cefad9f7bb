//! Period lifecycle state machine.
//!
//! ```text
//! Open --close--> Closed --reopen(reason)--> Reopened --reclose--> Closed
//! ```
//!
//! The same machine governs fiscal years and their monthly periods.

use chrono::{DateTime, Datelike, Months, NaiveDate, Utc};
use quire_shared::types::{ActorId, FiscalYearId, MonthlyPeriodId};

use super::period::{DateWindow, MonthlyPeriod, PeriodAudit, PeriodStatus};
use crate::error::LedgerError;

/// Which close a `close` request performs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CloseKind {
    /// First close of an open period.
    Close,
    /// Close of a reopened period.
    Reclose,
}

/// Stateless service for period status transitions.
pub struct PeriodLifecycle;

impl PeriodLifecycle {
    /// Decides how a fiscal year in `status` gets closed.
    ///
    /// # Errors
    ///
    /// Returns `InvalidPeriodTransition` if the year is already closed.
    pub fn close_kind(status: PeriodStatus) -> Result<CloseKind, LedgerError> {
        match status {
            PeriodStatus::Open => Ok(CloseKind::Close),
            PeriodStatus::Reopened => Ok(CloseKind::Reclose),
            PeriodStatus::Closed => Err(LedgerError::InvalidPeriodTransition {
                from: status,
                to: PeriodStatus::Closed,
            }),
        }
    }

    /// Validates a first close of a month.
    ///
    /// # Errors
    ///
    /// Returns `InvalidPeriodTransition` unless the month is open.
    pub fn check_close_month(status: PeriodStatus) -> Result<(), LedgerError> {
        match status {
            PeriodStatus::Open => Ok(()),
            _ => Err(LedgerError::InvalidPeriodTransition {
                from: status,
                to: PeriodStatus::Closed,
            }),
        }
    }

    /// Validates a reclose.
    ///
    /// # Errors
    ///
    /// Returns `InvalidPeriodTransition` unless the period was reopened.
    pub fn check_reclose(status: PeriodStatus) -> Result<(), LedgerError> {
        match status {
            PeriodStatus::Reopened => Ok(()),
            _ => Err(LedgerError::InvalidPeriodTransition {
                from: status,
                to: PeriodStatus::Closed,
            }),
        }
    }

    /// Validates a reopen and returns the trimmed reason.
    ///
    /// # Errors
    ///
    /// Returns `ReasonRequired` for an empty reason and
    /// `InvalidPeriodTransition` unless the period is closed.
    pub fn check_reopen(status: PeriodStatus, reason: &str) -> Result<String, LedgerError> {
        let reason = reason.trim();
        if reason.is_empty() {
            return Err(LedgerError::ReasonRequired);
        }
        match status {
            PeriodStatus::Closed => Ok(reason.to_string()),
            _ => Err(LedgerError::InvalidPeriodTransition {
                from: status,
                to: PeriodStatus::Reopened,
            }),
        }
    }

    /// Marks a period closed and records who did it.
    pub fn apply_close(
        status: &mut PeriodStatus,
        audit: &mut PeriodAudit,
        kind: CloseKind,
        actor: ActorId,
        at: DateTime<Utc>,
    ) {
        *status = PeriodStatus::Closed;
        match kind {
            CloseKind::Close => {
                audit.closed_by = Some(actor);
                audit.closed_at = Some(at);
            }
            CloseKind::Reclose => {
                audit.reclosed_by = Some(actor);
                audit.reclosed_at = Some(at);
            }
        }
    }

    /// Marks a period reopened and records who did it and why.
    pub fn apply_reopen(
        status: &mut PeriodStatus,
        audit: &mut PeriodAudit,
        actor: ActorId,
        at: DateTime<Utc>,
        reason: &str,
    ) {
        *status = PeriodStatus::Reopened;
        audit.reopened_by = Some(actor);
        audit.reopened_at = Some(at);
        audit.reopen_reason = Some(reason.to_string());
    }
}

/// Validates a fiscal year date range.
///
/// # Errors
///
/// Returns `InvalidDateRange` unless `start_date` is before `end_date`.
pub fn validate_date_range(start_date: NaiveDate, end_date: NaiveDate) -> Result<DateWindow, LedgerError> {
    if start_date >= end_date {
        return Err(LedgerError::InvalidDateRange {
            start: start_date,
            end: end_date,
        });
    }
    Ok(DateWindow {
        start: start_date,
        end: end_date,
    })
}

/// Checks if two date ranges overlap.
///
/// Two ranges [a_start, a_end] and [b_start, b_end] overlap if:
/// a_start <= b_end AND a_end >= b_start
#[must_use]
pub fn date_ranges_overlap(a: DateWindow, b: DateWindow) -> bool {
    a.start <= b.end && a.end >= b.start
}

/// Range of the fiscal year following `current`.
///
/// A year spanning whole calendar months is followed by one of the same
/// number of months, whatever day it starts on. Any other year is followed by
/// one of the same number of days.
#[must_use]
pub fn next_year_range(current: DateWindow) -> Option<DateWindow> {
    let start = current.end.succ_opt()?;
    let end = match whole_months_between(current.start, start) {
        Some(months) => start.checked_add_months(months)?,
        None => start.checked_add_signed(start - current.start)?,
    }
    .pred_opt()?;
    Some(DateWindow { start, end })
}

/// Number of calendar months from `from` to `to` when it is whole.
fn whole_months_between(from: NaiveDate, to: NaiveDate) -> Option<Months> {
    let years = i64::from(to.year()) - i64::from(from.year());
    let months = years * 12 + i64::from(to.month()) - i64::from(from.month());
    let months = Months::new(u32::try_from(months).ok().filter(|m| *m > 0)?);
    (from.checked_add_months(months) == Some(to)).then_some(months)
}

/// Generates monthly periods for a fiscal year.
///
/// Each period runs to the end of its calendar month or to the fiscal year
/// end, whichever comes first. A year starting mid-month gets a short first
/// period.
#[must_use]
pub fn generate_monthly_periods(
    fiscal_year_id: FiscalYearId,
    start_date: NaiveDate,
    end_date: NaiveDate,
) -> Vec<MonthlyPeriod> {
    let mut periods = Vec::new();
    let mut current = start_date;
    let mut period_number: u32 = 1;

    while current <= end_date {
        let month_end = last_day_of_month(current);
        let period_end = month_end.min(end_date);

        periods.push(MonthlyPeriod {
            id: MonthlyPeriodId::new(),
            fiscal_year_id,
            period_number,
            name: format!("{} {}", month_name(current.month()), current.year()),
            start_date: current,
            end_date: period_end,
            status: PeriodStatus::Open,
            is_active: true,
            audit: PeriodAudit::default(),
        });

        let Some(next) = period_end.succ_opt() else {
            break;
        };
        current = next;
        period_number += 1;
    }

    periods
}

/// Returns the last day of the month containing `date`.
#[must_use]
pub fn last_day_of_month(date: NaiveDate) -> NaiveDate {
    date.with_day(1)
        .and_then(|first| first.checked_add_months(Months::new(1)))
        .and_then(|next| next.pred_opt())
        .unwrap_or(NaiveDate::MAX)
}

/// Returns month name.
#[must_use]
pub const fn month_name(month: u32) -> &'static str {
    match month {
        1 => "January",
        2 => "February",
        3 => "March",
        4 => "April",
        5 => "May",
        6 => "June",
        7 => "July",
        8 => "August",
        9 => "September",
        10 => "October",
        11 => "November",
        12 => "December",
        _ => "Unknown",
    }
}

//! Fiscal year and monthly period types.

use chrono::{DateTime, NaiveDate, Utc};
use quire_shared::types::{ActorId, FiscalYearId, MonthlyPeriodId};
use serde::{Deserialize, Serialize};

use crate::error::LedgerError;

/// Lifecycle status shared by fiscal years and monthly periods.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PeriodStatus {
    /// Never closed; accepts postings.
    Open,
    /// Closed; rejects postings.
    Closed,
    /// Closed once, then reopened with a justification; accepts postings.
    Reopened,
}

impl PeriodStatus {
    /// Returns true if the period is closed.
    #[must_use]
    pub const fn is_closed(self) -> bool {
        matches!(self, Self::Closed)
    }

    /// Lowercase name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Open => "open",
            Self::Closed => "closed",
            Self::Reopened => "reopened",
        }
    }
}

impl std::fmt::Display for PeriodStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Who closed, reopened and reclosed a period, and when.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PeriodAudit {
    /// Actor of the first close.
    pub closed_by: Option<ActorId>,
    /// Time of the first close.
    pub closed_at: Option<DateTime<Utc>>,
    /// Actor of the latest reopen.
    pub reopened_by: Option<ActorId>,
    /// Time of the latest reopen.
    pub reopened_at: Option<DateTime<Utc>>,
    /// Justification of the latest reopen.
    pub reopen_reason: Option<String>,
    /// Actor of the latest reclose.
    pub reclosed_by: Option<ActorId>,
    /// Time of the latest reclose.
    pub reclosed_at: Option<DateTime<Utc>>,
}

/// An inclusive date range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DateWindow {
    /// First day, inclusive.
    pub start: NaiveDate,
    /// Last day, inclusive.
    pub end: NaiveDate,
}

impl DateWindow {
    /// Creates a window.
    ///
    /// # Errors
    ///
    /// Returns `InvalidDateRange` if `start` is after `end`.
    pub fn new(start: NaiveDate, end: NaiveDate) -> Result<Self, LedgerError> {
        if start > end {
            return Err(LedgerError::InvalidDateRange { start, end });
        }
        Ok(Self { start, end })
    }

    /// Returns true if the date falls within the window.
    #[must_use]
    pub fn contains(&self, date: NaiveDate) -> bool {
        date >= self.start && date <= self.end
    }
}

/// Fiscal year definition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FiscalYear {
    /// Unique identifier.
    pub id: FiscalYearId,
    /// Year name (e.g., "FY2026").
    pub name: String,
    /// Start date of the fiscal year.
    pub start_date: NaiveDate,
    /// End date of the fiscal year.
    pub end_date: NaiveDate,
    /// Lifecycle status.
    pub status: PeriodStatus,
    /// Whether the year accepts postings at all.
    pub is_active: bool,
    /// Close/reopen history.
    pub audit: PeriodAudit,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
}

impl FiscalYear {
    /// The year's date range.
    #[must_use]
    pub const fn window(&self) -> DateWindow {
        DateWindow {
            start: self.start_date,
            end: self.end_date,
        }
    }

    /// Returns true if the given date falls within this year.
    #[must_use]
    pub fn contains_date(&self, date: NaiveDate) -> bool {
        date >= self.start_date && date <= self.end_date
    }
}

/// A month within a fiscal year.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MonthlyPeriod {
    /// Unique identifier.
    pub id: MonthlyPeriodId,
    /// Fiscal year this period belongs to.
    pub fiscal_year_id: FiscalYearId,
    /// Period number within the year, starting at 1.
    pub period_number: u32,
    /// Period name (e.g., "January 2026").
    pub name: String,
    /// Start date of the period.
    pub start_date: NaiveDate,
    /// End date of the period.
    pub end_date: NaiveDate,
    /// Lifecycle status.
    pub status: PeriodStatus,
    /// Whether the month accepts postings at all.
    pub is_active: bool,
    /// Close/reopen history.
    pub audit: PeriodAudit,
}

impl MonthlyPeriod {
    /// The month's date range.
    #[must_use]
    pub const fn window(&self) -> DateWindow {
        DateWindow {
            start: self.start_date,
            end: self.end_date,
        }
    }

    /// Returns true if the given date falls within this period.
    #[must_use]
    pub fn contains_date(&self, date: NaiveDate) -> bool {
        date >= self.start_date && date <= self.end_date
    }
}

/// A fiscal year with its generated months.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FiscalYearWithPeriods {
    /// The fiscal year.
    pub year: FiscalYear,
    /// Its months, in order.
    pub periods: Vec<MonthlyPeriod>,
}

/// What a balance or readiness query covers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind", content = "id")]
pub enum PeriodScope {
    /// A whole fiscal year.
    Year(FiscalYearId),
    /// One month.
    Month(MonthlyPeriodId),
}

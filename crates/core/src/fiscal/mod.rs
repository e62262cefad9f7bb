//! Fiscal year and period management.

pub mod lifecycle;
pub mod period;
pub mod readiness;

pub use lifecycle::{CloseKind, PeriodLifecycle};
pub use period::{
    DateWindow, FiscalYear, FiscalYearWithPeriods, MonthlyPeriod, PeriodAudit, PeriodScope,
    PeriodStatus,
};
pub use readiness::{NotReadyReason, ReadinessReport};

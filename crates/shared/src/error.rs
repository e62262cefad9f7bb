//! Error categories shared across crates.
//!
//! Every rejection produced by the ledger core falls into exactly one
//! category, so callers can decide how to react without matching on each
//! concrete variant.

use serde::{Deserialize, Serialize};

/// Coarse classification of a ledger failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCategory {
    /// Malformed input: empty entry, bad line amounts, missing description.
    Structural,
    /// Debits and credits do not agree.
    Balance,
    /// An account cannot receive postings.
    AccountEligibility,
    /// A fiscal year or month is in the wrong state for the request.
    PeriodState,
    /// A status change that the lifecycle does not allow.
    Transition,
    /// A referenced record does not exist.
    NotFound,
    /// A concurrent writer changed the data first, or an atomic write failed.
    Consistency,
    /// The persistence backend could not be reached or returned an error.
    Storage,
}

impl ErrorCategory {
    /// Returns the error code for API responses.
    #[must_use]
    pub const fn error_code(self) -> &'static str {
        match self {
            Self::Structural => "STRUCTURAL_ERROR",
            Self::Balance => "BALANCE_ERROR",
            Self::AccountEligibility => "ACCOUNT_ELIGIBILITY_ERROR",
            Self::PeriodState => "PERIOD_STATE_ERROR",
            Self::Transition => "INVALID_TRANSITION",
            Self::NotFound => "NOT_FOUND",
            Self::Consistency => "CONSISTENCY_ERROR",
            Self::Storage => "STORAGE_ERROR",
        }
    }

    /// Returns the HTTP status code a transport layer should use.
    #[must_use]
    pub const fn status_code(self) -> u16 {
        match self {
            Self::Structural | Self::Balance | Self::AccountEligibility => 400,
            Self::PeriodState | Self::Transition => 422,
            Self::NotFound => 404,
            Self::Consistency => 409,
            Self::Storage => 500,
        }
    }

    /// Returns true if the caller can fix the request and retry.
    #[must_use]
    pub const fn is_caller_fixable(self) -> bool {
        !matches!(self, Self::Consistency | Self::Storage)
    }
}

impl std::fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.error_code())
    }
}

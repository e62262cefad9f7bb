//! Ledger behaviour switches.

use quire_shared::config::{DatePolicy, LedgerConfig};

/// Behaviour switches consulted by the engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LedgerPolicy {
    /// How entry dates are checked against their month.
    pub date_policy: DatePolicy,
    /// Accept entries dated after today.
    pub allow_future_dates: bool,
    /// Code of the equity account receiving the net result on close.
    pub result_account_code: String,
}

impl Default for LedgerPolicy {
    fn default() -> Self {
        Self::from(&LedgerConfig::default())
    }
}

impl From<&LedgerConfig> for LedgerPolicy {
    fn from(config: &LedgerConfig) -> Self {
        Self {
            date_policy: config.date_policy,
            allow_future_dates: config.allow_future_dates,
            result_account_code: config.result_account_code.trim().to_string(),
        }
    }
}

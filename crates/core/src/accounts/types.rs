//! Account domain types.

use chrono::{DateTime, Utc};
use quire_shared::types::{AccountId, Amount};
use serde::{Deserialize, Serialize};

use super::code::AccountCode;

/// Account classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AccountType {
    /// Resources owned.
    Asset,
    /// Obligations owed.
    Liability,
    /// Owners' residual interest.
    Equity,
    /// Income earned in the period.
    Revenue,
    /// Operating expenses of the period.
    Expense,
    /// Cost of goods or services sold.
    Cost,
}

impl AccountType {
    /// All account types in chart order.
    pub const ALL: [Self; 6] = [
        Self::Asset,
        Self::Liability,
        Self::Equity,
        Self::Revenue,
        Self::Expense,
        Self::Cost,
    ];

    /// Nature an account of this type gets unless overridden.
    ///
    /// Asset/Expense/Cost are debit-increasing; Liability/Equity/Revenue are
    /// credit-increasing.
    #[must_use]
    pub const fn default_nature(self) -> Nature {
        match self {
            Self::Asset | Self::Expense | Self::Cost => Nature::DebitIncreasing,
            Self::Liability | Self::Equity | Self::Revenue => Nature::CreditIncreasing,
        }
    }

    /// Temporary accounts are zeroed by the closing entry.
    #[must_use]
    pub const fn is_temporary(self) -> bool {
        matches!(self, Self::Revenue | Self::Expense | Self::Cost)
    }

    /// Permanent accounts carry their balance into the next fiscal year.
    #[must_use]
    pub const fn is_permanent(self) -> bool {
        !self.is_temporary()
    }

    /// Lowercase name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Asset => "asset",
            Self::Liability => "liability",
            Self::Equity => "equity",
            Self::Revenue => "revenue",
            Self::Expense => "expense",
            Self::Cost => "cost",
        }
    }
}

impl std::fmt::Display for AccountType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for AccountType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|t| t.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| format!("Unknown account type: {s}"))
    }
}

/// Which side of a line increases the account's balance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Nature {
    /// balance += debit - credit
    DebitIncreasing,
    /// balance += credit - debit
    CreditIncreasing,
}

impl Nature {
    /// Calculates the balance change for a line.
    #[must_use]
    pub fn balance_change(self, debit: Amount, credit: Amount) -> Amount {
        match self {
            Self::DebitIncreasing => debit - credit,
            Self::CreditIncreasing => credit - debit,
        }
    }

    /// Splits a balance into the (debit, credit) pair that posts it.
    ///
    /// A positive balance lands on the increasing side; a negative one on the
    /// opposite side, as a positive amount.
    #[must_use]
    pub fn posting_for(self, balance: Amount) -> (Amount, Amount) {
        let increasing_debit = matches!(self, Self::DebitIncreasing);
        if balance.is_negative() == increasing_debit {
            (Amount::ZERO, balance.abs())
        } else {
            (balance.abs(), Amount::ZERO)
        }
    }

    /// Lowercase name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::DebitIncreasing => "debit_increasing",
            Self::CreditIncreasing => "credit_increasing",
        }
    }
}

impl std::fmt::Display for Nature {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A node in the chart of accounts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Account {
    /// Unique identifier.
    pub id: AccountId,
    /// Hierarchical code, unique across the chart.
    pub code: AccountCode,
    /// Display name.
    pub name: String,
    /// Classification.
    pub account_type: AccountType,
    /// Increasing side; defaults from the type.
    pub nature: Nature,
    /// Parent in the tree, `None` for roots.
    pub parent_id: Option<AccountId>,
    /// Summary account: may not receive direct postings.
    pub is_parent: bool,
    /// Inactive accounts cannot receive postings.
    pub is_active: bool,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
    /// Last modification timestamp.
    pub updated_at: DateTime<Utc>,
}

impl Account {
    /// Returns true if the account may be referenced by a journal line.
    #[must_use]
    pub const fn can_receive_postings(&self) -> bool {
        self.is_active && !self.is_parent
    }
}

/// Input for creating an account.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewAccount {
    /// Account code.
    pub code: String,
    /// Display name.
    pub name: String,
    /// Classification.
    pub account_type: AccountType,
    /// Overrides the type's default nature.
    pub nature: Option<Nature>,
    /// Parent account.
    pub parent_id: Option<AccountId>,
    /// Create as a summary account.
    pub is_parent: bool,
}

/// Partial update of an account. `None` fields are left unchanged.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AccountUpdate {
    /// New code.
    pub code: Option<String>,
    /// New name.
    pub name: Option<String>,
    /// New type; blocked once the account has postings.
    pub account_type: Option<AccountType>,
    /// New nature; blocked once the account has postings.
    pub nature: Option<Nature>,
    /// New parent; `Some(None)` makes the account a root.
    pub parent_id: Option<Option<AccountId>>,
    /// Summary flag.
    pub is_parent: Option<bool>,
}

/// Why an account cannot receive a posting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AccountProblem {
    /// No such account.
    Missing,
    /// Account is deactivated.
    Inactive,
    /// Account is a summary (parent) account.
    Summary,
}

/// One offending account in an entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountIssue {
    /// The account referenced by the line.
    pub account_id: AccountId,
    /// What is wrong with it.
    pub problem: AccountProblem,
}

impl std::fmt::Display for AccountIssue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let problem = match self.problem {
            AccountProblem::Missing => "does not exist",
            AccountProblem::Inactive => "is inactive",
            AccountProblem::Summary => "is a summary account",
        };
        write!(f, "account {} {problem}", self.account_id)
    }
}

//! Chart of accounts.

pub mod code;
pub mod service;
pub mod tree;
pub mod types;

#[cfg(test)]
mod tree_props;

pub use code::{AccountCode, InvalidAccountCode};
pub use service::AccountService;
pub use tree::ChartOfAccounts;
pub use types::{Account, AccountIssue, AccountProblem, AccountType, AccountUpdate, NewAccount, Nature};

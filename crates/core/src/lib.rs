//! Core bookkeeping logic for Quire.
//!
//! This crate contains pure business logic with ZERO web or database dependencies.
//! Persistence sits behind the [`store::LedgerStore`] trait.
//!
//! # Modules
//!
//! - `accounts` - Chart of accounts tree and maintenance rules
//! - `ledger` - Journal entries, validation, balances and movements
//! - `fiscal` - Fiscal years, monthly periods and their lifecycle
//! - `closing` - Year-end closing and opening entries
//! - `store` - Persistence seam and the in-memory store
//! - `engine` - Facade exposing every ledger operation

pub mod accounts;
pub mod clock;
pub mod closing;
pub mod engine;
pub mod error;
pub mod fiscal;
pub mod ledger;
pub mod policy;
pub mod store;

pub use clock::{Clock, FixedClock, SystemClock};
pub use engine::LedgerEngine;
pub use error::LedgerError;
pub use policy::LedgerPolicy;
pub use store::{LedgerStore, MemoryStore};

//! Common types used across the application.

pub mod amount;
pub mod id;

pub use amount::{Amount, MONEY_SCALE};
pub use id::*;

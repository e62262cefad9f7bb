//! Period-closing protocol.

pub mod protocol;

pub use protocol::{ClosingPlan, ClosingPlanner, ClosingSummary, CloseOptions, EntryRef, NextYear};

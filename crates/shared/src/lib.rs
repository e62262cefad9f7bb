//! Shared types, errors, and configuration for Quire.
//!
//! This crate provides common types used across all other crates:
//! - `Amount`, the decimal money type used for every monetary value
//! - Typed IDs for type-safe entity references
//! - Error categories shared by every rejection the core produces
//! - Configuration management
//! - Tracing subscriber setup for the binaries

pub mod config;
pub mod error;
pub mod telemetry;
pub mod types;

pub use config::{AppConfig, DatePolicy, LedgerConfig, LoggingConfig};
pub use error::ErrorCategory;
pub use types::Amount;

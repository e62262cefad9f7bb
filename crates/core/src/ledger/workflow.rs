//! Journal entry status transitions.
//!
//! ```text
//! Pending --approve--> Approved
//! Pending --void(reason)--> Voided
//! Approved --void(reason)--> Voided
//! ```

use chrono::{DateTime, Utc};
use quire_shared::types::ActorId;
use serde::{Deserialize, Serialize};

use super::types::{EntryStatus, JournalEntry};
use crate::error::LedgerError;

/// A validated status change, ready to be written.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "action")]
pub enum StatusChange {
    /// Pending -> Approved.
    Approve {
        /// Approver.
        approved_by: ActorId,
        /// Approval time.
        approved_at: DateTime<Utc>,
    },
    /// Pending/Approved -> Voided.
    Void {
        /// Actor voiding the entry.
        voided_by: ActorId,
        /// Void time.
        voided_at: DateTime<Utc>,
        /// Justification.
        reason: String,
    },
}

impl StatusChange {
    /// Status after the change.
    #[must_use]
    pub const fn target_status(&self) -> EntryStatus {
        match self {
            Self::Approve { .. } => EntryStatus::Approved,
            Self::Void { .. } => EntryStatus::Voided,
        }
    }

    /// Applies the change to an entry.
    pub fn apply(&self, entry: &mut JournalEntry) {
        entry.status = self.target_status();
        match self {
            Self::Approve {
                approved_by,
                approved_at,
            } => {
                entry.audit.approved_by = Some(*approved_by);
                entry.audit.approved_at = Some(*approved_at);
            }
            Self::Void {
                voided_by,
                voided_at,
                reason,
            } => {
                entry.audit.voided_by = Some(*voided_by);
                entry.audit.voided_at = Some(*voided_at);
                entry.audit.void_reason = Some(reason.clone());
            }
        }
    }
}

/// Stateless service for entry status transitions.
pub struct EntryWorkflow;

impl EntryWorkflow {
    /// Approve a pending entry.
    ///
    /// # Errors
    ///
    /// Returns `InvalidEntryTransition` unless the entry is pending.
    pub fn approve(
        entry: &JournalEntry,
        approved_by: ActorId,
        approved_at: DateTime<Utc>,
    ) -> Result<StatusChange, LedgerError> {
        match entry.status {
            EntryStatus::Pending => Ok(StatusChange::Approve {
                approved_by,
                approved_at,
            }),
            from => Err(LedgerError::InvalidEntryTransition {
                from,
                to: EntryStatus::Approved,
            }),
        }
    }

    /// Void a user entry.
    ///
    /// # Errors
    ///
    /// Returns `ReasonRequired` for an empty reason, `SystemEntry` for
    /// closing/opening entries and `InvalidEntryTransition` if already
    /// voided.
    pub fn void(
        entry: &JournalEntry,
        voided_by: ActorId,
        voided_at: DateTime<Utc>,
        reason: &str,
    ) -> Result<StatusChange, LedgerError> {
        let reason = reason.trim();
        if reason.is_empty() {
            return Err(LedgerError::ReasonRequired);
        }
        if entry.is_system() {
            return Err(LedgerError::SystemEntry(entry.id));
        }
        match entry.status {
            EntryStatus::Pending | EntryStatus::Approved => Ok(StatusChange::Void {
                voided_by,
                voided_at,
                reason: reason.to_string(),
            }),
            EntryStatus::Voided => Err(LedgerError::InvalidEntryTransition {
                from: EntryStatus::Voided,
                to: EntryStatus::Voided,
            }),
        }
    }

    /// Check that an entry's lines may be replaced.
    ///
    /// # Errors
    ///
    /// Returns `SystemEntry` or `EntryNotEditable`.
    pub fn ensure_editable(entry: &JournalEntry) -> Result<(), LedgerError> {
        if entry.is_system() {
            return Err(LedgerError::SystemEntry(entry.id));
        }
        if entry.status != EntryStatus::Pending {
            return Err(LedgerError::EntryNotEditable(entry.id));
        }
        Ok(())
    }
}

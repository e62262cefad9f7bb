//! Ready-to-close predicate.

use quire_shared::types::{AccountId, JournalEntryId};
use serde::{Deserialize, Serialize};

use super::period::{PeriodScope, PeriodStatus};
use crate::accounts::ChartOfAccounts;
use crate::ledger::{EntryStatus, EntryTotals, JournalEntry};

/// One unmet closing precondition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "reason")]
pub enum NotReadyReason {
    /// The period is already closed.
    AlreadyClosed,
    /// The period is inactive.
    Inactive,
    /// Entries still awaiting approval or void.
    PendingEntries {
        /// The pending entries.
        entry_ids: Vec<JournalEntryId>,
    },
    /// Non-voided entries whose lines do not balance.
    UnbalancedEntries {
        /// The unbalanced entries.
        entry_ids: Vec<JournalEntryId>,
    },
    /// Summary accounts carrying direct postings.
    SummaryAccountPostings {
        /// The offending accounts.
        account_ids: Vec<AccountId>,
    },
}

impl std::fmt::Display for NotReadyReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::AlreadyClosed => f.write_str("period is already closed"),
            Self::Inactive => f.write_str("period is inactive"),
            Self::PendingEntries { entry_ids } => {
                write!(f, "{} pending entries", entry_ids.len())
            }
            Self::UnbalancedEntries { entry_ids } => {
                write!(f, "{} unbalanced entries", entry_ids.len())
            }
            Self::SummaryAccountPostings { account_ids } => {
                write!(f, "{} summary accounts with direct postings", account_ids.len())
            }
        }
    }
}

/// Every unmet closing precondition for a period.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReadinessReport {
    /// The assessed period.
    pub scope: PeriodScope,
    /// Unmet preconditions; empty means ready.
    pub reasons: Vec<NotReadyReason>,
}

impl ReadinessReport {
    /// Returns true if the period may be closed.
    #[must_use]
    pub fn is_ready(&self) -> bool {
        self.reasons.is_empty()
    }

    /// Checks the closing preconditions of a period.
    ///
    /// `entries` are all entries filed in the period, any status.
    #[must_use]
    pub fn assess(
        scope: PeriodScope,
        status: PeriodStatus,
        is_active: bool,
        entries: &[JournalEntry],
        chart: &ChartOfAccounts,
    ) -> Self {
        let mut reasons = Vec::new();

        if status.is_closed() {
            reasons.push(NotReadyReason::AlreadyClosed);
        }
        if !is_active {
            reasons.push(NotReadyReason::Inactive);
        }

        let pending: Vec<JournalEntryId> = entries
            .iter()
            .filter(|e| e.status == EntryStatus::Pending)
            .map(|e| e.id)
            .collect();
        if !pending.is_empty() {
            reasons.push(NotReadyReason::PendingEntries { entry_ids: pending });
        }

        let live = || entries.iter().filter(|e| e.status != EntryStatus::Voided);

        let unbalanced: Vec<JournalEntryId> = live()
            .filter(|e| !EntryTotals::from_lines(&e.lines).is_balanced())
            .map(|e| e.id)
            .collect();
        if !unbalanced.is_empty() {
            reasons.push(NotReadyReason::UnbalancedEntries {
                entry_ids: unbalanced,
            });
        }

        let mut summary: Vec<AccountId> = live()
            .flat_map(|e| e.lines.iter())
            .map(|line| line.account_id)
            .filter(|id| chart.get(*id).is_some_and(|account| account.is_parent))
            .collect();
        summary.sort_unstable();
        summary.dedup();
        if !summary.is_empty() {
            reasons.push(NotReadyReason::SummaryAccountPostings {
                account_ids: summary,
            });
        }

        Self { scope, reasons }
    }
}

//! Per-account movement ledger with running balances.

use std::collections::HashSet;

use chrono::NaiveDate;
use quire_shared::types::{AccountId, Amount, JournalEntryId};
use serde::{Deserialize, Serialize};

use super::balance::RunningBalance;
use super::types::JournalEntry;
use crate::accounts::{ChartOfAccounts, Nature};
use crate::error::LedgerError;
use crate::fiscal::DateWindow;

/// One line affecting the account (or one of its descendants).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Movement {
    /// Source entry.
    pub entry_id: JournalEntryId,
    /// Source entry number.
    pub entry_number: i64,
    /// Entry date.
    pub date: NaiveDate,
    /// Entry description.
    pub description: String,
    /// Line memo.
    pub memo: Option<String>,
    /// Account the line was posted to.
    pub account_id: AccountId,
    /// Debit amount.
    pub debit: Amount,
    /// Credit amount.
    pub credit: Amount,
    /// Change in the posted account's nature.
    pub change: Amount,
    /// Running balance after this movement.
    pub running: RunningBalance,
}

/// Ordered movements of one account over a window.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountLedger {
    /// The account.
    pub account_id: AccountId,
    /// The account's nature.
    pub nature: Nature,
    /// The requested window.
    pub window: DateWindow,
    /// Balance accumulated from the start of the fiscal year to the day
    /// before the window.
    pub opening_balance: Amount,
    /// Movements ordered by (date, entry number, line position).
    pub movements: Vec<Movement>,
    /// Sum of debits in the window.
    pub total_debit: Amount,
    /// Sum of credits in the window.
    pub total_credit: Amount,
    /// Balance after the last movement.
    pub closing_balance: Amount,
}

/// Stateless movement processor.
pub struct MovementProcessor;

impl MovementProcessor {
    /// Builds the ledger of `account_id` over `window`.
    ///
    /// Lines posted to descendants are included, so a summary account shows
    /// the movement of its whole subtree. Each line's change is measured in
    /// the nature of the account it was posted to, which keeps the closing
    /// balance equal to the aggregated balance. Only approved entries count;
    /// those dated from `opening_from` up to the window start make up the
    /// opening balance.
    ///
    /// # Errors
    ///
    /// Returns `AccountNotFound` if the account is not in the chart.
    pub fn build(
        chart: &ChartOfAccounts,
        account_id: AccountId,
        entries: &[JournalEntry],
        window: DateWindow,
        opening_from: NaiveDate,
    ) -> Result<AccountLedger, LedgerError> {
        let account = chart
            .get(account_id)
            .ok_or(LedgerError::AccountNotFound(account_id))?;
        let subtree: HashSet<AccountId> = chart.subtree(account_id).into_iter().collect();
        let nature_of = |id: AccountId| chart.get(id).map_or(account.nature, |a| a.nature);

        let mut opening_balance = Amount::ZERO;
        let mut in_window: Vec<(&JournalEntry, usize)> = Vec::new();

        for entry in entries.iter().filter(|e| e.counts_in_balances()) {
            for (i, line) in entry.lines.iter().enumerate() {
                if !subtree.contains(&line.account_id) {
                    continue;
                }
                if entry.date >= opening_from && entry.date < window.start {
                    opening_balance += nature_of(line.account_id).balance_change(line.debit, line.credit);
                } else if window.contains(entry.date) {
                    in_window.push((entry, i));
                }
            }
        }

        in_window.sort_by(|(a, ai), (b, bi)| {
            a.date
                .cmp(&b.date)
                .then(a.number.cmp(&b.number))
                .then(a.lines[*ai].position.cmp(&b.lines[*bi].position))
        });

        let mut movements = Vec::with_capacity(in_window.len());
        let mut total_debit = Amount::ZERO;
        let mut total_credit = Amount::ZERO;
        let mut previous: Option<RunningBalance> = None;

        for (entry, i) in in_window {
            let line = &entry.lines[i];
            let change = nature_of(line.account_id).balance_change(line.debit, line.credit);
            let running = match &previous {
                None => RunningBalance::first_entry(opening_balance, change),
                Some(prev) => RunningBalance::next_entry(prev, change),
            };
            total_debit += line.debit;
            total_credit += line.credit;
            previous = Some(running);
            movements.push(Movement {
                entry_id: entry.id,
                entry_number: entry.number,
                date: entry.date,
                description: entry.description.clone(),
                memo: line.memo.clone(),
                account_id: line.account_id,
                debit: line.debit,
                credit: line.credit,
                change,
                running,
            });
        }

        Ok(AccountLedger {
            account_id,
            nature: account.nature,
            window,
            opening_balance,
            closing_balance: previous.map_or(opening_balance, |r| r.current_balance),
            movements,
            total_debit,
            total_credit,
        })
    }
}

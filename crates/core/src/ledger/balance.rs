//! Account balance aggregation.
//!
//! Leaf balances come from approved lines inside a date window. Parent
//! balances are the parent's own balance plus the aggregated balances of its
//! children, rolled up in post-order over the chart arena.

use std::collections::HashMap;

use quire_shared::types::{AccountId, Amount};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use super::types::JournalEntry;
use crate::accounts::ChartOfAccounts;
use crate::fiscal::DateWindow;

/// Debit and credit sums of one account.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineSums {
    /// Sum of debits.
    pub debit: Amount,
    /// Sum of credits.
    pub credit: Amount,
}

impl LineSums {
    fn add(&mut self, other: Self) {
        self.debit += other.debit;
        self.credit += other.credit;
    }
}

/// Balance of one account over a window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountBalance {
    /// The account ID.
    pub account_id: AccountId,
    /// Lines posted directly to this account.
    pub own: LineSums,
    /// Lines posted to this account and everything below it.
    pub rolled: LineSums,
    /// Balance of the directly posted lines, in the account's nature.
    pub own_balance: Amount,
    /// `own_balance` plus the children's aggregated balances.
    pub balance: Amount,
}

/// Balances of every account in the chart over one window.
#[derive(Debug, Clone, Serialize)]
pub struct AccountBalances {
    /// The window that was aggregated.
    pub window: DateWindow,
    /// Balances in tree order.
    pub accounts: Vec<AccountBalance>,
    #[serde(skip)]
    index: HashMap<AccountId, usize>,
}

impl AccountBalances {
    /// Balance record of an account.
    #[must_use]
    pub fn get(&self, id: AccountId) -> Option<&AccountBalance> {
        self.index.get(&id).map(|&i| &self.accounts[i])
    }

    /// Aggregated balance of an account, zero if unknown.
    #[must_use]
    pub fn balance_of(&self, id: AccountId) -> Amount {
        self.get(id).map_or(Amount::ZERO, |b| b.balance)
    }

    /// Iterates balances in tree order.
    pub fn iter(&self) -> impl Iterator<Item = &AccountBalance> {
        self.accounts.iter()
    }
}

/// Stateless balance aggregator.
pub struct BalanceAggregator;

impl BalanceAggregator {
    /// Sums approved lines dated inside `window`, per account.
    #[must_use]
    pub fn line_sums(entries: &[JournalEntry], window: &DateWindow) -> HashMap<AccountId, LineSums> {
        entries
            .par_iter()
            .filter(|entry| entry.counts_in_balances() && window.contains(entry.date))
            .fold(HashMap::new, |mut acc: HashMap<AccountId, LineSums>, entry| {
                for line in &entry.lines {
                    acc.entry(line.account_id).or_default().add(LineSums {
                        debit: line.debit,
                        credit: line.credit,
                    });
                }
                acc
            })
            .reduce(HashMap::new, |mut left, right| {
                for (account_id, sums) in right {
                    left.entry(account_id).or_default().add(sums);
                }
                left
            })
    }

    /// Computes every account's balance over `window`.
    ///
    /// Lines posted to accounts missing from the chart are ignored.
    #[must_use]
    pub fn aggregate(
        chart: &ChartOfAccounts,
        entries: &[JournalEntry],
        window: &DateWindow,
    ) -> AccountBalances {
        let sums = Self::line_sums(entries, window);
        let mut by_index: Vec<Option<AccountBalance>> = vec![None; chart.len()];

        for i in chart.postorder_indices() {
            let account = chart.node(i);
            let own = sums.get(&account.id).copied().unwrap_or_default();
            let own_balance = account.nature.balance_change(own.debit, own.credit);

            let mut rolled = own;
            let mut balance = own_balance;
            for &child in chart.child_indices(i) {
                if let Some(child_balance) = &by_index[child] {
                    rolled.add(child_balance.rolled);
                    balance += child_balance.balance;
                }
            }

            by_index[i] = Some(AccountBalance {
                account_id: account.id,
                own,
                rolled,
                own_balance,
                balance,
            });
        }

        let mut lookup: HashMap<AccountId, AccountBalance> = by_index
            .into_iter()
            .flatten()
            .map(|b| (b.account_id, b))
            .collect();
        let accounts: Vec<AccountBalance> = chart
            .iter()
            .filter_map(|account| lookup.remove(&account.id))
            .collect();
        let index = accounts
            .iter()
            .enumerate()
            .map(|(i, b)| (b.account_id, i))
            .collect();

        AccountBalances {
            window: *window,
            accounts,
            index,
        }
    }
}

/// One row of a trial balance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrialBalanceRow {
    /// The account ID.
    pub account_id: AccountId,
    /// Account code.
    pub code: String,
    /// Account name.
    pub name: String,
    /// Net debit balance, zero if the account nets to credit.
    pub debit: Amount,
    /// Net credit balance, zero if the account nets to debit.
    pub credit: Amount,
}

/// Net debit/credit position of every leaf with activity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrialBalance {
    /// The window that was aggregated.
    pub window: DateWindow,
    /// Leaf rows in tree order.
    pub rows: Vec<TrialBalanceRow>,
    /// Sum of the debit column.
    pub total_debit: Amount,
    /// Sum of the credit column.
    pub total_credit: Amount,
}

impl TrialBalance {
    /// Derives the trial balance from an aggregation pass.
    #[must_use]
    pub fn from_balances(chart: &ChartOfAccounts, balances: &AccountBalances) -> Self {
        let mut rows = Vec::new();
        let mut total_debit = Amount::ZERO;
        let mut total_credit = Amount::ZERO;

        for balance in balances.iter() {
            let Some(account) = chart.get(balance.account_id) else {
                continue;
            };
            if balance.own == LineSums::default() {
                continue;
            }
            let net = balance.own.debit - balance.own.credit;
            let (debit, credit) = if net.is_negative() {
                (Amount::ZERO, -net)
            } else {
                (net, Amount::ZERO)
            };
            total_debit += debit;
            total_credit += credit;
            rows.push(TrialBalanceRow {
                account_id: account.id,
                code: account.code.to_string(),
                name: account.name.clone(),
                debit,
                credit,
            });
        }

        Self {
            window: balances.window,
            rows,
            total_debit,
            total_credit,
        }
    }

    /// True if both columns agree after rounding to two decimals.
    #[must_use]
    pub fn is_balanced(&self) -> bool {
        self.total_debit.round_money() == self.total_credit.round_money()
    }
}

/// Running balance information for a ledger movement.
///
/// - `sequence`: monotonically increasing counter within one ledger
/// - `previous_balance`: balance before this movement
/// - `current_balance`: balance after this movement
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunningBalance {
    /// Position in the ledger, starting at 1.
    pub sequence: u64,
    /// Balance before this movement.
    pub previous_balance: Amount,
    /// Balance after this movement.
    pub current_balance: Amount,
}

impl RunningBalance {
    /// Creates the running balance for the first movement after `opening`.
    #[must_use]
    pub fn first_entry(opening: Amount, balance_change: Amount) -> Self {
        Self {
            sequence: 1,
            previous_balance: opening,
            current_balance: opening + balance_change,
        }
    }

    /// Creates a new running balance based on the previous movement.
    ///
    /// - current_balance[N] = previous_balance[N] + balance_change
    /// - previous_balance[N] = current_balance[N-1]
    #[must_use]
    pub fn next_entry(previous: &Self, balance_change: Amount) -> Self {
        Self {
            sequence: previous.sequence + 1,
            previous_balance: previous.current_balance,
            current_balance: previous.current_balance + balance_change,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::accounts::{Account, AccountCode, AccountType};
    use crate::ledger::{EntryAudit, EntryKind, EntryStatus, EntryTotals, JournalLine};
    use chrono::{NaiveDate, Utc};
    use quire_shared::types::{ActorId, FiscalYearId, JournalEntryId, JournalLineId, MonthlyPeriodId};
    use rust_decimal_macros::dec;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn account(code: &str, account_type: AccountType, parent: Option<&Account>) -> Account {
        Account {
            id: AccountId::new(),
            code: AccountCode::parse(code).unwrap(),
            name: code.to_string(),
            account_type,
            nature: account_type.default_nature(),
            parent_id: parent.map(|p| p.id),
            is_parent: false,
            is_active: true,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn entry(on: NaiveDate, status: EntryStatus, lines: &[(AccountId, rust_decimal::Decimal, rust_decimal::Decimal)]) -> JournalEntry {
        let id = JournalEntryId::new();
        let lines: Vec<JournalLine> = lines
            .iter()
            .enumerate()
            .map(|(i, (account_id, debit, credit))| JournalLine {
                id: JournalLineId::new(),
                entry_id: id,
                account_id: *account_id,
                debit: Amount::new(*debit),
                credit: Amount::new(*credit),
                memo: None,
                position: u32::try_from(i).unwrap(),
            })
            .collect();
        JournalEntry {
            id,
            number: 1,
            fiscal_year_id: FiscalYearId::new(),
            period_id: MonthlyPeriodId::new(),
            date: on,
            description: "test".into(),
            status,
            kind: EntryKind::Regular,
            totals: EntryTotals::from_lines(&lines),
            lines,
            audit: EntryAudit::created(ActorId::new(), Utc::now()),
        }
    }

    fn year() -> DateWindow {
        DateWindow::new(date(2026, 1, 1), date(2026, 12, 31)).unwrap()
    }

    #[test]
    fn test_leaf_balances_follow_nature() {
        let cash = account("1", AccountType::Asset, None);
        let sales = account("4", AccountType::Revenue, None);
        let chart = ChartOfAccounts::build(vec![cash.clone(), sales.clone()]).unwrap();
        let entries = vec![entry(
            date(2026, 2, 1),
            EntryStatus::Approved,
            &[(cash.id, dec!(250), dec!(0)), (sales.id, dec!(0), dec!(250))],
        )];

        let balances = BalanceAggregator::aggregate(&chart, &entries, &year());
        assert_eq!(balances.balance_of(cash.id), Amount::new(dec!(250)));
        assert_eq!(balances.balance_of(sales.id), Amount::new(dec!(250)));
    }

    #[test]
    fn test_only_approved_entries_in_window_count() {
        let cash = account("1", AccountType::Asset, None);
        let loan = account("2", AccountType::Liability, None);
        let chart = ChartOfAccounts::build(vec![cash.clone(), loan.clone()]).unwrap();
        let lines = [(cash.id, dec!(10), dec!(0)), (loan.id, dec!(0), dec!(10))];
        let entries = vec![
            entry(date(2026, 3, 1), EntryStatus::Approved, &lines),
            entry(date(2026, 3, 1), EntryStatus::Pending, &lines),
            entry(date(2026, 3, 1), EntryStatus::Voided, &lines),
            entry(date(2027, 1, 1), EntryStatus::Approved, &lines),
        ];

        let balances = BalanceAggregator::aggregate(&chart, &entries, &year());
        assert_eq!(balances.balance_of(cash.id), Amount::new(dec!(10)));
        assert_eq!(balances.balance_of(loan.id), Amount::new(dec!(10)));
    }

    #[test]
    fn test_parent_rolls_up_children() {
        let mut assets = account("1", AccountType::Asset, None);
        assets.is_parent = true;
        let cash = account("1.1", AccountType::Asset, Some(&assets));
        let bank = account("1.2", AccountType::Asset, Some(&assets));
        let equity = account("3", AccountType::Equity, None);
        let chart =
            ChartOfAccounts::build(vec![assets.clone(), cash.clone(), bank.clone(), equity.clone()]).unwrap();
        let entries = vec![
            entry(
                date(2026, 1, 2),
                EntryStatus::Approved,
                &[(cash.id, dec!(300), dec!(0)), (equity.id, dec!(0), dec!(300))],
            ),
            entry(
                date(2026, 1, 3),
                EntryStatus::Approved,
                &[(bank.id, dec!(200), dec!(0)), (cash.id, dec!(0), dec!(50)), (equity.id, dec!(0), dec!(150))],
            ),
        ];

        let balances = BalanceAggregator::aggregate(&chart, &entries, &year());
        let parent = balances.get(assets.id).unwrap();
        assert_eq!(parent.own_balance, Amount::ZERO);
        assert_eq!(parent.balance, Amount::new(dec!(450)));
        assert_eq!(parent.rolled.debit, Amount::new(dec!(500)));
        assert_eq!(parent.rolled.credit, Amount::new(dec!(50)));

        let order: Vec<AccountId> = balances.iter().map(|b| b.account_id).collect();
        assert_eq!(order, vec![assets.id, cash.id, bank.id, equity.id]);
    }

    #[test]
    fn test_trial_balance_from_same_pass() {
        let cash = account("1", AccountType::Asset, None);
        let loan = account("2", AccountType::Liability, None);
        let sales = account("4", AccountType::Revenue, None);
        let chart = ChartOfAccounts::build(vec![cash.clone(), loan.clone(), sales.clone()]).unwrap();
        let entries = vec![
            entry(
                date(2026, 1, 2),
                EntryStatus::Approved,
                &[(cash.id, dec!(1000), dec!(0)), (loan.id, dec!(0), dec!(1000))],
            ),
            entry(
                date(2026, 1, 3),
                EntryStatus::Approved,
                &[(cash.id, dec!(400), dec!(0)), (sales.id, dec!(0), dec!(400))],
            ),
        ];

        let balances = BalanceAggregator::aggregate(&chart, &entries, &year());
        let trial = TrialBalance::from_balances(&chart, &balances);
        assert_eq!(trial.rows.len(), 3);
        assert_eq!(trial.total_debit, Amount::new(dec!(1400)));
        assert_eq!(trial.total_credit, Amount::new(dec!(1400)));
        assert!(trial.is_balanced());
    }

    #[test]
    fn test_running_balance_chain() {
        let first = RunningBalance::first_entry(Amount::new(dec!(100)), Amount::new(dec!(25)));
        assert_eq!(first.sequence, 1);
        assert_eq!(first.current_balance, Amount::new(dec!(125)));

        let second = RunningBalance::next_entry(&first, Amount::new(dec!(-40)));
        assert_eq!(second.sequence, 2);
        assert_eq!(second.previous_balance, first.current_balance);
        assert_eq!(second.current_balance, Amount::new(dec!(85)));
    }
}

//! Property-based tests for hierarchical balance rollup.

use chrono::{NaiveDate, Utc};
use proptest::prelude::*;
use quire_shared::types::{
    AccountId, ActorId, Amount, FiscalYearId, JournalEntryId, JournalLineId, MonthlyPeriodId,
};
use rust_decimal::Decimal;

use super::balance::{BalanceAggregator, TrialBalance};
use super::types::{EntryAudit, EntryKind, EntryStatus, EntryTotals, JournalEntry, JournalLine};
use crate::accounts::{Account, AccountCode, AccountType, ChartOfAccounts};
use crate::fiscal::DateWindow;

/// A random forest (entry `i` points at an earlier index or is a root) with
/// a random type per account.
fn chart_strategy() -> impl Strategy<Value = Vec<(Option<usize>, AccountType)>> {
    (2usize..25).prop_flat_map(|n| {
        (0..n)
            .map(|i| {
                let parent = if i == 0 {
                    Just(None).boxed()
                } else {
                    prop_oneof![1 => Just(None), 3 => (0..i).prop_map(Some)].boxed()
                };
                (parent, prop::sample::select(AccountType::ALL.to_vec()))
            })
            .collect::<Vec<_>>()
    })
}

fn build_chart(shape: &[(Option<usize>, AccountType)]) -> Vec<Account> {
    let ids: Vec<AccountId> = shape.iter().map(|_| AccountId::new()).collect();
    shape
        .iter()
        .enumerate()
        .map(|(i, (parent, account_type))| Account {
            id: ids[i],
            code: AccountCode::parse(&format!("{}", i + 1)).unwrap(),
            name: format!("Account {i}"),
            account_type: *account_type,
            nature: account_type.default_nature(),
            parent_id: parent.map(|p| ids[p]),
            is_parent: shape.iter().any(|(p, _)| *p == Some(i)),
            is_active: true,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        })
        .collect()
}

/// Balanced two-line entries between random leaves.
fn entries_for(leaves: &[AccountId], postings: &[(usize, usize, i64)]) -> Vec<JournalEntry> {
    let date = NaiveDate::from_ymd_opt(2026, 5, 1).unwrap_or_default();
    postings
        .iter()
        .map(|(from, to, cents)| {
            let id = JournalEntryId::new();
            let amount = Amount::new(Decimal::new(*cents, 2));
            let line = |account_id: AccountId, debit: Amount, credit: Amount, position: u32| JournalLine {
                id: JournalLineId::new(),
                entry_id: id,
                account_id,
                debit,
                credit,
                memo: None,
                position,
            };
            let lines = vec![
                line(leaves[from % leaves.len()], amount, Amount::ZERO, 0),
                line(leaves[to % leaves.len()], Amount::ZERO, amount, 1),
            ];
            JournalEntry {
                id,
                number: 1,
                fiscal_year_id: FiscalYearId::new(),
                period_id: MonthlyPeriodId::new(),
                date,
                description: "generated".into(),
                status: EntryStatus::Approved,
                kind: EntryKind::Regular,
                totals: EntryTotals::from_lines(&lines),
                lines,
                audit: EntryAudit::created(ActorId::new(), Utc::now()),
            }
        })
        .collect()
}

fn postings_strategy() -> impl Strategy<Value = Vec<(usize, usize, i64)>> {
    prop::collection::vec((0usize..100, 0usize..100, 1i64..1_000_000), 0..30)
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(100))]

    /// Every account's balance is its own balance plus its children's.
    #[test]
    fn prop_parent_equals_own_plus_children(
        shape in chart_strategy(),
        postings in postings_strategy(),
    ) {
        let accounts = build_chart(&shape);
        let leaves: Vec<AccountId> = accounts.iter().filter(|a| !a.is_parent).map(|a| a.id).collect();
        let chart = ChartOfAccounts::build(accounts.clone()).unwrap();
        let entries = entries_for(&leaves, &postings);
        let window = DateWindow::new(
            NaiveDate::from_ymd_opt(2026, 1, 1).unwrap(),
            NaiveDate::from_ymd_opt(2026, 12, 31).unwrap(),
        ).unwrap();

        let balances = BalanceAggregator::aggregate(&chart, &entries, &window);
        prop_assert_eq!(balances.accounts.len(), accounts.len());

        for account in &accounts {
            let record = balances.get(account.id).unwrap();
            let children: Amount = chart.children(account.id).map(|c| balances.balance_of(c.id)).sum();
            prop_assert_eq!(record.balance, record.own_balance + children);
            if !account.is_parent {
                prop_assert_eq!(record.rolled, record.own);
            }
        }
    }

    /// Rolled debit/credit totals of the roots cover every posted line, and
    /// the trial balance of balanced entries balances.
    #[test]
    fn prop_roots_cover_all_lines(
        shape in chart_strategy(),
        postings in postings_strategy(),
    ) {
        let accounts = build_chart(&shape);
        let leaves: Vec<AccountId> = accounts.iter().filter(|a| !a.is_parent).map(|a| a.id).collect();
        let chart = ChartOfAccounts::build(accounts).unwrap();
        let entries = entries_for(&leaves, &postings);
        let window = DateWindow::new(
            NaiveDate::from_ymd_opt(2026, 1, 1).unwrap(),
            NaiveDate::from_ymd_opt(2026, 12, 31).unwrap(),
        ).unwrap();

        let balances = BalanceAggregator::aggregate(&chart, &entries, &window);
        let posted: Amount = entries.iter().map(|e| e.totals.debit).sum();
        let root_debits: Amount = chart.roots().map(|r| balances.get(r.id).unwrap().rolled.debit).sum();
        let root_credits: Amount = chart.roots().map(|r| balances.get(r.id).unwrap().rolled.credit).sum();
        prop_assert_eq!(root_debits, posted);
        prop_assert_eq!(root_credits, posted);

        let trial = TrialBalance::from_balances(&chart, &balances);
        prop_assert!(trial.is_balanced());
    }
}

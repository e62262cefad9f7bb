//! Property-based tests for the chart-of-accounts arena.

use chrono::Utc;
use proptest::prelude::*;
use quire_shared::types::AccountId;

use super::{Account, AccountCode, AccountType, ChartOfAccounts};

/// Strategy for a random forest: entry `i` is either a root or points at an
/// earlier index.
fn forest_strategy() -> impl Strategy<Value = Vec<Option<usize>>> {
    (1usize..40).prop_flat_map(|n| {
        (0..n)
            .map(|i| {
                if i == 0 {
                    Just(None).boxed()
                } else {
                    prop_oneof![1 => Just(None), 4 => (0..i).prop_map(Some)].boxed()
                }
            })
            .collect::<Vec<_>>()
    })
}

fn build_accounts(shape: &[Option<usize>]) -> Vec<Account> {
    let ids: Vec<AccountId> = shape.iter().map(|_| AccountId::new()).collect();
    shape
        .iter()
        .enumerate()
        .map(|(i, parent)| Account {
            id: ids[i],
            code: AccountCode::parse(&format!("{}", i + 1)).unwrap(),
            name: format!("Account {i}"),
            account_type: AccountType::Asset,
            nature: AccountType::Asset.default_nature(),
            parent_id: parent.map(|p| ids[p]),
            is_parent: shape.contains(&Some(i)),
            is_active: true,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        })
        .collect()
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(100))]

    /// Post-order lists every account exactly once, children before parents.
    #[test]
    fn prop_postorder_children_before_parents(shape in forest_strategy()) {
        let chart = ChartOfAccounts::build(build_accounts(&shape)).unwrap();
        let order = chart.postorder_indices();
        prop_assert_eq!(order.len(), chart.len());

        let mut position = vec![usize::MAX; chart.len()];
        for (pos, &i) in order.iter().enumerate() {
            prop_assert_eq!(position[i], usize::MAX, "visited twice");
            position[i] = pos;
        }
        for &i in &order {
            for &child in chart.child_indices(i) {
                prop_assert!(position[child] < position[i]);
            }
        }
    }

    /// Every account's ancestors contain each account whose subtree holds it.
    #[test]
    fn prop_subtree_matches_ancestors(shape in forest_strategy()) {
        let accounts = build_accounts(&shape);
        let chart = ChartOfAccounts::build(accounts.clone()).unwrap();
        for top in &accounts {
            let subtree = chart.subtree(top.id);
            for account in &accounts {
                let below = account.id == top.id || chart.ancestors(account.id).contains(&top.id);
                prop_assert_eq!(subtree.contains(&account.id), below);
            }
        }
    }

    /// Re-parenting any account under its own descendant is detected.
    #[test]
    fn prop_descendant_parent_is_cycle(shape in forest_strategy()) {
        let accounts = build_accounts(&shape);
        let chart = ChartOfAccounts::build(accounts.clone()).unwrap();
        for account in &accounts {
            for descendant in chart.subtree(account.id) {
                prop_assert!(chart.would_create_cycle(account.id, descendant));
            }
        }
    }
}

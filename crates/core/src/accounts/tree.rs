//! Arena-backed chart of accounts.
//!
//! Accounts live in a flat `Vec`; parent/child links are indices into it.
//! Traversals use explicit stacks so deep charts cannot overflow the call
//! stack.

use std::collections::HashMap;

use quire_shared::types::AccountId;

use super::types::Account;
use crate::error::LedgerError;

/// The full account hierarchy.
#[derive(Debug, Clone, Default)]
pub struct ChartOfAccounts {
    nodes: Vec<Account>,
    index: HashMap<AccountId, usize>,
    parents: Vec<Option<usize>>,
    children: Vec<Vec<usize>>,
    roots: Vec<usize>,
}

impl ChartOfAccounts {
    /// Builds the tree from a flat account list.
    ///
    /// # Errors
    ///
    /// Returns `AccountNotFound` for a parent reference that does not resolve
    /// and `AccountCycle` if parent links form a cycle.
    pub fn build(accounts: Vec<Account>) -> Result<Self, LedgerError> {
        let index: HashMap<AccountId, usize> = accounts
            .iter()
            .enumerate()
            .map(|(i, account)| (account.id, i))
            .collect();

        let mut parents = vec![None; accounts.len()];
        let mut children = vec![Vec::new(); accounts.len()];
        let mut roots = Vec::new();

        for (i, account) in accounts.iter().enumerate() {
            match account.parent_id {
                Some(parent_id) => {
                    let parent = *index
                        .get(&parent_id)
                        .ok_or(LedgerError::AccountNotFound(parent_id))?;
                    parents[i] = Some(parent);
                    children[parent].push(i);
                }
                None => roots.push(i),
            }
        }

        for list in &mut children {
            list.sort_by(|a, b| accounts[*a].code.cmp(&accounts[*b].code));
        }
        roots.sort_by(|a, b| accounts[*a].code.cmp(&accounts[*b].code));

        let chart = Self {
            nodes: accounts,
            index,
            parents,
            children,
            roots,
        };

        // Anything not reachable from a root sits on a cycle.
        let mut reached = vec![false; chart.nodes.len()];
        for i in chart.preorder_indices() {
            reached[i] = true;
        }
        if let Some(stranded) = reached.iter().position(|r| !r) {
            return Err(LedgerError::AccountCycle(chart.nodes[stranded].id));
        }

        Ok(chart)
    }

    /// Number of accounts.
    #[must_use]
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Returns true if the chart has no accounts.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Looks up an account.
    #[must_use]
    pub fn get(&self, id: AccountId) -> Option<&Account> {
        self.index.get(&id).map(|&i| &self.nodes[i])
    }

    /// Looks up an account by code.
    #[must_use]
    pub fn find_by_code(&self, code: &str) -> Option<&Account> {
        let code = code.trim();
        self.nodes.iter().find(|account| account.code.as_str() == code)
    }

    /// Root accounts, ordered by code.
    pub fn roots(&self) -> impl Iterator<Item = &Account> {
        self.roots.iter().map(|&i| &self.nodes[i])
    }

    /// Direct children of an account, ordered by code.
    pub fn children(&self, id: AccountId) -> impl Iterator<Item = &Account> {
        self.index
            .get(&id)
            .into_iter()
            .flat_map(|&i| self.children[i].iter().map(|&c| &self.nodes[c]))
    }

    /// Returns true if the account has at least one child.
    #[must_use]
    pub fn has_children(&self, id: AccountId) -> bool {
        self.index
            .get(&id)
            .is_some_and(|&i| !self.children[i].is_empty())
    }

    /// All accounts in tree order: parents before children, siblings by code.
    pub fn iter(&self) -> impl Iterator<Item = &Account> {
        self.preorder_indices().into_iter().map(|i| &self.nodes[i])
    }

    /// The account and everything below it, in tree order.
    #[must_use]
    pub fn subtree(&self, id: AccountId) -> Vec<AccountId> {
        let Some(&start) = self.index.get(&id) else {
            return Vec::new();
        };
        let mut out = Vec::new();
        let mut stack = vec![start];
        while let Some(i) = stack.pop() {
            out.push(self.nodes[i].id);
            stack.extend(self.children[i].iter().rev());
        }
        out
    }

    /// Ancestors from the direct parent up to the root.
    #[must_use]
    pub fn ancestors(&self, id: AccountId) -> Vec<AccountId> {
        let mut out = Vec::new();
        let mut current = self.index.get(&id).and_then(|&i| self.parents[i]);
        while let Some(i) = current {
            out.push(self.nodes[i].id);
            current = self.parents[i];
        }
        out
    }

    /// Returns true if making `new_parent` the parent of `id` would close a
    /// loop.
    #[must_use]
    pub fn would_create_cycle(&self, id: AccountId, new_parent: AccountId) -> bool {
        new_parent == id || self.ancestors(new_parent).contains(&id)
    }

    /// Indices in post-order: every child before its parent.
    pub(crate) fn postorder_indices(&self) -> Vec<usize> {
        let mut out = Vec::with_capacity(self.nodes.len());
        let mut stack: Vec<(usize, bool)> = self.roots.iter().rev().map(|&r| (r, false)).collect();
        while let Some((i, expanded)) = stack.pop() {
            if expanded {
                out.push(i);
            } else {
                stack.push((i, true));
                stack.extend(self.children[i].iter().rev().map(|&c| (c, false)));
            }
        }
        out
    }

    fn preorder_indices(&self) -> Vec<usize> {
        let mut out = Vec::with_capacity(self.nodes.len());
        let mut stack: Vec<usize> = self.roots.iter().rev().copied().collect();
        while let Some(i) = stack.pop() {
            out.push(i);
            stack.extend(self.children[i].iter().rev());
        }
        out
    }

    pub(crate) fn node(&self, i: usize) -> &Account {
        &self.nodes[i]
    }

    pub(crate) fn child_indices(&self, i: usize) -> &[usize] {
        &self.children[i]
    }
}

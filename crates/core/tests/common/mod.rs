//! Shared fixture for engine tests: a small chart and FY2026 in a
//! `MemoryStore` (or any other store), with the clock frozen mid-2027.

#![allow(dead_code)]

use std::sync::Mutex;

use async_trait::async_trait;
use chrono::NaiveDate;
use quire_core::accounts::{Account, AccountType, NewAccount};
use quire_core::fiscal::{FiscalYear, FiscalYearWithPeriods, MonthlyPeriod, PeriodScope};
use quire_core::ledger::{EntryReceipt, JournalEntry, LineInput, NewEntryInput};
use quire_core::store::{CommitReceipt, EntryQuery, LedgerStore, StoreError, WriteBatch};
use quire_core::{FixedClock, LedgerEngine, LedgerError, LedgerPolicy, MemoryStore};
use quire_shared::types::{AccountId, ActorId, Amount, FiscalYearId, JournalEntryId, MonthlyPeriodId};
use rust_decimal::Decimal;

pub type Engine<S = MemoryStore> = LedgerEngine<S, FixedClock>;

pub fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

pub fn amount(value: Decimal) -> Amount {
    Amount::new(value)
}

/// IDs of the seeded accounts.
#[derive(Debug, Clone, Copy)]
pub struct Chart {
    pub assets: AccountId,
    pub cash: AccountId,
    pub bank: AccountId,
    pub liabilities: AccountId,
    pub payable: AccountId,
    pub equity: AccountId,
    pub capital: AccountId,
    pub result: AccountId,
    pub revenue: AccountId,
    pub sales: AccountId,
    pub expenses: AccountId,
    pub rent: AccountId,
    pub costs: AccountId,
    pub cogs: AccountId,
}

pub struct Fixture<S = MemoryStore> {
    pub engine: Engine<S>,
    pub actor: ActorId,
    pub chart: Chart,
    pub year: FiscalYearWithPeriods,
}

pub async fn fixture() -> Fixture {
    fixture_with(LedgerPolicy::default()).await
}

pub async fn fixture_with(policy: LedgerPolicy) -> Fixture {
    fixture_on(MemoryStore::new(), policy).await
}

pub async fn fixture_on<S: LedgerStore>(store: S, policy: LedgerPolicy) -> Fixture<S> {
    let engine = LedgerEngine::with_clock(store, FixedClock::on(date(2027, 6, 30)), policy);

    let add = |code: &str, name: &str, account_type: AccountType, parent: Option<AccountId>, is_parent: bool| NewAccount {
        code: code.to_string(),
        name: name.to_string(),
        account_type,
        nature: None,
        parent_id: parent,
        is_parent,
    };
    let create = |input: NewAccount| {
        let engine = &engine;
        async move { engine.create_account(input).await.unwrap().id }
    };

    let assets = create(add("1", "Assets", AccountType::Asset, None, true)).await;
    let cash = create(add("1.1", "Cash", AccountType::Asset, Some(assets), false)).await;
    let bank = create(add("1.2", "Bank", AccountType::Asset, Some(assets), false)).await;
    let liabilities = create(add("2", "Liabilities", AccountType::Liability, None, true)).await;
    let payable = create(add("2.1", "Accounts payable", AccountType::Liability, Some(liabilities), false)).await;
    let equity = create(add("3", "Equity", AccountType::Equity, None, true)).await;
    let capital = create(add("3.1", "Share capital", AccountType::Equity, Some(equity), false)).await;
    let result = create(add("3.3", "Period result", AccountType::Equity, Some(equity), false)).await;
    let revenue = create(add("4", "Revenue", AccountType::Revenue, None, true)).await;
    let sales = create(add("4.1", "Sales", AccountType::Revenue, Some(revenue), false)).await;
    let expenses = create(add("5", "Expenses", AccountType::Expense, None, true)).await;
    let rent = create(add("5.1", "Rent", AccountType::Expense, Some(expenses), false)).await;
    let costs = create(add("6", "Costs", AccountType::Cost, None, true)).await;
    let cogs = create(add("6.1", "Cost of goods sold", AccountType::Cost, Some(costs), false)).await;

    let year = engine
        .create_fiscal_year("FY2026", date(2026, 1, 1), date(2026, 12, 31))
        .await
        .unwrap();

    Fixture {
        engine,
        actor: ActorId::new(),
        chart: Chart {
            assets,
            cash,
            bank,
            liabilities,
            payable,
            equity,
            capital,
            result,
            revenue,
            sales,
            expenses,
            rent,
            costs,
            cogs,
        },
        year,
    }
}

/// Builds entry lines from `(account, debit, credit)` triples.
pub fn lines(postings: &[(AccountId, Decimal, Decimal)]) -> Vec<LineInput> {
    postings
        .iter()
        .map(|(account, debit, credit)| {
            if debit.is_zero() {
                LineInput::credit(*account, amount(*credit))
            } else {
                LineInput::debit(*account, amount(*debit))
            }
        })
        .collect()
}

impl<S: LedgerStore> Fixture<S> {
    /// Month `n` (1-based) of FY2026.
    pub fn month(&self, n: u32) -> &MonthlyPeriod {
        &self.year.periods[usize::try_from(n - 1).unwrap()]
    }

    pub fn year_scope(&self) -> PeriodScope {
        PeriodScope::Year(self.year.year.id)
    }

    pub fn input(&self, on: NaiveDate, postings: &[(AccountId, Decimal, Decimal)]) -> NewEntryInput {
        NewEntryInput {
            date: on,
            description: "Test entry".to_string(),
            period_id: None,
            lines: lines(postings),
            actor: self.actor,
        }
    }

    pub async fn create(
        &self,
        on: NaiveDate,
        postings: &[(AccountId, Decimal, Decimal)],
    ) -> Result<EntryReceipt, LedgerError> {
        self.engine.validate_and_create_entry(self.input(on, postings)).await
    }

    /// Creates and approves an entry.
    pub async fn post(&self, on: NaiveDate, postings: &[(AccountId, Decimal, Decimal)]) -> JournalEntry {
        let receipt = self.create(on, postings).await.unwrap();
        self.engine.approve_entry(receipt.entry.id, self.actor).await.unwrap()
    }

    pub async fn balance(&self, scope: PeriodScope, account: AccountId) -> Amount {
        self.engine
            .compute_account_balances(scope)
            .await
            .unwrap()
            .balance_of(account)
    }
}

/// Store that commits a queued batch right before the next commit, playing a
/// writer that lands between an operation's reads and its own write.
#[derive(Debug, Default)]
pub struct RacingStore {
    pub inner: MemoryStore,
    queued: Mutex<Option<WriteBatch>>,
}

impl RacingStore {
    pub fn queue(&self, batch: WriteBatch) {
        *self.queued.lock().unwrap() = Some(batch);
    }
}

#[async_trait]
impl LedgerStore for RacingStore {
    async fn accounts(&self) -> Result<Vec<Account>, StoreError> {
        self.inner.accounts().await
    }

    async fn account(&self, id: AccountId) -> Result<Option<Account>, StoreError> {
        self.inner.account(id).await
    }

    async fn accounts_by_ids(&self, ids: &[AccountId]) -> Result<Vec<Account>, StoreError> {
        self.inner.accounts_by_ids(ids).await
    }

    async fn account_has_postings(&self, id: AccountId) -> Result<bool, StoreError> {
        self.inner.account_has_postings(id).await
    }

    async fn fiscal_years(&self) -> Result<Vec<FiscalYear>, StoreError> {
        self.inner.fiscal_years().await
    }

    async fn fiscal_year(&self, id: FiscalYearId) -> Result<Option<FiscalYear>, StoreError> {
        self.inner.fiscal_year(id).await
    }

    async fn periods(&self, fiscal_year_id: FiscalYearId) -> Result<Vec<MonthlyPeriod>, StoreError> {
        self.inner.periods(fiscal_year_id).await
    }

    async fn period(&self, id: MonthlyPeriodId) -> Result<Option<MonthlyPeriod>, StoreError> {
        self.inner.period(id).await
    }

    async fn entry(&self, id: JournalEntryId) -> Result<Option<JournalEntry>, StoreError> {
        self.inner.entry(id).await
    }

    async fn entries(&self, query: &EntryQuery) -> Result<Vec<JournalEntry>, StoreError> {
        self.inner.entries(query).await
    }

    async fn entry_revision(&self, fiscal_year_id: FiscalYearId) -> Result<Option<i64>, StoreError> {
        self.inner.entry_revision(fiscal_year_id).await
    }

    async fn commit(&self, batch: WriteBatch) -> Result<CommitReceipt, StoreError> {
        let queued = self.queued.lock().unwrap().take();
        if let Some(first) = queued {
            self.inner.commit(first).await?;
        }
        self.inner.commit(batch).await
    }
}

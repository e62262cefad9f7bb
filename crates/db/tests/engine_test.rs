//! Ledger engine end to end on PostgreSQL.
//!
//! Run with `cargo test -p quire-db -- --ignored` and `DATABASE_URL` set.

mod common;

use std::collections::HashSet;
use std::sync::Arc;

use common::{TestDb, date};
use futures::future::join_all;
use quire_core::LedgerError;
use quire_core::closing::CloseOptions;
use quire_core::fiscal::{PeriodScope, PeriodStatus};
use quire_core::ledger::{EntryKind, EntryStatus, LineInput, NewEntryInput};
use quire_core::store::{EntryQuery, LedgerStore};
use quire_shared::types::{AccountId, ActorId, Amount};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

fn input(actor: ActorId, on: chrono::NaiveDate, debit: AccountId, credit: AccountId, value: Decimal) -> NewEntryInput {
    NewEntryInput {
        date: on,
        description: "Engine test".to_string(),
        period_id: None,
        lines: vec![
            LineInput::debit(debit, Amount::new(value)),
            LineInput::credit(credit, Amount::new(value)),
        ],
        actor,
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
#[ignore = "requires PostgreSQL"]
async fn test_concurrent_creation_assigns_unique_numbers() {
    let test_db = TestDb::new().await;
    let engine = Arc::new(test_db.engine());
    let (chart, _) = common::seed(&engine).await;
    let actor = ActorId::new();

    let handles: Vec<_> = (1..=40)
        .map(|i| {
            let engine = Arc::clone(&engine);
            tokio::spawn(async move {
                let value = Decimal::from(i);
                engine
                    .validate_and_create_entry(input(actor, date(2026, 8, 1), chart.cash, chart.sales, value))
                    .await
                    .unwrap()
                    .entry
                    .number
            })
        })
        .collect();

    let numbers: HashSet<i64> = join_all(handles).await.into_iter().map(Result::unwrap).collect();
    assert_eq!(numbers, (1..=40).collect());

    drop(engine);
    test_db.cleanup().await;
}

#[tokio::test]
#[ignore = "requires PostgreSQL"]
async fn test_approve_void_and_balances() {
    let test_db = TestDb::new().await;
    let engine = test_db.engine();
    let (chart, year) = common::seed(&engine).await;
    let actor = ActorId::new();

    let kept = engine
        .validate_and_create_entry(input(actor, date(2026, 3, 2), chart.cash, chart.capital, dec!(1000)))
        .await
        .unwrap();
    engine.approve_entry(kept.entry.id, actor).await.unwrap();
    let dropped = engine
        .validate_and_create_entry(input(actor, date(2026, 3, 3), chart.cash, chart.sales, dec!(75)))
        .await
        .unwrap();
    engine.approve_entry(dropped.entry.id, actor).await.unwrap();
    let voided = engine.void_entry(dropped.entry.id, actor, "wrong customer").await.unwrap();
    assert_eq!(voided.status, EntryStatus::Voided);

    let balances = engine
        .compute_account_balances(PeriodScope::Year(year.year.id))
        .await
        .unwrap();
    assert_eq!(balances.balance_of(chart.cash), Amount::new(dec!(1000)));
    assert_eq!(balances.balance_of(chart.sales), Amount::ZERO);

    let stored = engine.store().entry(dropped.entry.id).await.unwrap().unwrap();
    assert_eq!(stored.audit.void_reason.as_deref(), Some("wrong customer"));
    assert_eq!(stored.audit.approved_by, Some(actor));

    test_db.cleanup().await;
}

#[tokio::test]
#[ignore = "requires PostgreSQL"]
async fn test_close_and_reopen_fiscal_year() {
    let test_db = TestDb::new().await;
    let engine = test_db.engine();
    let (chart, year) = common::seed(&engine).await;
    let actor = ActorId::new();

    for (on, debit, credit, value) in [
        (date(2026, 1, 5), chart.cash, chart.capital, dec!(300)),
        (date(2026, 4, 9), chart.cash, chart.sales, dec!(500)),
        (date(2026, 9, 1), chart.rent, chart.cash, dec!(300)),
    ] {
        let receipt = engine
            .validate_and_create_entry(input(actor, on, debit, credit, value))
            .await
            .unwrap();
        engine.approve_entry(receipt.entry.id, actor).await.unwrap();
    }

    let summary = engine
        .close_period(year.year.id, actor, CloseOptions::default())
        .await
        .unwrap();
    assert_eq!(summary.net_result, Amount::new(dec!(200)));
    let next_year = summary.next_fiscal_year_id.unwrap();

    let closed = engine.store().fiscal_year(year.year.id).await.unwrap().unwrap();
    assert_eq!(closed.status, PeriodStatus::Closed);
    let months = engine.store().periods(year.year.id).await.unwrap();
    assert!(months.iter().all(|m| m.status == PeriodStatus::Closed));

    let openings = engine
        .store()
        .entries(&EntryQuery::for_year(next_year))
        .await
        .unwrap();
    assert_eq!(openings.len(), 1);
    assert_eq!(openings[0].kind, EntryKind::Opening);

    let carried = engine
        .compute_account_balances(PeriodScope::Year(next_year))
        .await
        .unwrap();
    assert_eq!(carried.balance_of(chart.cash), Amount::new(dec!(500)));
    assert_eq!(carried.balance_of(chart.result), Amount::new(dec!(200)));

    assert!(matches!(
        engine
            .validate_and_create_entry(input(actor, date(2026, 12, 1), chart.cash, chart.sales, dec!(1)))
            .await,
        Err(LedgerError::PeriodClosed { .. })
    ));

    let reopened = engine.reopen_period(year.year.id, actor, "Audit adjustment").await.unwrap();
    assert_eq!(reopened.year.status, PeriodStatus::Reopened);

    test_db.cleanup().await;
}

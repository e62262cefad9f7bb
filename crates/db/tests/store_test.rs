//! `PgLedgerStore` against a live PostgreSQL.
//!
//! Run with `cargo test -p quire-db -- --ignored` and `DATABASE_URL` set.

mod common;

use chrono::Utc;
use common::{TestDb, date};
use quire_core::fiscal::PeriodStatus;
use quire_core::ledger::{EntryAudit, EntryKind, EntryStatus, JournalLine, NewEntry, StatusChange};
use quire_core::store::{LedgerStore, StoreError, WriteBatch, WriteOp};
use quire_db::migration::{Migrator, MigratorTrait};
use quire_shared::types::{AccountId, ActorId, Amount, JournalEntryId, JournalLineId};
use rust_decimal_macros::dec;

fn draft(
    fiscal_year_id: quire_shared::types::FiscalYearId,
    period_id: quire_shared::types::MonthlyPeriodId,
    postings: &[(AccountId, rust_decimal::Decimal, rust_decimal::Decimal)],
) -> NewEntry {
    let id = JournalEntryId::new();
    let lines = postings
        .iter()
        .zip(0u32..)
        .map(|((account_id, debit, credit), position)| JournalLine {
            id: JournalLineId::new(),
            entry_id: id,
            account_id: *account_id,
            debit: Amount::new(*debit),
            credit: Amount::new(*credit),
            memo: None,
            position,
        })
        .collect();
    NewEntry {
        id,
        fiscal_year_id,
        period_id,
        date: date(2026, 2, 10),
        description: "Store test".to_string(),
        status: EntryStatus::Pending,
        kind: EntryKind::Regular,
        lines,
        audit: EntryAudit::created(ActorId::new(), Utc::now()),
    }
}

#[tokio::test]
#[ignore = "requires PostgreSQL"]
async fn test_migrations_roll_back_and_reapply() {
    let test_db = TestDb::new().await;

    Migrator::down(&test_db.db, None).await.unwrap();
    assert_eq!(Migrator::get_pending_migrations(&test_db.db).await.unwrap().len(), 1);
    Migrator::up(&test_db.db, None).await.unwrap();
    assert!(Migrator::get_pending_migrations(&test_db.db).await.unwrap().is_empty());

    test_db.cleanup().await;
}

#[tokio::test]
#[ignore = "requires PostgreSQL"]
async fn test_entry_round_trips_with_lines_in_order() {
    let test_db = TestDb::new().await;
    let engine = test_db.engine();
    let (chart, year) = common::seed(&engine).await;
    let store = test_db.store();

    let entry = draft(
        year.year.id,
        year.periods[1].id,
        &[
            (chart.rent, dec!(40.25), dec!(0)),
            (chart.cash, dec!(0), dec!(30.25)),
            (chart.payable, dec!(0), dec!(10)),
        ],
    );
    let receipt = store.commit(WriteOp::InsertEntry(entry.clone()).into()).await.unwrap();
    assert_eq!(receipt.number_of(entry.id), Some(1));

    let stored = store.entry(entry.id).await.unwrap().unwrap();
    assert_eq!(stored.number, 1);
    assert_eq!(stored.lines, entry.lines);
    assert_eq!(stored.totals.debit, Amount::new(dec!(40.25)));
    assert!(store.account_has_postings(chart.payable).await.unwrap());
    assert!(!store.account_has_postings(chart.sales).await.unwrap());

    test_db.cleanup().await;
}

#[tokio::test]
#[ignore = "requires PostgreSQL"]
async fn test_stale_expected_status_conflicts() {
    let test_db = TestDb::new().await;
    let engine = test_db.engine();
    let (_, year) = common::seed(&engine).await;
    let store = test_db.store();

    let mut reopened = year.periods[0].clone();
    reopened.status = PeriodStatus::Reopened;
    let result = store
        .commit(
            WriteOp::UpdatePeriod {
                expected: PeriodStatus::Closed,
                period: reopened,
            }
            .into(),
        )
        .await;

    assert!(matches!(result, Err(StoreError::Conflict(_))));
    let period = store.period(year.periods[0].id).await.unwrap().unwrap();
    assert_eq!(period.status, PeriodStatus::Open);

    test_db.cleanup().await;
}

#[tokio::test]
#[ignore = "requires PostgreSQL"]
async fn test_failed_batch_rolls_back_entry_and_counter() {
    let test_db = TestDb::new().await;
    let engine = test_db.engine();
    let (chart, year) = common::seed(&engine).await;
    let store = test_db.store();

    let entry = draft(
        year.year.id,
        year.periods[1].id,
        &[(chart.cash, dec!(5), dec!(0)), (chart.sales, dec!(0), dec!(5))],
    );
    let mut batch = WriteBatch::new();
    batch.push(WriteOp::InsertEntry(entry.clone())).push(WriteOp::UpdateEntryStatus {
        entry_id: JournalEntryId::new(),
        expected: EntryStatus::Pending,
        change: StatusChange::Approve {
            approved_by: ActorId::new(),
            approved_at: Utc::now(),
        },
    });

    assert!(matches!(store.commit(batch).await, Err(StoreError::NotFound(_))));
    assert!(store.entry(entry.id).await.unwrap().is_none());

    let receipt = store.commit(WriteOp::InsertEntry(entry.clone()).into()).await.unwrap();
    assert_eq!(receipt.number_of(entry.id), Some(1));

    test_db.cleanup().await;
}

#[tokio::test]
#[ignore = "requires PostgreSQL"]
async fn test_schema_rejects_two_sided_line() {
    let test_db = TestDb::new().await;
    let engine = test_db.engine();
    let (chart, year) = common::seed(&engine).await;
    let store = test_db.store();

    let entry = draft(
        year.year.id,
        year.periods[1].id,
        &[(chart.cash, dec!(5), dec!(5)), (chart.sales, dec!(0), dec!(5))],
    );
    let result = store.commit(WriteOp::InsertEntry(entry.clone()).into()).await;

    assert!(matches!(result, Err(StoreError::Backend(_))));
    assert!(store.entry(entry.id).await.unwrap().is_none());

    test_db.cleanup().await;
}

#[tokio::test]
#[ignore = "requires PostgreSQL"]
async fn test_duplicate_account_code_conflicts() {
    let test_db = TestDb::new().await;
    let engine = test_db.engine();
    let (chart, _) = common::seed(&engine).await;
    let store = test_db.store();

    let mut copy = store.account(chart.cash).await.unwrap().unwrap();
    copy.id = AccountId::new();
    let result = store.commit(WriteOp::InsertAccount(copy).into()).await;

    assert!(matches!(result, Err(StoreError::Conflict(_))));

    test_db.cleanup().await;
}

#[tokio::test]
#[ignore = "requires PostgreSQL"]
async fn test_regular_entry_rejected_once_period_closed() {
    let test_db = TestDb::new().await;
    let engine = test_db.engine();
    let (chart, year) = common::seed(&engine).await;
    let store = test_db.store();

    let mut closed = year.periods[1].clone();
    closed.status = PeriodStatus::Closed;
    store
        .commit(
            WriteOp::UpdatePeriod {
                expected: PeriodStatus::Open,
                period: closed,
            }
            .into(),
        )
        .await
        .unwrap();

    let postings = [(chart.cash, dec!(5), dec!(0)), (chart.sales, dec!(0), dec!(5))];
    let late = draft(year.year.id, year.periods[1].id, &postings);
    let result = store.commit(WriteOp::InsertEntry(late.clone()).into()).await;
    assert!(matches!(result, Err(StoreError::Conflict(_))));
    assert!(store.entry(late.id).await.unwrap().is_none());

    let mut closing = draft(year.year.id, year.periods[1].id, &postings);
    closing.kind = EntryKind::Closing;
    closing.status = EntryStatus::Approved;
    store.commit(WriteOp::InsertEntry(closing).into()).await.unwrap();

    test_db.cleanup().await;
}

#[tokio::test]
#[ignore = "requires PostgreSQL"]
async fn test_entry_revision_guards_snapshot() {
    let test_db = TestDb::new().await;
    let engine = test_db.engine();
    let (chart, year) = common::seed(&engine).await;
    let store = test_db.store();
    let fiscal_year_id = year.year.id;

    let before = store.entry_revision(fiscal_year_id).await.unwrap().unwrap();
    let entry = draft(
        fiscal_year_id,
        year.periods[1].id,
        &[(chart.cash, dec!(5), dec!(0)), (chart.sales, dec!(0), dec!(5))],
    );
    store.commit(WriteOp::InsertEntry(entry).into()).await.unwrap();
    let after = store.entry_revision(fiscal_year_id).await.unwrap().unwrap();
    assert_eq!(after, before + 1);

    let stale = WriteOp::ExpectEntryRevision {
        fiscal_year_id,
        revision: before,
    };
    assert!(matches!(store.commit(stale.into()).await, Err(StoreError::Conflict(_))));
    let current = WriteOp::ExpectEntryRevision {
        fiscal_year_id,
        revision: after,
    };
    store.commit(current.into()).await.unwrap();

    test_db.cleanup().await;
}

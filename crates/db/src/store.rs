//! PostgreSQL-backed [`LedgerStore`].
//!
//! Every batch runs inside one database transaction. Status-guarded updates
//! carry the observed status in their `WHERE` clause, so a concurrent change
//! makes the update touch no rows and the batch rolls back with a conflict.
//! Entry numbers come from a per-year counter row incremented with
//! `UPDATE ... RETURNING`. Every entry write also bumps the row's revision
//! first thing, so writers of one year serialize on that row lock, and a
//! year-end close that locks the row with `FOR UPDATE` sees exactly the
//! revision its snapshot was taken at. Regular entry writes then take a
//! share lock on their month and year rows and fail if either is closed.

use std::collections::HashMap;
use std::fmt::Display;

use async_trait::async_trait;
use quire_core::accounts::Account;
use quire_core::fiscal::{FiscalYear, MonthlyPeriod};
use quire_core::ledger::{EntryKind, JournalEntry, JournalLine, StatusChange};
use quire_core::store::{CommitReceipt, EntryQuery, LedgerStore, StoreError, WriteBatch, WriteOp};
use quire_shared::types::{AccountId, FiscalYearId, JournalEntryId, MonthlyPeriodId};
use sea_orm::sea_query::Expr;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection, DatabaseTransaction,
    DbBackend, DbErr, EntityTrait, PrimaryKeyTrait, QueryFilter, QueryOrder, Set, SqlErr,
    Statement, TransactionTrait,
};
use tracing::debug;
use uuid::Uuid;

use crate::convert::{
    account_from_model, account_to_active, entry_from_models, line_to_active, new_entry_to_active,
    period_from_model, period_to_active, year_from_model, year_to_active,
};
use crate::entities::{
    accounts, entry_sequences, fiscal_years, journal_entries, journal_lines, monthly_periods,
    sea_orm_active_enums::{EntryStatus, PeriodStatus},
};

/// Upper bound on ids per `IN (...)` list when loading lines.
const LINE_QUERY_CHUNK: usize = 5_000;

const NEXT_ENTRY_NUMBER_SQL: &str = r"
UPDATE entry_sequences
   SET last_value = last_value + 1,
       revision = revision + 1
 WHERE fiscal_year_id = $1
RETURNING last_value
";

const BUMP_REVISION_SQL: &str = r"
UPDATE entry_sequences
   SET revision = revision + 1
 WHERE fiscal_year_id = $1
RETURNING revision
";

const LOCK_REVISION_SQL: &str = r"
SELECT revision
  FROM entry_sequences
 WHERE fiscal_year_id = $1
   FOR UPDATE
";

// The share lock waits for a concurrent close of either row and then
// re-evaluates the status filter against the committed version.
const POSTABLE_PERIOD_SQL: &str = r"
SELECT p.id
  FROM monthly_periods p
  JOIN fiscal_years y ON y.id = p.fiscal_year_id
 WHERE p.id = $1
   AND y.id = $2
   AND p.status <> 'closed'
   AND y.status <> 'closed'
   FOR SHARE OF p, y
";

/// Maps a database error onto the store's error kinds.
///
/// Uniqueness and foreign-key violations mean the batch raced another writer
/// or referenced something that is gone; both are conflicts.
fn db_error(err: DbErr) -> StoreError {
    match err.sql_err() {
        Some(SqlErr::UniqueConstraintViolation(detail)) => StoreError::Conflict(detail),
        Some(SqlErr::ForeignKeyConstraintViolation(detail)) => StoreError::Conflict(detail),
        _ => StoreError::Backend(err.to_string()),
    }
}

/// Explains why a guarded write touched no rows.
async fn missed_guard<E>(
    txn: &DatabaseTransaction,
    what: &str,
    id: Uuid,
    expected: impl Display,
) -> StoreError
where
    E: EntityTrait,
    Uuid: Into<<E::PrimaryKey as PrimaryKeyTrait>::ValueType>,
{
    match E::find_by_id(id).one(txn).await {
        Ok(Some(_)) => StoreError::Conflict(format!("{what} {id} is no longer {expected}")),
        Ok(None) => StoreError::NotFound(format!("{what} {id}")),
        Err(err) => db_error(err),
    }
}

/// Ledger store on a `SeaORM` connection pool.
#[derive(Debug, Clone)]
pub struct PgLedgerStore {
    db: DatabaseConnection,
}

impl PgLedgerStore {
    /// Creates a store on an existing connection.
    #[must_use]
    pub const fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    /// The underlying connection.
    #[must_use]
    pub const fn connection(&self) -> &DatabaseConnection {
        &self.db
    }

    /// Loads the lines of the given entries, grouped by entry and ordered by
    /// position.
    async fn lines_for(
        &self,
        entry_ids: &[Uuid],
    ) -> Result<HashMap<Uuid, Vec<journal_lines::Model>>, StoreError> {
        let mut grouped: HashMap<Uuid, Vec<journal_lines::Model>> = HashMap::new();
        for chunk in entry_ids.chunks(LINE_QUERY_CHUNK) {
            let rows = journal_lines::Entity::find()
                .filter(journal_lines::Column::EntryId.is_in(chunk.iter().copied()))
                .order_by_asc(journal_lines::Column::EntryId)
                .order_by_asc(journal_lines::Column::Position)
                .all(&self.db)
                .await
                .map_err(db_error)?;
            for row in rows {
                grouped.entry(row.entry_id).or_default().push(row);
            }
        }
        Ok(grouped)
    }
}

#[async_trait]
impl LedgerStore for PgLedgerStore {
    async fn accounts(&self) -> Result<Vec<Account>, StoreError> {
        accounts::Entity::find()
            .order_by_asc(accounts::Column::Code)
            .all(&self.db)
            .await
            .map_err(db_error)?
            .into_iter()
            .map(account_from_model)
            .collect()
    }

    async fn account(&self, id: AccountId) -> Result<Option<Account>, StoreError> {
        accounts::Entity::find_by_id(id.0)
            .one(&self.db)
            .await
            .map_err(db_error)?
            .map(account_from_model)
            .transpose()
    }

    async fn accounts_by_ids(&self, ids: &[AccountId]) -> Result<Vec<Account>, StoreError> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        accounts::Entity::find()
            .filter(accounts::Column::Id.is_in(ids.iter().map(|id| id.0)))
            .all(&self.db)
            .await
            .map_err(db_error)?
            .into_iter()
            .map(account_from_model)
            .collect()
    }

    async fn account_has_postings(&self, id: AccountId) -> Result<bool, StoreError> {
        let line = journal_lines::Entity::find()
            .filter(journal_lines::Column::AccountId.eq(id.0))
            .one(&self.db)
            .await
            .map_err(db_error)?;
        Ok(line.is_some())
    }

    async fn fiscal_years(&self) -> Result<Vec<FiscalYear>, StoreError> {
        let rows = fiscal_years::Entity::find()
            .order_by_asc(fiscal_years::Column::StartDate)
            .all(&self.db)
            .await
            .map_err(db_error)?;
        Ok(rows.into_iter().map(year_from_model).collect())
    }

    async fn fiscal_year(&self, id: FiscalYearId) -> Result<Option<FiscalYear>, StoreError> {
        let row = fiscal_years::Entity::find_by_id(id.0)
            .one(&self.db)
            .await
            .map_err(db_error)?;
        Ok(row.map(year_from_model))
    }

    async fn periods(&self, fiscal_year_id: FiscalYearId) -> Result<Vec<MonthlyPeriod>, StoreError> {
        monthly_periods::Entity::find()
            .filter(monthly_periods::Column::FiscalYearId.eq(fiscal_year_id.0))
            .order_by_asc(monthly_periods::Column::PeriodNumber)
            .all(&self.db)
            .await
            .map_err(db_error)?
            .into_iter()
            .map(period_from_model)
            .collect()
    }

    async fn period(&self, id: MonthlyPeriodId) -> Result<Option<MonthlyPeriod>, StoreError> {
        monthly_periods::Entity::find_by_id(id.0)
            .one(&self.db)
            .await
            .map_err(db_error)?
            .map(period_from_model)
            .transpose()
    }

    async fn entry(&self, id: JournalEntryId) -> Result<Option<JournalEntry>, StoreError> {
        let Some(header) = journal_entries::Entity::find_by_id(id.0)
            .one(&self.db)
            .await
            .map_err(db_error)?
        else {
            return Ok(None);
        };
        let lines = journal_lines::Entity::find()
            .filter(journal_lines::Column::EntryId.eq(id.0))
            .order_by_asc(journal_lines::Column::Position)
            .all(&self.db)
            .await
            .map_err(db_error)?;
        entry_from_models(header, lines).map(Some)
    }

    async fn entry_revision(&self, fiscal_year_id: FiscalYearId) -> Result<Option<i64>, StoreError> {
        let row = entry_sequences::Entity::find_by_id(fiscal_year_id.0)
            .one(&self.db)
            .await
            .map_err(db_error)?;
        Ok(row.map(|r| r.revision))
    }

    async fn entries(&self, query: &EntryQuery) -> Result<Vec<JournalEntry>, StoreError> {
        let mut select = journal_entries::Entity::find();
        if let Some(window) = query.window {
            select = select.filter(journal_entries::Column::EntryDate.between(window.start, window.end));
        }
        if let Some(fiscal_year_id) = query.fiscal_year_id {
            select = select.filter(journal_entries::Column::FiscalYearId.eq(fiscal_year_id.0));
        }
        if let Some(period_id) = query.period_id {
            select = select.filter(journal_entries::Column::PeriodId.eq(period_id.0));
        }
        if !query.statuses.is_empty() {
            let statuses: Vec<EntryStatus> = query.statuses.iter().map(|s| (*s).into()).collect();
            select = select.filter(journal_entries::Column::Status.is_in(statuses));
        }

        let headers = select
            .order_by_asc(journal_entries::Column::EntryDate)
            .order_by_asc(journal_entries::Column::EntryNumber)
            .all(&self.db)
            .await
            .map_err(db_error)?;

        let ids: Vec<Uuid> = headers.iter().map(|h| h.id).collect();
        let mut lines = self.lines_for(&ids).await?;
        headers
            .into_iter()
            .map(|header| {
                let entry_lines = lines.remove(&header.id).unwrap_or_default();
                entry_from_models(header, entry_lines)
            })
            .collect()
    }

    async fn commit(&self, batch: WriteBatch) -> Result<CommitReceipt, StoreError> {
        debug!(ops = batch.len(), "committing write batch");
        let txn = self.db.begin().await.map_err(db_error)?;
        let mut receipt = CommitReceipt::default();

        for op in batch.into_ops() {
            apply(&txn, op, &mut receipt).await?;
        }

        txn.commit().await.map_err(db_error)?;
        Ok(receipt)
    }
}

/// Applies one write inside the batch transaction.
///
/// An error returned here drops `txn` uncommitted, which rolls back every
/// earlier write of the batch.
async fn apply(
    txn: &DatabaseTransaction,
    op: WriteOp,
    receipt: &mut CommitReceipt,
) -> Result<(), StoreError> {
    match op {
        WriteOp::InsertAccount(account) => {
            account_to_active(&account).insert(txn).await.map_err(db_error)?;
        }
        WriteOp::UpdateAccount(account) => match account_to_active(&account).update(txn).await {
            Ok(_) => {}
            Err(DbErr::RecordNotUpdated) => {
                return Err(StoreError::NotFound(format!("account {}", account.id)));
            }
            Err(err) => return Err(db_error(err)),
        },
        WriteOp::DeleteAccount(id) => {
            let result = accounts::Entity::delete_by_id(id.0)
                .exec(txn)
                .await
                .map_err(db_error)?;
            if result.rows_affected == 0 {
                return Err(StoreError::NotFound(format!("account {id}")));
            }
        }
        WriteOp::InsertFiscalYear(year) => {
            year_to_active(&year).insert(txn).await.map_err(db_error)?;
            entry_sequences::ActiveModel {
                fiscal_year_id: Set(year.id.0),
                last_value: Set(0),
                revision: Set(0),
            }
            .insert(txn)
            .await
            .map_err(db_error)?;
        }
        WriteOp::UpdateFiscalYear { expected, year } => {
            let result = fiscal_years::Entity::update_many()
                .set(year_to_active(&year))
                .filter(fiscal_years::Column::Id.eq(year.id.0))
                .filter(fiscal_years::Column::Status.eq(PeriodStatus::from(expected)))
                .exec(txn)
                .await
                .map_err(db_error)?;
            if result.rows_affected != 1 {
                let id = year.id.0;
                return Err(missed_guard::<fiscal_years::Entity>(txn, "fiscal year", id, expected).await);
            }
        }
        WriteOp::InsertPeriod(period) => {
            period_to_active(&period)?.insert(txn).await.map_err(db_error)?;
        }
        WriteOp::UpdatePeriod { expected, period } => {
            let result = monthly_periods::Entity::update_many()
                .set(period_to_active(&period)?)
                .filter(monthly_periods::Column::Id.eq(period.id.0))
                .filter(monthly_periods::Column::Status.eq(PeriodStatus::from(expected)))
                .exec(txn)
                .await
                .map_err(db_error)?;
            if result.rows_affected != 1 {
                return Err(missed_guard::<monthly_periods::Entity>(txn, "period", period.id.0, expected).await);
            }
        }
        WriteOp::ExpectEntryRevision {
            fiscal_year_id,
            revision,
        } => {
            let current = counter_value(txn, LOCK_REVISION_SQL, fiscal_year_id, "revision").await?;
            if current != revision {
                return Err(StoreError::Conflict(format!(
                    "entries of fiscal year {fiscal_year_id} changed (revision {current}, expected {revision})"
                )));
            }
        }
        WriteOp::InsertEntry(new_entry) => {
            let number =
                counter_value(txn, NEXT_ENTRY_NUMBER_SQL, new_entry.fiscal_year_id, "last_value").await?;
            if new_entry.kind == EntryKind::Regular {
                ensure_postable(txn, new_entry.fiscal_year_id.0, new_entry.period_id.0).await?;
            }
            new_entry_to_active(&new_entry, number)
                .insert(txn)
                .await
                .map_err(db_error)?;
            insert_lines(txn, &new_entry.lines).await?;
            receipt.entry_numbers.push((new_entry.id, number));
        }
        WriteOp::ReplaceLines {
            entry_id,
            expected,
            lines,
            totals,
        } => {
            prepare_entry_write(txn, entry_id).await?;
            let result = journal_entries::Entity::update_many()
                .col_expr(journal_entries::Column::TotalDebit, Expr::value(totals.debit.value()))
                .col_expr(journal_entries::Column::TotalCredit, Expr::value(totals.credit.value()))
                .filter(journal_entries::Column::Id.eq(entry_id.0))
                .filter(journal_entries::Column::Status.eq(EntryStatus::from(expected)))
                .exec(txn)
                .await
                .map_err(db_error)?;
            if result.rows_affected != 1 {
                return Err(missed_guard::<journal_entries::Entity>(txn, "entry", entry_id.0, expected).await);
            }
            journal_lines::Entity::delete_many()
                .filter(journal_lines::Column::EntryId.eq(entry_id.0))
                .exec(txn)
                .await
                .map_err(db_error)?;
            insert_lines(txn, &lines).await?;
        }
        WriteOp::UpdateEntryStatus {
            entry_id,
            expected,
            change,
        } => {
            prepare_entry_write(txn, entry_id).await?;
            let result = journal_entries::Entity::update_many()
                .set(status_change_to_active(&change))
                .filter(journal_entries::Column::Id.eq(entry_id.0))
                .filter(journal_entries::Column::Status.eq(EntryStatus::from(expected)))
                .exec(txn)
                .await
                .map_err(db_error)?;
            if result.rows_affected != 1 {
                return Err(missed_guard::<journal_entries::Entity>(txn, "entry", entry_id.0, expected).await);
            }
        }
    }
    Ok(())
}

/// Runs a statement on the year's counter row and reads back `column`.
async fn counter_value(
    txn: &DatabaseTransaction,
    sql: &str,
    fiscal_year_id: FiscalYearId,
    column: &str,
) -> Result<i64, StoreError> {
    let row = txn
        .query_one(Statement::from_sql_and_values(
            DbBackend::Postgres,
            sql,
            [fiscal_year_id.0.into()],
        ))
        .await
        .map_err(db_error)?
        .ok_or_else(|| StoreError::NotFound(format!("fiscal year {fiscal_year_id}")))?;
    row.try_get::<i64>("", column).map_err(db_error)
}

/// Fails with a conflict unless the month and its year are still open.
async fn ensure_postable(
    txn: &DatabaseTransaction,
    fiscal_year_id: Uuid,
    period_id: Uuid,
) -> Result<(), StoreError> {
    let row = txn
        .query_one(Statement::from_sql_and_values(
            DbBackend::Postgres,
            POSTABLE_PERIOD_SQL,
            [period_id.into(), fiscal_year_id.into()],
        ))
        .await
        .map_err(db_error)?;
    if row.is_none() {
        return Err(StoreError::Conflict(format!(
            "period {period_id} of fiscal year {fiscal_year_id} is closed"
        )));
    }
    Ok(())
}

/// Bumps the revision of the entry's year and checks its period before the
/// entry itself changes.
async fn prepare_entry_write(txn: &DatabaseTransaction, entry_id: JournalEntryId) -> Result<(), StoreError> {
    let header = journal_entries::Entity::find_by_id(entry_id.0)
        .one(txn)
        .await
        .map_err(db_error)?
        .ok_or_else(|| StoreError::NotFound(format!("entry {entry_id}")))?;
    counter_value(txn, BUMP_REVISION_SQL, FiscalYearId(header.fiscal_year_id), "revision").await?;
    if EntryKind::from(header.kind) == EntryKind::Regular {
        ensure_postable(txn, header.fiscal_year_id, header.period_id).await?;
    }
    Ok(())
}

async fn insert_lines(txn: &DatabaseTransaction, lines: &[JournalLine]) -> Result<(), StoreError> {
    if lines.is_empty() {
        return Ok(());
    }
    let models = lines.iter().map(line_to_active).collect::<Result<Vec<_>, _>>()?;
    journal_lines::Entity::insert_many(models)
        .exec(txn)
        .await
        .map_err(db_error)?;
    Ok(())
}

fn status_change_to_active(change: &StatusChange) -> journal_entries::ActiveModel {
    let mut model = journal_entries::ActiveModel {
        status: Set(change.target_status().into()),
        ..Default::default()
    };
    match change {
        StatusChange::Approve {
            approved_by,
            approved_at,
        } => {
            model.approved_by = Set(Some(approved_by.0));
            model.approved_at = Set(Some(*approved_at));
        }
        StatusChange::Void {
            voided_by,
            voided_at,
            reason,
        } => {
            model.voided_by = Set(Some(voided_by.0));
            model.voided_at = Set(Some(*voided_at));
            model.void_reason = Set(Some(reason.clone()));
        }
    }
    model
}

//! `SeaORM` Entity for journal entry headers.

use super::sea_orm_active_enums::{EntryKind, EntryStatus};
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Eq, Serialize, Deserialize)]
#[sea_orm(table_name = "journal_entries")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub entry_number: i64,
    pub fiscal_year_id: Uuid,
    pub period_id: Uuid,
    pub entry_date: Date,
    #[sea_orm(column_type = "Text")]
    pub description: String,
    pub status: EntryStatus,
    pub kind: EntryKind,
    #[sea_orm(column_type = "Decimal(Some((19, 4)))")]
    pub total_debit: Decimal,
    #[sea_orm(column_type = "Decimal(Some((19, 4)))")]
    pub total_credit: Decimal,
    pub created_by: Uuid,
    pub created_at: DateTimeUtc,
    pub approved_by: Option<Uuid>,
    pub approved_at: Option<DateTimeUtc>,
    pub voided_by: Option<Uuid>,
    pub voided_at: Option<DateTimeUtc>,
    #[sea_orm(column_type = "Text", nullable)]
    pub void_reason: Option<String>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::fiscal_years::Entity",
        from = "Column::FiscalYearId",
        to = "super::fiscal_years::Column::Id",
        on_update = "NoAction",
        on_delete = "Restrict"
    )]
    FiscalYears,
    #[sea_orm(
        belongs_to = "super::monthly_periods::Entity",
        from = "Column::PeriodId",
        to = "super::monthly_periods::Column::Id",
        on_update = "NoAction",
        on_delete = "Restrict"
    )]
    MonthlyPeriods,
    #[sea_orm(has_many = "super::journal_lines::Entity")]
    JournalLines,
}

impl Related<super::fiscal_years::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::FiscalYears.def()
    }
}

impl Related<super::monthly_periods::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::MonthlyPeriods.def()
    }
}

impl Related<super::journal_lines::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::JournalLines.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

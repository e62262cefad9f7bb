//! `SeaORM` Entity for fiscal years.

use super::sea_orm_active_enums::PeriodStatus;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Eq, Serialize, Deserialize)]
#[sea_orm(table_name = "fiscal_years")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub name: String,
    pub start_date: Date,
    pub end_date: Date,
    pub status: PeriodStatus,
    pub is_active: bool,
    pub closed_by: Option<Uuid>,
    pub closed_at: Option<DateTimeUtc>,
    pub reopened_by: Option<Uuid>,
    pub reopened_at: Option<DateTimeUtc>,
    #[sea_orm(column_type = "Text", nullable)]
    pub reopen_reason: Option<String>,
    pub reclosed_by: Option<Uuid>,
    pub reclosed_at: Option<DateTimeUtc>,
    pub created_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::monthly_periods::Entity")]
    MonthlyPeriods,
    #[sea_orm(has_many = "super::journal_entries::Entity")]
    JournalEntries,
    #[sea_orm(has_one = "super::entry_sequences::Entity")]
    EntrySequences,
}

impl Related<super::monthly_periods::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::MonthlyPeriods.def()
    }
}

impl Related<super::journal_entries::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::JournalEntries.def()
    }
}

impl Related<super::entry_sequences::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::EntrySequences.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

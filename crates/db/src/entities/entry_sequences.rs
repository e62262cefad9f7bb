//! `SeaORM` Entity for per-fiscal-year entry counters.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Eq, Serialize, Deserialize)]
#[sea_orm(table_name = "entry_sequences")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub fiscal_year_id: Uuid,
    pub last_value: i64,
    pub revision: i64,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::fiscal_years::Entity",
        from = "Column::FiscalYearId",
        to = "super::fiscal_years::Column::Id",
        on_update = "NoAction",
        on_delete = "Cascade"
    )]
    FiscalYears,
}

impl Related<super::fiscal_years::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::FiscalYears.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

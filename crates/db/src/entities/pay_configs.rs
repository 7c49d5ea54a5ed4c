//! `SeaORM` Entity for pay_configs table.

use credit_core::ledger::PayTier;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Eq, Serialize, Deserialize)]
#[sea_orm(table_name = "pay_configs")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    #[sea_orm(unique)]
    pub level: i16,
    pub min_score: i64,
    pub max_score: Option<i64>,
    #[sea_orm(column_type = "Decimal(Some((20, 2)))", nullable)]
    pub daily_limit: Option<Decimal>,
    #[sea_orm(column_type = "Decimal(Some((5, 4)))")]
    pub fee_rate: Decimal,
    #[sea_orm(column_type = "Decimal(Some((5, 4)))")]
    pub score_rate: Decimal,
    pub created_at: DateTimeWithTimeZone,
    pub updated_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

impl From<Model> for PayTier {
    fn from(model: Model) -> Self {
        Self {
            level: model.level,
            min_score: model.min_score,
            max_score: model.max_score,
            daily_limit: model.daily_limit,
            fee_rate: model.fee_rate,
            score_rate: model.score_rate,
        }
    }
}

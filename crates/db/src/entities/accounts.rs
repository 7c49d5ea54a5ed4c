//! `SeaORM` Entity for accounts table.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Eq, Serialize, Deserialize)]
#[sea_orm(table_name = "accounts")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: i64,
    #[sea_orm(unique)]
    pub username: String,
    pub pay_score: i64,
    #[serde(skip_serializing)]
    pub pay_key_hash: Option<String>,
    #[serde(skip_serializing)]
    pub sign_key: String,
    #[sea_orm(column_type = "Decimal(Some((20, 2)))")]
    pub total_receive: Decimal,
    #[sea_orm(column_type = "Decimal(Some((20, 2)))")]
    pub total_payment: Decimal,
    #[sea_orm(column_type = "Decimal(Some((20, 2)))")]
    pub total_transfer: Decimal,
    #[sea_orm(column_type = "Decimal(Some((20, 2)))")]
    pub total_community: Decimal,
    #[sea_orm(column_type = "Decimal(Some((20, 2)))")]
    pub community_balance: Decimal,
    #[sea_orm(column_type = "Decimal(Some((20, 2)))")]
    pub available_balance: Decimal,
    pub is_active: bool,
    pub created_at: DateTimeWithTimeZone,
    pub updated_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::merchant_credentials::Entity")]
    MerchantCredentials,
}

impl Related<super::merchant_credentials::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::MerchantCredentials.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

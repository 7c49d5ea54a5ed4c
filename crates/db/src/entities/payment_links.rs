//! `SeaORM` Entity for payment_links table.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Eq, Serialize, Deserialize)]
#[sea_orm(table_name = "payment_links")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    pub merchant_credential_id: i64,
    #[sea_orm(unique)]
    pub token: String,
    #[sea_orm(column_type = "Decimal(Some((20, 2)))")]
    pub amount: Decimal,
    pub product_name: String,
    pub remark: String,
    pub total_limit: Option<i32>,
    pub user_limit: Option<i32>,
    pub deleted_at: Option<DateTimeWithTimeZone>,
    pub created_at: DateTimeWithTimeZone,
    pub updated_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::merchant_credentials::Entity",
        from = "Column::MerchantCredentialId",
        to = "super::merchant_credentials::Column::Id"
    )]
    MerchantCredentials,
}

impl Related<super::merchant_credentials::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::MerchantCredentials.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

impl Model {
    /// Total limit, if one is enforced.
    pub fn enforced_total_limit(&self) -> Option<i32> {
        self.total_limit.filter(|limit| *limit > 0)
    }

    /// Per-payer limit, if one is enforced.
    pub fn enforced_user_limit(&self) -> Option<i32> {
        self.user_limit.filter(|limit| *limit > 0)
    }
}

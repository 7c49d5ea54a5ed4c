//! `SeaORM` Entity for orders table.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

use super::sea_orm_active_enums::{OrderStatus, OrderType};

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Eq, Serialize, Deserialize)]
#[sea_orm(table_name = "orders")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    pub order_name: String,
    pub merchant_order_no: Option<String>,
    pub client_id: Option<String>,
    pub payer_id: i64,
    pub payee_id: i64,
    #[sea_orm(column_type = "Decimal(Some((20, 2)))")]
    pub amount: Decimal,
    #[sea_orm(column_type = "Decimal(Some((20, 2)))")]
    pub fee: Decimal,
    pub payee_score_delta: i64,
    pub status: OrderStatus,
    #[sea_orm(column_name = "type")]
    pub order_type: OrderType,
    pub remark: String,
    pub payment_type: String,
    pub payment_link_id: Option<i64>,
    pub is_test: bool,
    pub trade_time: Option<DateTimeWithTimeZone>,
    pub expires_at: DateTimeWithTimeZone,
    pub created_at: DateTimeWithTimeZone,
    pub updated_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::payment_links::Entity",
        from = "Column::PaymentLinkId",
        to = "super::payment_links::Column::Id"
    )]
    PaymentLinks,
}

impl Related<super::payment_links::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::PaymentLinks.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

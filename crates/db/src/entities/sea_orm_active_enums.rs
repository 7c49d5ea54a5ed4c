//! `SeaORM` active enums mirroring the PostgreSQL enum types.

use credit_core::ledger::{OrderStatus as CoreOrderStatus, OrderType as CoreOrderType};
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "Enum", enum_name = "order_status")]
pub enum OrderStatus {
    #[sea_orm(string_value = "pending")]
    Pending,
    #[sea_orm(string_value = "success")]
    Success,
    #[sea_orm(string_value = "expired")]
    Expired,
    #[sea_orm(string_value = "failed")]
    Failed,
    #[sea_orm(string_value = "disputing")]
    Disputing,
    #[sea_orm(string_value = "refund")]
    Refund,
    #[sea_orm(string_value = "refused")]
    Refused,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "Enum", enum_name = "order_type")]
pub enum OrderType {
    #[sea_orm(string_value = "payment")]
    Payment,
    #[sea_orm(string_value = "online")]
    Online,
    #[sea_orm(string_value = "transfer")]
    Transfer,
    #[sea_orm(string_value = "community")]
    Community,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(16))")]
pub enum JobStatus {
    #[sea_orm(string_value = "pending")]
    Pending,
    #[sea_orm(string_value = "running")]
    Running,
    #[sea_orm(string_value = "done")]
    Done,
    #[sea_orm(string_value = "failed")]
    Failed,
}

impl From<CoreOrderStatus> for OrderStatus {
    fn from(status: CoreOrderStatus) -> Self {
        match status {
            CoreOrderStatus::Pending => Self::Pending,
            CoreOrderStatus::Success => Self::Success,
            CoreOrderStatus::Expired => Self::Expired,
            CoreOrderStatus::Failed => Self::Failed,
            CoreOrderStatus::Disputing => Self::Disputing,
            CoreOrderStatus::Refund => Self::Refund,
            CoreOrderStatus::Refused => Self::Refused,
        }
    }
}

impl From<OrderStatus> for CoreOrderStatus {
    fn from(status: OrderStatus) -> Self {
        match status {
            OrderStatus::Pending => Self::Pending,
            OrderStatus::Success => Self::Success,
            OrderStatus::Expired => Self::Expired,
            OrderStatus::Failed => Self::Failed,
            OrderStatus::Disputing => Self::Disputing,
            OrderStatus::Refund => Self::Refund,
            OrderStatus::Refused => Self::Refused,
        }
    }
}

impl From<CoreOrderType> for OrderType {
    fn from(order_type: CoreOrderType) -> Self {
        match order_type {
            CoreOrderType::Payment => Self::Payment,
            CoreOrderType::Online => Self::Online,
            CoreOrderType::Transfer => Self::Transfer,
            CoreOrderType::Community => Self::Community,
        }
    }
}

impl From<OrderType> for CoreOrderType {
    fn from(order_type: OrderType) -> Self {
        match order_type {
            OrderType::Payment => Self::Payment,
            OrderType::Online => Self::Online,
            OrderType::Transfer => Self::Transfer,
            OrderType::Community => Self::Community,
        }
    }
}

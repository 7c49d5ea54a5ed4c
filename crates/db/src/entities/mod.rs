//! `SeaORM` entity definitions.

pub mod accounts;
pub mod jobs;
pub mod merchant_credentials;
pub mod orders;
pub mod pay_configs;
pub mod payment_links;
pub mod sea_orm_active_enums;

//! Database layer with `SeaORM` entities, repositories and the settlement engine.
//!
//! This crate provides:
//! - `SeaORM` entity definitions
//! - Database migrations
//! - Repository abstractions for data access
//! - The Limit Lock and the Settlement Engine, which move money atomically
//! - The in-process order token store

pub mod entities;
pub mod error;
pub mod limit_lock;
pub mod migration;
pub mod repositories;
pub mod settlement;
pub mod token_store;

pub use error::SettlementError;
pub use limit_lock::{LimitLock, PgAdvisoryLock};
pub use repositories::{
    AccountRepository, JobRepository, MerchantRepository, NewAccount, OrderRepository,
    PayConfigRepository, ScoreSyncRepository,
};
pub use settlement::{SettlementEngine, SettlementSettings};
pub use token_store::TokenStore;

use std::time::Duration;

use credit_shared::config::DatabaseConfig;
use sea_orm::{ConnectOptions, Database, DatabaseConnection, DbErr};

/// Establishes a connection to the database.
///
/// # Errors
///
/// Returns an error if the connection cannot be established.
pub async fn connect(database_url: &str) -> Result<DatabaseConnection, DbErr> {
    Database::connect(database_url).await
}

/// Establishes a pooled connection using the configured pool bounds.
///
/// # Errors
///
/// Returns an error if the connection cannot be established.
pub async fn connect_with(config: &DatabaseConfig) -> Result<DatabaseConnection, DbErr> {
    let mut options = ConnectOptions::new(config.url.clone());
    options
        .max_connections(config.max_connections)
        .min_connections(config.min_connections)
        .connect_timeout(Duration::from_secs(10))
        .sqlx_logging(false);
    Database::connect(options).await
}

//! Transaction-scoped limit locks.
//!
//! Callers acquire a lock inside an open transaction; it is released when the
//! transaction commits or rolls back. Only take a lock when a limit is
//! actually configured, otherwise unlimited subjects serialize for nothing.

use async_trait::async_trait;
use credit_core::ledger::LimitKey;
use sea_orm::{ConnectionTrait, DatabaseTransaction, DbBackend, DbErr, Statement};

/// A named exclusive lock held until the surrounding transaction ends.
#[async_trait]
pub trait LimitLock: Send + Sync {
    /// Blocks until the lock for `key` is held by `txn`.
    async fn acquire(&self, txn: &DatabaseTransaction, key: &LimitKey) -> Result<(), DbErr>;
}

/// PostgreSQL advisory transaction locks.
#[derive(Debug, Clone, Copy, Default)]
pub struct PgAdvisoryLock;

#[async_trait]
impl LimitLock for PgAdvisoryLock {
    async fn acquire(&self, txn: &DatabaseTransaction, key: &LimitKey) -> Result<(), DbErr> {
        tracing::trace!(lock = %key.canonical(), "Acquiring limit lock");
        txn.execute(Statement::from_sql_and_values(
            DbBackend::Postgres,
            "SELECT pg_advisory_xact_lock($1)",
            [key.lock_id().into()],
        ))
        .await?;
        Ok(())
    }
}

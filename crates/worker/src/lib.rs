//! Background worker for the credit ledger.
//!
//! Runs beside the API in the same process:
//! - the job runtime, draining the durable queue (merchant notifications,
//!   score sync pages, bulk order expiry, unanswered dispute refunds)
//! - the scheduler, enqueueing periodic jobs and pruning finished ones
//! - the expiry sweeper, expiring single orders as their tokens time out

pub mod error;
pub mod handlers;
pub mod rate_limit;
pub mod runtime;
pub mod scheduler;
pub mod score_feed;
pub mod sweeper;

pub use error::WorkerError;
pub use handlers::{Attempt, Handlers, JobHandler};
pub use rate_limit::RateLimiter;
pub use runtime::JobRunner;
pub use scheduler::Scheduler;
pub use score_feed::{HttpScoreFeed, ScoreFeed};
pub use sweeper::ExpirySweeper;

use std::sync::Arc;
use std::time::Duration;

use credit_db::{JobRepository, MerchantRepository, OrderRepository, SettlementEngine, TokenStore};
use credit_shared::config::AppConfig;
use sea_orm::DatabaseConnection;
use tokio::sync::mpsc::UnboundedReceiver;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;

/// All background tasks, ready to spawn.
pub struct Worker {
    runner: JobRunner,
    scheduler: Scheduler,
    sweeper: ExpirySweeper,
}

impl Worker {
    /// Wires the worker from configuration.
    ///
    /// `expired` receives the order ids whose expiry markers timed out in
    /// `tokens`. `engine` settles dispute refunds.
    ///
    /// # Errors
    ///
    /// Returns an error if an HTTP client cannot be built.
    pub fn from_config(
        db: &DatabaseConnection,
        engine: SettlementEngine,
        tokens: Arc<TokenStore>,
        expired: UnboundedReceiver<i64>,
        config: &AppConfig,
    ) -> Result<Self, WorkerError> {
        let worker = &config.worker;
        let sync = &worker.score_sync;
        let orders = OrderRepository::new(db.clone());
        let jobs = JobRepository::new(db.clone());

        let sync_enabled = sync.enabled && !sync.leaderboard_url.trim().is_empty();
        if sync.enabled && !sync_enabled {
            tracing::warn!("Score sync enabled without a leaderboard URL; not scheduling it");
        }

        let handlers = Handlers::new(
            handlers::NotificationDispatcher::new(
                orders.clone(),
                MerchantRepository::new(db.clone()),
                config.server.is_production(),
            )?,
            handlers::ExpiryHandler::new(orders.clone()),
            handlers::ScoreSyncHandler::new(
                db.clone(),
                Arc::new(HttpScoreFeed::new(sync.leaderboard_url.clone())?),
                Arc::new(RateLimiter::new(sync.rate, Duration::from_secs(sync.period_secs))),
                config.payment.new_user_protection_days,
                sync.max_attempts,
                Duration::from_secs(worker.job_timeout_secs) / 2,
            ),
            handlers::DisputeRefundHandler::new(engine, config.payment.dispute_refund_days),
        );

        Ok(Self {
            runner: JobRunner::new(
                jobs.clone(),
                Arc::new(handlers),
                worker.concurrency,
                Duration::from_millis(worker.poll_interval_ms),
                Duration::from_secs(worker.job_timeout_secs),
            ),
            scheduler: Scheduler::new(
                jobs,
                Duration::from_secs(worker.expiry_sweep_interval_secs),
                Duration::from_secs(worker.dispute_sweep_interval_secs),
                Duration::from_secs(worker.job_retention_hours.saturating_mul(3600)),
                sync_enabled.then(|| Duration::from_secs(sync.interval_secs)),
                sync.max_attempts,
            ),
            sweeper: ExpirySweeper::new(orders, tokens, expired),
        })
    }

    /// Spawns every task; they stop when `shutdown` fires.
    pub fn spawn(self, shutdown: &CancellationToken) -> JoinSet<()> {
        let mut tasks = JoinSet::new();
        tasks.spawn(self.runner.run(shutdown.clone()));
        tasks.spawn(self.scheduler.run(shutdown.clone()));
        tasks.spawn(self.sweeper.run(shutdown.clone()));
        tasks
    }
}

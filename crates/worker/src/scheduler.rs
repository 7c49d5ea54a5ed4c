//! Periodic job scheduling.
//!
//! Each tick enqueues a job under a key derived from the current time slot,
//! so several server instances ticking together still enqueue it once. The
//! scheduler also deletes finished jobs past their retention age, since slot
//! keys from old slots are never looked up again.

use std::time::Duration;

use chrono::{DateTime, Utc};
use credit_core::jobs::JobPayload;
use credit_db::JobRepository;
use tokio::time::{Interval, MissedTickBehavior, interval};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

/// Attempts for the bulk expiry job.
const EXPIRY_MAX_ATTEMPTS: i32 = 3;

/// Attempts for the dispute refund pass.
const DISPUTE_MAX_ATTEMPTS: i32 = 3;

/// How often finished jobs are pruned.
const RETENTION_EVERY: Duration = Duration::from_secs(3600);

/// A score walk from the first page.
const WALK_START: JobPayload = JobPayload::ScoreSyncAll { from_page: 0 };

/// Dedupe key of a periodic job in the slot containing `now`.
#[must_use]
pub fn slot_key(payload: &JobPayload, now: DateTime<Utc>, period: Duration) -> String {
    let period_secs = i64::try_from(period.as_secs().max(1)).unwrap_or(i64::MAX);
    format!("{}:{}", payload.kind(), now.timestamp().div_euclid(period_secs))
}

/// Enqueues periodic jobs until cancelled.
#[derive(Debug, Clone)]
pub struct Scheduler {
    jobs: JobRepository,
    expiry_every: Duration,
    dispute_every: Duration,
    retention: Duration,
    score_sync_every: Option<Duration>,
    score_sync_max_attempts: i32,
}

impl Scheduler {
    /// Creates a scheduler. `score_sync_every` of `None` disables score sync.
    ///
    /// `retention` is how long a `done` job is kept before it is deleted.
    #[must_use]
    pub const fn new(
        jobs: JobRepository,
        expiry_every: Duration,
        dispute_every: Duration,
        retention: Duration,
        score_sync_every: Option<Duration>,
        score_sync_max_attempts: i32,
    ) -> Self {
        Self {
            jobs,
            expiry_every,
            dispute_every,
            retention,
            score_sync_every,
            score_sync_max_attempts,
        }
    }

    /// Runs until `shutdown` fires.
    pub async fn run(self, shutdown: CancellationToken) {
        let mut expiry = ticker(self.expiry_every);
        let mut disputes = ticker(self.dispute_every);
        let mut retention = ticker(RETENTION_EVERY);
        // Never fires when score sync is off.
        let mut score_sync = self.score_sync_every.map(ticker);

        loop {
            tokio::select! {
                () = shutdown.cancelled() => break,
                _ = expiry.tick() => {
                    self.schedule(&JobPayload::ExpireOrders, self.expiry_every, EXPIRY_MAX_ATTEMPTS)
                        .await;
                    self.reap_abandoned().await;
                }
                _ = disputes.tick() => {
                    self.schedule(
                        &JobPayload::RefundExpiredDisputes,
                        self.dispute_every,
                        DISPUTE_MAX_ATTEMPTS,
                    )
                    .await;
                }
                _ = retention.tick() => self.prune_finished().await,
                Some(()) = next_tick(score_sync.as_mut()) => {
                    if let Some(every) = self.score_sync_every {
                        self.schedule(&WALK_START, every, self.score_sync_max_attempts).await;
                    }
                }
            }
        }
        info!("Scheduler stopped");
    }

    async fn schedule(&self, payload: &JobPayload, period: Duration, max_attempts: i32) {
        let key = slot_key(payload, Utc::now(), period);
        match self.jobs.enqueue_unique(payload, max_attempts, &key).await {
            Ok(true) => info!(kind = payload.kind(), %key, "Periodic job enqueued"),
            Ok(false) => {}
            Err(e) => error!(kind = payload.kind(), "Failed to enqueue periodic job: {}", e),
        }
    }

    async fn prune_finished(&self) {
        let cutoff = chrono::Duration::from_std(self.retention)
            .map_or(DateTime::<Utc>::MIN_UTC, |age| Utc::now() - age);
        match self.jobs.prune_done(cutoff).await {
            Ok(0) => {}
            Ok(count) => info!(count, "Pruned finished jobs"),
            Err(e) => error!("Failed to prune finished jobs: {}", e),
        }
    }

    async fn reap_abandoned(&self) {
        match self.jobs.fail_abandoned().await {
            Ok(0) => {}
            Ok(count) => warn!(count, "Failed jobs abandoned on their final attempt"),
            Err(e) => error!("Failed to reap abandoned jobs: {}", e),
        }
    }
}

fn ticker(every: Duration) -> Interval {
    let mut ticker = interval(every.max(Duration::from_secs(1)));
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
    ticker
}

async fn next_tick(ticker: Option<&mut Interval>) -> Option<()> {
    match ticker {
        Some(ticker) => {
            ticker.tick().await;
            Some(())
        }
        None => std::future::pending().await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_slot_key_is_stable_within_a_slot() {
        let period = Duration::from_secs(3600);
        let start = Utc.with_ymd_and_hms(2026, 3, 1, 10, 0, 0).unwrap();
        let later = Utc.with_ymd_and_hms(2026, 3, 1, 10, 59, 59).unwrap();
        let next = Utc.with_ymd_and_hms(2026, 3, 1, 11, 0, 0).unwrap();

        let key = slot_key(&WALK_START, start, period);
        assert!(key.starts_with("score_sync_all:"));
        assert_eq!(key, slot_key(&WALK_START, later, period));
        assert_ne!(key, slot_key(&WALK_START, next, period));
    }

    #[test]
    fn test_slot_key_differs_by_kind() {
        let now = Utc::now();
        let period = Duration::from_secs(60);
        assert_ne!(
            slot_key(&WALK_START, now, period),
            slot_key(&JobPayload::ExpireOrders, now, period)
        );
    }

    #[test]
    fn test_zero_period_does_not_divide_by_zero() {
        let now = Utc.with_ymd_and_hms(2026, 3, 1, 0, 0, 7).unwrap();
        assert_eq!(
            slot_key(&JobPayload::ExpireOrders, now, Duration::ZERO),
            format!("expire_orders:{}", now.timestamp())
        );
    }
}

//! Community score synchronization jobs.
//!
//! `score_sync_all` walks the feed page by page under the rate limiter and
//! fans out one `score_sync_page` job per non-empty page. A walk step stops
//! fetching once its time budget is spent and hands the rest of the feed to
//! a continuation job carrying the next page as its cursor, so no single job
//! has to outlast the job timeout. Pages carry absolute scores, so re-running
//! a step after a failure is harmless.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use credit_core::jobs::JobPayload;
use credit_core::score::ExternalScore;
use credit_db::{JobRepository, ScoreSyncRepository};
use sea_orm::DatabaseConnection;
use tokio::time::Instant;

use super::Attempt;
use crate::error::WorkerError;
use crate::rate_limit::RateLimiter;
use crate::score_feed::ScoreFeed;

/// Upper bound on pages per walk, in case the feed ignores the page number.
const MAX_PAGES: u32 = 100_000;

/// Outcome of one walk step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WalkStep {
    /// Page jobs this step enqueued.
    pub pages: u32,
    /// Continuation job id and its first page, if the feed was not exhausted.
    pub continuation: Option<(i64, u32)>,
}

/// Runs both score sync job kinds.
#[derive(Clone)]
pub struct ScoreSyncHandler {
    db: DatabaseConnection,
    repo: ScoreSyncRepository,
    feed: Arc<dyn ScoreFeed>,
    limiter: Arc<RateLimiter>,
    protection_days: u32,
    page_max_attempts: i32,
    walk_budget: Duration,
}

impl ScoreSyncHandler {
    /// Creates the handler.
    ///
    /// `walk_budget` bounds the time one walk step spends fetching; keep it
    /// well under the job timeout.
    #[must_use]
    pub fn new(
        db: DatabaseConnection,
        feed: Arc<dyn ScoreFeed>,
        limiter: Arc<RateLimiter>,
        protection_days: u32,
        page_max_attempts: i32,
        walk_budget: Duration,
    ) -> Self {
        Self {
            repo: ScoreSyncRepository::new(db.clone()),
            db,
            feed,
            limiter,
            protection_days,
            page_max_attempts,
            walk_budget,
        }
    }

    /// Walks the feed from `from_page`, enqueueing one job per non-empty page.
    ///
    /// Stops at the first empty page, or enqueues a continuation from the
    /// next page once the walk budget is spent.
    pub async fn sync_all(
        &self,
        from_page: u32,
        attempt: Attempt,
    ) -> Result<WalkStep, WorkerError> {
        let started = Instant::now();
        let mut page = from_page;
        let mut pages = 0;

        while page < MAX_PAGES {
            if page > from_page && started.elapsed() >= self.walk_budget {
                let next = JobPayload::ScoreSyncAll { from_page: page };
                let id = JobRepository::enqueue(&self.db, &next, attempt.max).await?;
                tracing::info!(
                    from_page,
                    next_page = page,
                    continuation = id,
                    "Score walk budget spent, continuing in a new job"
                );
                return Ok(WalkStep {
                    pages,
                    continuation: Some((id, page)),
                });
            }

            self.limiter.acquire().await;
            let scores = self.feed.fetch_page(page).await?;
            if scores.is_empty() {
                break;
            }
            JobRepository::enqueue(
                &self.db,
                &JobPayload::ScoreSyncPage { page, scores },
                self.page_max_attempts,
            )
            .await?;
            page += 1;
            pages += 1;
        }
        if page == MAX_PAGES {
            tracing::warn!(pages = page, "Score feed never ran out of pages");
        }
        tracing::info!(
            from_page,
            last_page = page,
            attempt = attempt.number,
            "Score walk finished"
        );
        Ok(WalkStep {
            pages,
            continuation: None,
        })
    }

    /// Applies one page of scores.
    pub async fn sync_page(&self, page: u32, scores: &[ExternalScore]) -> Result<(), WorkerError> {
        let summary = self
            .repo
            .apply_batch(scores, self.protection_days, Utc::now())
            .await?;
        tracing::info!(
            page,
            initialized = summary.initialized,
            applied = summary.applied,
            suppressed = summary.suppressed,
            unchanged = summary.unchanged,
            unknown = summary.unknown,
            "Score page applied"
        );
        Ok(())
    }
}

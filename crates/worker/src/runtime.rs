//! Job runtime.
//!
//! A fixed pool of loops claims jobs from the durable queue. Each claim is
//! leased for the job timeout plus a margin, so a crashed worker's job
//! becomes claimable again once the lease runs out.

use std::sync::Arc;
use std::time::Duration;

use credit_db::JobRepository;
use credit_db::entities::jobs;
use credit_db::repositories::{RetryOutcome, decode_payload};
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::error::WorkerError;
use crate::handlers::{Attempt, JobHandler};

/// Lease margin on top of the job timeout.
const LEASE_MARGIN: Duration = Duration::from_secs(30);

/// Claims and runs jobs until cancelled.
#[derive(Clone)]
pub struct JobRunner {
    jobs: JobRepository,
    handler: Arc<dyn JobHandler>,
    concurrency: usize,
    poll_interval: Duration,
    job_timeout: Duration,
}

impl JobRunner {
    /// Creates a runner with `concurrency` claim loops.
    #[must_use]
    pub fn new(
        jobs: JobRepository,
        handler: Arc<dyn JobHandler>,
        concurrency: usize,
        poll_interval: Duration,
        job_timeout: Duration,
    ) -> Self {
        Self {
            jobs,
            handler,
            concurrency: concurrency.max(1),
            poll_interval,
            job_timeout,
        }
    }

    /// Runs every loop until `shutdown` fires, then waits for in-flight jobs.
    pub async fn run(self, shutdown: CancellationToken) {
        let mut loops = JoinSet::new();
        for slot in 0..self.concurrency {
            let runner = self.clone();
            let shutdown = shutdown.clone();
            loops.spawn(async move { runner.claim_loop(slot, shutdown).await });
        }
        info!(concurrency = self.concurrency, "Job runner started");

        while let Some(joined) = loops.join_next().await {
            if let Err(e) = joined {
                error!("Job loop panicked: {}", e);
            }
        }
        info!("Job runner stopped");
    }

    async fn claim_loop(&self, slot: usize, shutdown: CancellationToken) {
        let lease_secs =
            i32::try_from((self.job_timeout + LEASE_MARGIN).as_secs()).unwrap_or(i32::MAX);

        while !shutdown.is_cancelled() {
            match self.jobs.claim(lease_secs).await {
                Ok(Some(job)) => self.process(job).await,
                Ok(None) => self.idle(&shutdown).await,
                Err(e) => {
                    error!(slot, "Failed to claim job: {}", e);
                    self.idle(&shutdown).await;
                }
            }
        }
        debug!(slot, "Job loop stopped");
    }

    async fn idle(&self, shutdown: &CancellationToken) {
        tokio::select! {
            () = shutdown.cancelled() => {}
            () = tokio::time::sleep(self.poll_interval) => {}
        }
    }

    /// Runs one claimed job and records the outcome.
    pub async fn process(&self, job: jobs::Model) {
        let payload = match decode_payload(&job) {
            Ok(payload) => payload,
            Err(e) => {
                error!(job_id = job.id, kind = %job.kind, "Undecodable job payload: {}", e);
                if let Err(e) = self.jobs.fail(job.id, &e.to_string()).await {
                    error!(job_id = job.id, "Failed to record job failure: {}", e);
                }
                return;
            }
        };
        let attempt = Attempt {
            number: job.attempts,
            max: job.max_attempts,
        };

        let handled = self.handler.handle(payload, attempt);
        let result = match tokio::time::timeout(self.job_timeout, handled).await {
            Ok(result) => result,
            Err(_) => Err(WorkerError::Timeout(self.job_timeout)),
        };

        match result {
            Ok(()) => {
                if let Err(e) = self.jobs.complete(job.id).await {
                    error!(job_id = job.id, "Failed to mark job done: {}", e);
                }
            }
            Err(failure) => self.record_failure(&job, &failure).await,
        }
    }

    async fn record_failure(&self, job: &jobs::Model, failure: &WorkerError) {
        match self.jobs.retry_or_fail(job, &failure.to_string()).await {
            Ok(RetryOutcome::Retrying { run_at }) => warn!(
                job_id = job.id,
                kind = %job.kind,
                attempt = job.attempts,
                %run_at,
                "Job failed, retrying: {}",
                failure
            ),
            Ok(RetryOutcome::Failed) => error!(
                job_id = job.id,
                kind = %job.kind,
                attempts = job.attempts,
                "Job failed permanently: {}",
                failure
            ),
            Err(e) => error!(job_id = job.id, "Failed to record job failure: {}", e),
        }
    }
}

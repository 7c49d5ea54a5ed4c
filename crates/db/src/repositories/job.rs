//! Durable job queue backed by the `jobs` table.
//!
//! Workers claim one job at a time with `FOR UPDATE SKIP LOCKED`, so
//! concurrent workers never receive the same job. A claim holds a lease; a
//! job whose lease ran out while `running` belongs to a crashed worker and
//! becomes claimable again.

use chrono::{DateTime, Utc};
use credit_core::jobs::{JobPayload, retry_backoff};
use sea_orm::sea_query::OnConflict;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection, DbBackend, DbErr,
    EntityTrait, QueryFilter, Set, Statement,
};

use crate::entities::jobs;
use crate::entities::sea_orm_active_enums::JobStatus;

/// Error types for job queue operations.
#[derive(Debug, thiserror::Error)]
pub enum JobError {
    /// Database error.
    #[error("Database error: {0}")]
    Database(#[from] DbErr),

    /// Payload could not be encoded or decoded.
    #[error("Invalid job payload: {0}")]
    Payload(#[from] serde_json::Error),
}

/// What happened to a job after a failed attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryOutcome {
    /// Scheduled again.
    Retrying {
        /// When the next attempt may start.
        run_at: DateTime<Utc>,
    },
    /// Out of attempts; the job is terminal.
    Failed,
}

const CLAIM_SQL: &str = r"
UPDATE jobs
SET status = 'running',
    attempts = attempts + 1,
    locked_until = now() + make_interval(secs => $1),
    updated_at = now()
WHERE id = (
    SELECT id FROM jobs
    WHERE (status = 'pending' AND run_at <= now())
       OR (status = 'running' AND locked_until < now() AND attempts < max_attempts)
    ORDER BY priority DESC, run_at
    LIMIT 1
    FOR UPDATE SKIP LOCKED
)
RETURNING *
";

const FAIL_ABANDONED_SQL: &str = r"
UPDATE jobs
SET status = 'failed',
    locked_until = NULL,
    last_error = COALESCE(last_error, 'lease expired after final attempt'),
    updated_at = now()
WHERE status = 'running' AND locked_until < now() AND attempts >= max_attempts
";

/// Job queue repository.
#[derive(Debug, Clone)]
pub struct JobRepository {
    db: DatabaseConnection,
}

impl JobRepository {
    /// Creates a new job repository.
    #[must_use]
    pub const fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    /// Enqueues a job on any connection.
    ///
    /// Called with the settlement transaction so the job exists only if the
    /// settlement commits.
    ///
    /// # Errors
    ///
    /// Returns an error if the payload cannot be encoded or the insert fails.
    pub async fn enqueue<C: ConnectionTrait>(
        conn: &C,
        payload: &JobPayload,
        max_attempts: i32,
    ) -> Result<i64, JobError> {
        let job = new_job(payload, max_attempts, None)?.insert(conn).await?;
        Ok(job.id)
    }

    /// Enqueues a job unless one with the same `unique_key` exists.
    ///
    /// Returns true if a job was inserted.
    ///
    /// # Errors
    ///
    /// Returns an error if the payload cannot be encoded or the insert fails.
    pub async fn enqueue_unique(
        &self,
        payload: &JobPayload,
        max_attempts: i32,
        unique_key: &str,
    ) -> Result<bool, JobError> {
        let inserted = jobs::Entity::insert(new_job(payload, max_attempts, Some(unique_key))?)
            .on_conflict(
                OnConflict::column(jobs::Column::UniqueKey)
                    .do_nothing()
                    .to_owned(),
            )
            .exec_without_returning(&self.db)
            .await?;
        Ok(inserted > 0)
    }

    /// Claims the next runnable job, leasing it for `lease_secs`.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub async fn claim(&self, lease_secs: i32) -> Result<Option<jobs::Model>, DbErr> {
        jobs::Entity::find()
            .from_raw_sql(Statement::from_sql_and_values(
                DbBackend::Postgres,
                CLAIM_SQL,
                [lease_secs.into()],
            ))
            .one(&self.db)
            .await
    }

    /// Marks a job done.
    ///
    /// # Errors
    ///
    /// Returns an error if the database update fails.
    pub async fn complete(&self, id: i64) -> Result<(), DbErr> {
        jobs::ActiveModel {
            id: Set(id),
            status: Set(JobStatus::Done),
            locked_until: Set(None),
            updated_at: Set(Utc::now().into()),
            ..Default::default()
        }
        .update(&self.db)
        .await?;
        Ok(())
    }

    /// Records a failed attempt, rescheduling with backoff or failing terminally.
    ///
    /// # Errors
    ///
    /// Returns an error if the database update fails.
    pub async fn retry_or_fail(
        &self,
        job: &jobs::Model,
        error: &str,
    ) -> Result<RetryOutcome, DbErr> {
        let now = Utc::now();
        let mut active = jobs::ActiveModel {
            id: Set(job.id),
            locked_until: Set(None),
            last_error: Set(Some(error.to_string())),
            updated_at: Set(now.into()),
            ..Default::default()
        };

        let outcome = if job.attempts >= job.max_attempts {
            active.status = Set(JobStatus::Failed);
            RetryOutcome::Failed
        } else {
            let delay = chrono::Duration::from_std(retry_backoff(job.attempts))
                .unwrap_or_else(|_| chrono::Duration::minutes(10));
            let run_at = now + delay;
            active.status = Set(JobStatus::Pending);
            active.run_at = Set(run_at.into());
            RetryOutcome::Retrying { run_at }
        };

        active.update(&self.db).await?;
        Ok(outcome)
    }

    /// Fails a job terminally, regardless of attempts left.
    ///
    /// # Errors
    ///
    /// Returns an error if the database update fails.
    pub async fn fail(&self, id: i64, error: &str) -> Result<(), DbErr> {
        jobs::ActiveModel {
            id: Set(id),
            status: Set(JobStatus::Failed),
            locked_until: Set(None),
            last_error: Set(Some(error.to_string())),
            updated_at: Set(Utc::now().into()),
            ..Default::default()
        }
        .update(&self.db)
        .await?;
        Ok(())
    }

    /// Fails running jobs whose final attempt lost its lease.
    ///
    /// # Errors
    ///
    /// Returns an error if the database update fails.
    pub async fn fail_abandoned(&self) -> Result<u64, DbErr> {
        let result = self
            .db
            .execute(Statement::from_string(
                DbBackend::Postgres,
                FAIL_ABANDONED_SQL,
            ))
            .await?;
        Ok(result.rows_affected())
    }

    /// Deletes `done` jobs last touched before `older_than`.
    ///
    /// Failed jobs are kept for inspection.
    ///
    /// # Errors
    ///
    /// Returns an error if the database delete fails.
    pub async fn prune_done(&self, older_than: DateTime<Utc>) -> Result<u64, DbErr> {
        let result = jobs::Entity::delete_many()
            .filter(jobs::Column::Status.eq(JobStatus::Done))
            .filter(jobs::Column::UpdatedAt.lt(older_than))
            .exec(&self.db)
            .await?;
        Ok(result.rows_affected)
    }

    /// Finds a job by ID.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub async fn find_by_id(&self, id: i64) -> Result<Option<jobs::Model>, DbErr> {
        jobs::Entity::find_by_id(id).one(&self.db).await
    }

    /// Pending jobs of one kind, oldest first.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub async fn pending_of_kind(&self, kind: &str) -> Result<Vec<jobs::Model>, DbErr> {
        jobs::Entity::find()
            .filter(jobs::Column::Kind.eq(kind))
            .filter(jobs::Column::Status.eq(JobStatus::Pending))
            .all(&self.db)
            .await
    }
}

/// Decodes a claimed job's payload by its kind tag.
///
/// # Errors
///
/// Returns `JobError::Payload` for an unknown kind or malformed payload.
pub fn decode_payload(job: &jobs::Model) -> Result<JobPayload, JobError> {
    Ok(serde_json::from_value(job.payload.clone())?)
}

fn new_job(
    payload: &JobPayload,
    max_attempts: i32,
    unique_key: Option<&str>,
) -> Result<jobs::ActiveModel, JobError> {
    let now = Utc::now().into();
    Ok(jobs::ActiveModel {
        kind: Set(payload.kind().to_string()),
        queue: Set(payload.queue().to_string()),
        priority: Set(payload.priority()),
        payload: Set(serde_json::to_value(payload)?),
        status: Set(JobStatus::Pending),
        attempts: Set(0),
        max_attempts: Set(max_attempts.max(1)),
        run_at: Set(now),
        unique_key: Set(unique_key.map(str::to_string)),
        created_at: Set(now),
        updated_at: Set(now),
        ..Default::default()
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn job(payload: serde_json::Value) -> jobs::Model {
        let now = Utc::now().into();
        jobs::Model {
            id: 1,
            kind: "merchant_notify".into(),
            queue: "critical".into(),
            priority: 6,
            payload,
            status: JobStatus::Running,
            attempts: 1,
            max_attempts: 5,
            run_at: now,
            locked_until: None,
            last_error: None,
            unique_key: None,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn test_new_job_carries_kind_and_queue() {
        let payload = JobPayload::MerchantNotify {
            order_id: 9,
            client_id: "c".into(),
        };
        let active = new_job(&payload, 5, Some("k")).unwrap();
        assert_eq!(active.kind.unwrap(), "merchant_notify");
        assert_eq!(active.queue.unwrap(), "critical");
        assert_eq!(active.unique_key.unwrap(), Some("k".to_string()));
    }

    #[test]
    fn test_new_job_needs_at_least_one_attempt() {
        let active = new_job(&JobPayload::ExpireOrders, 0, None).unwrap();
        assert_eq!(active.max_attempts.unwrap(), 1);
    }

    #[test]
    fn test_decode_payload() {
        let decoded =
            decode_payload(&job(
                json!({ "kind": "merchant_notify", "order_id": 9, "client_id": "c" })
            ))
                .unwrap();
        assert_eq!(
            decoded,
            JobPayload::MerchantNotify {
                order_id: 9,
                client_id: "c".into()
            }
        );
    }

    #[test]
    fn test_decode_rejects_unknown_kind() {
        assert!(matches!(
            decode_payload(&job(json!({ "kind": "legacy_map", "user_id": 1 }))),
            Err(JobError::Payload(_))
        ));
    }
}

//! Postgres-backed job result store.
//!
//! Monotonic status is enforced in SQL: the upsert's `DO UPDATE` carries a
//! `WHERE` clause that skips rows already in a terminal status. When the
//! upsert returns nothing the existing row is read back and reported as
//! [`Transition::AlreadyTerminal`].

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::types::Json;
use sqlx::{FromRow, PgPool, Row};
use tracing::{debug, instrument};

use studyforge_core::{JobId, UserId};

use super::store::JobResultStore;
use super::types::{JobResult, JobResultPayload, JobStatus, StatusUpdate, Transition};
use crate::error::StoreError;

const COLUMNS: &str =
    "job_id, owner_id, status, result_payload, error_message, created_at, updated_at, completed_at";

#[derive(Debug, Clone)]
pub struct PostgresJobResultStore {
    pool: Arc<PgPool>,
}

impl PostgresJobResultStore {
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool: Arc::new(pool),
        }
    }
}

#[async_trait]
impl JobResultStore for PostgresJobResultStore {
    #[instrument(skip(self), fields(job_id = %job_id), err)]
    async fn get(&self, job_id: JobId) -> Result<Option<JobResult>, StoreError> {
        let row = sqlx::query(&format!("SELECT {COLUMNS} FROM job_results WHERE job_id = $1"))
            .bind(job_id.as_uuid())
            .fetch_optional(&*self.pool)
            .await?;

        match row {
            Some(r) => Ok(Some(JobResultRow::from_row(&r)?.try_into()?)),
            None => Ok(None),
        }
    }

    #[instrument(
        skip(self, update),
        fields(job_id = %job_id, owner_id = %owner_id, status = %update.status()),
        err
    )]
    async fn record(
        &self,
        job_id: JobId,
        owner_id: UserId,
        update: StatusUpdate,
    ) -> Result<Transition, StoreError> {
        let (payload, error_message) = match &update {
            StatusUpdate::Processing => (None, None),
            StatusUpdate::Completed(payload) => (Some(Json(payload.clone())), None),
            StatusUpdate::Failed(message) => (None, Some(message.clone())),
        };
        let now = Utc::now();
        let completed_at = update.status().is_terminal().then_some(now);

        let applied = sqlx::query(&format!(
            r#"
            INSERT INTO job_results
                (job_id, owner_id, status, result_payload, error_message,
                 created_at, updated_at, completed_at)
            VALUES ($1, $2, $3, $4, $5, $6, $6, $7)
            ON CONFLICT (job_id) DO UPDATE SET
                status = EXCLUDED.status,
                result_payload = EXCLUDED.result_payload,
                error_message = EXCLUDED.error_message,
                updated_at = EXCLUDED.updated_at,
                completed_at = EXCLUDED.completed_at
            WHERE job_results.status NOT IN ('completed', 'failed')
            RETURNING {COLUMNS}
            "#
        ))
        .bind(job_id.as_uuid())
        .bind(owner_id.as_uuid())
        .bind(update.status().as_str())
        .bind(payload)
        .bind(error_message)
        .bind(now)
        .bind(completed_at)
        .fetch_optional(&*self.pool)
        .await?;

        if let Some(row) = applied {
            return Ok(Transition::Applied(JobResultRow::from_row(&row)?.try_into()?));
        }

        debug!("job result already terminal; write skipped");
        let existing = self
            .get(job_id)
            .await?
            .ok_or_else(|| StoreError::NotFound(format!("job result {job_id}")))?;
        Ok(Transition::AlreadyTerminal(existing))
    }
}

struct JobResultRow {
    job_id: uuid::Uuid,
    owner_id: uuid::Uuid,
    status: String,
    result_payload: Option<Json<JobResultPayload>>,
    error_message: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    completed_at: Option<DateTime<Utc>>,
}

impl<'r> FromRow<'r, sqlx::postgres::PgRow> for JobResultRow {
    fn from_row(row: &'r sqlx::postgres::PgRow) -> Result<Self, sqlx::Error> {
        Ok(JobResultRow {
            job_id: row.try_get("job_id")?,
            owner_id: row.try_get("owner_id")?,
            status: row.try_get("status")?,
            result_payload: row.try_get("result_payload")?,
            error_message: row.try_get("error_message")?,
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
            completed_at: row.try_get("completed_at")?,
        })
    }
}

impl TryFrom<JobResultRow> for JobResult {
    type Error = StoreError;

    fn try_from(row: JobResultRow) -> Result<Self, Self::Error> {
        let status: JobStatus = row.status.parse().map_err(StoreError::CorruptRow)?;
        Ok(JobResult {
            job_id: JobId::from_uuid(row.job_id),
            owner_id: UserId::from_uuid(row.owner_id),
            status,
            result_payload: row.result_payload.map(|Json(p)| p),
            error_message: row.error_message,
            created_at: row.created_at,
            updated_at: row.updated_at,
            completed_at: row.completed_at,
        })
    }
}

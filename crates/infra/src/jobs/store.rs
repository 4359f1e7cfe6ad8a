//! Job result side table.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use chrono::Utc;

use studyforge_core::{JobId, UserId};

use super::types::{JobResult, JobResultPayload, StatusUpdate, Transition};
use crate::error::StoreError;

/// Persistence for job results, keyed by job id.
///
/// `record` is an upsert that refuses to overwrite a terminal row, so
/// redelivered messages can never change a job's final outcome.
#[async_trait]
pub trait JobResultStore: Send + Sync {
    async fn get(&self, job_id: JobId) -> Result<Option<JobResult>, StoreError>;

    async fn record(
        &self,
        job_id: JobId,
        owner_id: UserId,
        update: StatusUpdate,
    ) -> Result<Transition, StoreError>;

    async fn mark_processing(
        &self,
        job_id: JobId,
        owner_id: UserId,
    ) -> Result<Transition, StoreError> {
        self.record(job_id, owner_id, StatusUpdate::Processing).await
    }

    async fn mark_completed(
        &self,
        job_id: JobId,
        owner_id: UserId,
        payload: JobResultPayload,
    ) -> Result<Transition, StoreError> {
        self.record(job_id, owner_id, StatusUpdate::Completed(payload)).await
    }

    async fn mark_failed(
        &self,
        job_id: JobId,
        owner_id: UserId,
        error: String,
    ) -> Result<Transition, StoreError> {
        self.record(job_id, owner_id, StatusUpdate::Failed(error)).await
    }
}

#[async_trait]
impl<S> JobResultStore for Arc<S>
where
    S: JobResultStore + ?Sized,
{
    async fn get(&self, job_id: JobId) -> Result<Option<JobResult>, StoreError> {
        (**self).get(job_id).await
    }

    async fn record(
        &self,
        job_id: JobId,
        owner_id: UserId,
        update: StatusUpdate,
    ) -> Result<Transition, StoreError> {
        (**self).record(job_id, owner_id, update).await
    }
}

/// In-memory job result store for tests/dev.
#[derive(Debug, Default)]
pub struct InMemoryJobResultStore {
    rows: RwLock<HashMap<JobId, JobResult>>,
}

impl InMemoryJobResultStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn arc() -> Arc<Self> {
        Arc::new(Self::new())
    }
}

#[async_trait]
impl JobResultStore for InMemoryJobResultStore {
    async fn get(&self, job_id: JobId) -> Result<Option<JobResult>, StoreError> {
        let rows = self.rows.read().map_err(|_| StoreError::poisoned())?;
        Ok(rows.get(&job_id).cloned())
    }

    async fn record(
        &self,
        job_id: JobId,
        owner_id: UserId,
        update: StatusUpdate,
    ) -> Result<Transition, StoreError> {
        let mut rows = self.rows.write().map_err(|_| StoreError::poisoned())?;
        let now = Utc::now();

        match rows.get_mut(&job_id) {
            Some(row) if row.status.is_terminal() => Ok(Transition::AlreadyTerminal(row.clone())),
            Some(row) => {
                row.apply(&update, now);
                Ok(Transition::Applied(row.clone()))
            }
            None => {
                let row = JobResult::fresh(job_id, owner_id, &update, now);
                rows.insert(job_id, row.clone());
                Ok(Transition::Applied(row))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::jobs::types::JobStatus;
    use studyforge_core::DeckId;

    #[tokio::test]
    async fn processing_can_repeat_before_terminal() {
        let store = InMemoryJobResultStore::new();
        let (job, owner) = (JobId::new(), UserId::new());

        let first = store.mark_processing(job, owner).await.unwrap();
        let second = store.mark_processing(job, owner).await.unwrap();

        assert!(matches!(first, Transition::Applied(_)));
        assert!(matches!(second, Transition::Applied(_)));
        assert_eq!(store.get(job).await.unwrap().unwrap().status, JobStatus::Processing);
    }

    #[tokio::test]
    async fn terminal_status_is_never_rewritten() {
        let store = InMemoryJobResultStore::new();
        let (job, owner) = (JobId::new(), UserId::new());

        store.mark_processing(job, owner).await.unwrap();
        store
            .mark_completed(job, owner, JobResultPayload::new(DeckId::new(), Vec::new()))
            .await
            .unwrap();

        let again = store.mark_failed(job, owner, "late failure".into()).await.unwrap();
        let back_to_processing = store.mark_processing(job, owner).await.unwrap();

        assert!(matches!(again, Transition::AlreadyTerminal(_)));
        assert!(matches!(back_to_processing, Transition::AlreadyTerminal(_)));
        let row = store.get(job).await.unwrap().unwrap();
        assert_eq!(row.status, JobStatus::Completed);
        assert!(row.error_message.is_none());
    }

    #[tokio::test]
    async fn failed_rows_keep_the_error() {
        let store = InMemoryJobResultStore::new();
        let (job, owner) = (JobId::new(), UserId::new());

        store.mark_failed(job, owner, "no cards".into()).await.unwrap();

        let row = store.get(job).await.unwrap().unwrap();
        assert_eq!(row.status, JobStatus::Failed);
        assert_eq!(row.error_message.as_deref(), Some("no cards"));
        assert!(row.completed_at.is_some());
    }

    #[tokio::test]
    async fn unknown_jobs_are_absent() {
        let store = InMemoryJobResultStore::new();
        assert!(store.get(JobId::new()).await.unwrap().is_none());
    }
}

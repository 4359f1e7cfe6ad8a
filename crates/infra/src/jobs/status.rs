//! Job status resolution for polling clients.
//!
//! Lookup order:
//! 1. the result store is authoritative when it has a row
//! 2. otherwise a visible queue message carrying the job id means `pending`,
//!    provided the message names the caller as owner
//! 3. otherwise `processing`, since a worker may hold the message invisibly

use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use thiserror::Error;
use tracing::{instrument, warn};

use studyforge_core::{JobId, UserId};

use super::store::JobResultStore;
use super::types::{JobResultPayload, JobStatus};
use crate::config::QueueConfig;
use crate::error::StoreError;
use crate::queue::MessageQueue;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum StatusError {
    #[error("job not found: {0}")]
    NotFound(JobId),

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// What a polling client sees.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct JobStatusView {
    pub job_id: JobId,
    pub status: JobStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payload: Option<JobResultPayload>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl JobStatusView {
    fn bare(job_id: JobId, status: JobStatus) -> Self {
        Self {
            job_id,
            status,
            payload: None,
            error: None,
        }
    }
}

#[derive(Clone)]
pub struct StatusResolver {
    results: Arc<dyn JobResultStore>,
    queue: Arc<dyn MessageQueue>,
    queue_name: String,
    peek_batch: usize,
    peek_visibility: Duration,
}

impl StatusResolver {
    pub fn new(
        results: Arc<dyn JobResultStore>,
        queue: Arc<dyn MessageQueue>,
        config: &QueueConfig,
    ) -> Self {
        Self {
            results,
            queue,
            queue_name: config.queue_name.clone(),
            peek_batch: config.status_peek_batch,
            peek_visibility: config.status_peek_visibility,
        }
    }

    /// Resolve the status of `job_id` on behalf of `owner_id`.
    ///
    /// A result row owned by someone else is reported as not found.
    #[instrument(skip(self), fields(job_id = %job_id, owner_id = %owner_id), err)]
    pub async fn get_status(
        &self,
        owner_id: UserId,
        job_id: JobId,
    ) -> Result<JobStatusView, StatusError> {
        if let Some(row) = self.results.get(job_id).await? {
            if row.owner_id != owner_id {
                return Err(StatusError::NotFound(job_id));
            }
            return Ok(JobStatusView {
                job_id,
                status: row.status,
                payload: row.result_payload,
                error: row.error_message,
            });
        }

        match self.queued_owner(job_id).await {
            Some(queued) if queued == owner_id.to_string() => {
                Ok(JobStatusView::bare(job_id, JobStatus::Pending))
            }
            Some(_) => Err(StatusError::NotFound(job_id)),
            None => Ok(JobStatusView::bare(job_id, JobStatus::Processing)),
        }
    }

    /// Peek at visible messages for the job id and return the owner it names.
    ///
    /// Peeking is a real read: matched messages stay hidden for the (short)
    /// peek visibility timeout. Queue errors are logged and treated as "not
    /// found in queue".
    async fn queued_owner(&self, job_id: JobId) -> Option<String> {
        let wanted = job_id.to_string();
        let messages = match self
            .queue
            .read(&self.queue_name, self.peek_batch, self.peek_visibility)
            .await
        {
            Ok(messages) => messages,
            Err(e) => {
                warn!(%job_id, error = %e, "queue peek failed; falling back");
                return None;
            }
        };

        messages
            .iter()
            .find(|m| m.payload.get("id").and_then(|v| v.as_str()) == Some(wanted.as_str()))
            .map(|m| {
                m.payload
                    .get("owner_id")
                    .and_then(|v| v.as_str())
                    .unwrap_or_default()
                    .to_string()
            })
    }
}

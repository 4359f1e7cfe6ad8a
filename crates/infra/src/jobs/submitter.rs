//! Job submission: validate, embed a fresh job id, enqueue, return.

use std::sync::Arc;

use chrono::Utc;
use thiserror::Error;
use tracing::{info, instrument};

use studyforge_core::{JobId, UserId};
use studyforge_generation::JobKind;
use studyforge_study::Difficulty;

use super::types::{InvalidJob, JobMessage};
use crate::queue::{MessageQueue, QueueError};

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum SubmitError {
    #[error(transparent)]
    Invalid(#[from] InvalidJob),

    #[error(transparent)]
    Queue(#[from] QueueError),
}

/// Everything a caller supplies for a generation job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubmitRequest {
    pub owner_id: UserId,
    pub kind: JobKind,
    pub prompt: String,
    pub source_text: Option<String>,
    pub collection_name: String,
    pub card_count: u32,
    pub difficulty: Difficulty,
    pub color: Option<String>,
}

/// Puts generation jobs on the queue.
///
/// Never waits for generation and never touches the result store; a job
/// has no result row until a worker picks it up.
#[derive(Clone)]
pub struct JobSubmitter {
    queue: Arc<dyn MessageQueue>,
    queue_name: String,
}

impl JobSubmitter {
    pub fn new(queue: Arc<dyn MessageQueue>, queue_name: impl Into<String>) -> Self {
        Self {
            queue,
            queue_name: queue_name.into(),
        }
    }

    #[instrument(
        skip(self, request),
        fields(owner_id = %request.owner_id, kind = %request.kind),
        err
    )]
    pub async fn submit(&self, request: SubmitRequest) -> Result<JobId, SubmitError> {
        let message = JobMessage {
            id: JobId::new(),
            owner_id: request.owner_id,
            kind: request.kind,
            generation_prompt: request.prompt,
            source_text: request.source_text,
            target_collection_name: request.collection_name,
            requested_card_count: request.card_count,
            difficulty: request.difficulty,
            display_color: request.color,
            created_at: Utc::now(),
        };
        message.validate()?;

        let msg_id = self
            .queue
            .enqueue(&self.queue_name, message.to_payload()?)
            .await?;

        info!(job_id = %message.id, msg_id = %msg_id, "generation job enqueued");
        Ok(message.id)
    }
}

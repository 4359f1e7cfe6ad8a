//! Job message and job result types.

use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use studyforge_core::{DeckId, JobId, UserId};
use studyforge_generation::{GeneratedCard, GenerationRequest, JobKind};
use studyforge_study::Difficulty;

/// A job that cannot be processed as written.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("invalid job: {0}")]
pub struct InvalidJob(pub String);

/// The payload carried through the queue. Immutable once enqueued.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobMessage {
    pub id: JobId,
    pub owner_id: UserId,
    pub kind: JobKind,
    pub generation_prompt: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_text: Option<String>,
    pub target_collection_name: String,
    pub requested_card_count: u32,
    pub difficulty: Difficulty,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_color: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl JobMessage {
    pub fn generation_request(&self) -> GenerationRequest {
        GenerationRequest {
            kind: self.kind,
            prompt: self.generation_prompt.clone(),
            source_text: self.source_text.clone(),
            card_count: self.requested_card_count,
            difficulty: self.difficulty,
        }
    }

    pub fn validate(&self) -> Result<(), InvalidJob> {
        if self.target_collection_name.trim().is_empty() {
            return Err(InvalidJob("collection name must not be empty".to_string()));
        }
        self.generation_request()
            .validate()
            .map_err(|e| InvalidJob(e.to_string()))
    }

    /// Deserialize a queue payload without checking its contents.
    ///
    /// Unknown job kinds and missing fields fail here. A payload that parses
    /// still carries an id and owner, so a failed `validate` can be recorded
    /// against the job.
    pub fn parse(payload: &serde_json::Value) -> Result<Self, InvalidJob> {
        serde_json::from_value(payload.clone()).map_err(|e| InvalidJob(e.to_string()))
    }

    /// [`JobMessage::parse`] followed by [`JobMessage::validate`].
    pub fn decode(payload: &serde_json::Value) -> Result<Self, InvalidJob> {
        let message = Self::parse(payload)?;
        message.validate()?;
        Ok(message)
    }

    pub fn to_payload(&self) -> Result<serde_json::Value, InvalidJob> {
        serde_json::to_value(self).map_err(|e| InvalidJob(e.to_string()))
    }
}

/// Lifecycle status of a job as seen by clients.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Pending,
    Processing,
    Completed,
    Failed,
}

impl JobStatus {
    /// `Completed` and `Failed` are never rewritten.
    pub fn is_terminal(self) -> bool {
        matches!(self, JobStatus::Completed | JobStatus::Failed)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            JobStatus::Pending => "pending",
            JobStatus::Processing => "processing",
            JobStatus::Completed => "completed",
            JobStatus::Failed => "failed",
        }
    }
}

impl core::fmt::Display for JobStatus {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for JobStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(JobStatus::Pending),
            "processing" => Ok(JobStatus::Processing),
            "completed" => Ok(JobStatus::Completed),
            "failed" => Ok(JobStatus::Failed),
            other => Err(format!("unknown job status: {other}")),
        }
    }
}

/// What a completed job produced.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobResultPayload {
    pub collection_id: DeckId,
    pub cards: Vec<GeneratedCard>,
    pub count: u32,
}

impl JobResultPayload {
    pub fn new(collection_id: DeckId, cards: Vec<GeneratedCard>) -> Self {
        let count = cards.len() as u32;
        Self {
            collection_id,
            cards,
            count,
        }
    }
}

/// Row of the job result side table. One per job id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobResult {
    pub job_id: JobId,
    pub owner_id: UserId,
    pub status: JobStatus,
    pub result_payload: Option<JobResultPayload>,
    pub error_message: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl JobResult {
    /// Build the row a fresh write of `update` would produce.
    pub fn fresh(
        job_id: JobId,
        owner_id: UserId,
        update: &StatusUpdate,
        now: DateTime<Utc>,
    ) -> Self {
        let mut row = Self {
            job_id,
            owner_id,
            status: JobStatus::Processing,
            result_payload: None,
            error_message: None,
            created_at: now,
            updated_at: now,
            completed_at: None,
        };
        row.apply(update, now);
        row
    }

    /// Overwrite status fields with `update`. Callers check terminality first.
    pub fn apply(&mut self, update: &StatusUpdate, now: DateTime<Utc>) {
        self.status = update.status();
        self.updated_at = now;
        match update {
            StatusUpdate::Processing => {}
            StatusUpdate::Completed(payload) => {
                self.result_payload = Some(payload.clone());
                self.error_message = None;
                self.completed_at = Some(now);
            }
            StatusUpdate::Failed(message) => {
                self.result_payload = None;
                self.error_message = Some(message.clone());
                self.completed_at = Some(now);
            }
        }
    }
}

/// A status write requested by the processor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StatusUpdate {
    Processing,
    Completed(JobResultPayload),
    Failed(String),
}

impl StatusUpdate {
    pub fn status(&self) -> JobStatus {
        match self {
            StatusUpdate::Processing => JobStatus::Processing,
            StatusUpdate::Completed(_) => JobStatus::Completed,
            StatusUpdate::Failed(_) => JobStatus::Failed,
        }
    }
}

/// Outcome of a status write.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Transition {
    /// The write landed; this is the new row.
    Applied(JobResult),
    /// The row was already terminal and was left untouched.
    AlreadyTerminal(JobResult),
}

impl Transition {
    pub fn result(&self) -> &JobResult {
        match self {
            Transition::Applied(r) | Transition::AlreadyTerminal(r) => r,
        }
    }
}

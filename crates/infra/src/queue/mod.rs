//! Durable message queue boundary.
//!
//! ## Contract
//!
//! - `enqueue` appends a JSON payload and returns the queue's delivery id
//! - `read` returns up to `max_n` visible messages, oldest first, and hides
//!   each of them for `visibility_timeout`
//! - a message that is neither deleted nor archived before its visibility
//!   timeout lapses becomes visible again (at-least-once delivery)
//! - `delete` drops a message for good; `archive` moves it aside for offline
//!   inspection, where it is never redelivered
//!
//! Delivery ids belong to the queue. Anything that must survive redelivery
//! (such as a job id) travels inside the payload.

pub mod in_memory;
pub mod postgres;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use in_memory::InMemoryQueue;
pub use postgres::PgmqQueue;

/// Delivery id assigned by the queue.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MessageId(pub i64);

impl core::fmt::Display for MessageId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A message handed out by [`MessageQueue::read`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueueMessage {
    pub msg_id: MessageId,
    /// How many times this message has been read, including this delivery.
    pub read_count: u32,
    pub enqueued_at: DateTime<Utc>,
    pub payload: serde_json::Value,
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum QueueError {
    #[error("queue not found: {0}")]
    QueueNotFound(String),

    #[error("queue storage error: {0}")]
    Storage(String),
}

impl From<sqlx::Error> for QueueError {
    fn from(err: sqlx::Error) -> Self {
        QueueError::Storage(err.to_string())
    }
}

#[async_trait]
pub trait MessageQueue: Send + Sync {
    async fn enqueue(
        &self,
        queue: &str,
        payload: serde_json::Value,
    ) -> Result<MessageId, QueueError>;

    async fn read(
        &self,
        queue: &str,
        max_n: usize,
        visibility_timeout: Duration,
    ) -> Result<Vec<QueueMessage>, QueueError>;

    /// Returns `false` when the message was already gone.
    async fn delete(&self, queue: &str, msg_id: MessageId) -> Result<bool, QueueError>;

    /// Returns `false` when the message was already gone.
    async fn archive(&self, queue: &str, msg_id: MessageId) -> Result<bool, QueueError>;
}

#[async_trait]
impl<Q> MessageQueue for Arc<Q>
where
    Q: MessageQueue + ?Sized,
{
    async fn enqueue(
        &self,
        queue: &str,
        payload: serde_json::Value,
    ) -> Result<MessageId, QueueError> {
        (**self).enqueue(queue, payload).await
    }

    async fn read(
        &self,
        queue: &str,
        max_n: usize,
        visibility_timeout: Duration,
    ) -> Result<Vec<QueueMessage>, QueueError> {
        (**self).read(queue, max_n, visibility_timeout).await
    }

    async fn delete(&self, queue: &str, msg_id: MessageId) -> Result<bool, QueueError> {
        (**self).delete(queue, msg_id).await
    }

    async fn archive(&self, queue: &str, msg_id: MessageId) -> Result<bool, QueueError> {
        (**self).archive(queue, msg_id).await
    }
}

//! In-memory queue for tests/dev.

use std::collections::{BTreeMap, HashMap};
use std::sync::RwLock;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use super::{MessageId, MessageQueue, QueueError, QueueMessage};

#[derive(Debug, Clone)]
struct StoredMessage {
    payload: serde_json::Value,
    enqueued_at: DateTime<Utc>,
    visible_at: DateTime<Utc>,
    read_count: u32,
}

impl StoredMessage {
    fn to_message(&self, msg_id: MessageId) -> QueueMessage {
        QueueMessage {
            msg_id,
            read_count: self.read_count,
            enqueued_at: self.enqueued_at,
            payload: self.payload.clone(),
        }
    }
}

#[derive(Debug, Default)]
struct QueueState {
    next_id: i64,
    live: BTreeMap<MessageId, StoredMessage>,
    archived: BTreeMap<MessageId, StoredMessage>,
}

/// In-memory queue with visibility timeouts.
///
/// Queues are created on first enqueue. Not durable.
#[derive(Debug, Default)]
pub struct InMemoryQueue {
    queues: RwLock<HashMap<String, QueueState>>,
}

impl InMemoryQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Messages not yet deleted or archived, visible or not.
    pub fn live_len(&self, queue: &str) -> usize {
        self.queues
            .read()
            .map(|q| q.get(queue).map_or(0, |s| s.live.len()))
            .unwrap_or(0)
    }

    /// Archived messages, oldest first.
    pub fn archived(&self, queue: &str) -> Vec<QueueMessage> {
        self.queues
            .read()
            .map(|q| {
                q.get(queue).map_or_else(Vec::new, |s| {
                    s.archived.iter().map(|(id, m)| m.to_message(*id)).collect()
                })
            })
            .unwrap_or_default()
    }

    /// Make every in-flight message visible again, as if its timeout lapsed.
    pub fn expire_visibility(&self, queue: &str) {
        if let Ok(mut queues) = self.queues.write() {
            if let Some(state) = queues.get_mut(queue) {
                let now = Utc::now();
                for message in state.live.values_mut() {
                    message.visible_at = now;
                }
            }
        }
    }
}

#[async_trait]
impl MessageQueue for InMemoryQueue {
    async fn enqueue(
        &self,
        queue: &str,
        payload: serde_json::Value,
    ) -> Result<MessageId, QueueError> {
        let mut queues = self.queues.write().map_err(|_| poisoned())?;
        let state = queues.entry(queue.to_string()).or_default();

        state.next_id += 1;
        let msg_id = MessageId(state.next_id);
        let now = Utc::now();
        state.live.insert(
            msg_id,
            StoredMessage {
                payload,
                enqueued_at: now,
                visible_at: now,
                read_count: 0,
            },
        );
        Ok(msg_id)
    }

    async fn read(
        &self,
        queue: &str,
        max_n: usize,
        visibility_timeout: Duration,
    ) -> Result<Vec<QueueMessage>, QueueError> {
        let mut queues = self.queues.write().map_err(|_| poisoned())?;
        let Some(state) = queues.get_mut(queue) else {
            return Ok(Vec::new());
        };

        let now = Utc::now();
        let lease =
            chrono::Duration::from_std(visibility_timeout).unwrap_or(chrono::Duration::zero());
        let hidden_until = now + lease;

        let mut delivered = Vec::new();
        for (msg_id, message) in state.live.iter_mut() {
            if delivered.len() >= max_n {
                break;
            }
            if message.visible_at > now {
                continue;
            }
            message.visible_at = hidden_until;
            message.read_count += 1;
            delivered.push(message.to_message(*msg_id));
        }
        Ok(delivered)
    }

    async fn delete(&self, queue: &str, msg_id: MessageId) -> Result<bool, QueueError> {
        let mut queues = self.queues.write().map_err(|_| poisoned())?;
        let state = queues
            .get_mut(queue)
            .ok_or_else(|| QueueError::QueueNotFound(queue.to_string()))?;
        Ok(state.live.remove(&msg_id).is_some())
    }

    async fn archive(&self, queue: &str, msg_id: MessageId) -> Result<bool, QueueError> {
        let mut queues = self.queues.write().map_err(|_| poisoned())?;
        let state = queues
            .get_mut(queue)
            .ok_or_else(|| QueueError::QueueNotFound(queue.to_string()))?;
        match state.live.remove(&msg_id) {
            Some(message) => {
                state.archived.insert(msg_id, message);
                Ok(true)
            }
            None => Ok(false),
        }
    }
}

fn poisoned() -> QueueError {
    QueueError::Storage("in-memory queue lock poisoned".to_string())
}

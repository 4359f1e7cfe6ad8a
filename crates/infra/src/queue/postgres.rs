//! Postgres queue backed by the `pgmq` extension.
//!
//! Each operation is a single call into pgmq's SQL API:
//!
//! | operation | SQL |
//! |-----------|-----|
//! | enqueue   | `pgmq.send(queue, msg)` |
//! | read      | `pgmq.read(queue, vt_seconds, qty)` |
//! | delete    | `pgmq.delete(queue, msg_id)` |
//! | archive   | `pgmq.archive(queue, msg_id)` |
//!
//! pgmq visibility timeouts have one-second resolution; sub-second timeouts
//! round up so a non-zero timeout never degrades into "always visible".

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{PgPool, Row};
use tracing::instrument;

use super::{MessageId, MessageQueue, QueueError, QueueMessage};

#[derive(Debug, Clone)]
pub struct PgmqQueue {
    pool: Arc<PgPool>,
}

impl PgmqQueue {
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool: Arc::new(pool),
        }
    }

    /// Create the queue if it does not exist yet.
    pub async fn ensure_queue(&self, queue: &str) -> Result<(), QueueError> {
        sqlx::query("SELECT pgmq.create($1)")
            .bind(queue)
            .execute(&*self.pool)
            .await?;
        Ok(())
    }
}

fn vt_seconds(timeout: Duration) -> i32 {
    let secs = timeout.as_secs() + u64::from(timeout.subsec_nanos() > 0);
    i32::try_from(secs).unwrap_or(i32::MAX)
}

#[async_trait]
impl MessageQueue for PgmqQueue {
    #[instrument(skip(self, payload), err)]
    async fn enqueue(
        &self,
        queue: &str,
        payload: serde_json::Value,
    ) -> Result<MessageId, QueueError> {
        let msg_id: i64 = sqlx::query_scalar("SELECT pgmq.send($1, $2)")
            .bind(queue)
            .bind(payload)
            .fetch_one(&*self.pool)
            .await?;
        Ok(MessageId(msg_id))
    }

    #[instrument(skip(self), err)]
    async fn read(
        &self,
        queue: &str,
        max_n: usize,
        visibility_timeout: Duration,
    ) -> Result<Vec<QueueMessage>, QueueError> {
        let qty = i32::try_from(max_n).unwrap_or(i32::MAX);
        let rows = sqlx::query(
            r#"
            SELECT msg_id, read_ct, enqueued_at, message
            FROM pgmq.read($1, $2, $3)
            "#,
        )
        .bind(queue)
        .bind(vt_seconds(visibility_timeout))
        .bind(qty)
        .fetch_all(&*self.pool)
        .await?;

        let mut messages = Vec::with_capacity(rows.len());
        for row in rows {
            let msg_id: i64 = row.try_get("msg_id")?;
            let read_ct: i32 = row.try_get("read_ct")?;
            let enqueued_at: DateTime<Utc> = row.try_get("enqueued_at")?;
            let payload: serde_json::Value = row.try_get("message")?;
            messages.push(QueueMessage {
                msg_id: MessageId(msg_id),
                read_count: read_ct.max(0) as u32,
                enqueued_at,
                payload,
            });
        }
        Ok(messages)
    }

    #[instrument(skip(self), err)]
    async fn delete(&self, queue: &str, msg_id: MessageId) -> Result<bool, QueueError> {
        let deleted: bool = sqlx::query_scalar("SELECT pgmq.delete($1, $2)")
            .bind(queue)
            .bind(msg_id.0)
            .fetch_one(&*self.pool)
            .await?;
        Ok(deleted)
    }

    #[instrument(skip(self), err)]
    async fn archive(&self, queue: &str, msg_id: MessageId) -> Result<bool, QueueError> {
        let archived: bool = sqlx::query_scalar("SELECT pgmq.archive($1, $2)")
            .bind(queue)
            .bind(msg_id.0)
            .fetch_one(&*self.pool)
            .await?;
        Ok(archived)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn visibility_rounds_up_to_whole_seconds() {
        assert_eq!(vt_seconds(Duration::ZERO), 0);
        assert_eq!(vt_seconds(Duration::from_millis(200)), 1);
        assert_eq!(vt_seconds(Duration::from_secs(300)), 300);
        assert_eq!(vt_seconds(Duration::from_millis(1500)), 2);
    }
}

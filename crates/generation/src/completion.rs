use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A single text-completion call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompletionRequest {
    pub system_instructions: String,
    pub user_content: String,
    pub max_tokens: u32,
    pub temperature: f32,
}

/// External text-completion capability.
///
/// Calls are fallible and not idempotent: a retried call is a new (billed)
/// call. Implementations return the raw model text and leave interpretation
/// to the caller.
#[async_trait]
pub trait CompletionClient: Send + Sync {
    async fn complete(&self, request: &CompletionRequest) -> Result<String, GenerationError>;
}

#[async_trait]
impl<C> CompletionClient for Arc<C>
where
    C: CompletionClient + ?Sized,
{
    async fn complete(&self, request: &CompletionRequest) -> Result<String, GenerationError> {
        (**self).complete(request).await
    }
}

#[derive(Debug, Clone, Error, PartialEq)]
pub enum GenerationError {
    #[error("completion timed out after {0:?}")]
    Timeout(Duration),

    #[error("transient completion failure: {0}")]
    Transient(String),

    #[error("completion rejected ({status}): {message}")]
    Rejected { status: u16, message: String },

    #[error("invalid generation output: {0}")]
    Validation(String),

    #[error("invalid generation request: {0}")]
    InvalidRequest(String),
}

impl GenerationError {
    /// Timeouts and network/upstream hiccups are worth another try; everything
    /// else will fail the same way again.
    pub fn is_transient(&self) -> bool {
        matches!(self, GenerationError::Timeout(_) | GenerationError::Transient(_))
    }

    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn invalid_request(msg: impl Into<String>) -> Self {
        Self::InvalidRequest(msg.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_timeouts_and_network_failures_are_transient() {
        assert!(GenerationError::Timeout(Duration::from_secs(1)).is_transient());
        assert!(GenerationError::Transient("connection reset".into()).is_transient());
        assert!(!GenerationError::validation("not json").is_transient());
        assert!(
            !GenerationError::Rejected {
                status: 401,
                message: "bad key".into()
            }
            .is_transient()
        );
    }
}

//! Scripted completion client for tests and local development.

use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;

use crate::completion::{CompletionClient, CompletionRequest, GenerationError};

/// Replays a fixed script of responses, in order.
///
/// Once only one scripted response remains it is returned for every further
/// call, so `ScriptedCompletionClient::new().then_ok(x)` always answers `x`.
#[derive(Debug, Default)]
pub struct ScriptedCompletionClient {
    script: Mutex<VecDeque<Result<String, GenerationError>>>,
    requests: Mutex<Vec<CompletionRequest>>,
    delay: Option<Duration>,
}

impl ScriptedCompletionClient {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn then_ok(self, text: impl Into<String>) -> Self {
        self.push(Ok(text.into()))
    }

    pub fn then_err(self, err: GenerationError) -> Self {
        self.push(Err(err))
    }

    /// Sleep before answering each call.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Number of calls received so far.
    pub fn calls(&self) -> usize {
        self.requests.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    /// Requests received so far, oldest first.
    pub fn requests(&self) -> Vec<CompletionRequest> {
        self.requests.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    fn push(self, response: Result<String, GenerationError>) -> Self {
        self.script
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push_back(response);
        self
    }

    fn next_response(&self) -> Result<String, GenerationError> {
        let mut script = self.script.lock().unwrap_or_else(|e| e.into_inner());
        if script.len() > 1 {
            if let Some(response) = script.pop_front() {
                return response;
            }
        }
        script
            .front()
            .cloned()
            .unwrap_or_else(|| Err(GenerationError::Transient("no scripted response".to_string())))
    }
}

#[async_trait]
impl CompletionClient for ScriptedCompletionClient {
    async fn complete(&self, request: &CompletionRequest) -> Result<String, GenerationError> {
        self.requests
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(request.clone());

        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        self.next_response()
    }
}

//! Configuration loading from the environment.
//!
//! Every setting has a default except `DATABASE_URL`; defaults are logged so a
//! misconfigured deployment is visible in the first lines of output.

use std::fmt::Display;
use std::str::FromStr;
use std::time::Duration;

use thiserror::Error;
use tracing::{info, warn};

use studyforge_generation::{GenerationSettings, HttpCompletionConfig, RetryPolicy};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("missing required setting {0}")]
    Missing(&'static str),

    #[error("invalid value for {key}: {message}")]
    Invalid { key: &'static str, message: String },
}

/// Queue and worker loop settings.
#[derive(Debug, Clone, PartialEq)]
pub struct QueueConfig {
    pub queue_name: String,
    pub batch_size: usize,
    pub visibility_timeout: Duration,
    pub poll_interval: Duration,
    /// How many visible messages the status resolver scans for a job id.
    pub status_peek_batch: usize,
    /// Visibility timeout used when peeking; kept short so real readers are not starved.
    pub status_peek_visibility: Duration,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            queue_name: "flashcard_generation".to_string(),
            batch_size: 5,
            visibility_timeout: Duration::from_secs(300),
            poll_interval: Duration::from_millis(2000),
            status_peek_batch: 50,
            status_peek_visibility: Duration::from_secs(1),
        }
    }
}

/// Completion service settings.
#[derive(Debug, Clone, PartialEq)]
pub struct CompletionConfig {
    pub api_url: String,
    pub api_key: String,
    pub model: String,
    pub timeout: Duration,
    pub max_retries: u32,
    pub max_tokens: u32,
    pub temperature: f32,
}

impl Default for CompletionConfig {
    fn default() -> Self {
        Self {
            api_url: "https://api.openai.com/v1".to_string(),
            api_key: String::new(),
            model: "gpt-4o-mini".to_string(),
            timeout: Duration::from_secs(60),
            max_retries: 3,
            max_tokens: 4000,
            temperature: 0.7,
        }
    }
}

impl CompletionConfig {
    pub fn http(&self) -> HttpCompletionConfig {
        HttpCompletionConfig {
            api_url: self.api_url.clone(),
            api_key: self.api_key.clone(),
            model: self.model.clone(),
            timeout: self.timeout,
        }
    }

    pub fn generation_settings(&self) -> GenerationSettings {
        GenerationSettings {
            max_tokens: self.max_tokens,
            temperature: self.temperature,
            call_timeout: self.timeout,
            retry: RetryPolicy {
                max_retries: self.max_retries,
                ..RetryPolicy::default()
            },
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct AppConfig {
    pub database_url: String,
    pub queue: QueueConfig,
    pub completion: CompletionConfig,
}

impl AppConfig {
    /// Load from process environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load from an arbitrary key lookup (used by tests).
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let queue_defaults = QueueConfig::default();
        let completion_defaults = CompletionConfig::default();

        let database_url = lookup("DATABASE_URL").ok_or(ConfigError::Missing("DATABASE_URL"))?;

        let queue = QueueConfig {
            queue_name: load_or(&lookup, "STUDYFORGE_QUEUE", queue_defaults.queue_name)?,
            batch_size: load_or(&lookup, "STUDYFORGE_BATCH_SIZE", queue_defaults.batch_size)?,
            visibility_timeout: Duration::from_secs(load_or(
                &lookup,
                "STUDYFORGE_VISIBILITY_SECS",
                queue_defaults.visibility_timeout.as_secs(),
            )?),
            poll_interval: Duration::from_millis(load_or(
                &lookup,
                "STUDYFORGE_POLL_MS",
                queue_defaults.poll_interval.as_millis() as u64,
            )?),
            status_peek_batch: load_or(
                &lookup,
                "STUDYFORGE_STATUS_PEEK_BATCH",
                queue_defaults.status_peek_batch,
            )?,
            status_peek_visibility: Duration::from_secs(load_or(
                &lookup,
                "STUDYFORGE_STATUS_PEEK_VT_SECS",
                queue_defaults.status_peek_visibility.as_secs(),
            )?),
        };

        if queue.batch_size == 0 {
            return Err(ConfigError::Invalid {
                key: "STUDYFORGE_BATCH_SIZE",
                message: "must be at least 1".to_string(),
            });
        }

        let api_key = lookup("COMPLETION_API_KEY").unwrap_or_else(|| {
            warn!("COMPLETION_API_KEY not set; completion calls will be rejected upstream");
            String::new()
        });

        let completion = CompletionConfig {
            api_url: load_or(&lookup, "COMPLETION_API_URL", completion_defaults.api_url)?,
            api_key,
            model: load_or(&lookup, "COMPLETION_MODEL", completion_defaults.model)?,
            timeout: Duration::from_secs(load_or(
                &lookup,
                "COMPLETION_TIMEOUT_SECS",
                completion_defaults.timeout.as_secs(),
            )?),
            max_retries: load_or(
                &lookup,
                "COMPLETION_MAX_RETRIES",
                completion_defaults.max_retries,
            )?,
            max_tokens: load_or(&lookup, "COMPLETION_MAX_TOKENS", completion_defaults.max_tokens)?,
            temperature: load_or(
                &lookup,
                "COMPLETION_TEMPERATURE",
                completion_defaults.temperature,
            )?,
        };

        // A batch runs its messages concurrently, so the lease only has to
        // outlive one job's slowest possible generation.
        let worst_case = completion.generation_settings().worst_case_duration();
        if queue.visibility_timeout <= worst_case {
            return Err(ConfigError::Invalid {
                key: "STUDYFORGE_VISIBILITY_SECS",
                message: format!(
                    "{}s does not outlast the worst-case generation time of {}s",
                    queue.visibility_timeout.as_secs(),
                    worst_case.as_secs()
                ),
            });
        }

        Ok(Self {
            database_url,
            queue,
            completion,
        })
    }
}

fn load_or<F, T>(lookup: &F, key: &'static str, default: T) -> Result<T, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr + Display,
    T::Err: Display,
{
    match lookup(key) {
        Some(raw) => raw.trim().parse().map_err(|e: T::Err| ConfigError::Invalid {
            key,
            message: e.to_string(),
        }),
        None => {
            info!("{key} not set, using default: {default}");
            Ok(default)
        }
    }
}

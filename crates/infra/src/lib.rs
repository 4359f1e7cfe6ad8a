//! Infrastructure layer: queue, persistence adapters, job pipeline, study services.

pub mod config;
pub mod error;
pub mod jobs;
pub mod queue;
pub mod schema;
pub mod study;


pub use config::{AppConfig, CompletionConfig, ConfigError, QueueConfig};
pub use error::StoreError;
pub use schema::apply_schema;

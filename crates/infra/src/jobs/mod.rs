//! Flashcard generation job pipeline.
//!
//! ## Components
//!
//! - `JobSubmitter`: validates a request and enqueues a `JobMessage`
//! - `JobProcessor`: drains the queue, generates cards, persists the deck
//! - `JobResultStore`: side table with monotonic job status
//! - `StatusResolver`: answers polling clients from the store, then the queue
//!
//! Data flow: submitter → queue → processor → result store ← resolver.

pub mod postgres;
pub mod processor;
pub mod status;
pub mod store;
pub mod submitter;
pub mod types;

pub use postgres::PostgresJobResultStore;
pub use processor::{
    BatchReport, JobProcessor, MessageOutcome, ProcessorConfig, ProcessorHandle, ProcessorStats,
};
pub use status::{JobStatusView, StatusError, StatusResolver};
pub use store::{InMemoryJobResultStore, JobResultStore};
pub use submitter::{JobSubmitter, SubmitError, SubmitRequest};
pub use types::{
    InvalidJob, JobMessage, JobResult, JobResultPayload, JobStatus, StatusUpdate, Transition,
};

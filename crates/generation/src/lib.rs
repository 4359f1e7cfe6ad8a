//! `studyforge-generation`
//!
//! **Responsibility:** turning a generation request into flashcards through an
//! external text-completion capability.
//!
//! The completion call itself is a black box behind [`CompletionClient`]. This
//! crate owns everything around it:
//! - the deterministic prompt (`prompt`)
//! - bounded retries with backoff and a per-call timeout (`retry`)
//! - extracting and validating cards from free-form output (`parse`)
//!
//! It does not persist anything; callers decide what to do with the cards.

pub mod completion;
pub mod generator;
pub mod http;
pub mod parse;
pub mod prompt;
pub mod retry;
pub mod scripted;

pub use completion::{CompletionClient, CompletionRequest, GenerationError};
pub use generator::{CardGenerator, GenerationSettings};
pub use http::{HttpCompletionClient, HttpCompletionConfig};
pub use parse::{GeneratedCard, extract_cards};
pub use prompt::{GenerationRequest, JobKind, MAX_CARDS_PER_JOB, MAX_SOURCE_CHARS};
pub use retry::{BackoffStrategy, RetryPolicy, complete_with_retry};
pub use scripted::ScriptedCompletionClient;

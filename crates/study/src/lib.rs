//! `studyforge-study`
//!
//! **Responsibility:** card lifecycle rules for studying flashcards.
//!
//! - mastery/interval rules applied on every answer (`mastery`)
//! - card ordering policies for a study session (`selection`)
//! - study session lifecycle and the review log (`session`, `review`)
//!
//! Everything here is pure and deterministic: callers pass `now` in and
//! persist the results through their own repositories.

pub mod card;
pub mod mastery;
pub mod review;
pub mod selection;
pub mod session;

pub use card::{Card, Deck, Difficulty};
pub use mastery::{
    AnswerResult, CustomStudyAnswer, Mastery, MasteryTier, MasteryUpdate, MASTERED_THRESHOLD,
    record_answer, record_custom_study_answer,
};
pub use review::{CardReview, SessionSummary};
pub use selection::{StudyAlgorithm, select_cards};
pub use session::{EndOutcome, SessionStats, StudySession};

//! Append-only review log and per-session aggregation.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use studyforge_core::{CardId, ReviewId, SessionId};

use crate::mastery::{AnswerResult, CustomStudyAnswer, Mastery, MasteryUpdate};
use crate::session::SessionStats;

/// One answer event. Never updated after insertion.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CardReview {
    pub id: ReviewId,
    pub card_id: CardId,
    pub session_id: SessionId,
    pub result: AnswerResult,
    pub previous_mastery: Mastery,
    pub new_mastery: Mastery,
    pub created_at: DateTime<Utc>,
}

impl CardReview {
    pub fn scheduled(
        card_id: CardId,
        session_id: SessionId,
        update: &MasteryUpdate,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: ReviewId::new(),
            card_id,
            session_id,
            result: update.result,
            previous_mastery: update.previous_mastery,
            new_mastery: update.new_mastery,
            created_at: now,
        }
    }

    pub fn custom(
        card_id: CardId,
        session_id: SessionId,
        answer: &CustomStudyAnswer,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: ReviewId::new(),
            card_id,
            session_id,
            result: answer.result,
            previous_mastery: answer.previous_mastery(),
            new_mastery: answer.new_mastery(),
            created_at: now,
        }
    }
}

/// Aggregate view of a session's review log.
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionSummary {
    /// Distinct cards answered at least once.
    pub cards_studied: u32,
    /// Distinct cards whose latest answer left them at or above the mastered threshold.
    pub cards_mastered: u32,
    pub easy: u32,
    pub correct: u32,
    pub hard: u32,
    pub incorrect: u32,
}

impl SessionSummary {
    pub fn from_reviews(reviews: &[CardReview]) -> Self {
        let mut summary = Self::default();
        let mut latest: HashMap<CardId, &CardReview> = HashMap::new();

        for review in reviews {
            match review.result {
                AnswerResult::Easy => summary.easy += 1,
                AnswerResult::Correct => summary.correct += 1,
                AnswerResult::Hard => summary.hard += 1,
                AnswerResult::Incorrect => summary.incorrect += 1,
            }
            latest
                .entry(review.card_id)
                .and_modify(|current| {
                    if review.created_at >= current.created_at {
                        *current = review;
                    }
                })
                .or_insert(review);
        }

        summary.cards_studied = latest.len() as u32;
        summary.cards_mastered =
            latest.values().filter(|r| r.new_mastery.is_mastered()).count() as u32;
        summary
    }

    pub fn answers(&self) -> u32 {
        self.easy + self.correct + self.hard + self.incorrect
    }

    pub fn into_stats(self, duration_seconds: u32) -> SessionStats {
        SessionStats {
            cards_studied: self.cards_studied,
            cards_mastered: self.cards_mastered,
            duration_seconds,
        }
    }
}

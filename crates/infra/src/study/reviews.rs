//! Answer recording during a study session.

use std::sync::Arc;

use chrono::Utc;
use thiserror::Error;
use tracing::{debug, instrument};

use studyforge_core::{CardId, SessionId};
use studyforge_study::{
    AnswerResult, Card, CardReview, MasteryUpdate, StudySession, record_answer,
    record_custom_study_answer,
};

use super::{DeckRepository, ReviewLog, SessionRepository};
use crate::error::StoreError;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ReviewError {
    #[error("session not found: {0}")]
    SessionNotFound(SessionId),

    #[error("session {0} has already ended")]
    SessionClosed(SessionId),

    #[error("card not found: {0}")]
    CardNotFound(CardId),

    #[error("card {card} is not part of session {session}'s deck")]
    CardNotInSessionDeck { card: CardId, session: SessionId },

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Result of a scheduled answer: the updated card and the logged review.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedAnswer {
    pub card: Card,
    pub update: MasteryUpdate,
    pub review: CardReview,
}

#[derive(Clone)]
pub struct ReviewService {
    decks: Arc<dyn DeckRepository>,
    sessions: Arc<dyn SessionRepository>,
    log: Arc<dyn ReviewLog>,
}

impl ReviewService {
    pub fn new(
        decks: Arc<dyn DeckRepository>,
        sessions: Arc<dyn SessionRepository>,
        log: Arc<dyn ReviewLog>,
    ) -> Self {
        Self { decks, sessions, log }
    }

    /// Apply a scheduled answer: move the card's mastery and next review
    /// forward, then log the review.
    #[instrument(
        skip(self),
        fields(session_id = %session_id, card_id = %card_id, result = %result),
        err
    )]
    pub async fn record_answer(
        &self,
        session_id: SessionId,
        card_id: CardId,
        result: AnswerResult,
    ) -> Result<RecordedAnswer, ReviewError> {
        let (_, mut card) = self.load(session_id, card_id).await?;
        let now = Utc::now();

        let update = record_answer(result, card.mastery_level);
        card.apply_review(&update, now);
        self.decks.save_card_schedule(&card).await?;

        let review = CardReview::scheduled(card.id, session_id, &update, now);
        self.log.append(&review).await?;

        debug!(
            previous = %update.previous_mastery,
            new = %update.new_mastery,
            interval_days = update.interval_days,
            "answer recorded"
        );
        Ok(RecordedAnswer { card, update, review })
    }

    /// Log an answer given in custom study mode. The card's schedule is left alone.
    #[instrument(
        skip(self),
        fields(session_id = %session_id, card_id = %card_id, result = %result),
        err
    )]
    pub async fn record_custom_study_answer(
        &self,
        session_id: SessionId,
        card_id: CardId,
        result: AnswerResult,
    ) -> Result<CardReview, ReviewError> {
        let (_, card) = self.load(session_id, card_id).await?;

        let answer = record_custom_study_answer(result, card.mastery_level);
        let review = CardReview::custom(card.id, session_id, &answer, Utc::now());
        self.log.append(&review).await?;
        Ok(review)
    }

    async fn load(
        &self,
        session_id: SessionId,
        card_id: CardId,
    ) -> Result<(StudySession, Card), ReviewError> {
        let session = self
            .sessions
            .get(session_id)
            .await?
            .ok_or(ReviewError::SessionNotFound(session_id))?;
        if !session.is_open() {
            return Err(ReviewError::SessionClosed(session_id));
        }

        let card = self
            .decks
            .get_card(card_id)
            .await?
            .ok_or(ReviewError::CardNotFound(card_id))?;
        if card.deck_id != session.deck_id {
            return Err(ReviewError::CardNotInSessionDeck {
                card: card_id,
                session: session_id,
            });
        }
        Ok((session, card))
    }
}

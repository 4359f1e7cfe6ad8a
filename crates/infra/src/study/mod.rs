//! Persistence seams and services for decks, sessions and reviews.
//!
//! Repositories are injected as `Arc<dyn Trait>`; the services here hold no
//! state of their own beyond those handles.

pub mod in_memory;
pub mod planner;
pub mod postgres;
pub mod reviews;
pub mod sessions;

use std::sync::Arc;

use async_trait::async_trait;

use studyforge_core::{CardId, DeckId, SessionId, UserId};
use studyforge_study::{Card, CardReview, Deck, StudySession};

use crate::error::StoreError;

pub use in_memory::{InMemoryDeckRepository, InMemoryReviewLog, InMemorySessionRepository};
pub use planner::StudyPlanner;
pub use postgres::{PostgresDeckRepository, PostgresReviewLog, PostgresSessionRepository};
pub use reviews::{RecordedAnswer, ReviewError, ReviewService};
pub use sessions::{SessionError, SessionManager};

#[async_trait]
pub trait DeckRepository: Send + Sync {
    /// Write a deck and all its cards atomically. Either everything is
    /// visible afterwards or nothing is.
    async fn insert_deck_with_cards(&self, deck: &Deck, cards: &[Card]) -> Result<(), StoreError>;

    async fn get_deck(&self, deck_id: DeckId) -> Result<Option<Deck>, StoreError>;

    async fn list_cards(&self, deck_id: DeckId) -> Result<Vec<Card>, StoreError>;

    async fn get_card(&self, card_id: CardId) -> Result<Option<Card>, StoreError>;

    /// Persist a card's scheduling fields (mastery, review count, timestamps).
    async fn save_card_schedule(&self, card: &Card) -> Result<(), StoreError>;
}

#[async_trait]
pub trait SessionRepository: Send + Sync {
    async fn get(&self, session_id: SessionId) -> Result<Option<StudySession>, StoreError>;

    /// Sessions for the pair with no `ended_at`.
    async fn list_open(
        &self,
        deck_id: DeckId,
        user_id: UserId,
    ) -> Result<Vec<StudySession>, StoreError>;

    async fn insert(&self, session: &StudySession) -> Result<(), StoreError>;

    async fn save(&self, session: &StudySession) -> Result<(), StoreError>;
}

/// Append-only log of answers.
#[async_trait]
pub trait ReviewLog: Send + Sync {
    async fn append(&self, review: &CardReview) -> Result<(), StoreError>;

    /// Oldest first.
    async fn list_by_session(&self, session_id: SessionId) -> Result<Vec<CardReview>, StoreError>;
}

#[async_trait]
impl<R> DeckRepository for Arc<R>
where
    R: DeckRepository + ?Sized,
{
    async fn insert_deck_with_cards(&self, deck: &Deck, cards: &[Card]) -> Result<(), StoreError> {
        (**self).insert_deck_with_cards(deck, cards).await
    }

    async fn get_deck(&self, deck_id: DeckId) -> Result<Option<Deck>, StoreError> {
        (**self).get_deck(deck_id).await
    }

    async fn list_cards(&self, deck_id: DeckId) -> Result<Vec<Card>, StoreError> {
        (**self).list_cards(deck_id).await
    }

    async fn get_card(&self, card_id: CardId) -> Result<Option<Card>, StoreError> {
        (**self).get_card(card_id).await
    }

    async fn save_card_schedule(&self, card: &Card) -> Result<(), StoreError> {
        (**self).save_card_schedule(card).await
    }
}

//! In-memory study repositories for tests/dev.

use std::collections::HashMap;
use std::sync::RwLock;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;

use studyforge_core::{CardId, DeckId, SessionId, UserId};
use studyforge_study::{Card, CardReview, Deck, StudySession};

use super::{DeckRepository, ReviewLog, SessionRepository};
use crate::error::StoreError;

#[derive(Debug, Default)]
struct DeckState {
    decks: HashMap<DeckId, Deck>,
    cards: HashMap<CardId, Card>,
}

#[derive(Debug, Default)]
pub struct InMemoryDeckRepository {
    state: RwLock<DeckState>,
    fail_writes: AtomicBool,
}

impl InMemoryDeckRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent write fail with a storage error until reset.
    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    pub fn deck_count(&self) -> usize {
        self.state.read().map(|s| s.decks.len()).unwrap_or(0)
    }

    fn check_writable(&self) -> Result<(), StoreError> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(StoreError::Storage("writes disabled".to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl DeckRepository for InMemoryDeckRepository {
    async fn insert_deck_with_cards(&self, deck: &Deck, cards: &[Card]) -> Result<(), StoreError> {
        self.check_writable()?;
        let mut state = self.state.write().map_err(|_| StoreError::poisoned())?;

        if state.decks.contains_key(&deck.id) {
            return Err(StoreError::Conflict(format!("deck {} already exists", deck.id)));
        }
        if let Some(card) = cards.iter().find(|c| c.deck_id != deck.id) {
            return Err(StoreError::Conflict(format!(
                "card {} does not belong to deck {}",
                card.id, deck.id
            )));
        }

        state.decks.insert(deck.id, deck.clone());
        for card in cards {
            state.cards.insert(card.id, card.clone());
        }
        Ok(())
    }

    async fn get_deck(&self, deck_id: DeckId) -> Result<Option<Deck>, StoreError> {
        let state = self.state.read().map_err(|_| StoreError::poisoned())?;
        Ok(state.decks.get(&deck_id).cloned())
    }

    async fn list_cards(&self, deck_id: DeckId) -> Result<Vec<Card>, StoreError> {
        let state = self.state.read().map_err(|_| StoreError::poisoned())?;
        let mut cards: Vec<Card> = state
            .cards
            .values()
            .filter(|c| c.deck_id == deck_id)
            .cloned()
            .collect();
        cards.sort_by_key(|c| (c.created_at, c.id));
        Ok(cards)
    }

    async fn get_card(&self, card_id: CardId) -> Result<Option<Card>, StoreError> {
        let state = self.state.read().map_err(|_| StoreError::poisoned())?;
        Ok(state.cards.get(&card_id).cloned())
    }

    async fn save_card_schedule(&self, card: &Card) -> Result<(), StoreError> {
        self.check_writable()?;
        let mut state = self.state.write().map_err(|_| StoreError::poisoned())?;
        let stored = state
            .cards
            .get_mut(&card.id)
            .ok_or_else(|| StoreError::NotFound(format!("card {}", card.id)))?;

        stored.mastery_level = card.mastery_level;
        stored.review_count = card.review_count;
        stored.next_review_at = card.next_review_at;
        stored.last_reviewed_at = card.last_reviewed_at;
        Ok(())
    }
}

#[derive(Debug, Default)]
pub struct InMemorySessionRepository {
    sessions: RwLock<HashMap<SessionId, StudySession>>,
}

impl InMemorySessionRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SessionRepository for InMemorySessionRepository {
    async fn get(&self, session_id: SessionId) -> Result<Option<StudySession>, StoreError> {
        let sessions = self.sessions.read().map_err(|_| StoreError::poisoned())?;
        Ok(sessions.get(&session_id).cloned())
    }

    async fn list_open(
        &self,
        deck_id: DeckId,
        user_id: UserId,
    ) -> Result<Vec<StudySession>, StoreError> {
        let sessions = self.sessions.read().map_err(|_| StoreError::poisoned())?;
        Ok(sessions
            .values()
            .filter(|s| s.deck_id == deck_id && s.user_id == user_id && s.is_open())
            .cloned()
            .collect())
    }

    async fn insert(&self, session: &StudySession) -> Result<(), StoreError> {
        let mut sessions = self.sessions.write().map_err(|_| StoreError::poisoned())?;
        if sessions.contains_key(&session.id) {
            return Err(StoreError::Conflict(format!("session {} already exists", session.id)));
        }
        let pair_open = sessions.values().any(|s| {
            s.deck_id == session.deck_id && s.user_id == session.user_id && s.is_open()
        });
        if session.is_open() && pair_open {
            return Err(StoreError::Conflict(format!(
                "deck {} already has an open session for user {}",
                session.deck_id, session.user_id
            )));
        }
        sessions.insert(session.id, session.clone());
        Ok(())
    }

    async fn save(&self, session: &StudySession) -> Result<(), StoreError> {
        let mut sessions = self.sessions.write().map_err(|_| StoreError::poisoned())?;
        match sessions.get_mut(&session.id) {
            Some(stored) => {
                *stored = session.clone();
                Ok(())
            }
            None => Err(StoreError::NotFound(format!("session {}", session.id))),
        }
    }
}

#[derive(Debug, Default)]
pub struct InMemoryReviewLog {
    reviews: RwLock<Vec<CardReview>>,
}

impl InMemoryReviewLog {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ReviewLog for InMemoryReviewLog {
    async fn append(&self, review: &CardReview) -> Result<(), StoreError> {
        let mut reviews = self.reviews.write().map_err(|_| StoreError::poisoned())?;
        reviews.push(review.clone());
        Ok(())
    }

    async fn list_by_session(&self, session_id: SessionId) -> Result<Vec<CardReview>, StoreError> {
        let reviews = self.reviews.read().map_err(|_| StoreError::poisoned())?;
        Ok(reviews
            .iter()
            .filter(|r| r.session_id == session_id)
            .cloned()
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use studyforge_study::Difficulty;

    fn deck() -> Deck {
        Deck {
            id: DeckId::new(),
            owner_id: UserId::new(),
            name: "Renal".into(),
            description: None,
            color: None,
            is_public: false,
            created_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn deck_and_cards_are_written_together() {
        let repo = InMemoryDeckRepository::new();
        let deck = deck();
        let cards: Vec<_> = (0..3)
            .map(|i| {
                Card::new(deck.id, format!("Q{i}"), format!("A{i}"), Difficulty::Easy, Utc::now())
            })
            .collect();

        repo.insert_deck_with_cards(&deck, &cards).await.unwrap();

        assert_eq!(repo.get_deck(deck.id).await.unwrap(), Some(deck.clone()));
        assert_eq!(repo.list_cards(deck.id).await.unwrap().len(), 3);
    }

    #[tokio::test]
    async fn failed_writes_leave_nothing_behind() {
        let repo = InMemoryDeckRepository::new();
        let deck = deck();
        let card = Card::new(deck.id, "Q", "A", Difficulty::Easy, Utc::now());
        repo.set_fail_writes(true);

        assert!(repo.insert_deck_with_cards(&deck, &[card]).await.is_err());
        assert_eq!(repo.deck_count(), 0);
        assert!(repo.list_cards(deck.id).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn cards_from_another_deck_are_rejected() {
        let repo = InMemoryDeckRepository::new();
        let deck = deck();
        let stray = Card::new(DeckId::new(), "Q", "A", Difficulty::Easy, Utc::now());

        let err = repo.insert_deck_with_cards(&deck, &[stray]).await.unwrap_err();

        assert!(matches!(err, StoreError::Conflict(_)));
        assert_eq!(repo.deck_count(), 0);
    }

    #[tokio::test]
    async fn saving_an_unknown_session_fails() {
        let repo = InMemorySessionRepository::new();
        let session = StudySession::start(
            DeckId::new(),
            UserId::new(),
            studyforge_study::StudyAlgorithm::Leitner,
            Utc::now(),
        );
        assert!(matches!(repo.save(&session).await, Err(StoreError::NotFound(_))));
    }

    #[tokio::test]
    async fn second_open_session_for_a_pair_conflicts() {
        let repo = InMemorySessionRepository::new();
        let (deck_id, user_id) = (DeckId::new(), UserId::new());
        let algorithm = studyforge_study::StudyAlgorithm::SpacedRepetition;
        let mut first = StudySession::start(deck_id, user_id, algorithm, Utc::now());
        repo.insert(&first).await.unwrap();

        let racer = StudySession::start(deck_id, user_id, algorithm, Utc::now());
        assert!(matches!(repo.insert(&racer).await, Err(StoreError::Conflict(_))));

        first.abandon(Utc::now());
        repo.save(&first).await.unwrap();
        repo.insert(&racer).await.unwrap();
        assert_eq!(repo.list_open(deck_id, user_id).await.unwrap(), vec![racer]);
    }
}

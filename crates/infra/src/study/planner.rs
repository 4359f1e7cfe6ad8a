use std::sync::Arc;

use chrono::Utc;
use tracing::{debug, instrument};

use studyforge_core::DeckId;
use studyforge_study::{Card, StudyAlgorithm, select_cards};

use super::DeckRepository;
use super::sessions::SessionError;

/// Picks which cards of a deck to study next.
#[derive(Clone)]
pub struct StudyPlanner {
    decks: Arc<dyn DeckRepository>,
}

impl StudyPlanner {
    pub fn new(decks: Arc<dyn DeckRepository>) -> Self {
        Self { decks }
    }

    #[instrument(skip(self), fields(deck_id = %deck_id), err)]
    pub async fn select_cards_for_study(
        &self,
        deck_id: DeckId,
        algorithm: StudyAlgorithm,
        limit: usize,
    ) -> Result<Vec<Card>, SessionError> {
        if self.decks.get_deck(deck_id).await?.is_none() {
            return Err(SessionError::DeckNotFound(deck_id));
        }

        let cards = self.decks.list_cards(deck_id).await?;
        let selected = select_cards(&cards, algorithm, limit, Utc::now());
        debug!(available = cards.len(), selected = selected.len(), %algorithm, "cards selected");
        Ok(selected)
    }
}

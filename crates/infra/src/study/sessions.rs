//! Study session lifecycle: at most one open session per (deck, user).

use std::sync::Arc;

use chrono::Utc;
use thiserror::Error;
use tracing::{info, instrument, warn};

use studyforge_core::{DeckId, DomainError, SessionId, UserId};
use studyforge_study::{EndOutcome, SessionStats, SessionSummary, StudyAlgorithm, StudySession};

use super::{DeckRepository, ReviewLog, SessionRepository};
use crate::error::StoreError;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum SessionError {
    #[error("deck not found: {0}")]
    DeckNotFound(DeckId),

    #[error("session not found: {0}")]
    SessionNotFound(SessionId),

    #[error(transparent)]
    Domain(#[from] DomainError),

    #[error(transparent)]
    Store(#[from] StoreError),
}

#[derive(Clone)]
pub struct SessionManager {
    sessions: Arc<dyn SessionRepository>,
    decks: Arc<dyn DeckRepository>,
    reviews: Arc<dyn ReviewLog>,
}

impl SessionManager {
    pub fn new(
        sessions: Arc<dyn SessionRepository>,
        decks: Arc<dyn DeckRepository>,
        reviews: Arc<dyn ReviewLog>,
    ) -> Self {
        Self {
            sessions,
            decks,
            reviews,
        }
    }

    /// Open a session, force-closing any session still open for the pair.
    ///
    /// Read-then-write per pair. The store admits one open session per pair,
    /// so when two starts race the slower insert fails with a `Conflict`
    /// store error and the faster session stays open.
    #[instrument(skip(self), fields(deck_id = %deck_id, user_id = %user_id), err)]
    pub async fn start_session(
        &self,
        deck_id: DeckId,
        user_id: UserId,
        algorithm: StudyAlgorithm,
    ) -> Result<StudySession, SessionError> {
        if self.decks.get_deck(deck_id).await?.is_none() {
            return Err(SessionError::DeckNotFound(deck_id));
        }

        let now = Utc::now();
        for mut lingering in self.sessions.list_open(deck_id, user_id).await? {
            warn!(session_id = %lingering.id, "closing lingering session");
            lingering.abandon(now);
            self.sessions.save(&lingering).await?;
        }

        let session = StudySession::start(deck_id, user_id, algorithm, now);
        self.sessions.insert(&session).await?;
        info!(session_id = %session.id, %algorithm, "study session started");
        Ok(session)
    }

    /// End a session with explicit counters. Idempotent for identical counters.
    #[instrument(skip(self, stats), fields(session_id = %session_id), err)]
    pub async fn end_session(
        &self,
        user_id: UserId,
        session_id: SessionId,
        stats: SessionStats,
    ) -> Result<StudySession, SessionError> {
        let mut session = self.owned_session(user_id, session_id).await?;

        match session.end(stats, Utc::now())? {
            EndOutcome::Ended => {
                self.sessions.save(&session).await?;
                info!(
                    cards_studied = session.cards_studied,
                    cards_mastered = session.cards_mastered,
                    "study session ended"
                );
            }
            EndOutcome::AlreadyEnded => {}
        }
        Ok(session)
    }

    /// End a session with counters derived from its review log.
    pub async fn finish_session(
        &self,
        user_id: UserId,
        session_id: SessionId,
        duration_seconds: u32,
    ) -> Result<StudySession, SessionError> {
        let summary = self.summarize(session_id).await?;
        self.end_session(user_id, session_id, summary.into_stats(duration_seconds))
            .await
    }

    pub async fn summarize(&self, session_id: SessionId) -> Result<SessionSummary, SessionError> {
        let reviews = self.reviews.list_by_session(session_id).await?;
        Ok(SessionSummary::from_reviews(&reviews))
    }

    async fn owned_session(
        &self,
        user_id: UserId,
        session_id: SessionId,
    ) -> Result<StudySession, SessionError> {
        match self.sessions.get(session_id).await? {
            Some(session) if session.user_id == user_id => Ok(session),
            _ => Err(SessionError::SessionNotFound(session_id)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::study::{InMemoryDeckRepository, InMemoryReviewLog, InMemorySessionRepository};
    use studyforge_study::Deck;

    struct Fixture {
        manager: SessionManager,
        sessions: Arc<InMemorySessionRepository>,
        deck_id: DeckId,
        user_id: UserId,
    }

    async fn fixture() -> Fixture {
        let decks = Arc::new(InMemoryDeckRepository::new());
        let sessions = Arc::new(InMemorySessionRepository::new());
        let user_id = UserId::new();
        let deck = Deck {
            id: DeckId::new(),
            owner_id: user_id,
            name: "Renal".into(),
            description: None,
            color: None,
            is_public: false,
            created_at: Utc::now(),
        };
        decks.insert_deck_with_cards(&deck, &[]).await.unwrap();

        Fixture {
            manager: SessionManager::new(
                sessions.clone(),
                decks,
                Arc::new(InMemoryReviewLog::new()),
            ),
            sessions,
            deck_id: deck.id,
            user_id,
        }
    }

    fn stats(studied: u32, mastered: u32, secs: u32) -> SessionStats {
        SessionStats {
            cards_studied: studied,
            cards_mastered: mastered,
            duration_seconds: secs,
        }
    }

    #[tokio::test]
    async fn second_start_closes_the_first() {
        let f = fixture().await;

        let first = f
            .manager
            .start_session(f.deck_id, f.user_id, StudyAlgorithm::SpacedRepetition)
            .await
            .unwrap();
        let second = f
            .manager
            .start_session(f.deck_id, f.user_id, StudyAlgorithm::Leitner)
            .await
            .unwrap();

        let open = f.sessions.list_open(f.deck_id, f.user_id).await.unwrap();
        assert_eq!(open.len(), 1);
        assert_eq!(open[0].id, second.id);

        let closed = f.sessions.get(first.id).await.unwrap().unwrap();
        assert!(closed.ended_at.is_some());
        assert_eq!(closed.cards_studied, 0);
        assert_eq!(closed.duration_seconds, 0);
    }

    #[tokio::test]
    async fn other_users_sessions_are_untouched() {
        let f = fixture().await;
        let other = UserId::new();

        f.manager
            .start_session(f.deck_id, other, StudyAlgorithm::Random)
            .await
            .unwrap();
        f.manager
            .start_session(f.deck_id, f.user_id, StudyAlgorithm::Random)
            .await
            .unwrap();

        assert_eq!(f.sessions.list_open(f.deck_id, other).await.unwrap().len(), 1);
        assert_eq!(f.sessions.list_open(f.deck_id, f.user_id).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn end_is_idempotent_with_identical_stats() {
        let f = fixture().await;
        let session = f
            .manager
            .start_session(f.deck_id, f.user_id, StudyAlgorithm::SpacedRepetition)
            .await
            .unwrap();

        let ended = f.manager.end_session(f.user_id, session.id, stats(10, 4, 600)).await.unwrap();
        let again = f.manager.end_session(f.user_id, session.id, stats(10, 4, 600)).await.unwrap();

        assert_eq!(ended, again);
        assert_eq!(ended.cards_mastered, 4);
    }

    #[tokio::test]
    async fn ended_sessions_cannot_be_rewritten() {
        let f = fixture().await;
        let session = f
            .manager
            .start_session(f.deck_id, f.user_id, StudyAlgorithm::SpacedRepetition)
            .await
            .unwrap();
        f.manager.end_session(f.user_id, session.id, stats(10, 4, 600)).await.unwrap();

        let err = f
            .manager
            .end_session(f.user_id, session.id, stats(12, 4, 700))
            .await
            .unwrap_err();

        assert!(matches!(err, SessionError::Domain(DomainError::Conflict(_))));
    }

    #[tokio::test]
    async fn sessions_of_other_users_are_not_found() {
        let f = fixture().await;
        let session = f
            .manager
            .start_session(f.deck_id, f.user_id, StudyAlgorithm::SpacedRepetition)
            .await
            .unwrap();

        let err = f
            .manager
            .end_session(UserId::new(), session.id, stats(1, 0, 10))
            .await
            .unwrap_err();

        assert_eq!(err, SessionError::SessionNotFound(session.id));
    }

    #[tokio::test]
    async fn starting_on_a_missing_deck_fails() {
        let f = fixture().await;
        let err = f
            .manager
            .start_session(DeckId::new(), f.user_id, StudyAlgorithm::SpacedRepetition)
            .await
            .unwrap_err();
        assert!(matches!(err, SessionError::DeckNotFound(_)));
    }
}

//! Study session lifecycle.
//!
//! A session is open while `ended_at` is `None`. It ends exactly once, either
//! through [`StudySession::end`] with the learner's final counters, or through
//! [`StudySession::abandon`] when a newer session for the same deck and user
//! supersedes it. Ended sessions never reopen.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use studyforge_core::{DeckId, DomainError, DomainResult, SessionId, UserId};

use crate::selection::StudyAlgorithm;

/// Final counters reported when a session ends.
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionStats {
    pub cards_studied: u32,
    pub cards_mastered: u32,
    pub duration_seconds: u32,
}

impl SessionStats {
    pub fn validate(&self) -> DomainResult<()> {
        if self.cards_mastered > self.cards_studied {
            return Err(DomainError::validation(format!(
                "cards_mastered ({}) cannot exceed cards_studied ({})",
                self.cards_mastered, self.cards_studied
            )));
        }
        Ok(())
    }
}

/// Whether [`StudySession::end`] changed anything.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum EndOutcome {
    Ended,
    AlreadyEnded,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StudySession {
    pub id: SessionId,
    pub deck_id: DeckId,
    pub user_id: UserId,
    pub algorithm: StudyAlgorithm,
    pub started_at: DateTime<Utc>,
    pub ended_at: Option<DateTime<Utc>>,
    pub cards_studied: u32,
    pub cards_mastered: u32,
    pub duration_seconds: u32,
}

impl StudySession {
    pub fn start(
        deck_id: DeckId,
        user_id: UserId,
        algorithm: StudyAlgorithm,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: SessionId::new(),
            deck_id,
            user_id,
            algorithm,
            started_at: now,
            ended_at: None,
            cards_studied: 0,
            cards_mastered: 0,
            duration_seconds: 0,
        }
    }

    pub fn is_open(&self) -> bool {
        self.ended_at.is_none()
    }

    pub fn stats(&self) -> SessionStats {
        SessionStats {
            cards_studied: self.cards_studied,
            cards_mastered: self.cards_mastered,
            duration_seconds: self.duration_seconds,
        }
    }

    /// Force-close a superseded session. Abandoned work is not credited.
    ///
    /// No-op on a session that already ended.
    pub fn abandon(&mut self, now: DateTime<Utc>) {
        if !self.is_open() {
            return;
        }
        self.ended_at = Some(now);
        self.cards_studied = 0;
        self.duration_seconds = 0;
    }

    /// End the session with the learner's final counters.
    ///
    /// Ending again with identical counters is a no-op; ending again with
    /// different counters is a conflict.
    pub fn end(&mut self, stats: SessionStats, now: DateTime<Utc>) -> DomainResult<EndOutcome> {
        stats.validate()?;

        if !self.is_open() {
            if self.stats() == stats {
                return Ok(EndOutcome::AlreadyEnded);
            }
            return Err(DomainError::conflict(format!(
                "session {} already ended with different stats",
                self.id
            )));
        }

        self.ended_at = Some(now);
        self.cards_studied = stats.cards_studied;
        self.cards_mastered = stats.cards_mastered;
        self.duration_seconds = stats.duration_seconds;
        Ok(EndOutcome::Ended)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn open_session() -> StudySession {
        StudySession::start(
            DeckId::new(),
            UserId::new(),
            StudyAlgorithm::SpacedRepetition,
            Utc::now(),
        )
    }

    fn stats(studied: u32, mastered: u32, secs: u32) -> SessionStats {
        SessionStats {
            cards_studied: studied,
            cards_mastered: mastered,
            duration_seconds: secs,
        }
    }

    #[test]
    fn end_records_counters_once() {
        let mut session = open_session();
        let now = Utc::now();

        assert_eq!(session.end(stats(12, 4, 300), now).unwrap(), EndOutcome::Ended);
        assert!(!session.is_open());
        assert_eq!(session.ended_at, Some(now));
        assert_eq!(session.stats(), stats(12, 4, 300));
    }

    #[test]
    fn ending_twice_with_same_stats_is_idempotent() {
        let mut session = open_session();
        let first = Utc::now();
        session.end(stats(3, 1, 60), first).unwrap();

        let outcome = session.end(stats(3, 1, 60), first + Duration::minutes(5)).unwrap();

        assert_eq!(outcome, EndOutcome::AlreadyEnded);
        assert_eq!(session.ended_at, Some(first));
    }

    #[test]
    fn ending_twice_with_different_stats_conflicts() {
        let mut session = open_session();
        session.end(stats(3, 1, 60), Utc::now()).unwrap();

        let err = session.end(stats(4, 1, 60), Utc::now()).unwrap_err();
        assert!(matches!(err, DomainError::Conflict(_)));
        assert_eq!(session.stats(), stats(3, 1, 60));
    }

    #[test]
    fn abandon_zeroes_progress() {
        let mut session = open_session();
        session.cards_studied = 7;
        session.duration_seconds = 120;

        session.abandon(Utc::now());

        assert!(!session.is_open());
        assert_eq!(session.cards_studied, 0);
        assert_eq!(session.duration_seconds, 0);
    }

    #[test]
    fn abandoned_session_cannot_be_reopened_with_new_stats() {
        let mut session = open_session();
        session.abandon(Utc::now());

        assert!(session.end(stats(5, 0, 30), Utc::now()).is_err());
        assert!(!session.is_open());
    }

    #[test]
    fn mastered_cannot_exceed_studied() {
        let mut session = open_session();
        let err = session.end(stats(1, 2, 10), Utc::now()).unwrap_err();
        assert!(matches!(err, DomainError::Validation(_)));
        assert!(session.is_open());
    }
}

//! Decks, cards and the per-card review schedule.

use core::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use studyforge_core::{CardId, DeckId, DomainError, UserId};

use crate::mastery::{Mastery, MasteryUpdate};

/// Difficulty of generated content. Ordered `Easy < Medium < Hard`.
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Difficulty {
    Easy,
    #[default]
    Medium,
    Hard,
}

impl Difficulty {
    pub fn as_str(self) -> &'static str {
        match self {
            Difficulty::Easy => "easy",
            Difficulty::Medium => "medium",
            Difficulty::Hard => "hard",
        }
    }
}

impl core::fmt::Display for Difficulty {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Difficulty {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "easy" => Ok(Difficulty::Easy),
            "medium" => Ok(Difficulty::Medium),
            "hard" => Ok(Difficulty::Hard),
            other => Err(DomainError::validation(format!("unknown difficulty: {other}"))),
        }
    }
}

/// A flashcard collection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Deck {
    pub id: DeckId,
    pub owner_id: UserId,
    pub name: String,
    pub description: Option<String>,
    pub color: Option<String>,
    pub is_public: bool,
    pub created_at: DateTime<Utc>,
}

/// A single flashcard together with its scheduling state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Card {
    pub id: CardId,
    pub deck_id: DeckId,
    pub front: String,
    pub back: String,
    pub difficulty_label: Difficulty,
    pub mastery_level: Mastery,
    pub review_count: u32,
    /// `None` means the card has never been reviewed and is due immediately.
    pub next_review_at: Option<DateTime<Utc>>,
    pub last_reviewed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl Card {
    /// A freshly created, never-reviewed card.
    pub fn new(
        deck_id: DeckId,
        front: impl Into<String>,
        back: impl Into<String>,
        difficulty_label: Difficulty,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: CardId::new(),
            deck_id,
            front: front.into(),
            back: back.into(),
            difficulty_label,
            mastery_level: Mastery::MIN,
            review_count: 0,
            next_review_at: None,
            last_reviewed_at: None,
            created_at,
        }
    }

    pub fn is_due(&self, now: DateTime<Utc>) -> bool {
        self.next_review_at.is_none_or(|at| at <= now)
    }

    /// Move the card's schedule forward after a scheduled answer.
    pub fn apply_review(&mut self, update: &MasteryUpdate, now: DateTime<Utc>) {
        self.mastery_level = update.new_mastery;
        self.review_count = self.review_count.saturating_add(1);
        self.next_review_at = Some(update.next_review_at(now));
        self.last_reviewed_at = Some(now);
    }
}

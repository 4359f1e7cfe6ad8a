//! Mastery and review-interval rules.
//!
//! A card's mastery is an integer in `[0, 100]`. Each answer moves it by a fixed
//! delta and schedules the next review a number of days out, where the number of
//! days depends on the mastery tier the card was in *before* the answer:
//!
//! | result    | delta | days (<30, <60, <80, >=80) |
//! |-----------|-------|----------------------------|
//! | easy      | +15   | 2, 4, 7, 14                |
//! | correct   | +10   | 1, 3, 5, 10                |
//! | hard      | +5    | 1                          |
//! | incorrect | -10   | 0                          |
//!
//! The rules are a pure function of `(result, previous_mastery)`. Only
//! [`MasteryUpdate::next_review_at`] involves a clock, and it takes `now` as an
//! argument.

use core::str::FromStr;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use studyforge_core::DomainError;

/// Mastery at or above which a card counts as mastered.
pub const MASTERED_THRESHOLD: u8 = 80;

/// Card mastery level, always within `[0, 100]`.
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub struct Mastery(u8);

impl Mastery {
    pub const MIN: Mastery = Mastery(0);
    pub const MAX: Mastery = Mastery(100);

    /// Build a mastery level, rejecting values above 100.
    pub fn new(value: u8) -> Result<Self, DomainError> {
        if value > Self::MAX.0 {
            return Err(DomainError::validation(format!(
                "mastery must be within 0..=100 (got {value})"
            )));
        }
        Ok(Self(value))
    }

    /// Build a mastery level from any integer, clamping into `[0, 100]`.
    ///
    /// Used when reading rows written by other clients.
    pub fn saturating(value: i64) -> Self {
        Self(value.clamp(0, 100) as u8)
    }

    pub fn value(self) -> u8 {
        self.0
    }

    pub fn tier(self) -> MasteryTier {
        match self.0 {
            0..30 => MasteryTier::Novice,
            30..60 => MasteryTier::Developing,
            60..80 => MasteryTier::Proficient,
            _ => MasteryTier::Mastered,
        }
    }

    pub fn is_mastered(self) -> bool {
        self.0 >= MASTERED_THRESHOLD
    }

    fn shifted(self, delta: i16) -> Self {
        Self((self.0 as i16 + delta).clamp(0, 100) as u8)
    }
}

impl TryFrom<u8> for Mastery {
    type Error = DomainError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<Mastery> for u8 {
    fn from(value: Mastery) -> Self {
        value.0
    }
}

impl core::fmt::Display for Mastery {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Interval bracket a card's mastery falls into.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum MasteryTier {
    /// mastery < 30
    Novice,
    /// mastery < 60
    Developing,
    /// mastery < 80
    Proficient,
    /// mastery >= 80
    Mastered,
}

/// How the learner rated their answer to a card.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnswerResult {
    Easy,
    Correct,
    Hard,
    Incorrect,
}

impl AnswerResult {
    pub const ALL: [AnswerResult; 4] = [
        AnswerResult::Easy,
        AnswerResult::Correct,
        AnswerResult::Hard,
        AnswerResult::Incorrect,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            AnswerResult::Easy => "easy",
            AnswerResult::Correct => "correct",
            AnswerResult::Hard => "hard",
            AnswerResult::Incorrect => "incorrect",
        }
    }

    fn mastery_delta(self) -> i16 {
        match self {
            AnswerResult::Easy => 15,
            AnswerResult::Correct => 10,
            AnswerResult::Hard => 5,
            AnswerResult::Incorrect => -10,
        }
    }

    fn interval_days(self, tier: MasteryTier) -> u32 {
        use MasteryTier::*;
        match (self, tier) {
            (AnswerResult::Easy, Novice) => 2,
            (AnswerResult::Easy, Developing) => 4,
            (AnswerResult::Easy, Proficient) => 7,
            (AnswerResult::Easy, Mastered) => 14,
            (AnswerResult::Correct, Novice) => 1,
            (AnswerResult::Correct, Developing) => 3,
            (AnswerResult::Correct, Proficient) => 5,
            (AnswerResult::Correct, Mastered) => 10,
            (AnswerResult::Hard, _) => 1,
            (AnswerResult::Incorrect, _) => 0,
        }
    }
}

impl core::fmt::Display for AnswerResult {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AnswerResult {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "easy" => Ok(AnswerResult::Easy),
            "correct" => Ok(AnswerResult::Correct),
            "hard" => Ok(AnswerResult::Hard),
            "incorrect" => Ok(AnswerResult::Incorrect),
            other => Err(DomainError::validation(format!("unknown answer result: {other}"))),
        }
    }
}

/// Outcome of a scheduled answer: new mastery plus the review interval.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct MasteryUpdate {
    pub result: AnswerResult,
    pub previous_mastery: Mastery,
    pub new_mastery: Mastery,
    /// Days until the card is due again (0 = due immediately).
    pub interval_days: u32,
}

impl MasteryUpdate {
    pub fn next_review_at(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        now + Duration::days(i64::from(self.interval_days))
    }
}

/// Apply the mastery rules to an answer.
pub fn record_answer(result: AnswerResult, previous_mastery: Mastery) -> MasteryUpdate {
    MasteryUpdate {
        result,
        previous_mastery,
        new_mastery: previous_mastery.shifted(result.mastery_delta()),
        interval_days: result.interval_days(previous_mastery.tier()),
    }
}

/// An answer given in custom study mode: logged, but the schedule is untouched.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct CustomStudyAnswer {
    pub result: AnswerResult,
    pub mastery: Mastery,
}

impl CustomStudyAnswer {
    pub fn previous_mastery(&self) -> Mastery {
        self.mastery
    }

    pub fn new_mastery(&self) -> Mastery {
        self.mastery
    }
}

/// Record an answer given in custom study mode.
///
/// Mastery is pinned to its previous value and no review interval is produced.
pub fn record_custom_study_answer(result: AnswerResult, mastery: Mastery) -> CustomStudyAnswer {
    CustomStudyAnswer { result, mastery }
}

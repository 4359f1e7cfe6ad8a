//! Card selection policies for a study session.

use core::cmp::Ordering;
use core::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use studyforge_core::DomainError;

use crate::card::Card;

/// How cards are picked and ordered for a study session.
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StudyAlgorithm {
    /// Due cards first (never-reviewed, then oldest due date), backfilled with
    /// not-yet-due cards.
    #[default]
    SpacedRepetition,
    /// Weakest cards first, due dates ignored.
    Leitner,
    /// Hardest difficulty label first.
    DifficultFirst,
    /// Newest cards first.
    Random,
}

impl StudyAlgorithm {
    pub fn as_str(self) -> &'static str {
        match self {
            StudyAlgorithm::SpacedRepetition => "spaced_repetition",
            StudyAlgorithm::Leitner => "leitner",
            StudyAlgorithm::DifficultFirst => "difficult_first",
            StudyAlgorithm::Random => "random",
        }
    }
}

impl core::fmt::Display for StudyAlgorithm {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for StudyAlgorithm {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "spaced_repetition" => Ok(StudyAlgorithm::SpacedRepetition),
            "leitner" => Ok(StudyAlgorithm::Leitner),
            "difficult_first" => Ok(StudyAlgorithm::DifficultFirst),
            "random" => Ok(StudyAlgorithm::Random),
            other => Err(DomainError::validation(format!("unknown study algorithm: {other}"))),
        }
    }
}

/// Pick up to `limit` cards from a deck, in presentation order.
///
/// Sorting is stable, so ties keep the order the cards were given in.
pub fn select_cards(
    cards: &[Card],
    algorithm: StudyAlgorithm,
    limit: usize,
    now: DateTime<Utc>,
) -> Vec<Card> {
    let mut ordered: Vec<Card> = cards.to_vec();

    match algorithm {
        StudyAlgorithm::SpacedRepetition => {
            let (mut due, mut later): (Vec<Card>, Vec<Card>) =
                ordered.into_iter().partition(|c| c.is_due(now));
            due.sort_by(|a, b| nulls_first(a.next_review_at, b.next_review_at));
            later.sort_by_key(|c| c.next_review_at);
            due.extend(later);
            ordered = due;
        }
        StudyAlgorithm::Leitner => ordered.sort_by_key(|c| c.mastery_level),
        StudyAlgorithm::DifficultFirst => {
            ordered.sort_by(|a, b| b.difficulty_label.cmp(&a.difficulty_label))
        }
        StudyAlgorithm::Random => ordered.sort_by(|a, b| b.created_at.cmp(&a.created_at)),
    }

    ordered.truncate(limit);
    ordered
}

fn nulls_first(a: Option<DateTime<Utc>>, b: Option<DateTime<Utc>>) -> Ordering {
    match (a, b) {
        (None, None) => Ordering::Equal,
        (None, Some(_)) => Ordering::Less,
        (Some(_), None) => Ordering::Greater,
        (Some(a), Some(b)) => a.cmp(&b),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::card::Difficulty;
    use crate::mastery::Mastery;
    use chrono::Duration;
    use studyforge_core::DeckId;

    fn card(deck: DeckId, created_at: DateTime<Utc>) -> Card {
        Card::new(deck, "front", "back", Difficulty::Medium, created_at)
    }

    fn due_in(mut c: Card, now: DateTime<Utc>, days: i64) -> Card {
        c.next_review_at = Some(now + Duration::days(days));
        c
    }

    #[test]
    fn spaced_repetition_puts_never_reviewed_first_then_oldest_due() {
        let now = Utc::now();
        let deck = DeckId::new();
        let overdue = due_in(card(deck, now), now, -3);
        let slightly_overdue = due_in(card(deck, now), now, -1);
        let fresh = card(deck, now);
        let future = due_in(card(deck, now), now, 5);

        let picked = select_cards(
            &[future.clone(), slightly_overdue.clone(), fresh.clone(), overdue.clone()],
            StudyAlgorithm::SpacedRepetition,
            10,
            now,
        );

        let ids: Vec<_> = picked.iter().map(|c| c.id).collect();
        assert_eq!(ids, vec![fresh.id, overdue.id, slightly_overdue.id, future.id]);
    }

    #[test]
    fn spaced_repetition_backfills_only_when_due_cards_run_out() {
        let now = Utc::now();
        let deck = DeckId::new();
        let due = card(deck, now);
        let soon = due_in(card(deck, now), now, 1);
        let later = due_in(card(deck, now), now, 9);

        let picked = select_cards(
            &[later.clone(), due.clone(), soon.clone()],
            StudyAlgorithm::SpacedRepetition,
            2,
            now,
        );

        assert_eq!(picked.len(), 2);
        assert_eq!(picked[0].id, due.id);
        assert_eq!(picked[1].id, soon.id);
    }

    #[test]
    fn leitner_orders_weakest_first_ignoring_due_dates() {
        let now = Utc::now();
        let deck = DeckId::new();
        let mut strong = card(deck, now);
        strong.mastery_level = Mastery::new(90).unwrap();
        let mut weak = due_in(card(deck, now), now, 30);
        weak.mastery_level = Mastery::new(5).unwrap();
        let mut middling = card(deck, now);
        middling.mastery_level = Mastery::new(50).unwrap();

        let picked = select_cards(
            &[strong.clone(), middling.clone(), weak.clone()],
            StudyAlgorithm::Leitner,
            3,
            now,
        );

        let ids: Vec<_> = picked.iter().map(|c| c.id).collect();
        assert_eq!(ids, vec![weak.id, middling.id, strong.id]);
    }

    #[test]
    fn difficult_first_orders_by_label_descending() {
        let now = Utc::now();
        let deck = DeckId::new();
        let mut easy = card(deck, now);
        easy.difficulty_label = Difficulty::Easy;
        let mut hard = card(deck, now);
        hard.difficulty_label = Difficulty::Hard;
        let medium = card(deck, now);

        let picked = select_cards(
            &[easy.clone(), medium.clone(), hard.clone()],
            StudyAlgorithm::DifficultFirst,
            3,
            now,
        );

        let labels: Vec<_> = picked.iter().map(|c| c.difficulty_label).collect();
        assert_eq!(labels, vec![Difficulty::Hard, Difficulty::Medium, Difficulty::Easy]);
    }

    #[test]
    fn random_orders_newest_first() {
        let now = Utc::now();
        let deck = DeckId::new();
        let old = card(deck, now - Duration::days(2));
        let new = card(deck, now);

        let picked = select_cards(&[old.clone(), new.clone()], StudyAlgorithm::Random, 1, now);
        assert_eq!(picked.len(), 1);
        assert_eq!(picked[0].id, new.id);
    }

    #[test]
    fn zero_limit_selects_nothing() {
        let now = Utc::now();
        let cards = vec![card(DeckId::new(), now)];
        assert!(select_cards(&cards, StudyAlgorithm::SpacedRepetition, 0, now).is_empty());
    }

    #[test]
    fn algorithm_names_round_trip() {
        for algorithm in [
            StudyAlgorithm::SpacedRepetition,
            StudyAlgorithm::Leitner,
            StudyAlgorithm::DifficultFirst,
            StudyAlgorithm::Random,
        ] {
            assert_eq!(algorithm.as_str().parse::<StudyAlgorithm>().unwrap(), algorithm);
        }
        assert_eq!(StudyAlgorithm::default(), StudyAlgorithm::SpacedRepetition);
    }

    mod proptest_tests {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #![proptest_config(ProptestConfig {
                cases: 500,
                ..ProptestConfig::default()
            })]

            /// Property: no future-due card is picked while a due card is left out.
            #[test]
            fn due_cards_win_over_future_cards(
                offsets in prop::collection::vec(prop::option::of(-10i64..10), 0..30),
                limit in 0usize..35,
            ) {
                let now = Utc::now();
                let deck = DeckId::new();
                let cards: Vec<Card> = offsets
                    .iter()
                    .map(|offset| {
                        let mut c = card(deck, now);
                        c.next_review_at = offset.map(|d| now + Duration::days(d));
                        c
                    })
                    .collect();

                let picked = select_cards(&cards, StudyAlgorithm::SpacedRepetition, limit, now);

                prop_assert_eq!(picked.len(), limit.min(cards.len()));
                if picked.iter().any(|c| !c.is_due(now)) {
                    let due_total = cards.iter().filter(|c| c.is_due(now)).count();
                    let due_picked = picked.iter().filter(|c| c.is_due(now)).count();
                    prop_assert_eq!(due_picked, due_total);
                }
            }
        }
    }
}

//! Extracting flashcards from raw completion output.
//!
//! Models wrap their answer in prose or code fences often enough that the
//! output is scanned for the first JSON array that decodes as a list of
//! `{front, back}` objects. Anything else in the text is ignored.

use serde::{Deserialize, Serialize};

use crate::completion::GenerationError;

/// A generated flashcard, before it is persisted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GeneratedCard {
    pub front: String,
    pub back: String,
}

#[derive(Debug, Deserialize)]
struct RawCard {
    #[serde(alias = "question")]
    front: String,
    #[serde(alias = "answer")]
    back: String,
}

/// Extract the cards from a completion.
///
/// Arrays that decode as cards but hold none after blank cards are dropped
/// are skipped. Returns a validation error when no array yields a card.
pub fn extract_cards(raw: &str) -> Result<Vec<GeneratedCard>, GenerationError> {
    let mut saw_empty = false;

    for (idx, _) in raw.match_indices('[') {
        let mut stream =
            serde_json::Deserializer::from_str(&raw[idx..]).into_iter::<Vec<RawCard>>();

        let Some(Ok(parsed)) = stream.next() else {
            continue;
        };

        let cards: Vec<GeneratedCard> = parsed
            .into_iter()
            .filter_map(|c| {
                let front = c.front.trim();
                let back = c.back.trim();
                (!front.is_empty() && !back.is_empty()).then(|| GeneratedCard {
                    front: front.to_string(),
                    back: back.to_string(),
                })
            })
            .collect();

        if cards.is_empty() {
            saw_empty = true;
            continue;
        }
        return Ok(cards);
    }

    if saw_empty {
        return Err(GenerationError::validation("completion contained no flashcards"));
    }
    Err(GenerationError::validation(
        "completion did not contain a JSON array of flashcards",
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_a_bare_array() {
        let raw = r#"[{"front":"Q1","back":"A1"},{"front":"Q2","back":"A2"}]"#;
        let cards = extract_cards(raw).unwrap();
        assert_eq!(cards.len(), 2);
        assert_eq!(cards[0].front, "Q1");
        assert_eq!(cards[1].back, "A2");
    }

    #[test]
    fn tolerates_prose_and_code_fences() {
        let raw = concat!(
            "Sure! Here are your cards:\n```json\n[\n",
            "  {\"front\": \"What filters blood?\", \"back\": \"The glomerulus\"}\n",
            "]\n```\nGood luck [and have fun].",
        );
        let cards = extract_cards(raw).unwrap();
        assert_eq!(
            cards,
            vec![GeneratedCard {
                front: "What filters blood?".into(),
                back: "The glomerulus".into()
            }]
        );
    }

    #[test]
    fn skips_arrays_that_are_not_cards() {
        let raw = r#"Topics: ["a", "b"]. Cards: [{"question": "Q", "answer": "A"}]"#;
        let cards = extract_cards(raw).unwrap();
        assert_eq!(cards.len(), 1);
        assert_eq!(cards[0].front, "Q");
    }

    #[test]
    fn rejects_non_json_output() {
        let err = extract_cards("I'm sorry, I can't help with that.").unwrap_err();
        assert!(matches!(err, GenerationError::Validation(_)));
        assert!(!err.is_transient());
    }

    #[test]
    fn rejects_empty_and_blank_arrays() {
        assert!(extract_cards("[]").is_err());
        assert!(extract_cards(r#"[{"front":"  ","back":"A"}]"#).is_err());
    }

    #[test]
    fn empty_arrays_before_the_cards_are_skipped() {
        let raw = concat!(
            r#"Previous attempt: []. Blank: [{"front":" ","back":"x"}]. "#,
            r#"Cards: [{"front":"Q","back":"A"}]"#,
        );
        let cards = extract_cards(raw).unwrap();
        assert_eq!(cards.len(), 1);
        assert_eq!(cards[0].back, "A");
    }

    #[test]
    fn drops_blank_cards_but_keeps_order() {
        let raw = r#"[{"front":"1","back":"a"},{"front":"","back":"x"},{"front":"2","back":"b"}]"#;
        let fronts: Vec<_> = extract_cards(raw).unwrap().into_iter().map(|c| c.front).collect();
        assert_eq!(fronts, vec!["1", "2"]);
    }
}

//! Generation requests and the deterministic prompt built from them.

use serde::{Deserialize, Serialize};

use studyforge_study::Difficulty;

use crate::completion::{CompletionRequest, GenerationError};

/// Upper bound on cards requested by a single job.
pub const MAX_CARDS_PER_JOB: u32 = 50;

/// Document text beyond this many characters is not sent to the model.
pub const MAX_SOURCE_CHARS: usize = 12_000;

/// Where the generation material comes from.
///
/// This is a closed set: payloads naming any other kind fail to deserialize.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobKind {
    /// Free text pasted by the user.
    Text,
    /// Text extracted from an uploaded document.
    Document,
    /// A topic to write cards about.
    Theme,
}

impl JobKind {
    pub fn as_str(self) -> &'static str {
        match self {
            JobKind::Text => "text",
            JobKind::Document => "document",
            JobKind::Theme => "theme",
        }
    }
}

impl core::fmt::Display for JobKind {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What to generate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenerationRequest {
    pub kind: JobKind,
    pub prompt: String,
    pub source_text: Option<String>,
    pub card_count: u32,
    pub difficulty: Difficulty,
}

impl GenerationRequest {
    pub fn validate(&self) -> Result<(), GenerationError> {
        if self.prompt.trim().is_empty() {
            return Err(GenerationError::invalid_request("prompt must not be empty"));
        }
        if self.card_count == 0 || self.card_count > MAX_CARDS_PER_JOB {
            return Err(GenerationError::invalid_request(format!(
                "card count must be within 1..={MAX_CARDS_PER_JOB} (got {})",
                self.card_count
            )));
        }
        if self.kind == JobKind::Document
            && self.source_text.as_deref().is_none_or(|s| s.trim().is_empty())
        {
            return Err(GenerationError::invalid_request(
                "document jobs require extracted source text",
            ));
        }
        Ok(())
    }

    pub fn system_instructions(&self) -> String {
        let guidance = match self.difficulty {
            Difficulty::Easy => {
                "Focus on core definitions and basic facts. Keep answers short and direct."
            }
            Difficulty::Medium => {
                "Mix definitions with questions that require understanding \
                 relationships between concepts."
            }
            Difficulty::Hard => {
                "Ask about mechanisms, edge cases and applications. \
                 Answers may need a few sentences of reasoning."
            }
        };

        format!(
            "You are an expert educator who writes study flashcards.\n\
             Create exactly {count} flashcards at {difficulty} difficulty.\n\
             {guidance}\n\
             Each flashcard has a \"front\" (a question or prompt) and a \"back\" (the answer).\n\
             Respond only with a JSON array of objects with the keys \"front\" and \"back\". \
             Do not add any text before or after the array.",
            count = self.card_count,
            difficulty = self.difficulty,
        )
    }

    pub fn user_content(&self) -> String {
        let prompt = self.prompt.trim();
        match self.kind {
            JobKind::Theme => format!("Topic: {prompt}"),
            JobKind::Text => match self.source_text.as_deref().map(str::trim) {
                Some(source) if !source.is_empty() => {
                    format!("{prompt}\n\nNotes:\n{}", truncate_chars(source, MAX_SOURCE_CHARS))
                }
                _ => format!("Notes:\n{prompt}"),
            },
            JobKind::Document => {
                let source = self.source_text.as_deref().map(str::trim).unwrap_or_default();
                format!(
                    "Focus: {prompt}\n\nDocument excerpt:\n{}",
                    truncate_chars(source, MAX_SOURCE_CHARS)
                )
            }
        }
    }

    pub fn to_completion(&self, max_tokens: u32, temperature: f32) -> CompletionRequest {
        CompletionRequest {
            system_instructions: self.system_instructions(),
            user_content: self.user_content(),
            max_tokens,
            temperature,
        }
    }
}

fn truncate_chars(s: &str, max: usize) -> &str {
    match s.char_indices().nth(max) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn theme(count: u32) -> GenerationRequest {
        GenerationRequest {
            kind: JobKind::Theme,
            prompt: "renal physiology".into(),
            source_text: None,
            card_count: count,
            difficulty: Difficulty::Medium,
        }
    }

    #[test]
    fn system_prompt_is_deterministic_and_parameterized() {
        let a = theme(10).system_instructions();
        let b = theme(10).system_instructions();
        assert_eq!(a, b);
        assert!(a.contains("exactly 10 flashcards"));
        assert!(a.contains("medium difficulty"));
        assert_ne!(a, theme(5).system_instructions());
    }

    #[test]
    fn card_count_bounds_are_enforced() {
        assert!(theme(0).validate().is_err());
        assert!(theme(MAX_CARDS_PER_JOB + 1).validate().is_err());
        assert!(theme(MAX_CARDS_PER_JOB).validate().is_ok());
    }

    #[test]
    fn document_jobs_need_source_text() {
        let mut request = theme(5);
        request.kind = JobKind::Document;
        assert!(request.validate().is_err());

        request.source_text = Some("   ".into());
        assert!(request.validate().is_err());

        request.source_text = Some("The nephron is the functional unit.".into());
        assert!(request.validate().is_ok());
        assert!(request.user_content().contains("functional unit"));
    }

    #[test]
    fn long_documents_are_truncated_on_char_boundaries() {
        let mut request = theme(5);
        request.kind = JobKind::Document;
        request.source_text = Some("é".repeat(MAX_SOURCE_CHARS + 100));

        let content = request.user_content();
        assert_eq!(content.matches('é').count(), MAX_SOURCE_CHARS);
    }

    #[test]
    fn unknown_kinds_do_not_deserialize() {
        assert!(serde_json::from_str::<JobKind>("\"theme\"").is_ok());
        assert!(serde_json::from_str::<JobKind>("\"video\"").is_err());
    }
}

use std::time::Duration;

use tracing::{info, instrument};

use crate::completion::{CompletionClient, GenerationError};
use crate::parse::{GeneratedCard, extract_cards};
use crate::prompt::GenerationRequest;
use crate::retry::{RetryPolicy, complete_with_retry};

/// Knobs for one generation call.
#[derive(Debug, Clone, PartialEq)]
pub struct GenerationSettings {
    pub max_tokens: u32,
    pub temperature: f32,
    /// Bound on each individual completion call.
    pub call_timeout: Duration,
    pub retry: RetryPolicy,
}

impl Default for GenerationSettings {
    fn default() -> Self {
        Self {
            max_tokens: 4000,
            temperature: 0.7,
            call_timeout: Duration::from_secs(60),
            retry: RetryPolicy::default(),
        }
    }
}

impl GenerationSettings {
    /// Longest a single `generate` call can take: every attempt timing out
    /// plus every backoff pause.
    pub fn worst_case_duration(&self) -> Duration {
        self.call_timeout
            .saturating_mul(self.retry.max_retries.saturating_add(1))
            .saturating_add(self.retry.total_backoff())
    }
}

/// Produces validated flashcards from a [`GenerationRequest`].
#[derive(Debug, Clone)]
pub struct CardGenerator<C> {
    client: C,
    settings: GenerationSettings,
}

impl<C: CompletionClient> CardGenerator<C> {
    pub fn new(client: C, settings: GenerationSettings) -> Self {
        Self { client, settings }
    }

    pub fn client(&self) -> &C {
        &self.client
    }

    /// Generate cards for a request.
    ///
    /// Transient failures are retried inside this call. Output that holds no
    /// cards is a validation error and is never retried. Fewer cards than
    /// requested is accepted as-is; extra cards are dropped.
    #[instrument(
        skip(self, request),
        fields(kind = %request.kind, card_count = request.card_count),
        err
    )]
    pub async fn generate(
        &self,
        request: &GenerationRequest,
    ) -> Result<Vec<GeneratedCard>, GenerationError> {
        request.validate()?;

        let completion = request.to_completion(self.settings.max_tokens, self.settings.temperature);
        let raw = complete_with_retry(
            &self.client,
            &completion,
            &self.settings.retry,
            self.settings.call_timeout,
        )
        .await?;

        let mut cards = extract_cards(&raw)?;
        let requested = request.card_count as usize;
        if cards.len() < requested {
            info!(requested, received = cards.len(), "model under-delivered cards");
        }
        cards.truncate(requested);
        Ok(cards)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::prompt::JobKind;
    use crate::scripted::ScriptedCompletionClient;
    use studyforge_study::Difficulty;

    fn settings() -> GenerationSettings {
        GenerationSettings {
            retry: RetryPolicy::fixed(2, Duration::ZERO),
            ..GenerationSettings::default()
        }
    }

    fn request(count: u32) -> GenerationRequest {
        GenerationRequest {
            kind: JobKind::Theme,
            prompt: "renal physiology".into(),
            source_text: None,
            card_count: count,
            difficulty: Difficulty::Hard,
        }
    }

    fn cards_json(n: usize) -> String {
        let cards: Vec<_> = (0..n)
            .map(|i| serde_json::json!({"front": format!("Q{i}"), "back": format!("A{i}")}))
            .collect();
        serde_json::to_string(&cards).unwrap()
    }

    #[tokio::test]
    async fn generates_requested_cards() {
        let client = ScriptedCompletionClient::new().then_ok(cards_json(10));
        let generator = CardGenerator::new(client, settings());

        let cards = generator.generate(&request(10)).await.unwrap();

        assert_eq!(cards.len(), 10);
        let sent = generator.client().requests();
        assert_eq!(sent.len(), 1);
        assert!(sent[0].system_instructions.contains("exactly 10 flashcards"));
        assert_eq!(sent[0].max_tokens, 4000);
    }

    #[tokio::test]
    async fn under_delivery_is_partial_success() {
        let client = ScriptedCompletionClient::new().then_ok(cards_json(3));
        let generator = CardGenerator::new(client, settings());
        assert_eq!(generator.generate(&request(10)).await.unwrap().len(), 3);
    }

    #[tokio::test]
    async fn over_delivery_is_truncated() {
        let client = ScriptedCompletionClient::new().then_ok(cards_json(12));
        let generator = CardGenerator::new(client, settings());
        assert_eq!(generator.generate(&request(5)).await.unwrap().len(), 5);
    }

    #[tokio::test]
    async fn unparsable_output_fails_without_retry() {
        let client = ScriptedCompletionClient::new().then_ok("no cards today");
        let generator = CardGenerator::new(client, settings());

        let err = generator.generate(&request(5)).await.unwrap_err();

        assert!(matches!(err, GenerationError::Validation(_)));
        assert_eq!(generator.client().calls(), 1);
    }

    #[tokio::test]
    async fn invalid_requests_never_reach_the_model() {
        let client = ScriptedCompletionClient::new().then_ok(cards_json(1));
        let generator = CardGenerator::new(client, settings());

        let err = generator.generate(&request(0)).await.unwrap_err();

        assert!(matches!(err, GenerationError::InvalidRequest(_)));
        assert_eq!(generator.client().calls(), 0);
    }

    #[test]
    fn worst_case_covers_every_attempt_and_pause() {
        assert_eq!(
            GenerationSettings::default().worst_case_duration(),
            Duration::from_secs(247)
        );
        assert_eq!(settings().worst_case_duration(), Duration::from_secs(180));
    }
}

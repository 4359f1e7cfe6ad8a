//! Job processor: drains the generation queue and drives each job to a
//! terminal state.
//!
//! ## Per-message state machine
//!
//! 1. parse the payload; unparsable payloads are archived immediately, and
//!    payloads that parse but fail validation are marked `failed`, then archived
//! 2. upsert `processing` (a terminal row short-circuits: delete if
//!    completed, archive if failed, never call the model again)
//! 3. generate cards (transient errors retried inside the generator)
//! 4. write deck + cards atomically, then `completed`, then delete
//! 5. generation/validation errors write `failed`, then archive
//!
//! Any persistence error leaves the message alone; the visibility timeout
//! brings it back. The deck id mirrors the job id, so a redelivery after a
//! crash between steps 4 and 5 finds the persisted deck and completes from it.
//!
//! Messages of one batch run concurrently, so every message of a read is
//! resolved within a single job's worst-case generation time. The lease must
//! cover that time (see `AppConfig::from_lookup`). Duplicate copies of one job
//! inside a batch run after the first copy settles.

use std::collections::HashSet;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use chrono::Utc;
use futures_util::future::join_all;
use serde::Serialize;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, instrument, warn};

use studyforge_core::{DeckId, JobId};
use studyforge_generation::{CardGenerator, CompletionClient, GeneratedCard, GenerationSettings};
use studyforge_study::{Card, Deck};

use super::store::JobResultStore;
use super::types::{JobMessage, JobResult, JobResultPayload, JobStatus, Transition};
use crate::config::QueueConfig;
use crate::error::StoreError;
use crate::queue::{MessageId, MessageQueue, QueueError, QueueMessage};
use crate::study::DeckRepository;

/// What happened to one delivered message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MessageOutcome {
    /// Cards persisted, job completed, message deleted.
    Completed { job_id: JobId, card_count: usize },
    /// Job failed terminally, message archived.
    Failed { job_id: JobId, error: String },
    /// Payload could not be decoded, message archived.
    Malformed,
    /// The job was already terminal; the message was resolved without work.
    AlreadyResolved { job_id: JobId, status: JobStatus },
    /// A persistence step failed; the message will be redelivered.
    Unresolved { job_id: JobId },
}

/// Outcomes of one `drain_batch` call, in delivery order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BatchReport {
    pub outcomes: Vec<(MessageId, MessageOutcome)>,
}

impl BatchReport {
    pub fn len(&self) -> usize {
        self.outcomes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.outcomes.is_empty()
    }

    pub fn completed(&self) -> usize {
        self.count(|o| matches!(o, MessageOutcome::Completed { .. }))
    }

    pub fn failed(&self) -> usize {
        self.count(|o| matches!(o, MessageOutcome::Failed { .. }))
    }

    pub fn unresolved(&self) -> usize {
        self.count(|o| matches!(o, MessageOutcome::Unresolved { .. }))
    }

    fn count(&self, pred: impl Fn(&MessageOutcome) -> bool) -> usize {
        self.outcomes.iter().filter(|(_, o)| pred(o)).count()
    }
}

/// Loop settings for [`JobProcessor::spawn`].
#[derive(Debug, Clone)]
pub struct ProcessorConfig {
    /// Name for logging
    pub name: String,
    pub batch_size: usize,
    pub visibility_timeout: Duration,
    /// Sleep between polls when the queue is empty or unreadable
    pub poll_interval: Duration,
}

impl Default for ProcessorConfig {
    fn default() -> Self {
        Self::from_queue_config(&QueueConfig::default())
    }
}

impl ProcessorConfig {
    pub fn from_queue_config(queue: &QueueConfig) -> Self {
        Self {
            name: "flashcard-worker".to_string(),
            batch_size: queue.batch_size,
            visibility_timeout: queue.visibility_timeout,
            poll_interval: queue.poll_interval,
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }
}

/// Processor runtime statistics.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ProcessorStats {
    pub batches: u64,
    pub messages_read: u64,
    pub jobs_completed: u64,
    pub jobs_failed: u64,
    pub messages_malformed: u64,
    pub redeliveries_resolved: u64,
    pub messages_unresolved: u64,
    pub read_errors: u64,
    pub uptime_secs: u64,
}

impl ProcessorStats {
    fn absorb(&mut self, report: &BatchReport) {
        self.batches += 1;
        self.messages_read += report.len() as u64;
        for (_, outcome) in &report.outcomes {
            match outcome {
                MessageOutcome::Completed { .. } => self.jobs_completed += 1,
                MessageOutcome::Failed { .. } => self.jobs_failed += 1,
                MessageOutcome::Malformed => self.messages_malformed += 1,
                MessageOutcome::AlreadyResolved { .. } => self.redeliveries_resolved += 1,
                MessageOutcome::Unresolved { .. } => self.messages_unresolved += 1,
            }
        }
    }
}

/// Handle to control a running processor.
#[derive(Debug)]
pub struct ProcessorHandle {
    shutdown: watch::Sender<bool>,
    join: JoinHandle<()>,
    stats: Arc<Mutex<ProcessorStats>>,
}

impl ProcessorHandle {
    /// Request graceful shutdown, wait for the in-flight batch to finish and
    /// return the final statistics, that batch included.
    pub async fn shutdown(self) -> ProcessorStats {
        let _ = self.shutdown.send(true);
        if let Err(e) = self.join.await {
            error!(error = %e, "job processor task ended abnormally");
        }
        lock_stats(&self.stats).clone()
    }
}

fn lock_stats(stats: &Mutex<ProcessorStats>) -> std::sync::MutexGuard<'_, ProcessorStats> {
    stats.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

pub struct JobProcessor {
    queue: Arc<dyn MessageQueue>,
    results: Arc<dyn JobResultStore>,
    decks: Arc<dyn DeckRepository>,
    generator: CardGenerator<Arc<dyn CompletionClient>>,
    queue_name: String,
}

impl JobProcessor {
    pub fn new(
        queue: Arc<dyn MessageQueue>,
        results: Arc<dyn JobResultStore>,
        decks: Arc<dyn DeckRepository>,
        client: Arc<dyn CompletionClient>,
        settings: GenerationSettings,
        queue_name: impl Into<String>,
    ) -> Self {
        Self {
            queue,
            results,
            decks,
            generator: CardGenerator::new(client, settings),
            queue_name: queue_name.into(),
        }
    }

    /// Read up to `max_n` messages and drive each to an outcome.
    ///
    /// Only a failed read is an error; per-message failures are reported in
    /// the [`BatchReport`].
    #[instrument(skip(self), fields(queue = %self.queue_name), err)]
    pub async fn drain_batch(
        &self,
        max_n: usize,
        visibility_timeout: Duration,
    ) -> Result<BatchReport, QueueError> {
        let messages = self
            .queue
            .read(&self.queue_name, max_n, visibility_timeout)
            .await?;

        let mut seen = HashSet::new();
        let (mut first, mut repeats) = (Vec::new(), Vec::new());
        for (index, message) in messages.into_iter().enumerate() {
            let job_key = message.payload.get("id").and_then(|v| v.as_str()).map(str::to_owned);
            match job_key {
                Some(key) if !seen.insert(key.clone()) => repeats.push((index, message)),
                _ => first.push((index, message)),
            }
        }

        let mut outcomes = join_all(
            first
                .into_iter()
                .map(|(index, message)| self.process_indexed(index, message)),
        )
        .await;
        for (index, message) in repeats {
            outcomes.push(self.process_indexed(index, message).await);
        }
        outcomes.sort_by_key(|(index, _)| *index);

        Ok(BatchReport {
            outcomes: outcomes.into_iter().map(|(_, outcome)| outcome).collect(),
        })
    }

    async fn process_indexed(
        &self,
        index: usize,
        message: QueueMessage,
    ) -> (usize, (MessageId, MessageOutcome)) {
        let msg_id = message.msg_id;
        (index, (msg_id, self.process_message(message).await))
    }

    #[instrument(
        skip(self, message),
        fields(msg_id = %message.msg_id, read_count = message.read_count)
    )]
    async fn process_message(&self, message: QueueMessage) -> MessageOutcome {
        let job = match JobMessage::parse(&message.payload) {
            Ok(job) => job,
            Err(e) => {
                warn!(error = %e, "malformed job message; archiving");
                self.archive(message.msg_id).await;
                return MessageOutcome::Malformed;
            }
        };
        let job_id = job.id;

        if let Err(e) = job.validate() {
            return self.fail(message.msg_id, &job, e.to_string()).await;
        }

        match self.results.mark_processing(job_id, job.owner_id).await {
            Ok(Transition::Applied(_)) => {}
            Ok(Transition::AlreadyTerminal(row)) => {
                return self.resolve_redelivery(message.msg_id, &row).await;
            }
            Err(e) => {
                error!(%job_id, error = %e, "could not mark job processing");
                return MessageOutcome::Unresolved { job_id };
            }
        }

        let deck_id = DeckId::from_uuid(*job_id.as_uuid());
        let persisted = match self.persisted_cards(deck_id).await {
            Ok(persisted) => persisted,
            Err(e) => {
                error!(%job_id, error = %e, "could not check for an existing deck");
                return MessageOutcome::Unresolved { job_id };
            }
        };

        let cards = match persisted {
            Some(cards) => {
                info!(%job_id, %deck_id, "deck already persisted by an earlier delivery");
                cards
            }
            None => {
                let generated = match self.generator.generate(&job.generation_request()).await {
                    Ok(cards) => cards,
                    Err(e) => return self.fail(message.msg_id, &job, e.to_string()).await,
                };
                if let Err(e) = self.persist_deck(deck_id, &job, &generated).await {
                    error!(%job_id, error = %e, "could not persist generated deck");
                    return MessageOutcome::Unresolved { job_id };
                }
                generated
            }
        };

        let card_count = cards.len();
        let payload = JobResultPayload::new(deck_id, cards);
        match self.results.mark_completed(job_id, job.owner_id, payload).await {
            Ok(Transition::Applied(_)) => {}
            Ok(Transition::AlreadyTerminal(row)) => {
                return self.resolve_redelivery(message.msg_id, &row).await;
            }
            Err(e) => {
                error!(%job_id, error = %e, "could not mark job completed");
                return MessageOutcome::Unresolved { job_id };
            }
        }

        self.delete(message.msg_id).await;
        info!(%job_id, %deck_id, card_count, "generation job completed");
        MessageOutcome::Completed { job_id, card_count }
    }

    async fn fail(&self, msg_id: MessageId, job: &JobMessage, error: String) -> MessageOutcome {
        let job_id = job.id;
        warn!(%job_id, %error, "generation job failed");

        match self.results.mark_failed(job_id, job.owner_id, error.clone()).await {
            Ok(Transition::Applied(_)) => {
                self.archive(msg_id).await;
                MessageOutcome::Failed { job_id, error }
            }
            Ok(Transition::AlreadyTerminal(row)) => self.resolve_redelivery(msg_id, &row).await,
            Err(e) => {
                error!(%job_id, error = %e, "could not mark job failed");
                MessageOutcome::Unresolved { job_id }
            }
        }
    }

    async fn resolve_redelivery(&self, msg_id: MessageId, row: &JobResult) -> MessageOutcome {
        debug!(
            job_id = %row.job_id,
            status = %row.status,
            "job already terminal; resolving message"
        );
        match row.status {
            JobStatus::Completed => self.delete(msg_id).await,
            _ => self.archive(msg_id).await,
        }
        MessageOutcome::AlreadyResolved {
            job_id: row.job_id,
            status: row.status,
        }
    }

    async fn persisted_cards(
        &self,
        deck_id: DeckId,
    ) -> Result<Option<Vec<GeneratedCard>>, StoreError> {
        if self.decks.get_deck(deck_id).await?.is_none() {
            return Ok(None);
        }
        let cards = self
            .decks
            .list_cards(deck_id)
            .await?
            .into_iter()
            .map(|c| GeneratedCard {
                front: c.front,
                back: c.back,
            })
            .collect();
        Ok(Some(cards))
    }

    async fn persist_deck(
        &self,
        deck_id: DeckId,
        job: &JobMessage,
        generated: &[GeneratedCard],
    ) -> Result<(), StoreError> {
        let now = Utc::now();
        let deck = Deck {
            id: deck_id,
            owner_id: job.owner_id,
            name: job.target_collection_name.trim().to_string(),
            description: Some(format!(
                "{} {} cards generated from {}",
                generated.len(),
                job.difficulty,
                job.kind
            )),
            color: job.display_color.clone(),
            is_public: false,
            created_at: now,
        };
        let cards: Vec<Card> = generated
            .iter()
            .map(|g| Card::new(deck_id, g.front.clone(), g.back.clone(), job.difficulty, now))
            .collect();

        self.decks.insert_deck_with_cards(&deck, &cards).await
    }

    async fn delete(&self, msg_id: MessageId) {
        if let Err(e) = self.queue.delete(&self.queue_name, msg_id).await {
            warn!(%msg_id, error = %e, "failed to delete message; it will be redelivered");
        }
    }

    async fn archive(&self, msg_id: MessageId) {
        if let Err(e) = self.queue.archive(&self.queue_name, msg_id).await {
            warn!(%msg_id, error = %e, "failed to archive message; it will be redelivered");
        }
    }

    /// Run `drain_batch` in a loop on a tokio task until shut down.
    pub fn spawn(self, config: ProcessorConfig) -> ProcessorHandle {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let stats = Arc::new(Mutex::new(ProcessorStats::default()));
        let join = tokio::spawn(processor_loop(self, config, shutdown_rx, stats.clone()));

        ProcessorHandle {
            shutdown: shutdown_tx,
            join,
            stats,
        }
    }
}

async fn processor_loop(
    processor: JobProcessor,
    config: ProcessorConfig,
    mut shutdown_rx: watch::Receiver<bool>,
    stats: Arc<Mutex<ProcessorStats>>,
) {
    info!(processor = %config.name, queue = %processor.queue_name, "job processor started");
    let start_time = Instant::now();

    loop {
        if *shutdown_rx.borrow() {
            break;
        }

        let idle = match processor
            .drain_batch(config.batch_size, config.visibility_timeout)
            .await
        {
            Ok(report) => {
                let mut s = lock_stats(&stats);
                s.absorb(&report);
                s.uptime_secs = start_time.elapsed().as_secs();
                report.is_empty()
            }
            Err(e) => {
                error!(processor = %config.name, error = %e, "failed to read from queue");
                lock_stats(&stats).read_errors += 1;
                true
            }
        };

        if idle {
            tokio::select! {
                changed = shutdown_rx.changed() => {
                    if changed.is_err() {
                        break;
                    }
                }
                _ = tokio::time::sleep(config.poll_interval) => {}
            }
        }
    }

    info!(processor = %config.name, "job processor stopped");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::jobs::store::InMemoryJobResultStore;
    use crate::queue::InMemoryQueue;
    use crate::study::InMemoryDeckRepository;
    use studyforge_core::UserId;
    use studyforge_generation::{GenerationError, JobKind, RetryPolicy, ScriptedCompletionClient};
    use studyforge_study::Difficulty;

    const Q: &str = "flashcard_generation";
    const VT: Duration = Duration::from_secs(300);

    struct Harness {
        processor: JobProcessor,
        queue: Arc<InMemoryQueue>,
        results: Arc<InMemoryJobResultStore>,
        decks: Arc<InMemoryDeckRepository>,
        client: Arc<ScriptedCompletionClient>,
    }

    impl Harness {
        /// Another worker over the same queue, stores and model.
        fn second_worker(&self) -> JobProcessor {
            worker(&self.queue, &self.results, &self.decks, &self.client)
        }
    }

    fn worker(
        queue: &Arc<InMemoryQueue>,
        results: &Arc<InMemoryJobResultStore>,
        decks: &Arc<InMemoryDeckRepository>,
        client: &Arc<ScriptedCompletionClient>,
    ) -> JobProcessor {
        let settings = GenerationSettings {
            retry: RetryPolicy::fixed(2, Duration::ZERO),
            ..GenerationSettings::default()
        };
        JobProcessor::new(
            queue.clone(),
            results.clone(),
            decks.clone(),
            client.clone(),
            settings,
            Q,
        )
    }

    fn harness(client: ScriptedCompletionClient) -> Harness {
        let queue = Arc::new(InMemoryQueue::new());
        let results = InMemoryJobResultStore::arc();
        let decks = Arc::new(InMemoryDeckRepository::new());
        let client = Arc::new(client);
        Harness {
            processor: worker(&queue, &results, &decks, &client),
            queue,
            results,
            decks,
            client,
        }
    }

    fn job(count: u32) -> JobMessage {
        JobMessage {
            id: JobId::new(),
            owner_id: UserId::new(),
            kind: JobKind::Theme,
            generation_prompt: "renal physiology".into(),
            source_text: None,
            target_collection_name: "Renal".into(),
            requested_card_count: count,
            difficulty: Difficulty::Medium,
            display_color: None,
            created_at: Utc::now(),
        }
    }

    fn cards_json(n: usize) -> String {
        let cards: Vec<_> = (0..n)
            .map(|i| serde_json::json!({"front": format!("Q{i}"), "back": format!("A{i}")}))
            .collect();
        serde_json::to_string(&cards).unwrap()
    }

    async fn enqueue(h: &Harness, job: &JobMessage) {
        h.queue.enqueue(Q, job.to_payload().unwrap()).await.unwrap();
    }

    #[tokio::test]
    async fn successful_job_persists_deck_and_deletes_message() {
        let h = harness(ScriptedCompletionClient::new().then_ok(cards_json(4)));
        let job = job(4);
        enqueue(&h, &job).await;

        let report = h.processor.drain_batch(5, VT).await.unwrap();

        assert_eq!(report.completed(), 1);
        let row = h.results.get(job.id).await.unwrap().unwrap();
        assert_eq!(row.status, JobStatus::Completed);
        let payload = row.result_payload.unwrap();
        assert_eq!(payload.count, 4);

        let deck = h.decks.get_deck(payload.collection_id).await.unwrap().unwrap();
        assert_eq!(deck.name, "Renal");
        assert_eq!(deck.owner_id, job.owner_id);
        let cards = h.decks.list_cards(deck.id).await.unwrap();
        assert_eq!(cards.len(), 4);
        assert!(cards.iter().all(|c| c.difficulty_label == Difficulty::Medium));

        assert_eq!(h.queue.live_len(Q), 0);
        assert!(h.queue.archived(Q).is_empty());
    }

    #[tokio::test]
    async fn rejected_completion_fails_and_archives() {
        let h = harness(ScriptedCompletionClient::new().then_err(GenerationError::Rejected {
            status: 401,
            message: "bad key".into(),
        }));
        let job = job(3);
        enqueue(&h, &job).await;

        let report = h.processor.drain_batch(5, VT).await.unwrap();

        assert_eq!(report.failed(), 1);
        let row = h.results.get(job.id).await.unwrap().unwrap();
        assert_eq!(row.status, JobStatus::Failed);
        assert!(row.error_message.unwrap().contains("401"));
        assert_eq!(h.queue.archived(Q).len(), 1);
        assert_eq!(h.client.calls(), 1);
    }

    #[tokio::test]
    async fn exhausted_transient_errors_fail_the_job() {
        let h = harness(
            ScriptedCompletionClient::new().then_err(GenerationError::Transient("503".into())),
        );
        let job = job(3);
        enqueue(&h, &job).await;

        let report = h.processor.drain_batch(5, VT).await.unwrap();

        assert_eq!(report.failed(), 1);
        assert_eq!(h.client.calls(), 3);
        assert_eq!(h.queue.archived(Q).len(), 1);
    }

    #[tokio::test]
    async fn crash_after_deck_write_completes_from_persisted_deck() {
        let h = harness(ScriptedCompletionClient::new().then_ok(cards_json(2)));
        let job = job(2);
        let deck_id = DeckId::from_uuid(*job.id.as_uuid());
        let now = Utc::now();
        let deck = Deck {
            id: deck_id,
            owner_id: job.owner_id,
            name: "Renal".into(),
            description: None,
            color: None,
            is_public: false,
            created_at: now,
        };
        let cards = vec![
            Card::new(deck_id, "kept 1", "a", Difficulty::Medium, now),
            Card::new(deck_id, "kept 2", "b", Difficulty::Medium, now),
        ];
        h.decks.insert_deck_with_cards(&deck, &cards).await.unwrap();
        enqueue(&h, &job).await;

        let report = h.processor.drain_batch(5, VT).await.unwrap();

        assert_eq!(report.completed(), 1);
        assert_eq!(h.client.calls(), 0);
        assert_eq!(h.decks.deck_count(), 1);
        let payload = h.results.get(job.id).await.unwrap().unwrap().result_payload.unwrap();
        assert_eq!(payload.count, 2);
        assert!(payload.cards.iter().all(|c| c.front.starts_with("kept")));
    }

    #[tokio::test]
    async fn failed_redelivery_is_archived_without_model_call() {
        let h = harness(ScriptedCompletionClient::new().then_ok(cards_json(2)));
        let job = job(2);
        h.results.mark_failed(job.id, job.owner_id, "earlier".into()).await.unwrap();
        enqueue(&h, &job).await;

        let report = h.processor.drain_batch(5, VT).await.unwrap();

        assert_eq!(
            report.outcomes[0].1,
            MessageOutcome::AlreadyResolved {
                job_id: job.id,
                status: JobStatus::Failed
            }
        );
        assert_eq!(h.client.calls(), 0);
        assert_eq!(h.queue.archived(Q).len(), 1);
    }

    #[tokio::test]
    async fn invalid_job_is_failed_and_archived() {
        let h = harness(ScriptedCompletionClient::new().then_ok(cards_json(1)));
        let job = job(0);
        enqueue(&h, &job).await;

        let report = h.processor.drain_batch(5, VT).await.unwrap();

        assert_eq!(report.failed(), 1);
        let row = h.results.get(job.id).await.unwrap().unwrap();
        assert_eq!(row.status, JobStatus::Failed);
        assert!(row.error_message.is_some());
        assert_eq!(h.queue.archived(Q).len(), 1);
        assert_eq!(h.client.calls(), 0);
    }

    #[tokio::test]
    async fn batch_finishes_before_its_lease_lapses() {
        let h = harness(
            ScriptedCompletionClient::new()
                .with_delay(Duration::from_millis(300))
                .then_ok(cards_json(1)),
        );
        let (a, b) = (job(1), job(1));
        enqueue(&h, &a).await;
        enqueue(&h, &b).await;
        let other = h.second_worker();
        let lease = Duration::from_millis(400);

        let (first, second) = tokio::join!(h.processor.drain_batch(2, lease), async {
            tokio::time::sleep(Duration::from_millis(450)).await;
            other.drain_batch(2, lease).await
        });

        assert_eq!(first.unwrap().completed(), 2);
        assert!(second.unwrap().is_empty());
        assert_eq!(h.client.calls(), 2);
        assert_eq!(h.decks.deck_count(), 2);
    }

    #[tokio::test]
    async fn duplicate_copies_in_one_batch_call_the_model_once() {
        let h = harness(
            ScriptedCompletionClient::new()
                .with_delay(Duration::from_millis(20))
                .then_ok(cards_json(2)),
        );
        let job = job(2);
        enqueue(&h, &job).await;
        enqueue(&h, &job).await;

        let report = h.processor.drain_batch(5, VT).await.unwrap();

        assert_eq!(report.completed(), 1);
        assert!(matches!(
            report.outcomes[1].1,
            MessageOutcome::AlreadyResolved {
                status: JobStatus::Completed,
                ..
            }
        ));
        assert_eq!(h.client.calls(), 1);
        assert_eq!(h.queue.live_len(Q), 0);
    }

    #[tokio::test]
    async fn spawned_processor_drains_and_shuts_down() {
        let h = harness(ScriptedCompletionClient::new().then_ok(cards_json(1)));
        let job = job(1);
        enqueue(&h, &job).await;

        let config = ProcessorConfig {
            poll_interval: Duration::from_millis(10),
            ..ProcessorConfig::default()
        }
        .with_name("test-worker");
        let results = h.results.clone();
        let handle = h.processor.spawn(config);

        let mut completed = false;
        for _ in 0..100 {
            if let Some(row) = results.get(job.id).await.unwrap() {
                if row.status == JobStatus::Completed {
                    completed = true;
                    break;
                }
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }

        let stats = handle.shutdown().await;

        assert!(completed);
        assert_eq!(stats.jobs_completed, 1);
    }
}

use std::sync::Arc;

use anyhow::Context;
use sqlx::postgres::PgPoolOptions;

use studyforge_generation::HttpCompletionClient;
use studyforge_infra::jobs::{JobProcessor, PostgresJobResultStore, ProcessorConfig};
use studyforge_infra::queue::PgmqQueue;
use studyforge_infra::study::PostgresDeckRepository;
use studyforge_infra::{AppConfig, apply_schema};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    studyforge_observability::init();

    let config = AppConfig::from_env().context("invalid configuration")?;

    let pool = PgPoolOptions::new()
        .max_connections(10)
        .connect(&config.database_url)
        .await
        .context("failed to connect to Postgres")?;

    apply_schema(&pool).await.context("failed to apply schema")?;

    let queue = PgmqQueue::new(pool.clone());
    queue
        .ensure_queue(&config.queue.queue_name)
        .await
        .context("failed to create queue")?;

    let client = HttpCompletionClient::new(config.completion.http())
        .context("failed to build completion client")?;

    let processor = JobProcessor::new(
        Arc::new(queue),
        Arc::new(PostgresJobResultStore::new(pool.clone())),
        Arc::new(PostgresDeckRepository::new(pool)),
        Arc::new(client),
        config.completion.generation_settings(),
        config.queue.queue_name.clone(),
    );

    let handle = processor.spawn(ProcessorConfig::from_queue_config(&config.queue));
    tracing::info!(
        queue = %config.queue.queue_name,
        batch_size = config.queue.batch_size,
        model = %config.completion.model,
        "worker running"
    );

    tokio::signal::ctrl_c()
        .await
        .context("failed to listen for shutdown signal")?;

    tracing::info!("shutdown requested");
    let stats = handle.shutdown().await;
    tracing::info!(
        jobs_completed = stats.jobs_completed,
        jobs_failed = stats.jobs_failed,
        "worker stopped"
    );
    Ok(())
}

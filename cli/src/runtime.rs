//! Process wiring shared by every command: tracing, metrics, the store, the
//! queue and execution guard, the collaborators and the coordinator.

use crate::ux_error;
use adapters::{
    HttpCalendarClient, HttpContentExtractor, HttpFrameSampler, LlmSummarizer, LogNotifier,
    OpenAiLlmClient, OpenAiVisionClient, RecordingNotifier, StoreReminderScheduler,
    StoreSemanticMemory, WebhookNotifier,
};
use anyhow::Result;
use config::{Config, ObservabilityConfig, QueueMode, StorageBackendKind};
use pipeline::{
    Collaborators, Coordinator, DispatchMode, Dispatcher, DrainReport, ReminderSweeper,
    TaskSupervisor, build_coordinator,
};
use stash_core::jobs::RetryPolicy;
use stash_core::traits::{ExecutionGuard, LlmClient, Notifier, PipelineStore};
use std::sync::Arc;
use std::time::Duration;
use storage::{InMemoryStore, InProcessGuard, PostgresStore, RedisJobQueue, RedisStorage};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

/// `RUST_LOG` wins over the configured level. Logs go to stderr so command
/// output on stdout stays machine-readable.
pub fn init_tracing(observability: &ObservabilityConfig) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&observability.log_level));
    let registry = tracing_subscriber::registry().with(filter);
    if observability.json_logs {
        registry
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        registry.with(fmt::layer().with_writer(std::io::stderr)).init();
    }
}

pub fn init_metrics(observability: &ObservabilityConfig) -> Result<()> {
    if !observability.metrics_enabled {
        return Ok(());
    }
    metrics_exporter_prometheus::PrometheusBuilder::new()
        .with_http_listener(([0, 0, 0, 0], observability.metrics_port))
        .install()?;
    tracing::info!(port = observability.metrics_port, "Prometheus exporter listening");
    Ok(())
}

/// Everything a command needs to run captures.
pub struct Runtime {
    pub config: Config,
    pub store: Arc<dyn PipelineStore>,
    pub queue: Option<Arc<RedisJobQueue>>,
    pub coordinator: Arc<Coordinator>,
    pub supervisor: TaskSupervisor,
    pub notifier: Arc<dyn Notifier>,
    pub scheduler: Arc<StoreReminderScheduler>,
}

impl Runtime {
    pub async fn build(config: Config) -> Result<Self> {
        let (guard, queue) = connect_queue(&config).await?;
        match config.storage.backend {
            StorageBackendKind::Memory => {
                tracing::info!("Using in-memory store");
                Ok(assemble(config, Arc::new(InMemoryStore::new()), guard, queue))
            }
            StorageBackendKind::Postgres => {
                let url = config
                    .storage
                    .postgres_url
                    .clone()
                    .ok_or_else(|| ux_error::config_error("postgres_backend_requires_url"))?;
                let store = PostgresStore::with_pool_size(&url, config.storage.pool_size)
                    .await
                    .map_err(|e| ux_error::postgres_unreachable(&e.to_string()))?;
                store
                    .initialize_schema()
                    .await
                    .map_err(|e| ux_error::postgres_unreachable(&e.to_string()))?;
                tracing::info!("Using PostgreSQL store");
                Ok(assemble(config, Arc::new(store), guard, queue))
            }
        }
    }

    pub fn dispatcher(&self) -> Dispatcher {
        let mode = match &self.queue {
            Some(queue) => DispatchMode::QueueBacked(queue.clone()),
            None => DispatchMode::InProcess,
        };
        Dispatcher::new(mode, self.coordinator.clone(), self.supervisor.clone())
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_attempts: self.config.queue.max_attempts,
            initial_backoff_ms: self.config.queue.initial_backoff_ms,
            max_backoff_ms: self.config.queue.max_backoff_ms,
        }
    }

    pub fn reminder_sweeper(&self) -> ReminderSweeper {
        ReminderSweeper::new(
            self.store.clone(),
            self.notifier.clone(),
            self.config.reminders.clone(),
        )
        .with_scheduler(self.scheduler.clone())
    }

    pub fn grace_period(&self) -> Duration {
        Duration::from_secs(self.config.shutdown.grace_period_seconds)
    }

    /// Cancels and drains supervised tasks within the grace period.
    pub async fn shutdown(&self) -> DrainReport {
        self.supervisor.shutdown(self.grace_period()).await
    }
}

async fn connect_queue(
    config: &Config,
) -> Result<(Arc<dyn ExecutionGuard>, Option<Arc<RedisJobQueue>>)> {
    if config.queue.mode == QueueMode::InProcess {
        return Ok((Arc::new(InProcessGuard::new()), None));
    }
    let url = config
        .queue
        .redis_url
        .as_deref()
        .ok_or_else(|| ux_error::config_error("queue_mode_requires_redis_url"))?;

    let connected = match RedisStorage::new(url).await {
        Ok(redis) => redis.ping().await.map(|()| redis),
        Err(e) => Err(e),
    };
    match connected {
        Ok(redis) => {
            let queue = RedisJobQueue::new(&redis, &config.queue.queue_name);
            tracing::info!(queue = %config.queue.queue_name, "Using Redis job queue");
            Ok((Arc::new(redis), Some(Arc::new(queue))))
        }
        Err(e) if config.queue.fallback_to_in_process => {
            tracing::warn!(error = %e, "Redis unreachable, falling back to in-process dispatch");
            Ok((Arc::new(InProcessGuard::new()), None))
        }
        Err(e) => Err(ux_error::redis_unreachable(&e.to_string()).into()),
    }
}

fn assemble<S: PipelineStore + 'static>(
    config: Config,
    store: Arc<S>,
    guard: Arc<dyn ExecutionGuard>,
    queue: Option<Arc<RedisJobQueue>>,
) -> Runtime {
    let supervisor = TaskSupervisor::new();
    let scheduler = Arc::new(StoreReminderScheduler::new());
    let collaborators = collaborators(&config, &store, scheduler.clone());
    let notifier = collaborators.notifier.clone();
    let store: Arc<dyn PipelineStore> = store;
    let coordinator = Arc::new(build_coordinator(
        &config,
        store.clone(),
        guard,
        &collaborators,
        supervisor.clone(),
    ));
    Runtime {
        config,
        store,
        queue,
        coordinator,
        supervisor,
        notifier,
        scheduler,
    }
}

fn collaborators<S: PipelineStore + 'static>(
    config: &Config,
    store: &Arc<S>,
    scheduler: Arc<StoreReminderScheduler>,
) -> Collaborators {
    let timeout = Duration::from_millis(config.collaborators.timeout_ms);
    let llm: Arc<dyn LlmClient> = Arc::new(OpenAiLlmClient::from_config(
        &config.llm,
        &config.collaborators,
    ));
    let delivery: Arc<dyn Notifier> = match &config.collaborators.notifier_webhook {
        Some(webhook) => Arc::new(WebhookNotifier::new(webhook.clone(), timeout)),
        None => Arc::new(LogNotifier),
    };

    Collaborators {
        summarizer: Arc::new(LlmSummarizer::new(llm.clone())),
        llm,
        extractor: Arc::new(HttpContentExtractor::from_config(&config.collaborators)),
        vision: Arc::new(OpenAiVisionClient::from_config(
            &config.llm,
            &config.collaborators,
        )),
        frames: Arc::new(HttpFrameSampler::from_config(&config.collaborators)),
        memory: Arc::new(StoreSemanticMemory::new(store.clone())),
        calendar: Arc::new(HttpCalendarClient::from_config(&config.collaborators)),
        notifier: Arc::new(RecordingNotifier::new(delivery, store.clone())),
        scheduler,
    }
}

//! Reminder sweeper.
//!
//! Periodically delivers due reminders through the notifier. Delivery is
//! claimed with a persisted idempotency marker keyed by owner, capture and
//! deadline, so concurrent sweepers and restarts deliver each reminder at
//! most once.

use crate::telemetry::PipelineTelemetry;
use adapters::StoreReminderScheduler;
use chrono::{DateTime, Utc};
use config::ReminderConfig;
use errors::{ActionError, CollaboratorError, StorageError};
use serde_json::json;
use stash_core::traits::{Notifier, PipelineStore};
use stash_core::types::{Notification, NotificationPriority, Reminder};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SweepReport {
    pub delivered: usize,
    pub duplicates: usize,
    pub failed: usize,
}

pub struct ReminderSweeper {
    store: Arc<dyn PipelineStore>,
    notifier: Arc<dyn Notifier>,
    scheduler: Option<Arc<StoreReminderScheduler>>,
    config: ReminderConfig,
    telemetry: PipelineTelemetry,
}

impl ReminderSweeper {
    pub fn new(
        store: Arc<dyn PipelineStore>,
        notifier: Arc<dyn Notifier>,
        config: ReminderConfig,
    ) -> Self {
        Self {
            store,
            notifier,
            scheduler: None,
            config,
            telemetry: PipelineTelemetry::new(),
        }
    }

    /// Wakes the sweeper early when the scheduler learns of a deadline
    /// sooner than the next tick.
    pub fn with_scheduler(mut self, scheduler: Arc<StoreReminderScheduler>) -> Self {
        self.scheduler = Some(scheduler);
        self
    }

    fn marker_ttl(&self) -> Duration {
        Duration::from_secs(self.config.marker_ttl_hours * 3_600)
    }

    /// Delivers every reminder due at `now`, up to the batch size.
    #[tracing::instrument(skip(self))]
    pub async fn sweep(&self, now: DateTime<Utc>) -> Result<SweepReport, StorageError> {
        let due = self.store.due_reminders(now, self.config.batch_size).await?;
        let mut report = SweepReport::default();
        for reminder in due {
            match self.deliver(&reminder, now).await {
                Ok(true) => {
                    report.delivered += 1;
                    self.telemetry.record_reminder("delivered");
                }
                Ok(false) => {
                    report.duplicates += 1;
                    self.telemetry.record_reminder("duplicate");
                }
                Err(e) => {
                    report.failed += 1;
                    self.telemetry.record_reminder("failed");
                    tracing::warn!(reminder_id = %reminder.id, error = %e, "Reminder delivery failed");
                }
            }
        }
        if let Some(scheduler) = &self.scheduler {
            scheduler.clear_due(now);
        }
        if report != SweepReport::default() {
            tracing::info!(
                delivered = report.delivered,
                duplicates = report.duplicates,
                failed = report.failed,
                "Reminder sweep finished"
            );
        }
        Ok(report)
    }

    /// `Ok(false)` when another sweep already claimed this reminder.
    async fn deliver(&self, reminder: &Reminder, now: DateTime<Utc>) -> Result<bool, ActionError> {
        let claimed = self
            .store
            .claim_marker(&reminder.delivery_key(), self.marker_ttl())
            .await?;
        // Claimed before sending: a failed send is not retried.
        if !claimed {
            self.store
                .mark_reminder_delivered(&reminder.id, now)
                .await?;
            return Ok(false);
        }

        let notification = Notification {
            owner_id: reminder.owner_id.clone(),
            title: "Reminder".to_string(),
            body: reminder.message.clone(),
            action_tag: Some("reminder".to_string()),
            data: Some(json!({
                "reminderId": reminder.id,
                "captureId": reminder.capture_id,
            })),
            priority: NotificationPriority::High,
        };
        if !self.notifier.send(&notification).await? {
            return Err(CollaboratorError::Rejected {
                service: "notifier".to_string(),
                reason: "reminder notification was not accepted".to_string(),
            }
            .into());
        }
        self.store.mark_reminder_delivered(&reminder.id, now).await?;
        Ok(true)
    }

    /// Sweeps every interval, or sooner when the scheduler publishes an
    /// earlier deadline, until `shutdown` is cancelled.
    pub async fn run(&self, shutdown: CancellationToken) {
        let interval = Duration::from_secs(self.config.sweep_interval_seconds);
        let mut next_due = self.scheduler.as_ref().map(|s| s.subscribe());
        tracing::info!(?interval, "Reminder sweeper started");

        loop {
            if let Err(e) = self.sweep(Utc::now()).await {
                tracing::warn!(error = %e, "Reminder sweep failed");
            }

            let wait = match next_due.as_ref().and_then(|rx| *rx.borrow()) {
                Some(due) => (due - Utc::now()).to_std().unwrap_or_default().min(interval),
                None => interval,
            };
            tokio::select! {
                _ = shutdown.cancelled() => break,
                _ = tokio::time::sleep(wait) => {}
                changed = async {
                    match next_due.as_mut() {
                        Some(rx) => rx.changed().await,
                        None => std::future::pending().await,
                    }
                } => {
                    if changed.is_err() {
                        next_due = None;
                    }
                    continue;
                }
            }
        }
        tracing::info!("Reminder sweeper stopped");
    }
}

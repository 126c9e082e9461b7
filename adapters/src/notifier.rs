use crate::http;
use async_trait::async_trait;
use chrono::Utc;
use errors::CollaboratorError;
use stash_core::traits::{NotificationStore, Notifier};
use stash_core::types::{Notification, NotificationRecord};
use std::sync::Arc;
use std::time::Duration;

const SERVICE: &str = "notifier";

/// Posts each notification as JSON to a webhook. Push delivery happens on
/// the receiving side.
pub struct WebhookNotifier {
    client: reqwest::Client,
    webhook: String,
    timeout: Duration,
}

impl WebhookNotifier {
    pub fn new(webhook: impl Into<String>, timeout: Duration) -> Self {
        Self {
            client: reqwest::Client::new(),
            webhook: webhook.into(),
            timeout,
        }
    }
}

#[async_trait]
impl Notifier for WebhookNotifier {
    #[tracing::instrument(skip(self, notification), fields(owner_id = %notification.owner_id))]
    async fn send(&self, notification: &Notification) -> Result<bool, CollaboratorError> {
        http::send(
            SERVICE,
            self.client.post(&self.webhook).json(notification),
            self.timeout,
        )
        .await?;
        Ok(true)
    }
}

/// Notifier for deployments without a webhook: logs and accepts.
#[derive(Default)]
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn send(&self, notification: &Notification) -> Result<bool, CollaboratorError> {
        tracing::info!(
            owner_id = %notification.owner_id,
            title = %notification.title,
            priority = %notification.priority,
            "Notification: {}",
            notification.body
        );
        Ok(true)
    }
}

/// Records every accepted notification so read times can be mined later.
pub struct RecordingNotifier {
    inner: Arc<dyn Notifier>,
    store: Arc<dyn NotificationStore>,
}

impl RecordingNotifier {
    pub fn new(inner: Arc<dyn Notifier>, store: Arc<dyn NotificationStore>) -> Self {
        Self { inner, store }
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn send(&self, notification: &Notification) -> Result<bool, CollaboratorError> {
        let accepted = self.inner.send(notification).await?;
        if accepted {
            let record = NotificationRecord {
                id: uuid::Uuid::new_v4().to_string(),
                owner_id: notification.owner_id.clone(),
                title: notification.title.clone(),
                body: notification.body.clone(),
                action_tag: notification.action_tag.clone(),
                sent_at: Utc::now(),
                read_at: None,
            };
            if let Err(e) = self.store.record_notification(&record).await {
                tracing::warn!(
                    owner_id = %notification.owner_id,
                    error = %e,
                    "Failed to record sent notification"
                );
            }
        }
        Ok(accepted)
    }
}

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use errors::CollaboratorError;
use stash_core::traits::ReminderScheduler;
use tokio::sync::watch;

const SERVICE: &str = "reminder_scheduler";

/// Scheduler for reminders persisted in the store.
///
/// Delivery is done by the reminder sweeper; scheduling only publishes the
/// earliest known deadline so the sweeper can wake before its next tick.
pub struct StoreReminderScheduler {
    next_due: watch::Sender<Option<DateTime<Utc>>>,
}

impl Default for StoreReminderScheduler {
    fn default() -> Self {
        Self::new()
    }
}

impl StoreReminderScheduler {
    pub fn new() -> Self {
        let (next_due, _) = watch::channel(None);
        Self { next_due }
    }

    pub fn subscribe(&self) -> watch::Receiver<Option<DateTime<Utc>>> {
        self.next_due.subscribe()
    }

    pub fn next_due(&self) -> Option<DateTime<Utc>> {
        *self.next_due.borrow()
    }

    /// Forgets a deadline that a sweep at `now` has already covered.
    pub fn clear_due(&self, now: DateTime<Utc>) {
        self.next_due.send_if_modified(|current| match current {
            Some(due) if *due <= now => {
                *current = None;
                true
            }
            _ => false,
        });
    }
}

#[async_trait]
impl ReminderScheduler for StoreReminderScheduler {
    async fn schedule(
        &self,
        reminder_id: &str,
        remind_at: DateTime<Utc>,
    ) -> Result<(), CollaboratorError> {
        if remind_at <= Utc::now() {
            return Err(CollaboratorError::Rejected {
                service: SERVICE.to_string(),
                reason: format!("reminder {} is not in the future", reminder_id),
            });
        }

        self.next_due.send_if_modified(|current| match current {
            Some(existing) if *existing <= remind_at => false,
            _ => {
                *current = Some(remind_at);
                true
            }
        });
        tracing::debug!(reminder_id, %remind_at, "Reminder scheduled");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[tokio::test]
    async fn test_keeps_earliest_deadline() {
        let scheduler = StoreReminderScheduler::new();
        let later = Utc::now() + Duration::hours(5);
        let sooner = Utc::now() + Duration::hours(1);

        scheduler.schedule("r1", later).await.unwrap();
        scheduler.schedule("r2", sooner).await.unwrap();
        scheduler.schedule("r3", later).await.unwrap();

        assert_eq!(scheduler.next_due(), Some(sooner));
    }

    #[tokio::test]
    async fn test_rejects_past_deadline() {
        let scheduler = StoreReminderScheduler::new();
        let err = scheduler
            .schedule("r1", Utc::now() - Duration::minutes(1))
            .await
            .unwrap_err();
        assert!(matches!(err, CollaboratorError::Rejected { .. }));
        assert_eq!(scheduler.next_due(), None);
    }

    #[tokio::test]
    async fn test_clear_due_only_forgets_covered_deadline() {
        let scheduler = StoreReminderScheduler::new();
        let at = Utc::now() + Duration::minutes(10);
        scheduler.schedule("r1", at).await.unwrap();

        scheduler.clear_due(Utc::now());
        assert_eq!(scheduler.next_due(), Some(at));

        scheduler.clear_due(at + Duration::seconds(1));
        assert_eq!(scheduler.next_due(), None);
    }

    #[tokio::test]
    async fn test_subscribers_see_updates() {
        let scheduler = StoreReminderScheduler::new();
        let mut rx = scheduler.subscribe();
        let at = Utc::now() + Duration::minutes(10);

        scheduler.schedule("r1", at).await.unwrap();
        rx.changed().await.unwrap();
        assert_eq!(*rx.borrow(), Some(at));
    }
}

//! # Learner
//!
//! Records the outcome of every run and mines per-owner behavioral
//! patterns from recent outcomes. Recording is synchronous. Mining runs as
//! a supervised background task; its failures are logged and nothing else.

pub mod patterns;

use crate::supervisor::TaskSupervisor;
use crate::telemetry::PipelineTelemetry;
use chrono::Utc;
use config::LearnerConfig;
use errors::StorageError;
use patterns::MinedPattern;
use stash_core::traits::PipelineStore;
use stash_core::types::{
    ActionOutcome, ActionPlan, CaptureId, ExecutionResult, OwnerId, PatternType, UserPattern,
};
use std::sync::Arc;

/// What one mining pass did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MiningReport {
    pub outcomes: usize,
    pub updated: Vec<PatternType>,
    pub failed: Vec<PatternType>,
    pub skipped: bool,
}

#[derive(Clone)]
pub struct Learner {
    store: Arc<dyn PipelineStore>,
    supervisor: TaskSupervisor,
    config: LearnerConfig,
    telemetry: PipelineTelemetry,
}

impl Learner {
    pub fn new(store: Arc<dyn PipelineStore>, supervisor: TaskSupervisor, config: LearnerConfig) -> Self {
        Self {
            store,
            supervisor,
            config,
            telemetry: PipelineTelemetry::new(),
        }
    }

    /// Persists the outcome, then schedules a mining pass for the owner
    /// without waiting for it.
    #[tracing::instrument(skip(self, plan, results), fields(capture_id = %capture_id, owner_id = %owner_id))]
    pub async fn record_outcome(
        &self,
        capture_id: &CaptureId,
        plan: &ActionPlan,
        results: &[ExecutionResult],
        owner_id: &OwnerId,
    ) -> Result<(), StorageError> {
        let outcome = ActionOutcome::new(
            capture_id.clone(),
            owner_id.clone(),
            plan.clone(),
            results.to_vec(),
        );
        self.store.record_outcome(&outcome).await?;
        tracing::debug!(success_rate = outcome.success_rate, "Outcome recorded");

        let learner = self.clone();
        let owner = owner_id.clone();
        if let Err(e) = self.supervisor.spawn("pattern_mining", async move {
            learner.mine_patterns(&owner).await;
        }) {
            tracing::debug!(error = %e, "Pattern mining not scheduled");
        }
        Ok(())
    }

    /// One mining pass. Fewer than `min_samples` recent outcomes changes
    /// nothing. Each extractor upserts its own row; one failing does not
    /// stop the others.
    #[tracing::instrument(skip(self), fields(owner_id = %owner_id))]
    pub async fn mine_patterns(&self, owner_id: &OwnerId) -> MiningReport {
        let outcomes = match self
            .store
            .recent_outcomes(owner_id, self.config.outcome_window)
            .await
        {
            Ok(outcomes) => outcomes,
            Err(e) => {
                tracing::warn!(error = %e, "Could not load outcomes for mining");
                self.telemetry.record_mining("failed");
                return MiningReport {
                    skipped: true,
                    ..MiningReport::default()
                };
            }
        };

        let mut report = MiningReport {
            outcomes: outcomes.len(),
            ..MiningReport::default()
        };
        if outcomes.len() < self.config.min_samples {
            tracing::debug!(outcomes = outcomes.len(), "Not enough outcomes to mine");
            report.skipped = true;
            self.telemetry.record_mining("skipped");
            return report;
        }

        let save_time = Ok(Some(patterns::save_time(&outcomes)));
        self.apply(owner_id, PatternType::SaveTime, save_time, &mut report)
            .await;

        let preference = self
            .store
            .captures_with_outcomes(owner_id, self.config.outcome_window)
            .await
            .map(|captures| {
                patterns::content_preference(&captures, self.config.high_confidence_samples)
            });
        self.apply(owner_id, PatternType::ContentPreference, preference, &mut report)
            .await;

        let timing = self
            .store
            .read_notifications(owner_id, self.config.outcome_window)
            .await
            .map(|reads| {
                patterns::notification_timing(
                    &reads,
                    self.config.min_read_events,
                    self.config.high_confidence_samples,
                )
            });
        self.apply(owner_id, PatternType::NotificationTiming, timing, &mut report)
            .await;

        self.telemetry.record_mining(if report.failed.is_empty() {
            "completed"
        } else {
            "partial"
        });
        tracing::info!(
            updated = report.updated.len(),
            failed = report.failed.len(),
            "Pattern mining finished"
        );
        report
    }

    async fn apply(
        &self,
        owner_id: &OwnerId,
        pattern_type: PatternType,
        mined: Result<Option<MinedPattern>, StorageError>,
        report: &mut MiningReport,
    ) {
        let mined = match mined {
            Ok(Some(mined)) => mined,
            Ok(None) => {
                tracing::debug!(%pattern_type, "Not enough data for pattern");
                return;
            }
            Err(e) => {
                tracing::warn!(%pattern_type, error = %e, "Pattern extractor failed");
                report.failed.push(pattern_type);
                return;
            }
        };

        let pattern = UserPattern {
            owner_id: owner_id.clone(),
            pattern_type,
            data: mined.data,
            confidence: mined.confidence,
            updated_at: Utc::now(),
        };
        match self.store.upsert_pattern(&pattern).await {
            Ok(()) => report.updated.push(pattern_type),
            Err(e) => {
                tracing::warn!(%pattern_type, error = %e, "Pattern upsert failed");
                report.failed.push(pattern_type);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use stash_core::traits::{CaptureStore, OutcomeStore, PatternStore};
    use stash_core::types::{Capture, CaptureType};
    use std::time::Duration;
    use storage::InMemoryStore;

    fn owner() -> OwnerId {
        OwnerId::new("u1".to_string()).unwrap()
    }

    fn empty_plan(capture_id: &CaptureId) -> ActionPlan {
        ActionPlan {
            capture_id: capture_id.clone(),
            actions: vec![],
            confidence: 0.8,
            reasoning: String::new(),
        }
    }

    async fn record(learner: &Learner, store: &InMemoryStore, n: usize) {
        for i in 0..n {
            let capture = Capture::new(owner(), CaptureType::Text, format!("note {i}"));
            store.insert_capture(&capture).await.unwrap();
            learner
                .record_outcome(&capture.id, &empty_plan(&capture.id), &[], &owner())
                .await
                .unwrap();
        }
    }

    #[tokio::test]
    async fn test_mining_below_threshold_changes_nothing() {
        let store = Arc::new(InMemoryStore::new());
        let supervisor = TaskSupervisor::new();
        let learner = Learner::new(store.clone(), supervisor.clone(), LearnerConfig::default());

        record(&learner, &store, 4).await;
        supervisor.shutdown(Duration::from_secs(2)).await;

        assert_eq!(store.recent_outcomes(&owner(), 10).await.unwrap().len(), 4);
        assert!(store.list_patterns(&owner()).await.unwrap().is_empty());
        let report = learner.mine_patterns(&owner()).await;
        assert!(report.skipped);
        assert!(report.updated.is_empty());
    }

    #[tokio::test]
    async fn test_mining_upserts_patterns() {
        let store = Arc::new(InMemoryStore::new());
        let supervisor = TaskSupervisor::new();
        let learner = Learner::new(store.clone(), supervisor.clone(), LearnerConfig::default());

        record(&learner, &store, 5).await;
        supervisor.shutdown(Duration::from_secs(2)).await;

        let report = learner.mine_patterns(&owner()).await;
        assert_eq!(
            report.updated,
            vec![PatternType::SaveTime, PatternType::ContentPreference]
        );
        let save_time = store
            .get_pattern(&owner(), PatternType::SaveTime)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(save_time.confidence, 0.7);
        assert_eq!(save_time.data["sampleSize"], 5);
        assert!(
            store
                .get_pattern(&owner(), PatternType::NotificationTiming)
                .await
                .unwrap()
                .is_none()
        );
    }
}

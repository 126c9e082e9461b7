use metrics::{counter, histogram};
use std::time::Duration;

/// Metric names and labels for the capture pipeline. Exporter installation
/// is left to the binary.
#[derive(Debug, Clone, Copy, Default)]
pub struct PipelineTelemetry;

impl PipelineTelemetry {
    pub fn new() -> Self {
        Self
    }

    pub fn record_run(&self, status: &str, duration: Duration) {
        counter!("stash_pipeline_runs_total", "status" => status.to_string()).increment(1);
        histogram!("stash_pipeline_run_duration_seconds", "status" => status.to_string())
            .record(duration.as_secs_f64());
    }

    pub fn record_stage(&self, stage: &str, duration: Duration) {
        histogram!("stash_pipeline_stage_duration_seconds", "stage" => stage.to_string())
            .record(duration.as_secs_f64());
    }

    pub fn record_action(&self, action_type: &str, success: bool) {
        let labels = [
            ("action", action_type.to_string()),
            (
                "outcome",
                if success { "success" } else { "failure" }.to_string(),
            ),
        ];
        counter!("stash_actions_total", &labels).increment(1);
    }

    pub fn record_degraded(&self, source: &str) {
        counter!("stash_degraded_results_total", "source" => source.to_string()).increment(1);
    }

    pub fn record_low_confidence_plan(&self, confidence: f32) {
        counter!("stash_low_confidence_plans_total").increment(1);
        histogram!("stash_low_confidence_plan_confidence").record(f64::from(confidence));
    }

    pub fn record_dispatch(&self, mode: &str) {
        counter!("stash_dispatch_total", "mode" => mode.to_string()).increment(1);
    }

    pub fn record_job(&self, outcome: &str) {
        counter!("stash_queue_jobs_total", "outcome" => outcome.to_string()).increment(1);
    }

    pub fn record_mining(&self, outcome: &str) {
        counter!("stash_mining_passes_total", "outcome" => outcome.to_string()).increment(1);
    }

    pub fn record_reminder(&self, outcome: &str) {
        counter!("stash_reminders_total", "outcome" => outcome.to_string()).increment(1);
    }

    pub fn record_task_panic(&self, task: &str) {
        counter!("stash_task_panics_total", "task" => task.to_string()).increment(1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use metrics_util::CompositeKey;
    use metrics_util::debugging::{DebugValue, DebuggingRecorder};

    type SnapshotVec = Vec<(
        CompositeKey,
        Option<metrics::Unit>,
        Option<metrics::SharedString>,
        DebugValue,
    )>;

    fn with_test_recorder<F: FnOnce()>(f: F) -> SnapshotVec {
        let recorder = DebuggingRecorder::new();
        let snapshotter = recorder.snapshotter();
        metrics::with_local_recorder(&recorder, f);
        snapshotter.snapshot().into_vec()
    }

    fn counter_value(snapshot: &SnapshotVec, name: &str) -> u64 {
        snapshot
            .iter()
            .filter(|(k, _, _, _)| k.key().name() == name)
            .map(|(_, _, _, v)| match v {
                DebugValue::Counter(c) => *c,
                _ => 0,
            })
            .sum()
    }

    #[test]
    fn test_run_and_action_metrics() {
        let snapshot = with_test_recorder(|| {
            let telemetry = PipelineTelemetry::new();
            telemetry.record_run("completed", Duration::from_millis(120));
            telemetry.record_action("add_tag", true);
            telemetry.record_action("notify", false);
            telemetry.record_low_confidence_plan(0.5);
        });

        assert_eq!(counter_value(&snapshot, "stash_pipeline_runs_total"), 1);
        assert_eq!(counter_value(&snapshot, "stash_actions_total"), 2);
        assert_eq!(counter_value(&snapshot, "stash_low_confidence_plans_total"), 1);
        assert!(
            snapshot
                .iter()
                .any(|(k, _, _, _)| k.key().name() == "stash_pipeline_run_duration_seconds")
        );
    }
}

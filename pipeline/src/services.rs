//! Wiring of the pipeline components from configuration and injected
//! collaborators.

use crate::analyzer::Analyzer;
use crate::coordinator::Coordinator;
use crate::executor::Executor;
use crate::learner::Learner;
use crate::planner::Planner;
use crate::supervisor::TaskSupervisor;
use config::Config;
use stash_core::traits::{
    CalendarClient, ContentExtractor, ExecutionGuard, FrameSampler, LlmClient, Notifier,
    PipelineStore, ReminderScheduler, SemanticMemory, Summarizer, VisionClient,
};
use std::sync::Arc;
use std::time::Duration;

/// Every external collaborator the pipeline calls.
#[derive(Clone)]
pub struct Collaborators {
    pub llm: Arc<dyn LlmClient>,
    pub extractor: Arc<dyn ContentExtractor>,
    pub vision: Arc<dyn VisionClient>,
    pub frames: Arc<dyn FrameSampler>,
    pub memory: Arc<dyn SemanticMemory>,
    pub calendar: Arc<dyn CalendarClient>,
    pub notifier: Arc<dyn Notifier>,
    pub scheduler: Arc<dyn ReminderScheduler>,
    pub summarizer: Arc<dyn Summarizer>,
}

/// Builds a coordinator with all four stages.
pub fn build_coordinator(
    config: &Config,
    store: Arc<dyn PipelineStore>,
    guard: Arc<dyn ExecutionGuard>,
    collaborators: &Collaborators,
    supervisor: TaskSupervisor,
) -> Coordinator {
    let analyzer = Analyzer::new(
        collaborators.llm.clone(),
        collaborators.extractor.clone(),
        collaborators.vision.clone(),
        collaborators.frames.clone(),
        collaborators.memory.clone(),
        store.clone(),
        config.analyzer.clone(),
    );
    let planner = Planner::new(
        collaborators.llm.clone(),
        store.clone(),
        config.planner.clone(),
    );
    let executor = Executor::new(
        store.clone(),
        collaborators.calendar.clone(),
        collaborators.notifier.clone(),
        collaborators.scheduler.clone(),
        collaborators.summarizer.clone(),
        config.executor.clone(),
    );
    let learner = Learner::new(store.clone(), supervisor, config.learner.clone());

    Coordinator::new(
        store,
        guard,
        collaborators.notifier.clone(),
        analyzer,
        planner,
        executor,
        learner,
        Duration::from_secs(config.queue.lock_ttl_seconds),
    )
}

//! # Stash Core
//!
//! Shared types and traits for the capture-processing pipeline.
//!
//! This crate provides:
//! - The capture data model (captures, analyses, plans, results, patterns)
//! - Collaborator traits at the pipeline's external boundary (LLM, content
//!   extraction, vision, semantic memory, calendar, notification, reminder
//!   scheduling)
//! - Store traits the pipeline persists through
//! - Job queue and execution guard traits for the dispatcher and workers
//! - Schema-validated decoding of structured model output

pub mod decode;
pub mod jobs;
pub mod traits;
pub mod types;

// Re-export commonly used types for convenience
pub use decode::{StructuredOutput, decode_structured, extract_json_object};
pub use traits::complete_structured;
pub use jobs::{CaptureJob, GuardToken, JobDelivery, RetryPolicy};
pub use types::{
    Action, ActionPlan, ActionType, AnalyzerOutput, Capture, CaptureId, CaptureType,
    DeepAnalysis, ExecutionResult, OwnerId, PatternType, ProcessingStatus, ReasoningStep,
    UserIntent, UserPattern,
};

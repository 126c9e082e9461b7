//! # Adapters
//!
//! Concrete clients for the pipeline's external collaborators:
//! - OpenAI-compatible chat completion, summarization and vision
//! - Reader/transcript content extraction over HTTP
//! - Frame sampling, calendar and webhook notification services
//! - Store-backed semantic memory and reminder scheduling
//!
//! `mock` holds scripted implementations of every collaborator trait for
//! tests across the workspace.

mod http;

pub mod calendar;
pub mod extractor;
pub mod llm;
pub mod memory;
pub mod mock;
pub mod notifier;
pub mod scheduler;
pub mod vision;

pub use calendar::HttpCalendarClient;
pub use extractor::HttpContentExtractor;
pub use llm::{LlmSummarizer, OpenAiLlmClient};
pub use memory::StoreSemanticMemory;
pub use notifier::{LogNotifier, RecordingNotifier, WebhookNotifier};
pub use scheduler::StoreReminderScheduler;
pub use vision::{HttpFrameSampler, OpenAiVisionClient};

//! # Stash Pipeline
//!
//! Autonomous capture processing: every capture a user saves is analyzed,
//! turned into an action plan, executed and learned from without asking
//! the user anything.
//!
//! Components:
//! - [`Dispatcher`]: hands captures off, either to a durable queue or to a
//!   supervised in-process task
//! - [`Coordinator`]: the per-capture state machine running the stages
//! - [`Analyzer`], [`Planner`], [`Executor`], [`Learner`]: the four stages
//! - [`WorkerPool`]: drains the queue in queue-backed mode
//! - [`ReminderSweeper`]: delivers due reminders
//! - [`TaskSupervisor`]: tracks detached tasks for graceful shutdown

pub mod analyzer;
pub mod coordinator;
pub mod dispatcher;
pub mod executor;
pub mod learner;
pub mod planner;
pub mod reminders;
pub mod services;
pub mod supervisor;
pub mod telemetry;
pub mod worker;

pub use analyzer::Analyzer;
pub use coordinator::{Coordinator, RunOutcome};
pub use dispatcher::{Accepted, DispatchMode, Dispatcher};
pub use executor::Executor;
pub use learner::{Learner, MiningReport};
pub use planner::Planner;
pub use reminders::{ReminderSweeper, SweepReport};
pub use services::{Collaborators, build_coordinator};
pub use supervisor::{DrainReport, TaskSupervisor};
pub use telemetry::PipelineTelemetry;
pub use worker::{JobDisposition, WorkerHandle, WorkerPool};

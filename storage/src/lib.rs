//! # Storage Layer
//!
//! Persistence backends for the capture pipeline:
//! - In-memory store, job queue and execution guard (tests, single process)
//! - PostgreSQL store for captures, collections, tags, reminders, outcomes,
//!   patterns, notifications and idempotency markers
//! - Redis job queue, distributed execution guard and idempotency markers

pub mod memory;
pub mod postgres;
pub mod redis;

pub use memory::{InMemoryJobQueue, InMemoryStore, InProcessGuard};
pub use postgres::{PostgresError, PostgresStore};
pub use redis::{DeadLetter, RedisJobQueue, RedisStorage};

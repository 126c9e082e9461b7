//! Container fixtures shared by the Stash integration tests.
//!
//! PostgreSQL and Redis are each started once per test process on first
//! use. Without Docker, or with `STASH_TEST_SKIP_CONTAINERS` set, the
//! fixture resolves to `None` and callers skip.

mod fixtures;

pub use fixtures::*;

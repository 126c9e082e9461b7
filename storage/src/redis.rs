//! Redis backend: per-capture execution locks, idempotency markers and the
//! durable job queue.
//!
//! Queue layout under a configurable prefix:
//! - `{prefix}:ready`: list of pending job payloads (LPUSH / LMOVE from right)
//! - `{prefix}:processing`: payloads handed to a worker and not yet acked
//! - `{prefix}:delayed`: sorted set of retry payloads scored by due time (ms)
//! - `{prefix}:dead`: list of dead-lettered jobs with their failure reason

use async_trait::async_trait;
use errors::StorageError;
use redis::AsyncCommands;
use serde::{Deserialize, Serialize};
use stash_core::jobs::{CaptureJob, GuardToken, JobDelivery};
use stash_core::traits::{ExecutionGuard, IdempotencyStore, JobQueue};
use stash_core::types::CaptureId;
use std::time::Duration;

const BACKEND: &str = "Redis";

/// Longest single sleep between empty polls.
const POLL_INTERVAL: Duration = Duration::from_millis(200);

/// Delayed payloads promoted per poll.
const PROMOTE_BATCH: usize = 100;

fn query_error(e: redis::RedisError) -> StorageError {
    if e.is_io_error() || e.is_connection_dropped() || e.is_connection_refusal() {
        StorageError::ConnectionError {
            backend: BACKEND.to_string(),
            reason: e.to_string(),
        }
    } else {
        StorageError::QueryError {
            backend: BACKEND.to_string(),
            reason: e.to_string(),
        }
    }
}

fn serialization_error(e: serde_json::Error) -> StorageError {
    StorageError::SerializationError {
        error_type: "JSON".to_string(),
        reason: e.to_string(),
    }
}

/// Result of a distributed lock acquisition attempt
#[derive(Debug, Clone)]
pub struct LockResult {
    /// The unique token identifying this lock holder
    pub lock_token: String,
    /// The key that was locked
    pub lock_key: String,
    /// TTL in seconds
    pub ttl_seconds: u64,
}

#[derive(Clone)]
pub struct RedisStorage {
    connection_manager: redis::aio::ConnectionManager,
    key_prefix: String,
}

impl RedisStorage {
    pub async fn new(connection_string: &str) -> Result<Self, StorageError> {
        Self::with_prefix(connection_string, "stash").await
    }

    pub async fn with_prefix(
        connection_string: &str,
        key_prefix: &str,
    ) -> Result<Self, StorageError> {
        let client =
            redis::Client::open(connection_string).map_err(|e| StorageError::ConnectionError {
                backend: BACKEND.to_string(),
                reason: e.to_string(),
            })?;

        let connection_manager =
            client
                .get_connection_manager()
                .await
                .map_err(|e| StorageError::ConnectionError {
                    backend: BACKEND.to_string(),
                    reason: e.to_string(),
                })?;

        Ok(Self {
            connection_manager,
            key_prefix: key_prefix.to_string(),
        })
    }

    pub fn connection(&self) -> redis::aio::ConnectionManager {
        self.connection_manager.clone()
    }

    pub async fn ping(&self) -> Result<(), StorageError> {
        let mut conn = self.connection();
        let _: String = redis::cmd("PING")
            .query_async(&mut conn)
            .await
            .map_err(query_error)?;
        Ok(())
    }

    pub async fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        let mut conn = self.connection();
        conn.get(key).await.map_err(query_error)
    }

    pub async fn delete_key(&self, key: &str) -> Result<(), StorageError> {
        let mut conn = self.connection();
        let _: usize = conn.del(key).await.map_err(query_error)?;
        Ok(())
    }

    pub async fn exists_key(&self, key: &str) -> Result<bool, StorageError> {
        let mut conn = self.connection();
        conn.exists(key).await.map_err(query_error)
    }

    fn lock_key(&self, capture_id: &CaptureId) -> String {
        format!("{}:lock:capture:{}", self.key_prefix, capture_id)
    }

    fn marker_key(&self, key: &str) -> String {
        format!("{}:marker:{}", self.key_prefix, key)
    }

    pub async fn acquire_lock(
        &self,
        lock_key: &str,
        ttl_seconds: u64,
    ) -> Result<Option<LockResult>, StorageError> {
        let lock_token = uuid::Uuid::new_v4().to_string();
        let acquired = self.set_nx_ex(lock_key, &lock_token, ttl_seconds).await?;

        Ok(acquired.then(|| LockResult {
            lock_token,
            lock_key: lock_key.to_string(),
            ttl_seconds,
        }))
    }

    pub async fn release_lock(
        &self,
        lock_key: &str,
        lock_token: &str,
    ) -> Result<bool, StorageError> {
        let script = redis::Script::new(
            r#"
            if redis.call("GET", KEYS[1]) == ARGV[1] then
                return redis.call("DEL", KEYS[1])
            else
                return 0
            end
            "#,
        );

        let mut conn = self.connection();
        let result: i32 = script
            .key(lock_key)
            .arg(lock_token)
            .invoke_async(&mut conn)
            .await
            .map_err(query_error)?;

        Ok(result == 1)
    }

    async fn set_nx_ex(&self, key: &str, value: &str, ttl_seconds: u64) -> Result<bool, StorageError> {
        let mut conn = self.connection();
        let result: Option<String> = redis::cmd("SET")
            .arg(key)
            .arg(value)
            .arg("NX")
            .arg("EX")
            .arg(ttl_seconds.max(1))
            .query_async(&mut conn)
            .await
            .map_err(query_error)?;
        Ok(result.is_some())
    }
}

#[async_trait]
impl ExecutionGuard for RedisStorage {
    async fn acquire(
        &self,
        capture_id: &CaptureId,
        ttl: Duration,
    ) -> Result<Option<GuardToken>, StorageError> {
        let lock = self
            .acquire_lock(&self.lock_key(capture_id), ttl.as_secs())
            .await?;
        Ok(lock.map(|lock| GuardToken {
            capture_id: capture_id.clone(),
            token: lock.lock_token,
        }))
    }

    async fn release(&self, token: &GuardToken) -> Result<(), StorageError> {
        let released = self
            .release_lock(&self.lock_key(&token.capture_id), &token.token)
            .await?;
        if !released {
            tracing::warn!(
                capture_id = %token.capture_id,
                "Execution lock expired before release"
            );
        }
        Ok(())
    }
}

#[async_trait]
impl IdempotencyStore for RedisStorage {
    async fn claim_marker(&self, key: &str, ttl: Duration) -> Result<bool, StorageError> {
        let timestamp = chrono::Utc::now().timestamp().to_string();
        self.set_nx_ex(&self.marker_key(key), &timestamp, ttl.as_secs())
            .await
    }

    async fn has_marker(&self, key: &str) -> Result<bool, StorageError> {
        self.exists_key(&self.marker_key(key)).await
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct DeadLetter {
    pub job: CaptureJob,
    pub reason: String,
    pub failed_at: chrono::DateTime<chrono::Utc>,
}

/// Redis list-backed job queue.
#[derive(Clone)]
pub struct RedisJobQueue {
    connection_manager: redis::aio::ConnectionManager,
    ready_key: String,
    processing_key: String,
    delayed_key: String,
    dead_key: String,
}

impl RedisJobQueue {
    pub fn new(storage: &RedisStorage, queue_name: &str) -> Self {
        Self {
            connection_manager: storage.connection(),
            ready_key: format!("{}:ready", queue_name),
            processing_key: format!("{}:processing", queue_name),
            delayed_key: format!("{}:delayed", queue_name),
            dead_key: format!("{}:dead", queue_name),
        }
    }

    /// Moves every payload left in the processing list back to the ready
    /// list. Run once at worker startup to recover jobs of a crashed process.
    pub async fn recover_in_flight(&self) -> Result<usize, StorageError> {
        let mut conn = self.connection_manager.clone();
        let mut recovered = 0;
        loop {
            let moved: Option<String> = redis::cmd("LMOVE")
                .arg(&self.processing_key)
                .arg(&self.ready_key)
                .arg("RIGHT")
                .arg("LEFT")
                .query_async(&mut conn)
                .await
                .map_err(query_error)?;
            if moved.is_none() {
                break;
            }
            recovered += 1;
        }
        if recovered > 0 {
            tracing::info!(recovered, "Recovered in-flight jobs");
        }
        Ok(recovered)
    }

    pub async fn dead_letters(&self, limit: usize) -> Result<Vec<DeadLetter>, StorageError> {
        let mut conn = self.connection_manager.clone();
        let stop = limit.max(1) as isize - 1;
        let raw: Vec<String> = conn
            .lrange(&self.dead_key, 0, stop)
            .await
            .map_err(query_error)?;
        raw.iter()
            .map(|payload| serde_json::from_str(payload).map_err(serialization_error))
            .collect()
    }

    async fn promote_due(&self) -> Result<usize, StorageError> {
        let script = redis::Script::new(
            r#"
            local due = redis.call("ZRANGEBYSCORE", KEYS[1], "-inf", ARGV[1], "LIMIT", 0, ARGV[2])
            for _, payload in ipairs(due) do
                redis.call("ZREM", KEYS[1], payload)
                redis.call("LPUSH", KEYS[2], payload)
            end
            return #due
            "#,
        );

        let now_ms = chrono::Utc::now().timestamp_millis();
        let mut conn = self.connection_manager.clone();
        let promoted: usize = script
            .key(&self.delayed_key)
            .key(&self.ready_key)
            .arg(now_ms)
            .arg(PROMOTE_BATCH)
            .invoke_async(&mut conn)
            .await
            .map_err(query_error)?;
        Ok(promoted)
    }

    async fn take(&self) -> Result<Option<String>, StorageError> {
        let mut conn = self.connection_manager.clone();
        redis::cmd("LMOVE")
            .arg(&self.ready_key)
            .arg(&self.processing_key)
            .arg("RIGHT")
            .arg("LEFT")
            .query_async(&mut conn)
            .await
            .map_err(query_error)
    }

    async fn remove_in_flight(&self, receipt: &str) -> Result<(), StorageError> {
        let mut conn = self.connection_manager.clone();
        let _: i64 = conn
            .lrem(&self.processing_key, 1, receipt)
            .await
            .map_err(query_error)?;
        Ok(())
    }
}

#[async_trait]
impl JobQueue for RedisJobQueue {
    async fn enqueue(&self, job: &CaptureJob) -> Result<(), StorageError> {
        let payload = serde_json::to_string(job).map_err(serialization_error)?;
        let mut conn = self.connection_manager.clone();
        let _: i64 = conn
            .lpush(&self.ready_key, payload)
            .await
            .map_err(query_error)?;
        Ok(())
    }

    async fn enqueue_delayed(
        &self,
        job: &CaptureJob,
        delay: Duration,
    ) -> Result<(), StorageError> {
        let payload = serde_json::to_string(job).map_err(serialization_error)?;
        let due_ms = chrono::Utc::now().timestamp_millis() + delay.as_millis() as i64;
        let mut conn = self.connection_manager.clone();
        let _: i64 = conn
            .zadd(&self.delayed_key, payload, due_ms)
            .await
            .map_err(query_error)?;
        Ok(())
    }

    async fn poll(&self, timeout: Duration) -> Result<Option<JobDelivery>, StorageError> {
        let deadline = tokio::time::Instant::now() + timeout;
        loop {
            self.promote_due().await?;
            if let Some(payload) = self.take().await? {
                return match serde_json::from_str::<CaptureJob>(&payload) {
                    Ok(job) => Ok(Some(JobDelivery {
                        job,
                        receipt: payload,
                    })),
                    Err(e) => {
                        tracing::error!(error = %e, payload = %payload, "Dropping undecodable job payload");
                        self.remove_in_flight(&payload).await?;
                        Ok(None)
                    }
                };
            }

            let now = tokio::time::Instant::now();
            if now >= deadline {
                return Ok(None);
            }
            tokio::time::sleep(POLL_INTERVAL.min(deadline - now)).await;
        }
    }

    async fn ack(&self, delivery: &JobDelivery) -> Result<(), StorageError> {
        self.remove_in_flight(&delivery.receipt).await
    }

    async fn dead_letter(&self, delivery: &JobDelivery, reason: &str) -> Result<(), StorageError> {
        let entry = DeadLetter {
            job: delivery.job.clone(),
            reason: reason.to_string(),
            failed_at: chrono::Utc::now(),
        };
        let payload = serde_json::to_string(&entry).map_err(serialization_error)?;
        self.remove_in_flight(&delivery.receipt).await?;
        let mut conn = self.connection_manager.clone();
        let _: i64 = conn
            .lpush(&self.dead_key, payload)
            .await
            .map_err(query_error)?;
        Ok(())
    }

    async fn depth(&self) -> Result<usize, StorageError> {
        let mut conn = self.connection_manager.clone();
        let ready: usize = conn.llen(&self.ready_key).await.map_err(query_error)?;
        let delayed: usize = conn.zcard(&self.delayed_key).await.map_err(query_error)?;
        Ok(ready + delayed)
    }
}

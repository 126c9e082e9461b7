use crate::memory::name_key;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use errors::StorageError;
use stash_core::traits::{
    CaptureStore, CollectionStore, IdempotencyStore, NotificationStore, OutcomeStore,
    PatternStore, ReminderStore, TagStore,
};
use stash_core::types::{
    ActionOutcome, Capture, CaptureCompletion, CaptureId, CaptureType, Collection,
    NotificationRecord, OwnerId, PatternType, ProcessingStatus, RelatedCapture, Reminder, Tag,
    UserPattern,
};
use sqlx::postgres::{PgPoolOptions, PgQueryResult, PgRow};
use sqlx::{AssertSqlSafe, Pool, Postgres, Row};
use std::time::Duration;
use thiserror::Error;

const BACKEND: &str = "PostgreSQL";

#[derive(Error, Debug)]
pub enum PostgresError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("Invalid stored value: {0}")]
    InvalidValue(String),
    #[error("Row not found: {0}")]
    NotFound(String),
}

impl From<PostgresError> for StorageError {
    fn from(err: PostgresError) -> Self {
        match err {
            PostgresError::Database(
                e @ (sqlx::Error::Io(_)
                | sqlx::Error::PoolTimedOut
                | sqlx::Error::PoolClosed
                | sqlx::Error::Tls(_)),
            ) => StorageError::ConnectionError {
                backend: BACKEND.to_string(),
                reason: e.to_string(),
            },
            PostgresError::Database(e) => StorageError::QueryError {
                backend: BACKEND.to_string(),
                reason: e.to_string(),
            },
            PostgresError::Serialization(e) => StorageError::SerializationError {
                error_type: "JSON".to_string(),
                reason: e.to_string(),
            },
            PostgresError::InvalidValue(reason) => StorageError::SerializationError {
                error_type: "column".to_string(),
                reason,
            },
            PostgresError::NotFound(id) => StorageError::NotFound {
                backend: BACKEND.to_string(),
                id,
            },
        }
    }
}

const CAPTURE_COLUMNS: &str = "id, owner_id, capture_type, content, annotation, \
     processing_status, analysis, action_plan, action_results, metadata, created_at, \
     updated_at, processed_at";

pub struct PostgresStore {
    pool: Pool<Postgres>,
}

impl PostgresStore {
    pub async fn new(connection_url: &str) -> Result<Self, PostgresError> {
        Self::with_pool_size(connection_url, 10).await
    }

    pub async fn with_pool_size(connection_url: &str, pool_size: u32) -> Result<Self, PostgresError> {
        let pool = PgPoolOptions::new()
            .max_connections(pool_size)
            .acquire_timeout(Duration::from_secs(10))
            .connect(connection_url)
            .await?;
        Ok(Self { pool })
    }

    pub fn from_pool(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }

    pub async fn initialize_schema(&self) -> Result<(), PostgresError> {
        let statements = [
            "CREATE TABLE IF NOT EXISTS captures (
                id TEXT PRIMARY KEY,
                owner_id TEXT NOT NULL,
                capture_type TEXT NOT NULL,
                content TEXT NOT NULL,
                annotation TEXT,
                processing_status TEXT NOT NULL,
                analysis JSONB,
                action_plan JSONB,
                action_results JSONB,
                metadata JSONB NOT NULL DEFAULT '{}',
                created_at TIMESTAMPTZ NOT NULL,
                updated_at TIMESTAMPTZ NOT NULL,
                processed_at TIMESTAMPTZ
            )",
            "CREATE INDEX IF NOT EXISTS idx_captures_owner_status
                ON captures(owner_id, processing_status, created_at DESC)",
            "CREATE TABLE IF NOT EXISTS collections (
                id TEXT PRIMARY KEY,
                owner_id TEXT NOT NULL,
                name TEXT NOT NULL,
                name_key TEXT NOT NULL,
                created_at TIMESTAMPTZ NOT NULL,
                UNIQUE (owner_id, name_key)
            )",
            "CREATE TABLE IF NOT EXISTS collection_captures (
                collection_id TEXT NOT NULL REFERENCES collections(id),
                capture_id TEXT NOT NULL,
                added_at TIMESTAMPTZ NOT NULL DEFAULT now(),
                PRIMARY KEY (collection_id, capture_id)
            )",
            "CREATE TABLE IF NOT EXISTS tags (
                id TEXT PRIMARY KEY,
                owner_id TEXT NOT NULL,
                name TEXT NOT NULL,
                name_key TEXT NOT NULL,
                UNIQUE (owner_id, name_key)
            )",
            "CREATE TABLE IF NOT EXISTS capture_tags (
                capture_id TEXT NOT NULL,
                tag_id TEXT NOT NULL REFERENCES tags(id),
                PRIMARY KEY (capture_id, tag_id)
            )",
            "CREATE TABLE IF NOT EXISTS reminders (
                id TEXT PRIMARY KEY,
                owner_id TEXT NOT NULL,
                capture_id TEXT NOT NULL,
                message TEXT NOT NULL,
                remind_at TIMESTAMPTZ NOT NULL,
                created_at TIMESTAMPTZ NOT NULL,
                delivered_at TIMESTAMPTZ
            )",
            "CREATE INDEX IF NOT EXISTS idx_reminders_due
                ON reminders(remind_at) WHERE delivered_at IS NULL",
            "CREATE TABLE IF NOT EXISTS action_outcomes (
                id TEXT PRIMARY KEY,
                capture_id TEXT NOT NULL,
                owner_id TEXT NOT NULL,
                plan JSONB NOT NULL,
                results JSONB NOT NULL,
                success_rate REAL NOT NULL,
                recorded_at TIMESTAMPTZ NOT NULL
            )",
            "CREATE INDEX IF NOT EXISTS idx_action_outcomes_owner
                ON action_outcomes(owner_id, recorded_at DESC)",
            "CREATE TABLE IF NOT EXISTS user_patterns (
                owner_id TEXT NOT NULL,
                pattern_type TEXT NOT NULL,
                data JSONB NOT NULL,
                confidence REAL NOT NULL,
                updated_at TIMESTAMPTZ NOT NULL,
                PRIMARY KEY (owner_id, pattern_type)
            )",
            "CREATE TABLE IF NOT EXISTS notifications (
                id TEXT PRIMARY KEY,
                owner_id TEXT NOT NULL,
                title TEXT NOT NULL,
                body TEXT NOT NULL,
                action_tag TEXT,
                sent_at TIMESTAMPTZ NOT NULL,
                read_at TIMESTAMPTZ
            )",
            "CREATE TABLE IF NOT EXISTS idempotency_markers (
                key TEXT PRIMARY KEY,
                expires_at TIMESTAMPTZ NOT NULL
            )",
        ];

        for statement in statements {
            sqlx::query(statement).execute(&self.pool).await?;
        }
        Ok(())
    }
}

fn require_row(result: PgQueryResult, id: &str) -> Result<(), PostgresError> {
    if result.rows_affected() == 0 {
        return Err(PostgresError::NotFound(id.to_string()));
    }
    Ok(())
}

fn parse_owner(raw: String) -> Result<OwnerId, PostgresError> {
    OwnerId::new(raw).ok_or_else(|| PostgresError::InvalidValue("owner_id".to_string()))
}

fn parse_capture_id(raw: String) -> Result<CaptureId, PostgresError> {
    CaptureId::new(raw).ok_or_else(|| PostgresError::InvalidValue("capture_id".to_string()))
}

fn opt_json<T: serde::de::DeserializeOwned>(
    value: Option<serde_json::Value>,
) -> Result<Option<T>, PostgresError> {
    value.map(serde_json::from_value).transpose().map_err(Into::into)
}

fn capture_from_row(row: &PgRow) -> Result<Capture, PostgresError> {
    let capture_type: String = row.get("capture_type");
    let status: String = row.get("processing_status");
    let metadata: serde_json::Value = row.get("metadata");

    Ok(Capture {
        id: parse_capture_id(row.get("id"))?,
        owner_id: parse_owner(row.get("owner_id"))?,
        capture_type: capture_type
            .parse::<CaptureType>()
            .map_err(|e| PostgresError::InvalidValue(format!("capture_type: {}", e)))?,
        content: row.get("content"),
        annotation: row.get("annotation"),
        processing_status: status
            .parse::<ProcessingStatus>()
            .map_err(|e| PostgresError::InvalidValue(format!("processing_status: {}", e)))?,
        analysis: opt_json(row.get("analysis"))?,
        action_plan: opt_json(row.get("action_plan"))?,
        action_results: opt_json(row.get("action_results"))?,
        metadata: match metadata {
            serde_json::Value::Object(map) => map,
            _ => serde_json::Map::new(),
        },
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
        processed_at: row.get("processed_at"),
    })
}

fn reminder_from_row(row: &PgRow) -> Result<Reminder, PostgresError> {
    Ok(Reminder {
        id: row.get("id"),
        owner_id: parse_owner(row.get("owner_id"))?,
        capture_id: parse_capture_id(row.get("capture_id"))?,
        message: row.get("message"),
        remind_at: row.get("remind_at"),
        created_at: row.get("created_at"),
        delivered_at: row.get("delivered_at"),
    })
}

fn pattern_from_row(row: &PgRow) -> Result<UserPattern, PostgresError> {
    let pattern_type: String = row.get("pattern_type");
    Ok(UserPattern {
        owner_id: parse_owner(row.get("owner_id"))?,
        pattern_type: pattern_type
            .parse::<PatternType>()
            .map_err(|e| PostgresError::InvalidValue(format!("pattern_type: {}", e)))?,
        data: row.get("data"),
        confidence: row.get("confidence"),
        updated_at: row.get("updated_at"),
    })
}

#[async_trait]
impl CaptureStore for PostgresStore {
    async fn get_capture(&self, id: &CaptureId) -> Result<Option<Capture>, StorageError> {
        let row = sqlx::query(AssertSqlSafe(format!(
            "SELECT {} FROM captures WHERE id = $1",
            CAPTURE_COLUMNS
        )))
        .bind(id.as_str())
        .fetch_optional(&self.pool)
        .await
        .map_err(PostgresError::from)?;

        Ok(row.as_ref().map(capture_from_row).transpose()?)
    }

    async fn insert_capture(&self, capture: &Capture) -> Result<(), StorageError> {
        let result = sqlx::query(
            "INSERT INTO captures (id, owner_id, capture_type, content, annotation, \
             processing_status, analysis, action_plan, action_results, metadata, created_at, \
             updated_at, processed_at)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)
             ON CONFLICT (id) DO NOTHING",
        )
        .bind(capture.id.as_str())
        .bind(capture.owner_id.as_str())
        .bind(capture.capture_type.to_string())
        .bind(&capture.content)
        .bind(&capture.annotation)
        .bind(capture.processing_status.to_string())
        .bind(
            capture
                .analysis
                .as_ref()
                .map(serde_json::to_value)
                .transpose()
                .map_err(PostgresError::from)?,
        )
        .bind(
            capture
                .action_plan
                .as_ref()
                .map(serde_json::to_value)
                .transpose()
                .map_err(PostgresError::from)?,
        )
        .bind(
            capture
                .action_results
                .as_ref()
                .map(serde_json::to_value)
                .transpose()
                .map_err(PostgresError::from)?,
        )
        .bind(serde_json::Value::Object(capture.metadata.clone()))
        .bind(capture.created_at)
        .bind(capture.updated_at)
        .bind(capture.processed_at)
        .execute(&self.pool)
        .await
        .map_err(PostgresError::from)?;

        if result.rows_affected() == 0 {
            return Err(StorageError::Conflict {
                backend: BACKEND.to_string(),
                reason: format!("capture {} already exists", capture.id),
            });
        }
        Ok(())
    }

    async fn set_status(
        &self,
        id: &CaptureId,
        status: ProcessingStatus,
    ) -> Result<(), StorageError> {
        let result = sqlx::query(
            "UPDATE captures SET processing_status = $2, updated_at = now() WHERE id = $1",
        )
        .bind(id.as_str())
        .bind(status.to_string())
        .execute(&self.pool)
        .await
        .map_err(PostgresError::from)?;
        Ok(require_row(result, id.as_str())?)
    }

    async fn complete_capture(
        &self,
        id: &CaptureId,
        completion: &CaptureCompletion,
    ) -> Result<(), StorageError> {
        let analysis = serde_json::to_value(&completion.analysis).map_err(PostgresError::from)?;
        let plan = serde_json::to_value(&completion.plan).map_err(PostgresError::from)?;
        let results = serde_json::to_value(&completion.results).map_err(PostgresError::from)?;
        let patch = serde_json::Value::Object(
            completion.metadata_patch().map_err(PostgresError::from)?,
        );

        let result = sqlx::query(
            "UPDATE captures SET
                processing_status = 'completed',
                analysis = $2,
                action_plan = $3,
                action_results = $4,
                metadata = (metadata - 'last_error') || $5::jsonb,
                processed_at = COALESCE(processed_at, now()),
                updated_at = now()
             WHERE id = $1",
        )
        .bind(id.as_str())
        .bind(analysis)
        .bind(plan)
        .bind(results)
        .bind(patch)
        .execute(&self.pool)
        .await
        .map_err(PostgresError::from)?;
        Ok(require_row(result, id.as_str())?)
    }

    async fn fail_capture(&self, id: &CaptureId, error: &str) -> Result<(), StorageError> {
        let result = sqlx::query(
            "UPDATE captures SET
                processing_status = 'failed',
                metadata = metadata || jsonb_build_object('last_error', $2::text),
                updated_at = now()
             WHERE id = $1",
        )
        .bind(id.as_str())
        .bind(error)
        .execute(&self.pool)
        .await
        .map_err(PostgresError::from)?;
        Ok(require_row(result, id.as_str())?)
    }

    async fn find_related(
        &self,
        owner_id: &OwnerId,
        topic: &str,
        exclude: &CaptureId,
        limit: usize,
    ) -> Result<Vec<RelatedCapture>, StorageError> {
        let rows = sqlx::query(
            "SELECT id, analysis, created_at FROM captures
             WHERE owner_id = $1
               AND id <> $2
               AND processing_status = 'completed'
               AND EXISTS (
                   SELECT 1 FROM jsonb_array_elements_text(analysis->'topics') AS t(topic)
                   WHERE lower(t.topic) = lower($3)
               )
             ORDER BY created_at DESC
             LIMIT $4",
        )
        .bind(owner_id.as_str())
        .bind(exclude.as_str())
        .bind(topic)
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await
        .map_err(PostgresError::from)?;

        let mut related = Vec::with_capacity(rows.len());
        for row in rows {
            let analysis: Option<stash_core::types::DeepAnalysis> = opt_json(row.get("analysis"))?;
            let analysis = analysis.unwrap_or_default();
            related.push(RelatedCapture {
                capture_id: parse_capture_id(row.get("id"))?,
                title: analysis.title,
                topics: analysis.topics,
                created_at: row.get("created_at"),
            });
        }
        Ok(related)
    }

    async fn recent_completed(
        &self,
        owner_id: &OwnerId,
        limit: usize,
    ) -> Result<Vec<Capture>, StorageError> {
        let rows = sqlx::query(AssertSqlSafe(format!(
            "SELECT {} FROM captures
             WHERE owner_id = $1 AND processing_status = 'completed'
             ORDER BY created_at DESC LIMIT $2",
            CAPTURE_COLUMNS
        )))
        .bind(owner_id.as_str())
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await
        .map_err(PostgresError::from)?;

        Ok(rows
            .iter()
            .map(capture_from_row)
            .collect::<Result<Vec<_>, _>>()?)
    }

    async fn captures_with_outcomes(
        &self,
        owner_id: &OwnerId,
        limit: usize,
    ) -> Result<Vec<Capture>, StorageError> {
        let rows = sqlx::query(AssertSqlSafe(format!(
            "SELECT {} FROM captures c
             WHERE c.owner_id = $1
               AND EXISTS (SELECT 1 FROM action_outcomes o WHERE o.capture_id = c.id)
             ORDER BY c.created_at DESC LIMIT $2",
            CAPTURE_COLUMNS
        )))
        .bind(owner_id.as_str())
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await
        .map_err(PostgresError::from)?;

        Ok(rows
            .iter()
            .map(capture_from_row)
            .collect::<Result<Vec<_>, _>>()?)
    }
}

#[async_trait]
impl CollectionStore for PostgresStore {
    async fn find_or_create_collection(
        &self,
        owner_id: &OwnerId,
        name: &str,
    ) -> Result<Collection, StorageError> {
        sqlx::query(
            "INSERT INTO collections (id, owner_id, name, name_key, created_at)
             VALUES ($1, $2, $3, $4, now())
             ON CONFLICT (owner_id, name_key) DO NOTHING",
        )
        .bind(uuid::Uuid::new_v4().to_string())
        .bind(owner_id.as_str())
        .bind(name.trim())
        .bind(name_key(name))
        .execute(&self.pool)
        .await
        .map_err(PostgresError::from)?;

        let row = sqlx::query(
            "SELECT id, name, created_at FROM collections WHERE owner_id = $1 AND name_key = $2",
        )
        .bind(owner_id.as_str())
        .bind(name_key(name))
        .fetch_one(&self.pool)
        .await
        .map_err(PostgresError::from)?;

        Ok(Collection {
            id: row.get("id"),
            owner_id: owner_id.clone(),
            name: row.get("name"),
            created_at: row.get("created_at"),
        })
    }

    async fn add_to_collection(
        &self,
        collection_id: &str,
        capture_id: &CaptureId,
    ) -> Result<bool, StorageError> {
        let result = sqlx::query(
            "INSERT INTO collection_captures (collection_id, capture_id) VALUES ($1, $2)
             ON CONFLICT DO NOTHING",
        )
        .bind(collection_id)
        .bind(capture_id.as_str())
        .execute(&self.pool)
        .await
        .map_err(PostgresError::from)?;
        Ok(result.rows_affected() == 1)
    }

    async fn collection_members(
        &self,
        collection_id: &str,
    ) -> Result<Vec<CaptureId>, StorageError> {
        let rows = sqlx::query(
            "SELECT capture_id FROM collection_captures WHERE collection_id = $1 ORDER BY added_at",
        )
        .bind(collection_id)
        .fetch_all(&self.pool)
        .await
        .map_err(PostgresError::from)?;

        Ok(rows
            .into_iter()
            .map(|row| parse_capture_id(row.get("capture_id")))
            .collect::<Result<Vec<_>, _>>()?)
    }

    async fn list_collections(&self, owner_id: &OwnerId) -> Result<Vec<Collection>, StorageError> {
        let rows = sqlx::query(
            "SELECT id, name, created_at FROM collections WHERE owner_id = $1 ORDER BY created_at",
        )
        .bind(owner_id.as_str())
        .fetch_all(&self.pool)
        .await
        .map_err(PostgresError::from)?;

        Ok(rows
            .into_iter()
            .map(|row| Collection {
                id: row.get("id"),
                owner_id: owner_id.clone(),
                name: row.get("name"),
                created_at: row.get("created_at"),
            })
            .collect())
    }
}

#[async_trait]
impl TagStore for PostgresStore {
    async fn find_or_create_tag(
        &self,
        owner_id: &OwnerId,
        name: &str,
    ) -> Result<Tag, StorageError> {
        sqlx::query(
            "INSERT INTO tags (id, owner_id, name, name_key) VALUES ($1, $2, $3, $4)
             ON CONFLICT (owner_id, name_key) DO NOTHING",
        )
        .bind(uuid::Uuid::new_v4().to_string())
        .bind(owner_id.as_str())
        .bind(name.trim())
        .bind(name_key(name))
        .execute(&self.pool)
        .await
        .map_err(PostgresError::from)?;

        let row = sqlx::query("SELECT id, name FROM tags WHERE owner_id = $1 AND name_key = $2")
            .bind(owner_id.as_str())
            .bind(name_key(name))
            .fetch_one(&self.pool)
            .await
            .map_err(PostgresError::from)?;

        Ok(Tag {
            id: row.get("id"),
            owner_id: owner_id.clone(),
            name: row.get("name"),
        })
    }

    async fn tag_capture(
        &self,
        capture_id: &CaptureId,
        tag_id: &str,
    ) -> Result<bool, StorageError> {
        let result = sqlx::query(
            "INSERT INTO capture_tags (capture_id, tag_id) VALUES ($1, $2) ON CONFLICT DO NOTHING",
        )
        .bind(capture_id.as_str())
        .bind(tag_id)
        .execute(&self.pool)
        .await
        .map_err(PostgresError::from)?;
        Ok(result.rows_affected() == 1)
    }

    async fn capture_tags(&self, capture_id: &CaptureId) -> Result<Vec<Tag>, StorageError> {
        let rows = sqlx::query(
            "SELECT t.id, t.owner_id, t.name FROM tags t
             JOIN capture_tags ct ON ct.tag_id = t.id
             WHERE ct.capture_id = $1 ORDER BY t.name",
        )
        .bind(capture_id.as_str())
        .fetch_all(&self.pool)
        .await
        .map_err(PostgresError::from)?;

        let mut tags = Vec::with_capacity(rows.len());
        for row in rows {
            tags.push(Tag {
                id: row.get("id"),
                owner_id: parse_owner(row.get("owner_id"))?,
                name: row.get("name"),
            });
        }
        Ok(tags)
    }
}

#[async_trait]
impl ReminderStore for PostgresStore {
    async fn insert_reminder(&self, reminder: &Reminder) -> Result<(), StorageError> {
        sqlx::query(
            "INSERT INTO reminders (id, owner_id, capture_id, message, remind_at, created_at, \
             delivered_at)
             VALUES ($1, $2, $3, $4, $5, $6, $7)
             ON CONFLICT (id) DO NOTHING",
        )
        .bind(&reminder.id)
        .bind(reminder.owner_id.as_str())
        .bind(reminder.capture_id.as_str())
        .bind(&reminder.message)
        .bind(reminder.remind_at)
        .bind(reminder.created_at)
        .bind(reminder.delivered_at)
        .execute(&self.pool)
        .await
        .map_err(PostgresError::from)?;
        Ok(())
    }

    async fn due_reminders(
        &self,
        now: DateTime<Utc>,
        limit: usize,
    ) -> Result<Vec<Reminder>, StorageError> {
        let rows = sqlx::query(
            "SELECT id, owner_id, capture_id, message, remind_at, created_at, delivered_at
             FROM reminders WHERE delivered_at IS NULL AND remind_at <= $1
             ORDER BY remind_at LIMIT $2",
        )
        .bind(now)
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await
        .map_err(PostgresError::from)?;

        Ok(rows
            .iter()
            .map(reminder_from_row)
            .collect::<Result<Vec<_>, _>>()?)
    }

    async fn mark_reminder_delivered(
        &self,
        reminder_id: &str,
        at: DateTime<Utc>,
    ) -> Result<(), StorageError> {
        let result = sqlx::query("UPDATE reminders SET delivered_at = $2 WHERE id = $1")
            .bind(reminder_id)
            .bind(at)
            .execute(&self.pool)
            .await
            .map_err(PostgresError::from)?;
        if result.rows_affected() == 0 {
            return Err(PostgresError::NotFound(reminder_id.to_string()).into());
        }
        Ok(())
    }

    async fn reminders_for_capture(
        &self,
        capture_id: &CaptureId,
    ) -> Result<Vec<Reminder>, StorageError> {
        let rows = sqlx::query(
            "SELECT id, owner_id, capture_id, message, remind_at, created_at, delivered_at
             FROM reminders WHERE capture_id = $1 ORDER BY remind_at",
        )
        .bind(capture_id.as_str())
        .fetch_all(&self.pool)
        .await
        .map_err(PostgresError::from)?;

        Ok(rows
            .iter()
            .map(reminder_from_row)
            .collect::<Result<Vec<_>, _>>()?)
    }
}

#[async_trait]
impl OutcomeStore for PostgresStore {
    async fn record_outcome(&self, outcome: &ActionOutcome) -> Result<(), StorageError> {
        sqlx::query(
            "INSERT INTO action_outcomes (id, capture_id, owner_id, plan, results, success_rate, \
             recorded_at)
             VALUES ($1, $2, $3, $4, $5, $6, $7)",
        )
        .bind(&outcome.id)
        .bind(outcome.capture_id.as_str())
        .bind(outcome.owner_id.as_str())
        .bind(serde_json::to_value(&outcome.plan).map_err(PostgresError::from)?)
        .bind(serde_json::to_value(&outcome.results).map_err(PostgresError::from)?)
        .bind(outcome.success_rate)
        .bind(outcome.recorded_at)
        .execute(&self.pool)
        .await
        .map_err(PostgresError::from)?;
        Ok(())
    }

    async fn recent_outcomes(
        &self,
        owner_id: &OwnerId,
        limit: usize,
    ) -> Result<Vec<ActionOutcome>, StorageError> {
        let rows = sqlx::query(
            "SELECT id, capture_id, owner_id, plan, results, success_rate, recorded_at
             FROM action_outcomes WHERE owner_id = $1
             ORDER BY recorded_at DESC LIMIT $2",
        )
        .bind(owner_id.as_str())
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await
        .map_err(PostgresError::from)?;

        let mut outcomes = Vec::with_capacity(rows.len());
        for row in rows {
            outcomes.push(ActionOutcome {
                id: row.get("id"),
                capture_id: parse_capture_id(row.get("capture_id"))?,
                owner_id: parse_owner(row.get("owner_id"))?,
                plan: serde_json::from_value(row.get("plan")).map_err(PostgresError::from)?,
                results: serde_json::from_value(row.get("results")).map_err(PostgresError::from)?,
                success_rate: row.get("success_rate"),
                recorded_at: row.get("recorded_at"),
            });
        }
        Ok(outcomes)
    }
}

#[async_trait]
impl PatternStore for PostgresStore {
    async fn upsert_pattern(&self, pattern: &UserPattern) -> Result<(), StorageError> {
        sqlx::query(
            "INSERT INTO user_patterns (owner_id, pattern_type, data, confidence, updated_at)
             VALUES ($1, $2, $3, $4, $5)
             ON CONFLICT (owner_id, pattern_type) DO UPDATE SET
                data = EXCLUDED.data,
                confidence = EXCLUDED.confidence,
                updated_at = EXCLUDED.updated_at",
        )
        .bind(pattern.owner_id.as_str())
        .bind(pattern.pattern_type.to_string())
        .bind(&pattern.data)
        .bind(pattern.confidence)
        .bind(pattern.updated_at)
        .execute(&self.pool)
        .await
        .map_err(PostgresError::from)?;
        Ok(())
    }

    async fn get_pattern(
        &self,
        owner_id: &OwnerId,
        pattern_type: PatternType,
    ) -> Result<Option<UserPattern>, StorageError> {
        let row = sqlx::query(
            "SELECT owner_id, pattern_type, data, confidence, updated_at FROM user_patterns
             WHERE owner_id = $1 AND pattern_type = $2",
        )
        .bind(owner_id.as_str())
        .bind(pattern_type.to_string())
        .fetch_optional(&self.pool)
        .await
        .map_err(PostgresError::from)?;

        Ok(row.as_ref().map(pattern_from_row).transpose()?)
    }

    async fn list_patterns(&self, owner_id: &OwnerId) -> Result<Vec<UserPattern>, StorageError> {
        let rows = sqlx::query(
            "SELECT owner_id, pattern_type, data, confidence, updated_at FROM user_patterns
             WHERE owner_id = $1 ORDER BY pattern_type",
        )
        .bind(owner_id.as_str())
        .fetch_all(&self.pool)
        .await
        .map_err(PostgresError::from)?;

        Ok(rows
            .iter()
            .map(pattern_from_row)
            .collect::<Result<Vec<_>, _>>()?)
    }
}

#[async_trait]
impl NotificationStore for PostgresStore {
    async fn record_notification(
        &self,
        record: &NotificationRecord,
    ) -> Result<(), StorageError> {
        sqlx::query(
            "INSERT INTO notifications (id, owner_id, title, body, action_tag, sent_at, read_at)
             VALUES ($1, $2, $3, $4, $5, $6, $7)",
        )
        .bind(&record.id)
        .bind(record.owner_id.as_str())
        .bind(&record.title)
        .bind(&record.body)
        .bind(&record.action_tag)
        .bind(record.sent_at)
        .bind(record.read_at)
        .execute(&self.pool)
        .await
        .map_err(PostgresError::from)?;
        Ok(())
    }

    async fn mark_notification_read(
        &self,
        notification_id: &str,
        at: DateTime<Utc>,
    ) -> Result<(), StorageError> {
        let result = sqlx::query("UPDATE notifications SET read_at = $2 WHERE id = $1")
            .bind(notification_id)
            .bind(at)
            .execute(&self.pool)
            .await
            .map_err(PostgresError::from)?;
        if result.rows_affected() == 0 {
            return Err(PostgresError::NotFound(notification_id.to_string()).into());
        }
        Ok(())
    }

    async fn read_notifications(
        &self,
        owner_id: &OwnerId,
        limit: usize,
    ) -> Result<Vec<NotificationRecord>, StorageError> {
        let rows = sqlx::query(
            "SELECT id, owner_id, title, body, action_tag, sent_at, read_at FROM notifications
             WHERE owner_id = $1 AND read_at IS NOT NULL
             ORDER BY read_at DESC LIMIT $2",
        )
        .bind(owner_id.as_str())
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await
        .map_err(PostgresError::from)?;

        let mut records = Vec::with_capacity(rows.len());
        for row in rows {
            records.push(NotificationRecord {
                id: row.get("id"),
                owner_id: parse_owner(row.get("owner_id"))?,
                title: row.get("title"),
                body: row.get("body"),
                action_tag: row.get("action_tag"),
                sent_at: row.get("sent_at"),
                read_at: row.get("read_at"),
            });
        }
        Ok(records)
    }
}

#[async_trait]
impl IdempotencyStore for PostgresStore {
    async fn claim_marker(&self, key: &str, ttl: Duration) -> Result<bool, StorageError> {
        let expires_at = Utc::now()
            + chrono::Duration::from_std(ttl).unwrap_or_else(|_| chrono::Duration::days(365));
        let result = sqlx::query(
            "INSERT INTO idempotency_markers (key, expires_at) VALUES ($1, $2)
             ON CONFLICT (key) DO UPDATE SET expires_at = EXCLUDED.expires_at
             WHERE idempotency_markers.expires_at < now()",
        )
        .bind(key)
        .bind(expires_at)
        .execute(&self.pool)
        .await
        .map_err(PostgresError::from)?;
        Ok(result.rows_affected() == 1)
    }

    async fn has_marker(&self, key: &str) -> Result<bool, StorageError> {
        let row: Option<(i32,)> = sqlx::query_as(
            "SELECT 1 FROM idempotency_markers WHERE key = $1 AND expires_at > now()",
        )
        .bind(key)
        .fetch_optional(&self.pool)
        .await
        .map_err(PostgresError::from)?;
        Ok(row.is_some())
    }
}

//! One handler per action type. Handlers validate their own payload and
//! return `ActionError`; the executor turns errors into failed results.

use adapters::memory::{jaccard, keywords};
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use config::ExecutorConfig;
use errors::{ActionError, CollaboratorError, StorageError};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::{Value, json};
use stash_core::traits::{CalendarClient, Notifier, PipelineStore, ReminderScheduler, Summarizer};
use stash_core::types::{
    ActionType, CalendarEventRequest, CaptureId, Collection, Notification, NotificationPriority,
    OwnerId, Reminder, ordered_set,
};

const DEFAULT_REMINDER_MESSAGE: &str = "Revisit your saved capture";

/// Everything a handler may touch for one action.
pub struct HandlerContext<'a> {
    pub capture_id: &'a CaptureId,
    /// Content extracted by this run's analysis; empty when unknown.
    pub content: &'a str,
    pub owner_id: &'a OwnerId,
    pub store: &'a dyn PipelineStore,
    pub calendar: &'a dyn CalendarClient,
    pub notifier: &'a dyn Notifier,
    pub scheduler: &'a dyn ReminderScheduler,
    pub summarizer: &'a dyn Summarizer,
    pub config: &'a ExecutorConfig,
}

fn payload<T: DeserializeOwned>(action: ActionType, data: &Value) -> Result<T, ActionError> {
    let data = if data.is_null() { json!({}) } else { data.clone() };
    serde_json::from_value(data).map_err(|e| ActionError::InvalidPayload {
        action: action.to_string(),
        reason: e.to_string(),
    })
}

fn invalid(action: ActionType, reason: impl Into<String>) -> ActionError {
    ActionError::InvalidPayload {
        action: action.to_string(),
        reason: reason.into(),
    }
}

fn parse_time(value: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value.trim())
        .ok()
        .map(|t| t.with_timezone(&Utc))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CollectionPayload {
    #[serde(alias = "name", alias = "collectionName")]
    collection: String,
}

/// Existing collection whose name shares enough keywords with `name`.
/// Ties go to the oldest collection.
pub fn closest_collection<'c>(
    name: &str,
    collections: &'c [Collection],
    threshold: f32,
) -> Option<&'c Collection> {
    let wanted = keywords(name);
    let mut best: Option<(f32, &Collection)> = None;
    for collection in collections {
        let score = jaccard(&wanted, &keywords(&collection.name));
        if score > 0.0 && score >= threshold && best.is_none_or(|(top, _)| score > top) {
            best = Some((score, collection));
        }
    }
    best.map(|(_, collection)| collection)
}

/// Files the capture into the closest existing collection, creating one
/// only when nothing the owner has is close enough.
pub async fn add_to_collection(ctx: &HandlerContext<'_>, data: &Value) -> Result<Value, ActionError> {
    let payload: CollectionPayload = payload(ActionType::AddToCollection, data)?;
    let name = payload.collection.trim();
    if name.is_empty() {
        return Err(invalid(ActionType::AddToCollection, "collection name is empty"));
    }

    let existing = ctx.store.list_collections(ctx.owner_id).await?;
    let collection =
        match closest_collection(name, &existing, ctx.config.collection_match_threshold) {
            Some(found) => {
                tracing::debug!(requested = name, matched = %found.name, "Reusing collection");
                found.clone()
            }
            None => {
                ctx.store
                    .find_or_create_collection(ctx.owner_id, name)
                    .await?
            }
        };
    let added = ctx
        .store
        .add_to_collection(&collection.id, ctx.capture_id)
        .await?;
    Ok(json!({
        "collectionId": collection.id,
        "collection": collection.name,
        "requested": name,
        "added": added,
    }))
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct ReminderPayload {
    message: Option<String>,
    #[serde(alias = "remind_at", alias = "time", alias = "datetime")]
    remind_at: Option<String>,
}

/// Persists the reminder, then hands it to the scheduler. A missing,
/// unparseable or past timestamp becomes now plus the default delay.
pub async fn create_reminder(ctx: &HandlerContext<'_>, data: &Value) -> Result<Value, ActionError> {
    let payload: ReminderPayload = payload(ActionType::CreateReminder, data)?;
    let now = Utc::now();
    let default_at = now + ChronoDuration::hours(ctx.config.default_reminder_delay_hours);
    let remind_at = match payload.remind_at.as_deref().and_then(parse_time) {
        Some(at) if at > now => at,
        Some(at) => {
            tracing::debug!(%at, "Reminder time is in the past, using default delay");
            default_at
        }
        None => default_at,
    };
    let message = payload
        .message
        .map(|m| m.trim().to_string())
        .filter(|m| !m.is_empty())
        .unwrap_or_else(|| DEFAULT_REMINDER_MESSAGE.to_string());

    let reminder = Reminder {
        id: uuid::Uuid::new_v4().to_string(),
        owner_id: ctx.owner_id.clone(),
        capture_id: ctx.capture_id.clone(),
        message,
        remind_at,
        created_at: now,
        delivered_at: None,
    };
    ctx.store.insert_reminder(&reminder).await?;
    ctx.scheduler.schedule(&reminder.id, remind_at).await?;

    Ok(json!({
        "reminderId": reminder.id,
        "remindAt": remind_at.to_rfc3339(),
    }))
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum TagList {
    Many(Vec<String>),
    One(String),
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TagPayload {
    #[serde(alias = "tag", alias = "topics")]
    tags: TagList,
}

pub async fn add_tag(ctx: &HandlerContext<'_>, data: &Value) -> Result<Value, ActionError> {
    let payload: TagPayload = payload(ActionType::AddTag, data)?;
    let names = match payload.tags {
        TagList::Many(names) => ordered_set(names),
        TagList::One(name) => ordered_set([name]),
    };
    if names.is_empty() {
        return Err(invalid(ActionType::AddTag, "no tags given"));
    }

    let mut tags = Vec::with_capacity(names.len());
    let mut added = 0usize;
    for name in &names {
        let tag = ctx.store.find_or_create_tag(ctx.owner_id, name).await?;
        if ctx.store.tag_capture(ctx.capture_id, &tag.id).await? {
            added += 1;
        }
        tags.push(tag.name);
    }
    Ok(json!({ "tags": tags, "added": added }))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CalendarPayload {
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    description: Option<String>,
    #[serde(alias = "startTime", alias = "start_time")]
    start: String,
    #[serde(default, alias = "endTime", alias = "end_time")]
    end: Option<String>,
    #[serde(default)]
    location: Option<String>,
}

pub async fn create_calendar_event(
    ctx: &HandlerContext<'_>,
    data: &Value,
) -> Result<Value, ActionError> {
    let payload: CalendarPayload = payload(ActionType::CreateCalendarEvent, data)?;
    let start = parse_time(&payload.start).ok_or_else(|| {
        invalid(
            ActionType::CreateCalendarEvent,
            format!("start {:?} is not an RFC 3339 timestamp", payload.start),
        )
    })?;
    let end = payload
        .end
        .as_deref()
        .and_then(parse_time)
        .filter(|end| *end > start)
        .unwrap_or_else(|| start + ChronoDuration::minutes(ctx.config.calendar_event_minutes));

    let request = CalendarEventRequest {
        title: payload
            .title
            .filter(|t| !t.trim().is_empty())
            .unwrap_or_else(|| "Saved capture".to_string()),
        description: payload.description,
        start,
        end,
        location: payload.location,
    };
    let event = ctx.calendar.create_event(ctx.owner_id, &request).await?;
    Ok(json!({ "eventId": event.id, "link": event.link }))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct NotifyPayload {
    #[serde(default)]
    title: Option<String>,
    #[serde(alias = "message")]
    body: String,
    #[serde(default)]
    action_tag: Option<String>,
    #[serde(default)]
    priority: Option<String>,
}

pub async fn notify(ctx: &HandlerContext<'_>, data: &Value) -> Result<Value, ActionError> {
    let payload: NotifyPayload = payload(ActionType::Notify, data)?;
    let notification = Notification {
        owner_id: ctx.owner_id.clone(),
        title: payload
            .title
            .filter(|t| !t.trim().is_empty())
            .unwrap_or_else(|| "Stash".to_string()),
        body: payload.body,
        action_tag: payload.action_tag,
        data: Some(json!({ "captureId": ctx.capture_id })),
        priority: payload
            .priority
            .and_then(|p| p.trim().to_lowercase().parse().ok())
            .unwrap_or(NotificationPriority::Normal),
    };
    if !ctx.notifier.send(&notification).await? {
        return Err(CollaboratorError::Rejected {
            service: "notifier".to_string(),
            reason: "notification was not accepted".to_string(),
        }
        .into());
    }
    Ok(json!({ "accepted": true }))
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct SummarizePayload {
    #[serde(alias = "max_length")]
    max_length: Option<usize>,
}

/// Summarizes the content extracted during this run, falling back to the
/// capture's raw content. The summary travels in the result data and is
/// written to metadata by the completion write.
pub async fn summarize(ctx: &HandlerContext<'_>, data: &Value) -> Result<Value, ActionError> {
    let payload: SummarizePayload = payload(ActionType::Summarize, data)?;
    let max_length = payload
        .max_length
        .map_or(ctx.config.summary_max_length, |n| {
            n.clamp(1, ctx.config.summary_max_length)
        });

    let raw;
    let content = if ctx.content.trim().is_empty() {
        raw = ctx
            .store
            .get_capture(ctx.capture_id)
            .await?
            .ok_or_else(|| StorageError::NotFound {
                backend: "capture store".to_string(),
                id: ctx.capture_id.to_string(),
            })?
            .content;
        raw.as_str()
    } else {
        ctx.content
    };

    let summary = ctx
        .summarizer
        .summarize(content, max_length, ctx.owner_id)
        .await?;
    Ok(json!({ "summary": summary }))
}

/// Entities are already part of the analysis; nothing to do.
pub async fn extract_entities(_ctx: &HandlerContext<'_>, _data: &Value) -> Result<Value, ActionError> {
    Ok(json!({ "skipped": true }))
}

use crate::http;
use async_trait::async_trait;
use errors::CollaboratorError;
use stash_core::traits::CalendarClient;
use stash_core::types::{CalendarEvent, CalendarEventRequest, OwnerId};
use std::time::Duration;

const SERVICE: &str = "calendar";

/// Calendar service speaking a small REST contract:
/// `POST|PATCH|DELETE {endpoint}/owners/{owner}/events[/{id}]`.
/// Token refresh happens on the service side.
pub struct HttpCalendarClient {
    client: reqwest::Client,
    endpoint: Option<String>,
    token: Option<String>,
    timeout: Duration,
}

impl HttpCalendarClient {
    pub fn new(endpoint: Option<String>, token: Option<String>, timeout: Duration) -> Self {
        Self {
            client: reqwest::Client::new(),
            endpoint: endpoint.map(|e| e.trim_end_matches('/').to_string()),
            token,
            timeout,
        }
    }

    pub fn from_config(config: &config::CollaboratorConfig) -> Self {
        Self::new(
            config.calendar_endpoint.clone(),
            config.calendar_token.clone(),
            Duration::from_millis(config.timeout_ms),
        )
    }

    fn events_url(&self, owner_id: &OwnerId) -> Result<String, CollaboratorError> {
        let endpoint = self
            .endpoint
            .as_ref()
            .ok_or_else(|| CollaboratorError::NotConfigured {
                service: SERVICE.to_string(),
            })?;
        Ok(format!(
            "{}/owners/{}/events",
            endpoint,
            urlencoding::encode(owner_id.as_str())
        ))
    }

    fn authorized(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.token {
            Some(token) => request.header("Authorization", format!("Bearer {}", token)),
            None => request,
        }
    }
}

#[async_trait]
impl CalendarClient for HttpCalendarClient {
    #[tracing::instrument(skip(self, event), fields(owner_id = %owner_id))]
    async fn create_event(
        &self,
        owner_id: &OwnerId,
        event: &CalendarEventRequest,
    ) -> Result<CalendarEvent, CollaboratorError> {
        let url = self.events_url(owner_id)?;
        let response = http::send(
            SERVICE,
            self.authorized(self.client.post(&url).json(event)),
            self.timeout,
        )
        .await?;
        http::read_json(SERVICE, self.timeout, response).await
    }

    async fn update_event(
        &self,
        owner_id: &OwnerId,
        event_id: &str,
        event: &CalendarEventRequest,
    ) -> Result<CalendarEvent, CollaboratorError> {
        let url = format!(
            "{}/{}",
            self.events_url(owner_id)?,
            urlencoding::encode(event_id)
        );
        let response = http::send(
            SERVICE,
            self.authorized(self.client.patch(&url).json(event)),
            self.timeout,
        )
        .await?;
        http::read_json(SERVICE, self.timeout, response).await
    }

    async fn delete_event(
        &self,
        owner_id: &OwnerId,
        event_id: &str,
    ) -> Result<(), CollaboratorError> {
        let url = format!(
            "{}/{}",
            self.events_url(owner_id)?,
            urlencoding::encode(event_id)
        );
        http::send(SERVICE, self.authorized(self.client.delete(&url)), self.timeout).await?;
        Ok(())
    }
}

//! Google Calendar provider.
//!
//! Talks to the Calendar v3 REST API with a bearer token. HTTP statuses are
//! folded into [`ProviderError`] so the retry layer can tell transient
//! failures from fatal ones.

use async_trait::async_trait;
use reqwest::{Client, Method, RequestBuilder, Response, StatusCode};
use serde_json::{json, Map, Value};
use tracing::debug;

use super::keyring_store;
use super::traits::CalendarProvider;
use crate::error::ProviderError;
use crate::sync::types::{CalendarEvent, EventPatch};

/// Keyring entry holding the OAuth access token.
pub const TOKEN_KEY: &str = "google_access_token";
/// Environment variable that overrides the keyring token.
pub const TOKEN_ENV: &str = "ROUTINECAL_GOOGLE_TOKEN";

/// Default Calendar API root.
pub const DEFAULT_API_BASE: &str = "https://www.googleapis.com/calendar/v3";

/// Resolve the access token: environment first, then the OS keyring.
pub fn load_access_token() -> Option<String> {
    if let Ok(token) = std::env::var(TOKEN_ENV) {
        if !token.trim().is_empty() {
            return Some(token.trim().to_string());
        }
    }
    keyring_store::get(TOKEN_KEY).ok().flatten()
}

/// Google Calendar implementation of [`CalendarProvider`].
pub struct GoogleCalendarProvider {
    http_client: Client,
    api_base: String,
    calendar_id: String,
    access_token: String,
}

impl GoogleCalendarProvider {
    pub fn new(
        api_base: impl Into<String>,
        calendar_id: impl Into<String>,
        access_token: impl Into<String>,
    ) -> Self {
        Self {
            http_client: Client::new(),
            api_base: api_base.into().trim_end_matches('/').to_string(),
            calendar_id: calendar_id.into(),
            access_token: access_token.into(),
        }
    }

    /// Build a provider from the stored credentials.
    pub fn from_stored_token(
        api_base: impl Into<String>,
        calendar_id: impl Into<String>,
    ) -> Result<Self, ProviderError> {
        let token = load_access_token().ok_or_else(|| {
            ProviderError::Unauthorized(format!(
                "no Google access token; run `routinecal auth set-token` or set {TOKEN_ENV}"
            ))
        })?;
        Ok(Self::new(api_base, calendar_id, token))
    }

    pub fn calendar_id(&self) -> &str {
        &self.calendar_id
    }

    fn events_url(&self) -> String {
        format!(
            "{}/calendars/{}/events",
            self.api_base,
            urlencoding::encode(&self.calendar_id)
        )
    }

    fn event_url(&self, event_id: &str) -> String {
        format!("{}/{}", self.events_url(), urlencoding::encode(event_id))
    }

    fn request(&self, method: Method, url: &str) -> RequestBuilder {
        self.http_client
            .request(method, url)
            .bearer_auth(&self.access_token)
    }

    async fn send(&self, builder: RequestBuilder) -> Result<Response, ProviderError> {
        let resp = builder.send().await?;
        if resp.status().is_success() {
            return Ok(resp);
        }
        let status = resp.status();
        let body = resp.text().await.unwrap_or_default();
        Err(classify_error(status, &body))
    }
}

/// Map a non-2xx response to a provider error.
pub fn classify_error(status: StatusCode, body: &str) -> ProviderError {
    let parsed: Value = serde_json::from_str(body).unwrap_or(Value::Null);
    let message = parsed["error"]["message"]
        .as_str()
        .map(str::to_string)
        .unwrap_or_else(|| {
            if body.is_empty() {
                status.to_string()
            } else {
                body.to_string()
            }
        });

    match status.as_u16() {
        404 | 410 => ProviderError::NotFound(message),
        429 => ProviderError::RateLimited,
        401 => ProviderError::Unauthorized(message),
        403 if is_rate_limit_reason(&parsed) => ProviderError::RateLimited,
        403 => ProviderError::Forbidden(message),
        s if status.is_server_error() => ProviderError::Server { status: s, message },
        _ if status.is_client_error() => ProviderError::BadRequest(message),
        s => ProviderError::Other(format!("unexpected status {s}: {message}")),
    }
}

fn is_rate_limit_reason(body: &Value) -> bool {
    body["error"]["errors"]
        .as_array()
        .map(|errors| {
            errors.iter().any(|e| {
                matches!(
                    e["reason"].as_str(),
                    Some("rateLimitExceeded") | Some("userRateLimitExceeded")
                )
            })
        })
        .unwrap_or(false)
}

/// Decode an event resource. All-day events carry `start.date` instead of
/// `start.dateTime` and are rejected with a message saying so.
async fn read_event(resp: Response) -> Result<CalendarEvent, ProviderError> {
    let body: Value = resp.json().await?;
    if body["start"]["dateTime"].is_null() && !body["start"]["date"].is_null() {
        return Err(ProviderError::Other(format!(
            "event {} is an all-day event; only timed events are supported",
            body["id"].as_str().unwrap_or("<unknown>")
        )));
    }
    serde_json::from_value(body)
        .map_err(|e| ProviderError::Other(format!("invalid event in response: {e}")))
}

fn patch_body(patch: &EventPatch) -> Value {
    let mut body = Map::new();
    if let Some(summary) = &patch.summary {
        body.insert("summary".into(), json!(summary));
    }
    if let Some(color_id) = &patch.color_id {
        body.insert("colorId".into(), json!(color_id));
    }
    Value::Object(body)
}

#[async_trait]
impl CalendarProvider for GoogleCalendarProvider {
    fn name(&self) -> &str {
        "google"
    }

    async fn create_event(&self, event: &CalendarEvent) -> Result<String, ProviderError> {
        let resp = self
            .send(self.request(Method::POST, &self.events_url()).json(event))
            .await?;
        let body: Value = resp.json().await?;
        let id = body["id"]
            .as_str()
            .ok_or_else(|| ProviderError::Other("missing event id in response".into()))?;
        debug!(event_id = id, "created calendar event");
        Ok(id.to_string())
    }

    async fn update_event(
        &self,
        event_id: &str,
        patch: &EventPatch,
    ) -> Result<CalendarEvent, ProviderError> {
        let resp = self
            .send(
                self.request(Method::PATCH, &self.event_url(event_id))
                    .json(&patch_body(patch)),
            )
            .await?;
        read_event(resp).await
    }

    async fn delete_event(&self, event_id: &str) -> Result<bool, ProviderError> {
        match self
            .send(self.request(Method::DELETE, &self.event_url(event_id)))
            .await
        {
            Ok(_) => Ok(true),
            Err(ProviderError::NotFound(_)) => Ok(false),
            Err(e) => Err(e),
        }
    }

    async fn get_event(&self, event_id: &str) -> Result<Option<CalendarEvent>, ProviderError> {
        match self
            .send(self.request(Method::GET, &self.event_url(event_id)))
            .await
        {
            Ok(resp) => read_event(resp).await.map(Some),
            Err(ProviderError::NotFound(_)) => Ok(None),
            Err(e) => Err(e),
        }
    }
}

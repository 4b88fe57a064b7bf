use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{json, Value};
use tracing::{debug, warn};

use shared_config::AppConfig;
use shared_models::{AvailabilitySlot, CalendarCredential, CalendarProviderKind};

use crate::models::{BookingAttendee, BookingWindow, CalendarBooking, CalendarError};

const REQUEST_TIMEOUT_SECS: u64 = 10;

/// External calendar seam. Two REST adapters exist; the workflow engine is
/// agnostic to which one a credential is bound to.
#[async_trait]
pub trait CalendarProvider: Send + Sync {
    fn kind(&self) -> CalendarProviderKind;

    async fn list_bookings(
        &self,
        credential: &CalendarCredential,
        window: &BookingWindow,
    ) -> Result<Vec<CalendarBooking>, CalendarError>;

    async fn create_booking(
        &self,
        credential: &CalendarCredential,
        slot: &AvailabilitySlot,
        attendee: &BookingAttendee,
    ) -> Result<CalendarBooking, CalendarError>;
}

fn http_client() -> reqwest::Client {
    reqwest::Client::builder()
        .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
        .build()
        .unwrap_or_default()
}

fn map_request_error(err: reqwest::Error) -> CalendarError {
    if err.is_timeout() {
        CalendarError::Timeout
    } else {
        CalendarError::Http(err.to_string())
    }
}

fn check_status(status: reqwest::StatusCode) -> Result<(), CalendarError> {
    if status == reqwest::StatusCode::UNAUTHORIZED || status == reqwest::StatusCode::FORBIDDEN {
        return Err(CalendarError::Unauthorized);
    }
    if !status.is_success() {
        return Err(CalendarError::Http(format!("status {}", status)));
    }
    Ok(())
}

// ==============================================================================
// REST BOOKING API ADAPTER
// ==============================================================================

/// Adapter for a conventional booking REST API:
/// `GET /v1/calendars/{id}/bookings` and `POST /v1/calendars/{id}/bookings`.
pub struct BookingApiProvider {
    client: reqwest::Client,
    base_url: String,
}

impl BookingApiProvider {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            client: http_client(),
            base_url: base_url.into(),
        }
    }
}

#[async_trait]
impl CalendarProvider for BookingApiProvider {
    fn kind(&self) -> CalendarProviderKind {
        CalendarProviderKind::BookingApi
    }

    async fn list_bookings(
        &self,
        credential: &CalendarCredential,
        window: &BookingWindow,
    ) -> Result<Vec<CalendarBooking>, CalendarError> {
        let url = format!(
            "{}/v1/calendars/{}/bookings",
            self.base_url, credential.calendar_id
        );
        debug!(calendar_id = %credential.calendar_id, "listing bookings via booking api");

        let response = self
            .client
            .get(&url)
            .bearer_auth(&credential.api_token)
            .query(&[
                ("from", window.from.to_rfc3339()),
                ("to", window.to.to_rfc3339()),
            ])
            .send()
            .await
            .map_err(map_request_error)?;

        check_status(response.status())?;

        let bookings: Vec<CalendarBooking> = response
            .json()
            .await
            .map_err(|e| CalendarError::InvalidResponse(e.to_string()))?;

        debug!(count = bookings.len(), "booking api returned bookings");
        Ok(bookings)
    }

    async fn create_booking(
        &self,
        credential: &CalendarCredential,
        slot: &AvailabilitySlot,
        attendee: &BookingAttendee,
    ) -> Result<CalendarBooking, CalendarError> {
        let url = format!(
            "{}/v1/calendars/{}/bookings",
            self.base_url, credential.calendar_id
        );

        let body = json!({
            "start_time": slot.start_time.to_rfc3339(),
            "end_time": slot.end_time.to_rfc3339(),
            "summary": slot.appointment_type,
            "attendee": {
                "name": attendee.name,
                "email": attendee.email,
                "phone": attendee.phone,
            },
        });

        let response = self
            .client
            .post(&url)
            .bearer_auth(&credential.api_token)
            .json(&body)
            .send()
            .await
            .map_err(map_request_error)?;

        check_status(response.status())?;

        response
            .json()
            .await
            .map_err(|e| CalendarError::InvalidResponse(e.to_string()))
    }
}

// ==============================================================================
// REST SCHEDULING-LINK ADAPTER
// ==============================================================================

/// Adapter for a scheduling-link style API where events live under a shared
/// link: `GET /api/scheduled_events` returns `{"collection": [...]}` and
/// `POST /api/invitee_bookings` creates one.
pub struct SchedulingLinkProvider {
    client: reqwest::Client,
    base_url: String,
}

impl SchedulingLinkProvider {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            client: http_client(),
            base_url: base_url.into(),
        }
    }

    fn parse_event(value: &Value) -> Result<CalendarBooking, CalendarError> {
        let start = value
            .get("start_time")
            .and_then(Value::as_str)
            .ok_or_else(|| CalendarError::InvalidResponse("event missing start_time".into()))?;
        let end = value
            .get("end_time")
            .and_then(Value::as_str)
            .ok_or_else(|| CalendarError::InvalidResponse("event missing end_time".into()))?;

        let parse = |raw: &str| {
            chrono::DateTime::parse_from_rfc3339(raw)
                .map(|dt| dt.with_timezone(&chrono::Utc))
                .map_err(|e| CalendarError::InvalidResponse(format!("bad timestamp {}: {}", raw, e)))
        };

        Ok(CalendarBooking {
            id: value
                .get("uri")
                .and_then(Value::as_str)
                .map(str::to_string),
            start_time: parse(start)?,
            end_time: parse(end)?,
            summary: value
                .get("name")
                .and_then(Value::as_str)
                .map(str::to_string),
        })
    }
}

#[async_trait]
impl CalendarProvider for SchedulingLinkProvider {
    fn kind(&self) -> CalendarProviderKind {
        CalendarProviderKind::SchedulingLink
    }

    async fn list_bookings(
        &self,
        credential: &CalendarCredential,
        window: &BookingWindow,
    ) -> Result<Vec<CalendarBooking>, CalendarError> {
        let url = format!("{}/api/scheduled_events", self.base_url);
        debug!(calendar_id = %credential.calendar_id, "listing events via scheduling link");

        let min_start = window.from.to_rfc3339();
        let max_start = window.to.to_rfc3339();
        let response = self
            .client
            .get(&url)
            .bearer_auth(&credential.api_token)
            .query(&[
                ("calendar", credential.calendar_id.as_str()),
                ("min_start_time", min_start.as_str()),
                ("max_start_time", max_start.as_str()),
            ])
            .send()
            .await
            .map_err(map_request_error)?;

        check_status(response.status())?;

        let payload: Value = response
            .json()
            .await
            .map_err(|e| CalendarError::InvalidResponse(e.to_string()))?;

        let collection = payload
            .get("collection")
            .and_then(Value::as_array)
            .ok_or_else(|| CalendarError::InvalidResponse("missing collection".into()))?;

        collection.iter().map(Self::parse_event).collect()
    }

    async fn create_booking(
        &self,
        credential: &CalendarCredential,
        slot: &AvailabilitySlot,
        attendee: &BookingAttendee,
    ) -> Result<CalendarBooking, CalendarError> {
        let url = format!("{}/api/invitee_bookings", self.base_url);

        let body = json!({
            "calendar": credential.calendar_id,
            "start_time": slot.start_time.to_rfc3339(),
            "end_time": slot.end_time.to_rfc3339(),
            "invitee": {
                "name": attendee.name,
                "email": attendee.email,
            },
        });

        let response = self
            .client
            .post(&url)
            .bearer_auth(&credential.api_token)
            .json(&body)
            .send()
            .await
            .map_err(map_request_error)?;

        check_status(response.status())?;

        let payload: Value = response
            .json()
            .await
            .map_err(|e| CalendarError::InvalidResponse(e.to_string()))?;

        let resource = payload
            .get("resource")
            .ok_or_else(|| CalendarError::InvalidResponse("missing resource".into()))?;

        Self::parse_event(resource)
    }
}

// ==============================================================================
// PROVIDER REGISTRY
// ==============================================================================

/// Maps a credential's provider kind to the adapter that can serve it.
pub struct CalendarProviderRegistry {
    providers: HashMap<CalendarProviderKind, Arc<dyn CalendarProvider>>,
}

impl CalendarProviderRegistry {
    pub fn new() -> Self {
        Self {
            providers: HashMap::new(),
        }
    }

    /// Registers the adapters the environment is configured for.
    pub fn from_config(config: &AppConfig) -> Self {
        let mut registry = Self::new();
        if config.is_booking_api_configured() {
            registry.register(Arc::new(BookingApiProvider::new(&config.booking_api_url)));
        }
        if config.is_scheduling_link_configured() {
            registry.register(Arc::new(SchedulingLinkProvider::new(
                &config.scheduling_link_url,
            )));
        }
        if registry.providers.is_empty() {
            warn!("no calendar providers registered; slot generation uses business hours only");
        }
        registry
    }

    pub fn register(&mut self, provider: Arc<dyn CalendarProvider>) {
        self.providers.insert(provider.kind(), provider);
    }

    pub fn resolve(&self, kind: CalendarProviderKind) -> Option<Arc<dyn CalendarProvider>> {
        self.providers.get(&kind).cloned()
    }
}

impl Default for CalendarProviderRegistry {
    fn default() -> Self {
        Self::new()
    }
}

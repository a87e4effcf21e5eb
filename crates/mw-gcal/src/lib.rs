//! Google Calendar event source for meetwhen.
//!
//! A thin read-mostly client for the Calendar v3 JSON API. Credentials are
//! request-scoped: every call takes the participant's [`Credential`] and
//! sends it as a bearer token, so one client serves any number of accounts
//! and holds no token state of its own.

use std::fmt;
use std::time::Duration;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use mw_core::{CalendarId, CalendarInfo, Credential, EventTime, RawEvent, TimeWindow};
use mw_engine::EventSource;

/// Default request timeout for API calls.
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);
const CALENDAR_API_URL: &str = "https://www.googleapis.com/calendar/v3";

/// Calendar client errors.
#[derive(Debug, Error)]
pub enum GcalError {
    /// Failed to build HTTP client.
    #[error("failed to build HTTP client: {0}")]
    ClientBuild(#[source] reqwest::Error),
    /// HTTP request failed.
    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),
    /// API returned an error response.
    #[error("API error: {message}")]
    Api { message: String },
    /// Failed to parse response.
    #[error("invalid response: {0}")]
    InvalidResponse(String),
    /// The returned calendar ID failed validation.
    #[error("invalid calendar ID in response: {0}")]
    InvalidCalendarId(#[from] mw_core::ValidationError),
}

/// Details for a new calendar event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventDetails {
    pub summary: String,
    pub description: Option<String>,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    /// Attendee email addresses.
    pub attendees: Vec<String>,
}

/// Google Calendar API client.
///
/// # Thread Safety
///
/// The client is safe to clone and share across threads. Each clone shares
/// the underlying HTTP connection pool.
#[derive(Clone)]
pub struct Client {
    http: reqwest::Client,
    base_url: String,
}

impl fmt::Debug for Client {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Client")
            .field("base_url", &self.base_url)
            .finish_non_exhaustive()
    }
}

impl Client {
    /// Creates a new client with the default endpoint and timeout.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client fails to build.
    pub fn new() -> Result<Self, GcalError> {
        Self::with_base_url(CALENDAR_API_URL)
    }

    /// Creates a client against a non-default endpoint, e.g. a local stub.
    pub fn with_base_url(base_url: impl Into<String>) -> Result<Self, GcalError> {
        let http = reqwest::Client::builder()
            .timeout(DEFAULT_TIMEOUT)
            .build()
            .map_err(GcalError::ClientBuild)?;

        Ok(Self {
            http,
            base_url: base_url.into(),
        })
    }

    /// Lists the calendars visible to the credential's account.
    pub async fn list_calendars(
        &self,
        credential: &Credential,
    ) -> Result<Vec<CalendarInfo>, GcalError> {
        let url = format!("{}/users/me/calendarList", self.base_url);
        let response = self
            .http
            .get(&url)
            .bearer_auth(credential.secret())
            .send()
            .await?;
        let body = check_response(response).await?;

        let payload: CalendarListResponse = serde_json::from_str(&body)
            .map_err(|err| GcalError::InvalidResponse(err.to_string()))?;

        let mut calendars = Vec::with_capacity(payload.items.len());
        for entry in payload.items {
            calendars.push(CalendarInfo {
                id: CalendarId::new(entry.id)?,
                summary: entry.summary,
                primary: entry.primary,
            });
        }
        Ok(calendars)
    }

    /// Lists the events of one calendar overlapping the window.
    ///
    /// Recurring events come back expanded (`singleEvents=true`). Events
    /// whose start or end cannot be interpreted are dropped with a warning
    /// rather than failing the whole fetch.
    pub async fn list_events(
        &self,
        credential: &Credential,
        calendar: &CalendarId,
        window: &TimeWindow,
    ) -> Result<Vec<RawEvent>, GcalError> {
        let url = self.events_url(calendar);
        let response = self
            .http
            .get(&url)
            .bearer_auth(credential.secret())
            .query(&[
                ("timeMin", window.start().to_rfc3339()),
                ("timeMax", window.end().to_rfc3339()),
                ("singleEvents", "true".to_string()),
                ("orderBy", "startTime".to_string()),
            ])
            .send()
            .await?;
        let body = check_response(response).await?;

        let payload: EventListResponse = serde_json::from_str(&body)
            .map_err(|err| GcalError::InvalidResponse(err.to_string()))?;

        Ok(payload
            .items
            .into_iter()
            .filter_map(|event| convert_event(event, calendar))
            .collect())
    }

    /// Resolves the account's primary calendar ID.
    ///
    /// Falls back to the `"primary"` alias when the calendar list cannot be
    /// fetched or contains no primary entry.
    pub async fn primary_calendar_id(&self, credential: &Credential) -> CalendarId {
        let primary = match self.list_calendars(credential).await {
            Ok(calendars) => calendars.into_iter().find(|c| c.primary).map(|c| c.id),
            Err(err) => {
                tracing::warn!(error = %err, "failed to resolve primary calendar");
                None
            }
        };
        primary.unwrap_or_else(|| {
            CalendarId::new("primary").unwrap_or_else(|_| unreachable!("literal is non-empty"))
        })
    }

    /// Creates an event on the given calendar.
    ///
    /// This is the one write operation, used by callers once a slot has
    /// been agreed; the scheduling engine itself never calls it.
    pub async fn create_event(
        &self,
        credential: &Credential,
        calendar: &CalendarId,
        details: &EventDetails,
    ) -> Result<(), GcalError> {
        let url = self.events_url(calendar);
        let payload = create_event_payload(details);
        let response = self
            .http
            .post(&url)
            .bearer_auth(credential.secret())
            .json(&payload)
            .send()
            .await?;
        check_response(response).await?;
        tracing::debug!(calendar = %calendar, summary = %details.summary, "created event");
        Ok(())
    }

    /// Builds the events URL for a calendar.
    ///
    /// The calendar ID goes into a path segment and must be
    /// percent-encoded: subscribed-calendar IDs contain `#` (e.g.
    /// `en.usa#holiday@group.v.calendar.google.com`), which would
    /// otherwise be parsed as a URL fragment and truncate the request.
    fn events_url(&self, calendar: &CalendarId) -> String {
        format!(
            "{}/calendars/{}/events",
            self.base_url,
            urlencoding::encode(calendar.as_str())
        )
    }
}

impl EventSource for Client {
    type Error = GcalError;

    async fn list_calendars(
        &self,
        credential: &Credential,
    ) -> Result<Vec<CalendarInfo>, GcalError> {
        Self::list_calendars(self, credential).await
    }

    async fn list_events(
        &self,
        credential: &Credential,
        calendar: &CalendarId,
        window: &TimeWindow,
    ) -> Result<Vec<RawEvent>, GcalError> {
        Self::list_events(self, credential, calendar, window).await
    }
}

async fn check_response(response: reqwest::Response) -> Result<String, GcalError> {
    let status = response.status();
    let body = response.text().await?;
    if !status.is_success() {
        return Err(parse_api_error(&body).unwrap_or_else(|| GcalError::Api {
            message: format!("status {status}: {body}"),
        }));
    }
    Ok(body)
}

fn parse_api_error(body: &str) -> Option<GcalError> {
    #[derive(Deserialize)]
    struct ErrorPayload {
        error: ErrorDetails,
    }

    #[derive(Deserialize)]
    struct ErrorDetails {
        message: String,
    }

    serde_json::from_str::<ErrorPayload>(body)
        .ok()
        .map(|payload| GcalError::Api {
            message: payload.error.message,
        })
}

#[derive(Debug, Deserialize)]
struct CalendarListResponse {
    #[serde(default)]
    items: Vec<CalendarListEntry>,
}

#[derive(Debug, Deserialize)]
struct CalendarListEntry {
    id: String,
    #[serde(default)]
    summary: Option<String>,
    #[serde(default)]
    primary: bool,
}

#[derive(Debug, Deserialize)]
struct EventListResponse {
    #[serde(default)]
    items: Vec<WireEvent>,
}

#[derive(Debug, Deserialize)]
struct WireEvent {
    #[serde(default)]
    summary: Option<String>,
    #[serde(default)]
    start: Option<WireEventTime>,
    #[serde(default)]
    end: Option<WireEventTime>,
}

/// An event boundary on the wire: `dateTime` for timed events, `date` for
/// all-day events.
#[derive(Debug, Deserialize)]
struct WireEventTime {
    #[serde(rename = "dateTime", default)]
    date_time: Option<String>,
    #[serde(default)]
    date: Option<String>,
}

/// Converts a wire event, dropping it with a warning when either boundary
/// is missing or unparseable.
fn convert_event(event: WireEvent, calendar: &CalendarId) -> Option<RawEvent> {
    let start = event.start.as_ref().and_then(parse_event_time);
    let end = event.end.as_ref().and_then(parse_event_time);
    match (start, end) {
        (Some(start), Some(end)) => Some(RawEvent {
            title: event.summary,
            start,
            end,
        }),
        _ => {
            tracing::warn!(
                calendar = %calendar,
                summary = event.summary.as_deref().unwrap_or("(untitled)"),
                "dropping event with missing or unparseable time"
            );
            None
        }
    }
}

fn parse_event_time(time: &WireEventTime) -> Option<EventTime> {
    if let Some(date_time) = &time.date_time {
        return DateTime::parse_from_rfc3339(date_time)
            .ok()
            .map(|t| EventTime::At(t.with_timezone(&Utc)));
    }
    time.date
        .as_ref()
        .and_then(|d| NaiveDate::parse_from_str(d, "%Y-%m-%d").ok())
        .map(EventTime::AllDay)
}

#[derive(Debug, Serialize)]
struct CreateEventPayload {
    summary: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    description: Option<String>,
    start: PayloadTime,
    end: PayloadTime,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    attendees: Vec<Attendee>,
}

#[derive(Debug, Serialize)]
struct PayloadTime {
    #[serde(rename = "dateTime")]
    date_time: String,
    #[serde(rename = "timeZone")]
    time_zone: &'static str,
}

#[derive(Debug, Serialize)]
struct Attendee {
    email: String,
}

fn create_event_payload(details: &EventDetails) -> CreateEventPayload {
    CreateEventPayload {
        summary: details.summary.clone(),
        description: details.description.clone(),
        start: PayloadTime {
            date_time: details.start.to_rfc3339(),
            time_zone: "UTC",
        },
        end: PayloadTime {
            date_time: details.end.to_rfc3339(),
            time_zone: "UTC",
        },
        attendees: details
            .attendees
            .iter()
            .map(|email| Attendee {
                email: email.clone(),
            })
            .collect(),
    }
}

//! Google Calendar REST client — one day's accepted events.

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, TimeZone, Utc};
use serde::Deserialize;
use tracing::debug;

use crate::error::SourceError;
use crate::sources::auth::Credential;
use crate::sources::types::EventRecord;
use crate::sources::CalendarSource;

const CALENDAR_BASE: &str = "https://www.googleapis.com/calendar/v3/calendars/primary/events";

// ── API response types ──────────────────────────────────────────────

#[derive(Debug, Deserialize)]
struct EventListResponse {
    #[serde(default)]
    items: Vec<EventResource>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct EventResource {
    id: String,
    #[serde(default)]
    summary: Option<String>,
    #[serde(default)]
    start: Option<EventTime>,
    #[serde(default)]
    end: Option<EventTime>,
    #[serde(default)]
    location: Option<String>,
    #[serde(default)]
    hangout_link: Option<String>,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    attendees: Vec<Attendee>,
    #[serde(default)]
    organizer: Option<Organizer>,
    #[serde(default)]
    status: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct EventTime {
    #[serde(default)]
    date_time: Option<DateTime<Utc>>,
    /// All-day events carry a date instead of a dateTime.
    #[serde(default)]
    date: Option<NaiveDate>,
}

impl EventTime {
    fn resolve(&self) -> Option<DateTime<Utc>> {
        self.date_time.or_else(|| {
            self.date
                .and_then(|d| d.and_hms_opt(0, 0, 0))
                .map(|naive| Utc.from_utc_datetime(&naive))
        })
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Attendee {
    #[serde(default)]
    email: Option<String>,
    #[serde(default)]
    response_status: Option<String>,
    /// True on the calendar owner's own attendee entry.
    #[serde(rename = "self", default)]
    is_self: bool,
}

#[derive(Debug, Deserialize)]
struct Organizer {
    #[serde(default)]
    email: Option<String>,
}

// ── Client ──────────────────────────────────────────────────────────

/// Calendar client over the REST API. Declined invitations are filtered
/// out — the briefing covers events the user is actually attending.
pub struct GoogleCalendarClient {
    http: reqwest::Client,
    credential: Credential,
}

impl GoogleCalendarClient {
    pub fn new(http: reqwest::Client, credential: Credential) -> Self {
        Self { http, credential }
    }

    fn err(reason: impl std::fmt::Display) -> SourceError {
        SourceError::RequestFailed {
            service: "calendar".into(),
            reason: reason.to_string(),
        }
    }
}

fn declined_by_me(event: &EventResource) -> bool {
    event
        .attendees
        .iter()
        .any(|a| a.is_self && a.response_status.as_deref() == Some("declined"))
}

#[async_trait]
impl CalendarSource for GoogleCalendarClient {
    async fn list_events(&self, date: NaiveDate) -> Result<Vec<EventRecord>, SourceError> {
        let day_start = Utc.from_utc_datetime(&date.and_hms_opt(0, 0, 0).ok_or_else(|| {
            SourceError::InvalidResponse {
                service: "calendar".into(),
                reason: format!("invalid date {date}"),
            }
        })?);
        let day_end = day_start + chrono::Duration::days(1);

        debug!(%date, "listing calendar events");
        let response = self
            .http
            .get(CALENDAR_BASE)
            .query(&[
                ("timeMin", day_start.to_rfc3339()),
                ("timeMax", day_end.to_rfc3339()),
                ("singleEvents", "true".to_string()),
                ("orderBy", "startTime".to_string()),
            ])
            .bearer_auth(self.credential.bearer())
            .send()
            .await
            .map_err(Self::err)?;

        let status = response.status();
        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            return Err(SourceError::RateLimited {
                service: "calendar".into(),
            });
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let excerpt: String = body.chars().take(200).collect();
            return Err(Self::err(format!("HTTP {status}: {excerpt}")));
        }

        let list: EventListResponse =
            response
                .json()
                .await
                .map_err(|e| SourceError::InvalidResponse {
                    service: "calendar".into(),
                    reason: e.to_string(),
                })?;

        let mut events = Vec::new();
        for item in list.items {
            if item.status.as_deref() == Some("cancelled") || declined_by_me(&item) {
                continue;
            }
            let (Some(start), Some(end)) = (
                item.start.as_ref().and_then(EventTime::resolve),
                item.end.as_ref().and_then(EventTime::resolve),
            ) else {
                continue;
            };
            events.push(EventRecord {
                id: item.id,
                title: item.summary.unwrap_or_else(|| "(untitled)".into()),
                start,
                end,
                location: item.location,
                meeting_url: item.hangout_link,
                description: item.description,
                attendees: item
                    .attendees
                    .iter()
                    .filter_map(|a| a.email.clone())
                    .collect(),
                organizer: item.organizer.and_then(|o| o.email),
                status: item.status.unwrap_or_else(|| "confirmed".into()),
            });
        }
        Ok(events)
    }
}

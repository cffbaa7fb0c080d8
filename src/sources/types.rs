//! Record types returned by the data-source collaborators.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::labels::ActionLabel;

// ── Email ───────────────────────────────────────────────────────────

/// One email as seen by the classification and briefing flows.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmailRecord {
    /// Gmail message id.
    pub id: String,
    /// Gmail thread id.
    pub thread_id: String,
    /// Raw `From` header value.
    pub sender: String,
    pub subject: String,
    /// Plain-text body (best-effort decode; empty when unavailable).
    pub body: String,
    pub timestamp: DateTime<Utc>,
    /// Gmail label ids currently on the message (system + user).
    pub label_ids: Vec<String>,
    /// Gmail label names, where known. Type labels are read-only signals.
    pub label_names: Vec<String>,
    /// Action label owned by this system, if one is already applied.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub action_label: Option<ActionLabel>,
}

impl EmailRecord {
    /// The Gmail `CATEGORY_*` labels on this message.
    pub fn type_labels(&self) -> Vec<String> {
        self.label_ids
            .iter()
            .filter(|l| l.starts_with("CATEGORY_"))
            .cloned()
            .collect()
    }
}

// ── Calendar ────────────────────────────────────────────────────────

/// One calendar event on the target date.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventRecord {
    pub id: String,
    pub title: String,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    /// Video-call link (Meet/Zoom), when present.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub meeting_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default)]
    pub attendees: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub organizer: Option<String>,
    /// confirmed | tentative | cancelled.
    pub status: String,
}

// ── Tasks ───────────────────────────────────────────────────────────

/// One task from the task source, due (or overdue) on the target date.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskRecord {
    pub id: String,
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub due: Option<NaiveDate>,
    /// 1 (normal) … 4 (urgent), Todoist convention.
    pub priority: u8,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub project: Option<String>,
}

// ── Documents ───────────────────────────────────────────────────────

/// A document reference surfaced by workspace search.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocRef {
    pub title: String,
    pub url: String,
    /// Where the reference was found (search query, email id, …).
    pub source: String,
}

// ── Source status ───────────────────────────────────────────────────

/// Per-run availability record for one data source. Rebuilt fresh each
/// run and discarded; the assemble stage reads it for failure notices.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceStatus {
    pub source: String,
    pub available: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub checked_at: DateTime<Utc>,
}

impl SourceStatus {
    pub fn ok(source: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            available: true,
            error: None,
            checked_at: Utc::now(),
        }
    }

    pub fn failed(source: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            available: false,
            error: Some(error.into()),
            checked_at: Utc::now(),
        }
    }
}

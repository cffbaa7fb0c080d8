//! Data collection aggregator — fans out to every configured source.
//!
//! Each source is queried independently; one failure never prevents the
//! others from completing, and every failure is recorded with a
//! human-readable cause instead of aborting the collection. Retries, if
//! any, belong to the individual source clients, not this layer.

use chrono::NaiveDate;
use tracing::{info, warn};

use crate::sources::{
    CalendarSource, DocumentSearch, EmailRecord, EmailSource, EventRecord, SourceStatus,
    TaskRecord, TaskSource,
};

/// Everything the briefing pipeline starts from. Built fresh per run.
#[derive(Debug, Clone, Default)]
pub struct Collected {
    pub emails: Vec<EmailRecord>,
    pub events: Vec<EventRecord>,
    pub tasks: Vec<TaskRecord>,
    /// Availability record per source, in a fixed reporting order.
    pub statuses: Vec<SourceStatus>,
}

impl Collected {
    /// Sources that failed this run, for the document's notice block.
    pub fn failures(&self) -> Vec<&SourceStatus> {
        self.statuses.iter().filter(|s| !s.available).collect()
    }
}

/// The collaborators the aggregator fans out to.
pub struct Sources<'a> {
    pub email: &'a dyn EmailSource,
    pub calendar: &'a dyn CalendarSource,
    pub tasks: Option<&'a dyn TaskSource>,
    pub documents: &'a dyn DocumentSearch,
}

/// Collect raw records from all sources for the target date.
///
/// Emails cover the look-back window; calendar and tasks cover the
/// target date; the document source is only probed for readiness here
/// (searches happen during calendar enrichment).
pub async fn collect(
    sources: &Sources<'_>,
    target_date: NaiveDate,
    days_back: u32,
    max_emails: u32,
) -> Collected {
    info!(%target_date, days_back, max_emails, "collecting from all sources");

    let email_fut = sources.email.list(days_back, max_emails, Some("in:inbox"));
    let calendar_fut = sources.calendar.list_events(target_date);
    let tasks_fut = async {
        match sources.tasks {
            Some(t) => Some(t.list_tasks(target_date).await),
            None => None,
        }
    };
    let docs_fut = sources.documents.ready();

    let (emails, events, tasks, docs_ready) =
        tokio::join!(email_fut, calendar_fut, tasks_fut, docs_fut);

    let mut collected = Collected::default();

    match emails {
        Ok(records) => {
            collected.statuses.push(SourceStatus::ok("gmail"));
            collected.emails = records;
        }
        Err(e) => {
            warn!(error = %e, "email collection failed");
            collected
                .statuses
                .push(SourceStatus::failed("gmail", e.to_string()));
        }
    }

    match events {
        Ok(records) => {
            collected.statuses.push(SourceStatus::ok("calendar"));
            collected.events = records;
        }
        Err(e) => {
            warn!(error = %e, "calendar collection failed");
            collected
                .statuses
                .push(SourceStatus::failed("calendar", e.to_string()));
        }
    }

    match tasks {
        Some(Ok(records)) => {
            collected.statuses.push(SourceStatus::ok("todoist"));
            collected.tasks = records;
        }
        Some(Err(e)) => {
            warn!(error = %e, "task collection failed");
            collected
                .statuses
                .push(SourceStatus::failed("todoist", e.to_string()));
        }
        None => {
            collected.statuses.push(SourceStatus::failed(
                "todoist",
                "not configured (TODOIST_API_KEY unset)",
            ));
        }
    }

    match docs_ready {
        Ok(()) => collected.statuses.push(SourceStatus::ok("workspace")),
        Err(e) => {
            warn!(error = %e, "workspace readiness probe failed");
            collected
                .statuses
                .push(SourceStatus::failed("workspace", e.to_string()));
        }
    }

    info!(
        emails = collected.emails.len(),
        events = collected.events.len(),
        tasks = collected.tasks.len(),
        failures = collected.failures().len(),
        "collection complete"
    );
    collected
}

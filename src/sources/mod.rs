//! Data-source collaborator interfaces and their HTTP implementations.
//!
//! Each source is a trait at the seam — pure I/O, no business logic.
//! Classification, reconciliation, and briefing assembly live above
//! these traits, which makes every workflow testable against in-memory
//! fakes.

pub mod auth;
pub mod calendar;
pub mod drive;
pub mod gmail;
pub mod todoist;
pub mod types;

use async_trait::async_trait;
use chrono::NaiveDate;

use crate::error::SourceError;
pub use types::{DocRef, EmailRecord, EventRecord, SourceStatus, TaskRecord};

/// Email store: list, mutate labels, send, archive.
#[async_trait]
pub trait EmailSource: Send + Sync {
    /// List messages in the look-back window, newest first. `query` is an
    /// extra store-native filter appended to the window query.
    async fn list(
        &self,
        days_back: u32,
        max_results: u32,
        query: Option<&str>,
    ) -> Result<Vec<EmailRecord>, SourceError>;

    /// Atomically add and remove label ids on one message.
    async fn modify_labels(
        &self,
        id: &str,
        add: &[String],
        remove: &[String],
    ) -> Result<(), SourceError>;

    /// Send a pre-built RFC 822 message.
    async fn send_raw(&self, mime: &[u8]) -> Result<(), SourceError>;

    /// The authenticated account's own address.
    async fn profile_address(&self) -> Result<String, SourceError>;

    /// Remove the message from the inbox view without deleting it.
    async fn archive(&self, id: &str) -> Result<(), SourceError>;

    /// All labels in the store as (name, id) pairs.
    async fn list_labels(&self) -> Result<Vec<(String, String)>, SourceError>;

    /// Create a user label, returning its store id.
    async fn create_label(&self, name: &str) -> Result<String, SourceError>;
}

/// Calendar store: accepted events for one date.
#[async_trait]
pub trait CalendarSource: Send + Sync {
    async fn list_events(&self, date: NaiveDate) -> Result<Vec<EventRecord>, SourceError>;
}

/// Task store: tasks due (or overdue) on one date.
#[async_trait]
pub trait TaskSource: Send + Sync {
    async fn list_tasks(&self, date: NaiveDate) -> Result<Vec<TaskRecord>, SourceError>;
}

/// Workspace document search.
#[async_trait]
pub trait DocumentSearch: Send + Sync {
    /// Cheap availability probe used by the collect stage.
    async fn ready(&self) -> Result<(), SourceError>;

    async fn search(&self, query: &str, max_results: u32) -> Result<Vec<DocRef>, SourceError>;
}

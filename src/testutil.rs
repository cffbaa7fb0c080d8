//! In-memory fakes for the data-source and narrative collaborators.
//!
//! Unit-test support only; compiled under `cfg(test)`. The fakes model
//! just enough Gmail behavior for the workflows to be exercised
//! honestly: a label store, the query forms the workflows use
//! (`in:inbox`, `label:x`, `-label:x`), and mutation bookkeeping so
//! tests can assert zero-mutation properties.

use std::collections::{HashMap, HashSet};
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::NaiveDate;

use crate::error::{LlmError, SourceError};
use crate::llm::{NarrativeGenerator, NarrativeStageConfig};
use crate::sources::{
    CalendarSource, DocRef, DocumentSearch, EmailRecord, EmailSource, EventRecord, TaskRecord,
    TaskSource,
};

// ── Email ───────────────────────────────────────────────────────────

#[derive(Default)]
struct FakeEmailState {
    emails: Vec<EmailRecord>,
    /// name → id for user labels.
    labels: HashMap<String, String>,
    next_label: u32,
    created_labels: u32,
    mutations: u32,
    sent: Vec<Vec<u8>>,
    archived: Vec<String>,
    fail_send: bool,
    fail_modify: HashSet<String>,
    fail_archive: HashSet<String>,
}

/// In-memory Gmail stand-in.
pub struct FakeEmail {
    state: Mutex<FakeEmailState>,
}

impl FakeEmail {
    pub fn with_emails(emails: Vec<EmailRecord>) -> Self {
        Self {
            state: Mutex::new(FakeEmailState {
                emails,
                ..Default::default()
            }),
        }
    }

    pub fn push_email(&self, email: EmailRecord) {
        self.state.lock().unwrap().emails.push(email);
    }

    /// Ensure a user label exists without counting as a creation.
    pub fn seed_label(&self, name: &str) -> String {
        let mut state = self.state.lock().unwrap();
        if let Some(id) = state.labels.get(name) {
            return id.clone();
        }
        state.next_label += 1;
        let id = format!("Label_{}", state.next_label);
        state.labels.insert(name.to_string(), id.clone());
        id
    }

    pub fn fail_send(&self) {
        self.state.lock().unwrap().fail_send = true;
    }

    pub fn fail_modify_for(&self, id: &str) {
        self.state.lock().unwrap().fail_modify.insert(id.to_string());
    }

    pub fn fail_archive_for(&self, id: &str) {
        self.state.lock().unwrap().fail_archive.insert(id.to_string());
    }

    pub fn mutation_count(&self) -> u32 {
        self.state.lock().unwrap().mutations
    }

    pub fn created_labels(&self) -> u32 {
        self.state.lock().unwrap().created_labels
    }

    pub fn sent_count(&self) -> usize {
        self.state.lock().unwrap().sent.len()
    }

    pub fn archived_ids(&self) -> Vec<String> {
        self.state.lock().unwrap().archived.clone()
    }

    /// User-label names currently on a message.
    pub fn label_names_on(&self, id: &str) -> Vec<String> {
        let state = self.state.lock().unwrap();
        let Some(email) = state.emails.iter().find(|e| e.id == id) else {
            return Vec::new();
        };
        let mut names: Vec<String> = email
            .label_ids
            .iter()
            .filter_map(|lid| {
                state
                    .labels
                    .iter()
                    .find(|(_, id)| *id == lid)
                    .map(|(name, _)| name.clone())
            })
            .collect();
        names.sort();
        names
    }

    /// Supports the query forms the workflows actually issue.
    fn matches_query(state: &FakeEmailState, email: &EmailRecord, query: &str) -> bool {
        for term in query.split_whitespace() {
            if term.starts_with("after:") {
                continue;
            }
            if term == "in:inbox" {
                if !email.label_ids.iter().any(|l| l == "INBOX") {
                    return false;
                }
            } else if let Some(name) = term.strip_prefix("-label:") {
                if let Some(id) = state.labels.get(name)
                    && email.label_ids.contains(id)
                {
                    return false;
                }
            } else if let Some(name) = term.strip_prefix("label:") {
                match state.labels.get(name) {
                    Some(id) if email.label_ids.contains(id) => {}
                    _ => return false,
                }
            }
        }
        true
    }
}

#[async_trait]
impl EmailSource for FakeEmail {
    async fn list(
        &self,
        _days_back: u32,
        max_results: u32,
        query: Option<&str>,
    ) -> Result<Vec<EmailRecord>, SourceError> {
        let state = self.state.lock().unwrap();
        Ok(state
            .emails
            .iter()
            .filter(|e| match query {
                Some(q) => Self::matches_query(&state, e, q),
                None => true,
            })
            .take(max_results as usize)
            .cloned()
            .collect())
    }

    async fn modify_labels(
        &self,
        id: &str,
        add: &[String],
        remove: &[String],
    ) -> Result<(), SourceError> {
        let mut state = self.state.lock().unwrap();
        if state.fail_modify.contains(id) {
            return Err(SourceError::RequestFailed {
                service: "gmail".into(),
                reason: "injected modify failure".into(),
            });
        }
        state.mutations += 1;
        if let Some(email) = state.emails.iter_mut().find(|e| e.id == id) {
            email.label_ids.retain(|l| !remove.contains(l));
            for label in add {
                if !email.label_ids.contains(label) {
                    email.label_ids.push(label.clone());
                }
            }
        }
        Ok(())
    }

    async fn send_raw(&self, mime: &[u8]) -> Result<(), SourceError> {
        let mut state = self.state.lock().unwrap();
        if state.fail_send {
            return Err(SourceError::RequestFailed {
                service: "gmail".into(),
                reason: "injected send failure".into(),
            });
        }
        state.sent.push(mime.to_vec());
        Ok(())
    }

    async fn profile_address(&self) -> Result<String, SourceError> {
        Ok("me@example.com".to_string())
    }

    async fn archive(&self, id: &str) -> Result<(), SourceError> {
        let mut state = self.state.lock().unwrap();
        if state.fail_archive.contains(id) {
            return Err(SourceError::RequestFailed {
                service: "gmail".into(),
                reason: "injected archive failure".into(),
            });
        }
        if let Some(email) = state.emails.iter_mut().find(|e| e.id == id) {
            email.label_ids.retain(|l| l != "INBOX");
        }
        state.archived.push(id.to_string());
        Ok(())
    }

    async fn list_labels(&self) -> Result<Vec<(String, String)>, SourceError> {
        let state = self.state.lock().unwrap();
        let mut labels: Vec<(String, String)> = crate::labels::PROTECTED_SYSTEM_LABELS
            .iter()
            .map(|name| (name.to_string(), name.to_string()))
            .collect();
        labels.extend(state.labels.iter().map(|(n, i)| (n.clone(), i.clone())));
        Ok(labels)
    }

    async fn create_label(&self, name: &str) -> Result<String, SourceError> {
        let mut state = self.state.lock().unwrap();
        state.created_labels += 1;
        state.next_label += 1;
        let id = format!("Label_{}", state.next_label);
        state.labels.insert(name.to_string(), id.clone());
        Ok(id)
    }
}

// ── Calendar ────────────────────────────────────────────────────────

#[derive(Default)]
pub struct FakeCalendar {
    events: Vec<EventRecord>,
}

impl FakeCalendar {
    pub fn with_events(events: Vec<EventRecord>) -> Self {
        Self { events }
    }
}

#[async_trait]
impl CalendarSource for FakeCalendar {
    async fn list_events(&self, _date: NaiveDate) -> Result<Vec<EventRecord>, SourceError> {
        Ok(self.events.clone())
    }
}

/// Always fails with the wrapped error's message.
pub struct FailingCalendar(pub SourceError);

#[async_trait]
impl CalendarSource for FailingCalendar {
    async fn list_events(&self, _date: NaiveDate) -> Result<Vec<EventRecord>, SourceError> {
        Err(SourceError::Unavailable {
            service: "calendar".into(),
            reason: self.0.to_string(),
        })
    }
}

// ── Tasks ───────────────────────────────────────────────────────────

#[derive(Default)]
pub struct FakeTasks {
    tasks: Vec<TaskRecord>,
}

impl FakeTasks {
    pub fn with_tasks(tasks: Vec<TaskRecord>) -> Self {
        Self { tasks }
    }
}

#[async_trait]
impl TaskSource for FakeTasks {
    async fn list_tasks(&self, _date: NaiveDate) -> Result<Vec<TaskRecord>, SourceError> {
        Ok(self.tasks.clone())
    }
}

// ── Documents ───────────────────────────────────────────────────────

#[derive(Default)]
pub struct FakeDocs {
    docs: Vec<DocRef>,
}

impl FakeDocs {
    pub fn with_docs(docs: Vec<DocRef>) -> Self {
        Self { docs }
    }
}

#[async_trait]
impl DocumentSearch for FakeDocs {
    async fn ready(&self) -> Result<(), SourceError> {
        Ok(())
    }

    async fn search(&self, _query: &str, max_results: u32) -> Result<Vec<DocRef>, SourceError> {
        Ok(self.docs.iter().take(max_results as usize).cloned().collect())
    }
}

// ── Narrative ───────────────────────────────────────────────────────

/// Deterministic generator: names the stage role and echoes input size.
#[derive(Default)]
pub struct FakeGenerator;

#[async_trait]
impl NarrativeGenerator for FakeGenerator {
    fn model_name(&self) -> &str {
        "fake-model"
    }

    async fn generate(
        &self,
        stage: &NarrativeStageConfig,
        _context: &str,
        input: &str,
    ) -> Result<String, LlmError> {
        Ok(format!(
            "Narrative by {} covering {} input bytes.",
            stage.role,
            input.len()
        ))
    }
}

/// Always fails, as a provider outage would.
pub struct FailingGenerator;

#[async_trait]
impl NarrativeGenerator for FailingGenerator {
    fn model_name(&self) -> &str {
        "failing-model"
    }

    async fn generate(
        &self,
        _stage: &NarrativeStageConfig,
        _context: &str,
        _input: &str,
    ) -> Result<String, LlmError> {
        Err(LlmError::RequestFailed {
            provider: "fake".into(),
            reason: "provider outage".into(),
        })
    }
}

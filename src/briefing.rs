//! Daily briefing generation — the `brief` workflow.
//!
//! Wires the concrete stage graph:
//!
//! ```text
//! collect ─→ classify-emails ─→ write-email-summary ─┐
//! collect ─→ enrich-calendar ────────────────────────┼─→ assemble-document
//! collect ─→ process-tasks ──────────────────────────┘
//! ```
//!
//! The three middle stages produce section narratives through the
//! LLM collaborator; assembly is deterministic scaffolding so failure
//! notices always survive into the final document, whatever the model
//! does. A failed source degrades its section; a failed narrative call
//! degrades its stage; the document is produced regardless.

use std::sync::{Arc, OnceLock};

use chrono::NaiveDate;
use tracing::{info, warn};

use crate::classify::Classifier;
use crate::collect::{self, Collected, Sources};
use crate::error::Error;
use crate::labels::ActionLabel;
use crate::llm::{NarrativeGenerator, NarrativeStageConfig};
use crate::pipeline::{Pipeline, StageFailure};
use crate::sources::{
    CalendarSource, DocumentSearch, EmailSource, EventRecord, SourceStatus, TaskRecord, TaskSource,
};

/// Documents fetched per event during calendar enrichment.
const DOCS_PER_EVENT: u32 = 2;

// ── Stage configs ───────────────────────────────────────────────────

fn email_summary_stage() -> NarrativeStageConfig {
    NarrativeStageConfig::new(
        "an email briefing specialist",
        "Summarize the classified emails into a short briefing section, grouped by action \
         category, keeping every hyperlink and naming senders.",
        "The input lists emails grouped by action label (todo, 2min, review, meetings, fyi), \
         one line per email with subject and sender.",
    )
}

fn calendar_stage() -> NarrativeStageConfig {
    NarrativeStageConfig::new(
        "a calendar analyst",
        "Write the daily agenda in strict chronological order, enriching each event with its \
         context, attendees, and any related documents.",
        "The input lists the day's accepted events with times, locations, meeting links, and \
         related workspace documents found for each event.",
    )
}

fn tasks_stage() -> NarrativeStageConfig {
    NarrativeStageConfig::new(
        "a task manager",
        "Produce a prioritized action-item list for the day, flagging overdue items first.",
        "The input lists tasks with due dates and priorities (4 is most urgent).",
    )
}

// ── Stage currency ──────────────────────────────────────────────────

/// Value passed between pipeline stages.
#[derive(Clone)]
pub enum StageData {
    Collected(Arc<Collected>),
    Text(String),
}

impl StageData {
    fn collected(&self) -> Option<Arc<Collected>> {
        match self {
            Self::Collected(c) => Some(Arc::clone(c)),
            Self::Text(_) => None,
        }
    }

    fn text(&self) -> &str {
        match self {
            Self::Text(t) => t,
            Self::Collected(_) => "",
        }
    }
}

// ── Dependencies & options ──────────────────────────────────────────

/// Collaborators the briefing pipeline closes over.
#[derive(Clone)]
pub struct BriefingDeps {
    pub email: Arc<dyn EmailSource>,
    pub calendar: Arc<dyn CalendarSource>,
    pub tasks: Option<Arc<dyn TaskSource>>,
    pub documents: Arc<dyn DocumentSearch>,
    pub generator: Arc<dyn NarrativeGenerator>,
}

#[derive(Debug, Clone)]
pub struct BriefingOptions {
    pub target_date: NaiveDate,
    pub days_back: u32,
    pub max_emails: u32,
    pub stage_timeout: std::time::Duration,
}

/// A produced briefing plus its degradation record.
pub struct BriefingOutcome {
    pub document: String,
    pub stage_failures: Vec<StageFailure>,
    pub source_failures: Vec<SourceStatus>,
}

impl BriefingOutcome {
    pub fn is_degraded(&self) -> bool {
        !self.stage_failures.is_empty() || !self.source_failures.is_empty()
    }
}

// ── Digest builders (deterministic, LLM-facing) ─────────────────────

/// Group collected emails by action label, in priority order.
fn classification_digest(classifier: &Classifier, collected: &Collected) -> String {
    let mut grouped: Vec<(ActionLabel, Vec<String>)> =
        ActionLabel::ALL.iter().map(|l| (*l, Vec::new())).collect();

    for email in &collected.emails {
        let label = email.action_label.unwrap_or_else(|| {
            classifier.classify(
                &email.sender,
                &email.subject,
                &email.body,
                &email.type_labels(),
            )
        });
        if let Some((_, bucket)) = grouped.iter_mut().find(|(l, _)| *l == label) {
            bucket.push(format!("\"{}\" — {}", email.subject, email.sender));
        }
    }

    let mut out = String::new();
    for (label, lines) in &grouped {
        if lines.is_empty() {
            continue;
        }
        out.push_str(&format!("{} ({}):\n", label.name(), lines.len()));
        for line in lines {
            out.push_str("- ");
            out.push_str(line);
            out.push('\n');
        }
    }
    if out.is_empty() {
        out.push_str("(no emails in the window)\n");
    }
    out
}

fn event_line(event: &EventRecord) -> String {
    let mut line = format!(
        "{}–{} {}",
        event.start.format("%H:%M"),
        event.end.format("%H:%M"),
        event.title
    );
    if let Some(loc) = &event.location {
        line.push_str(&format!(" ({loc})"));
    }
    if let Some(url) = &event.meeting_url {
        line.push_str(&format!(" [{url}]"));
    }
    if !event.attendees.is_empty() {
        line.push_str(&format!(" — attendees: {}", event.attendees.join(", ")));
    }
    line
}

fn task_line(task: &TaskRecord) -> String {
    let due = task
        .due
        .map(|d| d.to_string())
        .unwrap_or_else(|| "no due date".into());
    format!("[p{}] {} (due {})", task.priority, task.content, due)
}

// ── Pipeline construction ───────────────────────────────────────────

/// Generate the briefing document for one date.
pub async fn run_briefing(
    deps: BriefingDeps,
    classifier: Arc<Classifier>,
    opts: BriefingOptions,
) -> Result<BriefingOutcome, Error> {
    info!(date = %opts.target_date, "generating daily briefing");

    // The assemble stage reads the per-source status records for its
    // notice block; collect publishes them here once, read-only after.
    let statuses: Arc<OnceLock<Vec<SourceStatus>>> = Arc::new(OnceLock::new());

    let pipeline = build_pipeline(&deps, &classifier, &opts, Arc::clone(&statuses))?;
    let run = pipeline.run(StageData::Text(String::new())).await;

    let source_failures: Vec<SourceStatus> = statuses
        .get()
        .map(|all| all.iter().filter(|s| !s.available).cloned().collect())
        .unwrap_or_default();

    let document = match run.output("assemble-document") {
        Some(data) => data.text().to_string(),
        // Terminal stage itself failed: emit the fallback error document
        // rather than nothing.
        None => {
            warn!("assemble stage produced no output, emitting fallback document");
            fallback_document(opts.target_date, &run.failures)
        }
    };

    Ok(BriefingOutcome {
        document,
        stage_failures: run.failures,
        source_failures,
    })
}

fn build_pipeline(
    deps: &BriefingDeps,
    classifier: &Arc<Classifier>,
    opts: &BriefingOptions,
    statuses: Arc<OnceLock<Vec<SourceStatus>>>,
) -> Result<Pipeline<StageData>, Error> {
    let target_date = opts.target_date;
    let days_back = opts.days_back;
    let max_emails = opts.max_emails;

    let collect_deps = deps.clone();
    let classify_classifier = Arc::clone(classifier);
    let summary_generator = Arc::clone(&deps.generator);
    let calendar_generator = Arc::clone(&deps.generator);
    let calendar_docs = Arc::clone(&deps.documents);
    let tasks_generator = Arc::clone(&deps.generator);
    let assemble_statuses = Arc::clone(&statuses);

    let pipeline = Pipeline::<StageData>::builder()
        .stage_timeout(opts.stage_timeout)
        .stage("collect", &[], move |_| {
            let deps = collect_deps.clone();
            let statuses = Arc::clone(&statuses);
            async move {
                let sources = Sources {
                    email: deps.email.as_ref(),
                    calendar: deps.calendar.as_ref(),
                    tasks: deps.tasks.as_deref(),
                    documents: deps.documents.as_ref(),
                };
                let collected =
                    collect::collect(&sources, target_date, days_back, max_emails).await;
                let _ = statuses.set(collected.statuses.clone());
                Ok(StageData::Collected(Arc::new(collected)))
            }
        })
        .stage("classify-emails", &["collect"], move |ctx| {
            let classifier = Arc::clone(&classify_classifier);
            async move {
                let collected = ctx
                    .first()
                    .and_then(StageData::collected)
                    .ok_or_else(|| "no collected data".to_string())?;
                if let Some(status) = collected.failures().iter().find(|s| s.source == "gmail") {
                    return Err(format!(
                        "gmail unavailable: {}",
                        status.error.as_deref().unwrap_or("unknown")
                    ));
                }
                Ok(StageData::Text(classification_digest(
                    &classifier,
                    &collected,
                )))
            }
        })
        .stage(
            "write-email-summary",
            &["classify-emails"],
            move |ctx| {
                let generator = Arc::clone(&summary_generator);
                async move {
                    let Some(digest) = ctx.first() else {
                        // Upstream classification failed; degrade the
                        // section instead of calling the model.
                        let notes: Vec<String> =
                            ctx.upstream_failures.iter().map(|f| f.notice()).collect();
                        return Ok(StageData::Text(format!(
                            "Email summary unavailable. {}",
                            notes.join(" ")
                        )));
                    };
                    let narrative = generator
                        .generate(
                            &email_summary_stage(),
                            &format!("Briefing date: {target_date}"),
                            digest.text(),
                        )
                        .await
                        .map_err(|e| e.to_string())?;
                    Ok(StageData::Text(narrative))
                }
            },
        )
        .stage("enrich-calendar", &["collect"], move |ctx| {
            let generator = Arc::clone(&calendar_generator);
            let docs = Arc::clone(&calendar_docs);
            async move {
                let collected = ctx
                    .first()
                    .and_then(StageData::collected)
                    .ok_or_else(|| "no collected data".to_string())?;
                if let Some(status) = collected.failures().iter().find(|s| s.source == "calendar")
                {
                    return Ok(StageData::Text(format!(
                        "Daily agenda unavailable — calendar source failed: {}.",
                        status.error.as_deref().unwrap_or("unknown")
                    )));
                }
                if collected.events.is_empty() {
                    return Ok(StageData::Text("No events scheduled.".to_string()));
                }

                let workspace_ready = collected
                    .statuses
                    .iter()
                    .any(|s| s.source == "workspace" && s.available);

                let mut events = collected.events.clone();
                events.sort_by_key(|e| e.start);
                let mut digest = String::new();
                for event in &events {
                    digest.push_str(&event_line(event));
                    digest.push('\n');
                    if workspace_ready {
                        match docs.search(&event.title, DOCS_PER_EVENT).await {
                            Ok(found) => {
                                for doc in found {
                                    digest.push_str(&format!(
                                        "  related: {} <{}>\n",
                                        doc.title, doc.url
                                    ));
                                }
                            }
                            // Enrichment is best-effort; the agenda
                            // stands without it.
                            Err(e) => warn!(event = %event.title, error = %e, "doc search failed"),
                        }
                    }
                }

                let narrative = generator
                    .generate(
                        &calendar_stage(),
                        &format!("Briefing date: {target_date}"),
                        &digest,
                    )
                    .await
                    .map_err(|e| e.to_string())?;
                Ok(StageData::Text(narrative))
            }
        })
        .stage("process-tasks", &["collect"], move |ctx| {
            let generator = Arc::clone(&tasks_generator);
            async move {
                let collected = ctx
                    .first()
                    .and_then(StageData::collected)
                    .ok_or_else(|| "no collected data".to_string())?;
                if let Some(status) = collected.failures().iter().find(|s| s.source == "todoist") {
                    return Ok(StageData::Text(format!(
                        "Action items unavailable — task source failed: {}.",
                        status.error.as_deref().unwrap_or("unknown")
                    )));
                }
                if collected.tasks.is_empty() {
                    return Ok(StageData::Text("No tasks due today.".to_string()));
                }

                let mut tasks = collected.tasks.clone();
                tasks.sort_by(|a, b| b.priority.cmp(&a.priority));
                let digest: String = tasks
                    .iter()
                    .map(|t| format!("{}\n", task_line(t)))
                    .collect();

                let narrative = generator
                    .generate(
                        &tasks_stage(),
                        &format!("Briefing date: {target_date}"),
                        &digest,
                    )
                    .await
                    .map_err(|e| e.to_string())?;
                Ok(StageData::Text(narrative))
            }
        })
        .stage(
            "assemble-document",
            &["write-email-summary", "enrich-calendar", "process-tasks"],
            move |ctx| {
                let statuses = Arc::clone(&assemble_statuses);
                async move {
                    let email_summary = ctx.input_of("write-email-summary").map(StageData::text);
                    let agenda = ctx.input_of("enrich-calendar").map(StageData::text);
                    let action_items = ctx.input_of("process-tasks").map(StageData::text);

                    let source_failures: Vec<SourceStatus> = statuses
                        .get()
                        .map(|all| all.iter().filter(|s| !s.available).cloned().collect())
                        .unwrap_or_default();

                    Ok(StageData::Text(assemble_document(
                        target_date,
                        action_items,
                        email_summary,
                        agenda,
                        &source_failures,
                        &ctx.upstream_failures,
                    )))
                }
            },
        )
        .build()?;

    Ok(pipeline)
}

// ── Document assembly ───────────────────────────────────────────────

/// Deterministic three-section scaffold. Section order is fixed:
/// Action Items, Email Summary, Daily Agenda.
fn assemble_document(
    date: NaiveDate,
    action_items: Option<&str>,
    email_summary: Option<&str>,
    agenda: Option<&str>,
    source_failures: &[SourceStatus],
    stage_failures: &[StageFailure],
) -> String {
    let mut doc = format!("# Daily Briefing for {}\n\n", date.format("%A, %B %d, %Y"));

    doc.push_str("## Action Items\n\n");
    doc.push_str(action_items.unwrap_or("_Section unavailable._"));
    doc.push_str("\n\n");

    doc.push_str("## Email Summary\n\n");
    doc.push_str(email_summary.unwrap_or("_Section unavailable._"));
    doc.push_str("\n\n");

    doc.push_str("## Daily Agenda\n\n");
    doc.push_str(agenda.unwrap_or("_Section unavailable._"));
    doc.push('\n');

    if !source_failures.is_empty() || !stage_failures.is_empty() {
        doc.push_str("\n## Data source issues\n\n");
        for status in source_failures {
            doc.push_str(&format!(
                "- {} unavailable: {}\n",
                status.source,
                status.error.as_deref().unwrap_or("unknown error")
            ));
        }
        for failure in stage_failures {
            doc.push_str(&format!("- {}\n", failure.notice()));
        }
    }
    doc
}

/// Emitted when even the assemble stage could not run.
fn fallback_document(date: NaiveDate, failures: &[StageFailure]) -> String {
    let mut doc = format!(
        "# Daily Briefing for {}\n\n## Briefing generation failed\n\n",
        date.format("%A, %B %d, %Y")
    );
    for failure in failures {
        doc.push_str(&format!("- {}\n", failure.notice()));
    }
    doc.push_str(
        "\nCheck API credentials, network connectivity, and re-run with --verbose for details.\n",
    );
    doc
}

//! Todo forwarding and archival — the `todos` workflow.
//!
//! Finds emails labeled `todo`, forwards each to the configured task
//! inbox (subject preserved, so the task system titles the task from
//! it), and archives the original — strictly in that order. An email is
//! never archived unless its forward succeeded in the same run;
//! "forwarded but not archived" is a distinct terminal state, reported
//! and left for the next run's operator rather than retried blindly.
//!
//! Idempotence comes from re-querying the `todo` label fresh each run:
//! an archived message keeps its label but a prior successful run has
//! removed it from the query window's inbox state; nothing is persisted
//! between runs.

use chrono::{DateTime, Utc};
use lettre::message::Mailbox;
use lettre::Message;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::error::Error;
use crate::sources::{EmailRecord, EmailSource};

// ── Item lifecycle ──────────────────────────────────────────────────

/// Per-item forwarding state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ForwardState {
    Pending,
    Forwarded,
    Archived,
    FailedForward,
    FailedArchive,
}

/// One email moving through the forward→archive workflow.
#[derive(Debug, Clone)]
pub struct TodoItem {
    pub email_id: String,
    pub subject: String,
    pub sender: String,
    pub state: ForwardState,
}

impl TodoItem {
    fn new(email: &EmailRecord) -> Self {
        Self {
            email_id: email.id.clone(),
            subject: email.subject.clone(),
            sender: email.sender.clone(),
            state: ForwardState::Pending,
        }
    }

    /// Legal transitions only; archival is unreachable except from
    /// `Forwarded`.
    fn transition(&mut self, to: ForwardState) -> bool {
        use ForwardState::*;
        let legal = matches!(
            (self.state, to),
            (Pending, Forwarded)
                | (Pending, FailedForward)
                | (Forwarded, Archived)
                | (Forwarded, FailedArchive)
        );
        if legal {
            self.state = to;
        }
        legal
    }
}

// ── Options & report ────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct TodoOptions {
    pub days_back: u32,
    pub max_emails: u32,
    pub dry_run: bool,
}

impl Default for TodoOptions {
    fn default() -> Self {
        Self {
            days_back: 7,
            max_emails: 20,
            dry_run: false,
        }
    }
}

/// Outcome of one todo-processing run. Identical shape for dry runs.
#[derive(Debug, Clone)]
pub struct TodoReport {
    pub run_id: Uuid,
    pub run_at: DateTime<Utc>,
    pub forward_address: String,
    pub days_back: u32,
    pub dry_run: bool,
    pub processed: u32,
    pub forwarded: u32,
    pub archived: u32,
    pub failed_forward: u32,
    pub failed_archive: u32,
    pub lines: Vec<String>,
    pub items: Vec<TodoItem>,
}

impl TodoReport {
    fn new(forward_address: &str, opts: &TodoOptions) -> Self {
        Self {
            run_id: Uuid::new_v4(),
            run_at: Utc::now(),
            forward_address: forward_address.to_string(),
            days_back: opts.days_back,
            dry_run: opts.dry_run,
            processed: 0,
            forwarded: 0,
            archived: 0,
            failed_forward: 0,
            failed_archive: 0,
            lines: Vec::new(),
            items: Vec::new(),
        }
    }

    pub fn render(&self) -> String {
        let mut out = String::new();
        out.push_str("TODO PROCESSING REPORT\n");
        out.push_str(&format!("Run: {}\n", self.run_id));
        out.push_str(&format!("Date: {}\n", self.run_at.to_rfc3339()));
        out.push_str(&format!("Forward address: {}\n", self.forward_address));
        out.push_str(&format!("Window: last {} days\n", self.days_back));
        out.push_str(&format!(
            "Dry run: {}\n\n",
            if self.dry_run {
                "yes (nothing forwarded or archived)"
            } else {
                "no"
            }
        ));

        if self.lines.is_empty() {
            out.push_str("No todo emails found in the window.\n");
        } else {
            out.push_str("RESULTS:\n");
            for line in &self.lines {
                out.push_str("  ");
                out.push_str(line);
                out.push('\n');
            }
        }

        out.push_str("\nSUMMARY:\n");
        out.push_str(&format!("  Processed: {}\n", self.processed));
        if self.dry_run {
            out.push_str(&format!("  Would forward and archive: {}\n", self.processed));
        } else {
            out.push_str(&format!("  Forwarded: {}\n", self.forwarded));
            out.push_str(&format!("  Archived: {}\n", self.archived));
            out.push_str(&format!("  Failed to forward: {}\n", self.failed_forward));
            out.push_str(&format!(
                "  Forwarded but not archived: {}\n",
                self.failed_archive
            ));
        }
        out
    }
}

// ── Forward message construction ────────────────────────────────────

/// Build the forwarded RFC 822 message. The original subject is kept
/// verbatim; the body is wrapped in the conventional forward frame.
fn build_forward_mime(
    item: &EmailRecord,
    to: &str,
    from: &str,
) -> Result<Vec<u8>, String> {
    let to: Mailbox = to
        .parse()
        .map_err(|e| format!("invalid forward address: {e}"))?;
    let from: Mailbox = from
        .parse()
        .map_err(|e| format!("invalid sender address: {e}"))?;

    let body = format!(
        "---------- Forwarded message ----------\n\
         From: {}\n\
         Date: {}\n\
         Subject: {}\n\
         \n\
         {}\n",
        item.sender,
        item.timestamp.to_rfc2822(),
        item.subject,
        item.body,
    );

    let message = Message::builder()
        .from(from)
        .to(to)
        .subject(&item.subject)
        .body(body)
        .map_err(|e| format!("failed to build forward message: {e}"))?;

    Ok(message.formatted())
}

// ── Batch ───────────────────────────────────────────────────────────

/// Forward and archive one batch of todo-labeled emails.
pub async fn process_todo_batch(
    email: &dyn EmailSource,
    forward_address: &str,
    opts: &TodoOptions,
) -> Result<TodoReport, Error> {
    // Fresh query each run; messages a previous run archived still carry
    // the label, but selection is what keeps re-runs harmless.
    let candidates = email
        .list(opts.days_back, opts.max_emails, Some("label:todo"))
        .await
        .map_err(Error::Source)?;

    let sender_address = email.profile_address().await.map_err(Error::Source)?;
    info!(
        candidates = candidates.len(),
        forward_address,
        dry_run = opts.dry_run,
        "starting todo batch"
    );

    let mut report = TodoReport::new(forward_address, opts);

    for record in &candidates {
        if record.label_ids.iter().any(|l| l == "TRASH") {
            debug!(id = %record.id, "skipping trashed todo");
            continue;
        }

        report.processed += 1;
        let mut item = TodoItem::new(record);
        let subject = truncate(&record.subject, 40);

        if opts.dry_run {
            report
                .lines
                .push(format!("{subject} -> would forward and archive"));
            report.items.push(item);
            continue;
        }

        let forward_result = match build_forward_mime(record, forward_address, &sender_address) {
            Ok(mime) => email.send_raw(&mime).await.map_err(|e| e.to_string()),
            Err(e) => Err(e),
        };

        match forward_result {
            Ok(()) => {
                item.transition(ForwardState::Forwarded);
                report.forwarded += 1;
            }
            Err(reason) => {
                // Forward failed: archive is never attempted for this item.
                warn!(id = %record.id, %reason, "forward failed");
                item.transition(ForwardState::FailedForward);
                report.failed_forward += 1;
                report.lines.push(format!("{subject} -> FAILED to forward"));
                report.items.push(item);
                continue;
            }
        }

        match email.archive(&record.id).await {
            Ok(()) => {
                item.transition(ForwardState::Archived);
                report.archived += 1;
                report
                    .lines
                    .push(format!("{subject} -> forwarded and archived"));
            }
            Err(e) => {
                warn!(id = %record.id, error = %e, "archive failed after forward");
                item.transition(ForwardState::FailedArchive);
                report.failed_archive += 1;
                report
                    .lines
                    .push(format!("{subject} -> forwarded but NOT archived"));
            }
        }
        report.items.push(item);
    }

    info!(
        processed = report.processed,
        forwarded = report.forwarded,
        archived = report.archived,
        failed_forward = report.failed_forward,
        failed_archive = report.failed_archive,
        "todo batch complete"
    );
    Ok(report)
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let head: String = s.chars().take(max).collect();
        format!("{head}...")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::FakeEmail;

    fn todo_email(fake: &FakeEmail, id: &str, subject: &str) -> EmailRecord {
        let todo_id = fake.seed_label("todo");
        EmailRecord {
            id: id.into(),
            thread_id: format!("t-{id}"),
            sender: "Alice <alice@example.com>".into(),
            subject: subject.into(),
            body: "Please handle this.".into(),
            timestamp: Utc::now(),
            label_ids: vec!["INBOX".into(), todo_id],
            label_names: vec![],
            action_label: None,
        }
    }

    fn opts() -> TodoOptions {
        TodoOptions::default()
    }

    #[tokio::test]
    async fn forward_then_archive_happy_path() {
        let fake = FakeEmail::with_emails(vec![]);
        let record = todo_email(&fake, "m1", "Renew passport");
        fake.push_email(record);

        let report = process_todo_batch(&fake, "inbox@todoist.net", &opts())
            .await
            .unwrap();
        assert_eq!(report.processed, 1);
        assert_eq!(report.forwarded, 1);
        assert_eq!(report.archived, 1);
        assert_eq!(report.items[0].state, ForwardState::Archived);
        assert_eq!(fake.sent_count(), 1);
        assert_eq!(fake.archived_ids(), vec!["m1".to_string()]);
    }

    #[tokio::test]
    async fn failed_forward_never_archives() {
        let fake = FakeEmail::with_emails(vec![]);
        let record = todo_email(&fake, "m1", "Renew passport");
        fake.push_email(record);
        fake.fail_send();

        let report = process_todo_batch(&fake, "inbox@todoist.net", &opts())
            .await
            .unwrap();
        assert_eq!(report.failed_forward, 1);
        assert_eq!(report.archived, 0);
        assert_eq!(report.items[0].state, ForwardState::FailedForward);
        // The archive call must never have been issued.
        assert!(fake.archived_ids().is_empty());
    }

    #[tokio::test]
    async fn forwarded_but_not_archived_is_distinct() {
        let fake = FakeEmail::with_emails(vec![]);
        let record = todo_email(&fake, "m1", "Renew passport");
        fake.push_email(record);
        fake.fail_archive_for("m1");

        let report = process_todo_batch(&fake, "inbox@todoist.net", &opts())
            .await
            .unwrap();
        assert_eq!(report.forwarded, 1);
        assert_eq!(report.archived, 0);
        assert_eq!(report.failed_archive, 1);
        assert_eq!(report.items[0].state, ForwardState::FailedArchive);
        assert!(report.render().contains("forwarded but NOT archived"));
    }

    #[tokio::test]
    async fn dry_run_touches_nothing() {
        let fake = FakeEmail::with_emails(vec![]);
        let record = todo_email(&fake, "m1", "Renew passport");
        fake.push_email(record);

        let dry = TodoOptions {
            dry_run: true,
            ..TodoOptions::default()
        };
        let report = process_todo_batch(&fake, "inbox@todoist.net", &dry)
            .await
            .unwrap();
        assert_eq!(report.processed, 1);
        assert_eq!(fake.sent_count(), 0);
        assert!(fake.archived_ids().is_empty());
        assert_eq!(fake.mutation_count(), 0);
        assert_eq!(report.items[0].state, ForwardState::Pending);
        assert!(report.render().contains("would forward and archive"));
    }

    #[tokio::test]
    async fn one_bad_item_does_not_stop_the_batch() {
        let fake = FakeEmail::with_emails(vec![]);
        let a = todo_email(&fake, "m1", "First");
        let b = todo_email(&fake, "m2", "Second");
        fake.push_email(a);
        fake.push_email(b);
        fake.fail_archive_for("m1");

        let report = process_todo_batch(&fake, "inbox@todoist.net", &opts())
            .await
            .unwrap();
        assert_eq!(report.processed, 2);
        assert_eq!(report.forwarded, 2);
        assert_eq!(report.archived, 1);
        assert_eq!(report.failed_archive, 1);
    }

    #[tokio::test]
    async fn trashed_todos_are_not_selected() {
        let fake = FakeEmail::with_emails(vec![]);
        let mut record = todo_email(&fake, "m1", "Old todo");
        record.label_ids.push("TRASH".into());
        fake.push_email(record);

        let report = process_todo_batch(&fake, "inbox@todoist.net", &opts())
            .await
            .unwrap();
        assert_eq!(report.processed, 0);
        assert_eq!(fake.sent_count(), 0);
    }

    #[test]
    fn transition_guards_archive() {
        let record = EmailRecord {
            id: "m1".into(),
            thread_id: "t1".into(),
            sender: "a@b.com".into(),
            subject: "S".into(),
            body: String::new(),
            timestamp: Utc::now(),
            label_ids: vec![],
            label_names: vec![],
            action_label: None,
        };
        let mut item = TodoItem::new(&record);
        // Pending → Archived is illegal.
        assert!(!item.transition(ForwardState::Archived));
        assert_eq!(item.state, ForwardState::Pending);

        assert!(item.transition(ForwardState::Forwarded));
        assert!(item.transition(ForwardState::Archived));
        assert_eq!(item.state, ForwardState::Archived);
    }

    #[test]
    fn forward_mime_preserves_subject_and_frames_body() {
        let record = EmailRecord {
            id: "m1".into(),
            thread_id: "t1".into(),
            sender: "Alice <alice@example.com>".into(),
            subject: "Renew passport".into(),
            body: "Don't forget.".into(),
            timestamp: Utc::now(),
            label_ids: vec![],
            label_names: vec![],
            action_label: None,
        };
        let mime = build_forward_mime(&record, "inbox@todoist.net", "me@example.com").unwrap();
        let text = String::from_utf8_lossy(&mime);
        assert!(text.contains("Subject: Renew passport"));
        assert!(text.contains("To: inbox@todoist.net"));
        assert!(text.contains("---------- Forwarded message ----------"));
        assert!(text.contains("Don't forget."));
    }

    #[test]
    fn forward_mime_rejects_bad_address() {
        let record = EmailRecord {
            id: "m1".into(),
            thread_id: "t1".into(),
            sender: "a@b.com".into(),
            subject: "S".into(),
            body: String::new(),
            timestamp: Utc::now(),
            label_ids: vec![],
            label_names: vec![],
            action_label: None,
        };
        assert!(build_forward_mime(&record, "not-an-address", "me@example.com").is_err());
    }
}

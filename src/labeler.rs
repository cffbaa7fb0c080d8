//! Label reconciliation — mapping classification decisions onto Gmail.
//!
//! The reconciler owns the name→id label map for a run. It is built once
//! (`ensure_labels` creates any missing action label; `load_existing`
//! never creates, for dry runs) and is read-only afterwards. `apply`
//! issues a single atomic modify per message: add the chosen action
//! label, remove every *other* action label — and nothing else. Gmail
//! system and foreign user labels are never touched.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::classify::Classifier;
use crate::error::{Error, LabelError};
use crate::labels::{ActionLabel, SKIP_FOLDER_LABELS};
use crate::sources::{EmailRecord, EmailSource};

// ── Label map ───────────────────────────────────────────────────────

/// Name→id map over the label store, frozen for the run.
#[derive(Debug, Clone, Default)]
pub struct LabelMap {
    name_to_id: HashMap<String, String>,
}

impl LabelMap {
    pub fn new(pairs: impl IntoIterator<Item = (String, String)>) -> Self {
        Self {
            name_to_id: pairs.into_iter().collect(),
        }
    }

    /// Store id of an action label, if the store has it.
    pub fn id_of(&self, label: ActionLabel) -> Option<&str> {
        self.name_to_id.get(label.name()).map(String::as_str)
    }

    /// Reverse lookup: which action label (if any) a store id denotes.
    pub fn action_label_for_id(&self, id: &str) -> Option<ActionLabel> {
        ActionLabel::ALL
            .into_iter()
            .find(|l| self.id_of(*l) == Some(id))
    }

    /// True when the message already carries any action label.
    pub fn has_action_label(&self, label_ids: &[String]) -> bool {
        label_ids
            .iter()
            .any(|id| self.action_label_for_id(id).is_some())
    }
}

// ── Reconciler ──────────────────────────────────────────────────────

/// Applies classification decisions to the label store.
pub struct LabelReconciler {
    map: LabelMap,
}

impl LabelReconciler {
    /// Query the store once and create any missing action label.
    pub async fn ensure_labels(email: &dyn EmailSource) -> Result<Self, LabelError> {
        let existing = email
            .list_labels()
            .await
            .map_err(|e| LabelError::List(e.to_string()))?;
        let mut map = LabelMap::new(existing);

        for label in ActionLabel::ALL {
            if map.id_of(label).is_none() {
                let id = email.create_label(label.name()).await.map_err(|e| {
                    LabelError::Create {
                        name: label.name().to_string(),
                        reason: e.to_string(),
                    }
                })?;
                info!(label = label.name(), %id, "created missing action label");
                map.name_to_id.insert(label.name().to_string(), id);
            }
        }
        Ok(Self { map })
    }

    /// Query the store once, creating nothing. Dry-run analysis can run
    /// against a store that has never seen this system's labels.
    pub async fn load_existing(email: &dyn EmailSource) -> Result<Self, LabelError> {
        let existing = email
            .list_labels()
            .await
            .map_err(|e| LabelError::List(e.to_string()))?;
        Ok(Self {
            map: LabelMap::new(existing),
        })
    }

    pub fn map(&self) -> &LabelMap {
        &self.map
    }

    /// Pre-filter, applied before classification is even considered:
    /// skip spam/trash/draft/sent, anything outside the inbox, and
    /// messages that already carry an action label (re-run safety).
    pub fn should_skip(&self, email: &EmailRecord) -> bool {
        if SKIP_FOLDER_LABELS
            .iter()
            .any(|skip| email.label_ids.iter().any(|id| id == skip))
        {
            return true;
        }
        if !email.label_ids.iter().any(|id| id == "INBOX") {
            return true;
        }
        self.map.has_action_label(&email.label_ids)
    }

    /// The ids to strip when applying `chosen`: every other action label
    /// currently on the message. Never a system or foreign label id —
    /// membership in the reconciler's own map is the filter.
    pub fn remove_set(&self, chosen: ActionLabel, current_label_ids: &[String]) -> Vec<String> {
        current_label_ids
            .iter()
            .filter(|id| {
                self.map
                    .action_label_for_id(id)
                    .is_some_and(|l| l != chosen)
            })
            .cloned()
            .collect()
    }

    /// One atomic mutation: add the chosen label, remove conflicting
    /// action labels.
    pub async fn apply(
        &self,
        email: &dyn EmailSource,
        item: &EmailRecord,
        chosen: ActionLabel,
    ) -> Result<(), LabelError> {
        let chosen_id = self
            .map
            .id_of(chosen)
            .ok_or_else(|| LabelError::UnknownLabel {
                name: chosen.name().to_string(),
            })?
            .to_string();
        let remove = self.remove_set(chosen, &item.label_ids);

        email
            .modify_labels(&item.id, &[chosen_id], &remove)
            .await
            .map_err(|e| LabelError::Mutation {
                message_id: item.id.clone(),
                reason: e.to_string(),
            })
    }
}

// ── Labeling batch ──────────────────────────────────────────────────

/// Options for one labeling run.
#[derive(Debug, Clone)]
pub struct LabelingOptions {
    pub days_back: u32,
    pub max_emails: u32,
    pub dry_run: bool,
}

impl Default for LabelingOptions {
    fn default() -> Self {
        Self {
            days_back: 7,
            max_emails: 50,
            dry_run: false,
        }
    }
}

/// Outcome of a labeling run. Same shape whether or not it was a dry
/// run — only the verbs in the lines differ.
#[derive(Debug, Clone)]
pub struct LabelingReport {
    pub run_id: Uuid,
    pub run_at: DateTime<Utc>,
    pub days_back: u32,
    pub dry_run: bool,
    pub processed: u32,
    pub labeled: u32,
    pub skipped: u32,
    pub failed: u32,
    /// Emails no phase-1..4 rule matched; labeled via the default phase.
    pub unclassified: u32,
    pub lines: Vec<String>,
}

impl LabelingReport {
    fn new(opts: &LabelingOptions) -> Self {
        Self {
            run_id: Uuid::new_v4(),
            run_at: Utc::now(),
            days_back: opts.days_back,
            dry_run: opts.dry_run,
            processed: 0,
            labeled: 0,
            skipped: 0,
            failed: 0,
            unclassified: 0,
            lines: Vec::new(),
        }
    }

    pub fn render(&self) -> String {
        let mut out = String::new();
        out.push_str("GMAIL LABELING REPORT\n");
        out.push_str(&format!("Run: {}\n", self.run_id));
        out.push_str(&format!("Date: {}\n", self.run_at.to_rfc3339()));
        out.push_str(&format!("Window: last {} days\n", self.days_back));
        out.push_str(&format!(
            "Dry run: {}\n\n",
            if self.dry_run { "yes (no labels applied)" } else { "no" }
        ));

        if self.lines.is_empty() {
            out.push_str("No unlabeled emails found in the window.\n");
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
            out.push_str(&format!("  Would label: {}\n", self.labeled));
        } else {
            out.push_str(&format!("  Labeled: {}\n", self.labeled));
            out.push_str(&format!("  Failed: {}\n", self.failed));
        }
        out.push_str(&format!("  Skipped (pre-filtered): {}\n", self.skipped));
        out.push_str(&format!("  Defaulted (no rule matched): {}\n", self.unclassified));
        out
    }
}

/// Gmail query that excludes already-labeled mail, so an unchanged inbox
/// yields an empty candidate list on re-run.
fn candidate_query() -> String {
    let exclusions: Vec<String> = ActionLabel::ALL
        .iter()
        .map(|l| format!("-label:{}", l.name()))
        .collect();
    format!("in:inbox {}", exclusions.join(" "))
}

/// Classify and label one batch of inbox emails.
pub async fn run_labeling(
    email: &dyn EmailSource,
    classifier: &Classifier,
    opts: &LabelingOptions,
) -> Result<LabelingReport, Error> {
    let reconciler = if opts.dry_run {
        LabelReconciler::load_existing(email).await?
    } else {
        LabelReconciler::ensure_labels(email).await?
    };

    let candidates = email
        .list(opts.days_back, opts.max_emails, Some(&candidate_query()))
        .await
        .map_err(Error::Source)?;
    info!(
        candidates = candidates.len(),
        dry_run = opts.dry_run,
        "starting labeling batch"
    );

    let mut report = LabelingReport::new(opts);

    for item in &candidates {
        report.processed += 1;

        if reconciler.should_skip(item) {
            report.skipped += 1;
            debug!(id = %item.id, "skipped by pre-filter");
            continue;
        }

        let subject = truncate(&item.subject, 50);
        let matched_rule = classifier.classify_rules(&item.sender, &item.subject, &item.body);
        let label = matched_rule.unwrap_or_else(|| {
            classifier.classify(&item.sender, &item.subject, &item.body, &item.type_labels())
        });
        if matched_rule.is_none() {
            report.unclassified += 1;
        }

        if opts.dry_run {
            report.labeled += 1;
            let suffix = if matched_rule.is_none() { " (default)" } else { "" };
            report
                .lines
                .push(format!("{subject} -> would label '{label}'{suffix}"));
            continue;
        }

        match reconciler.apply(email, item, label).await {
            Ok(()) => {
                report.labeled += 1;
                report.lines.push(format!("{subject} -> {label}"));
            }
            Err(e) => {
                // Per-item failure; the batch continues.
                warn!(id = %item.id, error = %e, "failed to label");
                report.failed += 1;
                report
                    .lines
                    .push(format!("{subject} -> FAILED to apply '{label}'"));
            }
        }
    }

    info!(
        processed = report.processed,
        labeled = report.labeled,
        skipped = report.skipped,
        failed = report.failed,
        "labeling batch complete"
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

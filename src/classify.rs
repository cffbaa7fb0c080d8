//! Email classification rule engine.
//!
//! Pure function of (sender, subject, body, Gmail type labels) → action
//! label. Five ordered phases, first match wins — evaluation order encodes
//! rule priority:
//!
//! 1. Meetings keywords in the subject
//! 2. Action-required keywords / senders / failure notifications → todo
//! 3. Review and feedback requests
//! 4. Quick confirmations → 2min, unless financial (then todo)
//! 5. Default: Gmail category and automated-sender signals → fyi
//!
//! No side effects; the engine never touches the label store.

use regex::Regex;
use tracing::trace;

use crate::labels::ActionLabel;

// ── Keyword sets ────────────────────────────────────────────────────

const MEETING_KEYWORDS: &[&str] = &[
    "meeting", "invite", "calendar", "schedule", "conference", "zoom", "teams", "appointment",
];

const TODO_KEYWORDS: &[&str] = &[
    "payment", "bill", "invoice", "action required", "please complete", "due date", "deadline",
    "submit", "approve", "sign", "register", "application",
];

const TODO_SENDERS: &[&str] = &[
    "school", "physician", "doctor", "security", "bank", "finance", "billing",
];

const FAILURE_KEYWORDS: &[&str] = &[
    "failed", "declined", "error", "problem", "issue", "suspended", "blocked",
];

const REVIEW_KEYWORDS: &[&str] = &[
    "review", "feedback", "opinion", "thoughts", "comment", "input",
];

const DOC_SHARING_INDICATORS: &[&str] = &[
    "docs.google.com", "has shared", "commented on", "shared with you",
];

const QUESTION_INDICATORS: &[&str] = &[
    "?", "what do you think", "can you", "would you", "could you",
];

const QUICK_KEYWORDS: &[&str] = &[
    "confirm", "verify", "click here", "one-click", "quick", "rsvp", "yes/no",
];

/// Quick confirmations about money or accounts are never two-minute tasks.
const FINANCIAL_TERMS: &[&str] = &["payment", "billing", "account", "financial"];

fn contains_any(haystack: &str, needles: &[&str]) -> bool {
    needles.iter().any(|n| haystack.contains(n))
}

// ── Classifier ──────────────────────────────────────────────────────

/// The dual-axis classification rule engine.
///
/// Holds the compiled automated-sender pattern; the keyword sets are
/// fixed. Construct once and reuse — classification itself is pure.
pub struct Classifier {
    automated_sender: Regex,
}

impl Default for Classifier {
    fn default() -> Self {
        Self::new()
    }
}

impl Classifier {
    pub fn new() -> Self {
        Self {
            // noreply@, no-reply@, no_reply@, donotreply@, automated@, system@ …
            automated_sender: Regex::new(r"(?i)\b(no[\-_.]?reply|donotreply|automated|system)\b")
                .expect("automated-sender pattern is valid"),
        }
    }

    /// Classify an email, always producing a label.
    ///
    /// Runs the rule phases, then the default phase. Identical inputs
    /// always yield identical output.
    pub fn classify(
        &self,
        sender: &str,
        subject: &str,
        body: &str,
        type_labels: &[String],
    ) -> ActionLabel {
        self.classify_rules(sender, subject, body)
            .unwrap_or_else(|| self.default_label(sender, type_labels))
    }

    /// Phases 1–4 only. `None` means no rule obviously matched and the
    /// caller decides whether to fall back to the default phase — kept
    /// distinct so dry-run analysis can report unclassified emails.
    pub fn classify_rules(&self, sender: &str, subject: &str, body: &str) -> Option<ActionLabel> {
        let subject = subject.to_lowercase();
        let sender = sender.to_lowercase();
        let body = body.to_lowercase();

        // Phase 1: meeting-related actions take precedence over everything.
        if contains_any(&subject, MEETING_KEYWORDS) {
            trace!(subject = %subject, "matched meetings phase");
            return Some(ActionLabel::Meetings);
        }

        // Phase 2: significant action required.
        if contains_any(&subject, TODO_KEYWORDS)
            || contains_any(&sender, TODO_SENDERS)
            || contains_any(&subject, FAILURE_KEYWORDS)
        {
            trace!(subject = %subject, "matched todo phase");
            return Some(ActionLabel::Todo);
        }

        // Phase 3: review/feedback requests.
        if contains_any(&subject, REVIEW_KEYWORDS)
            || contains_any(&body, DOC_SHARING_INDICATORS)
            || contains_any(&subject, QUESTION_INDICATORS)
        {
            trace!(subject = %subject, "matched review phase");
            return Some(ActionLabel::Review);
        }

        // Phase 4: quick actions. Financial confirmations are todo, not 2min.
        if contains_any(&subject, QUICK_KEYWORDS) {
            if contains_any(&subject, FINANCIAL_TERMS) {
                trace!(subject = %subject, "quick keyword with financial term, reclassified todo");
                return Some(ActionLabel::Todo);
            }
            trace!(subject = %subject, "matched quick-action phase");
            return Some(ActionLabel::TwoMin);
        }

        None
    }

    /// Phase 5: content-based fallback using the Gmail category as a weak
    /// signal. Every path resolves to `fyi` in the production rule set.
    fn default_label(&self, sender: &str, type_labels: &[String]) -> ActionLabel {
        const INFORMATIONAL_CATEGORIES: [&str; 4] = [
            "CATEGORY_PROMOTIONS",
            "CATEGORY_FORUMS",
            "CATEGORY_UPDATES",
            "CATEGORY_SOCIAL",
        ];

        if type_labels
            .iter()
            .any(|l| INFORMATIONAL_CATEGORIES.contains(&l.as_str()))
        {
            return ActionLabel::Fyi;
        }

        if self.automated_sender.is_match(sender) {
            return ActionLabel::Fyi;
        }

        ActionLabel::Fyi
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn classifier() -> Classifier {
        Classifier::new()
    }

    fn classify(sender: &str, subject: &str, body: &str) -> ActionLabel {
        classifier().classify(sender, subject, body, &[])
    }

    // ── Phase precedence ────────────────────────────────────────────

    #[test]
    fn meeting_keyword_wins_regardless_of_other_matches() {
        // "payment" would match the todo phase, but "meeting" is phase 1.
        assert_eq!(
            classify("billing@vendor.com", "Meeting about payment schedule", ""),
            ActionLabel::Meetings
        );
        assert_eq!(
            classify("a@b.com", "Team Standup - Zoom link inside", ""),
            ActionLabel::Meetings
        );
    }

    #[test]
    fn todo_from_subject_keywords() {
        assert_eq!(
            classify("shop@store.com", "Your invoice is ready", ""),
            ActionLabel::Todo
        );
        assert_eq!(
            classify("hr@company.com", "Action required: benefits enrollment", ""),
            ActionLabel::Todo
        );
    }

    #[test]
    fn todo_from_sender_domain() {
        assert_eq!(
            classify("frontdesk@lincoln-school.edu", "Friday pickup", ""),
            ActionLabel::Todo
        );
        assert_eq!(
            classify("alerts@mybank.com", "Statement available", ""),
            ActionLabel::Todo
        );
    }

    #[test]
    fn todo_from_failure_keywords() {
        assert_eq!(
            classify("orders@shop.com", "Payment failed for invoice #123", ""),
            ActionLabel::Todo
        );
        assert_eq!(
            classify("it@company.com", "Your account has been suspended", ""),
            ActionLabel::Todo
        );
    }

    #[test]
    fn review_from_subject() {
        assert_eq!(
            classify("colleague@company.com", "Feedback on the Q3 draft", ""),
            ActionLabel::Review
        );
    }

    #[test]
    fn review_from_doc_sharing_body() {
        assert_eq!(
            classify(
                "drive-shares@google.com",
                "Q3 Planning",
                "Alice has shared a document with you: https://docs.google.com/document/d/abc"
            ),
            ActionLabel::Review
        );
    }

    #[test]
    fn review_from_question_subject() {
        assert_eq!(
            classify("bob@company.com", "Did the deploy finish?", ""),
            ActionLabel::Review
        );
    }

    #[test]
    fn quick_action_rsvp() {
        assert_eq!(
            classify("events@club.org", "Please RSVP by Friday", ""),
            ActionLabel::TwoMin
        );
        // "please" alone is not a review trigger; confirmation wins.
        assert_eq!(
            classify("events@club.org", "Please confirm your RSVP", ""),
            ActionLabel::TwoMin
        );
    }

    #[test]
    fn quick_action_with_financial_term_is_todo() {
        assert_eq!(
            classify("noreply@service.com", "Please confirm your billing details", ""),
            ActionLabel::Todo
        );
        assert_eq!(
            classify("x@y.com", "Verify your account now", ""),
            ActionLabel::Todo
        );
        // Same keyword without the financial term stays 2min.
        assert_eq!(
            classify("events@club.org", "Please RSVP: confirm your attendance", ""),
            ActionLabel::TwoMin
        );
    }

    // ── Default phase ───────────────────────────────────────────────

    #[test]
    fn promotions_category_defaults_to_fyi() {
        let c = classifier();
        assert_eq!(
            c.classify(
                "deals@shop.com",
                "This week's catalog",
                "",
                &["CATEGORY_PROMOTIONS".to_string(), "INBOX".to_string()]
            ),
            ActionLabel::Fyi
        );
    }

    #[test]
    fn automated_sender_defaults_to_fyi() {
        assert_eq!(classify("noreply@service.com", "Weekly digest", ""), ActionLabel::Fyi);
        assert_eq!(classify("no-reply@github.com", "Release notes", ""), ActionLabel::Fyi);
        assert_eq!(classify("donotreply@airline.com", "Trip summary", ""), ActionLabel::Fyi);
    }

    #[test]
    fn unmatched_email_defaults_to_fyi() {
        assert_eq!(classify("friend@gmail.com", "Saturday", "see you there"), ActionLabel::Fyi);
    }

    // ── No-rule-matched path ────────────────────────────────────────

    #[test]
    fn classify_rules_returns_none_when_no_phase_matches() {
        let c = classifier();
        assert_eq!(c.classify_rules("friend@gmail.com", "Saturday", "see you there"), None);
        assert_eq!(c.classify_rules("noreply@service.com", "Weekly digest", ""), None);
    }

    #[test]
    fn classify_rules_some_for_rule_matches() {
        let c = classifier();
        assert_eq!(
            c.classify_rules("a@b.com", "Conference agenda", ""),
            Some(ActionLabel::Meetings)
        );
        assert_eq!(
            c.classify_rules("a@b.com", "Please RSVP", ""),
            Some(ActionLabel::TwoMin)
        );
    }

    // ── Purity ──────────────────────────────────────────────────────

    #[test]
    fn classification_is_deterministic() {
        let c = classifier();
        let labels = vec!["CATEGORY_UPDATES".to_string()];
        let first = c.classify("sender@x.com", "Quarterly update", "body text", &labels);
        for _ in 0..10 {
            assert_eq!(c.classify("sender@x.com", "Quarterly update", "body text", &labels), first);
        }
    }

    #[test]
    fn case_insensitive_matching() {
        assert_eq!(classify("a@b.com", "MEETING TOMORROW", ""), ActionLabel::Meetings);
        assert_eq!(classify("a@b.com", "Invoice Overdue", ""), ActionLabel::Todo);
    }
}

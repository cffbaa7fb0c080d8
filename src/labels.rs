//! Action labels and Gmail system-label constants.
//!
//! Two independent axes describe an email:
//! - **Type labels** (Gmail-assigned `CATEGORY_*` and folder labels) say
//!   what an email IS. They are read-only input signals — this system
//!   never writes or removes them.
//! - **Action labels** (owned by this system) say what to DO with it.
//!   Exactly one action label is present after reconciliation.

use std::fmt;

use serde::{Deserialize, Serialize};

/// User-applied classification describing the required follow-up.
///
/// The variant order is fixed; `priority()` gives the briefing display
/// rank. Rule precedence during classification is encoded by phase order
/// in [`crate::classify`], not by this rank.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ActionLabel {
    /// Requires action that takes more than two minutes.
    Todo,
    /// Requires action resolvable in under two minutes.
    #[serde(rename = "2min")]
    TwoMin,
    /// Asks for feedback, review, or an opinion on a document.
    Review,
    /// Meeting-related communication (invitations, notes, scheduling).
    Meetings,
    /// Informational, no action required.
    Fyi,
}

impl ActionLabel {
    /// All action labels, in priority order.
    pub const ALL: [ActionLabel; 5] = [
        ActionLabel::Todo,
        ActionLabel::TwoMin,
        ActionLabel::Review,
        ActionLabel::Meetings,
        ActionLabel::Fyi,
    ];

    /// The Gmail label name this variant maps to.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Todo => "todo",
            Self::TwoMin => "2min",
            Self::Review => "review",
            Self::Meetings => "meetings",
            Self::Fyi => "fyi",
        }
    }

    /// Parse a Gmail label name. Returns `None` for foreign labels.
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "todo" => Some(Self::Todo),
            "2min" => Some(Self::TwoMin),
            "review" => Some(Self::Review),
            "meetings" => Some(Self::Meetings),
            "fyi" => Some(Self::Fyi),
            _ => None,
        }
    }

    /// Display rank for briefing organization (1 = shown first).
    pub fn priority(&self) -> u8 {
        match self {
            Self::Todo => 1,
            Self::TwoMin => 2,
            Self::Review => 3,
            Self::Meetings => 4,
            Self::Fyi => 5,
        }
    }

    /// Human-facing name for report output.
    pub fn display_name(&self) -> &'static str {
        match self {
            Self::Todo => "Todo",
            Self::TwoMin => "2min",
            Self::Review => "Review",
            Self::Meetings => "Meetings",
            Self::Fyi => "FYI",
        }
    }

    /// Presentation emoji for report output.
    pub fn emoji(&self) -> &'static str {
        match self {
            Self::Todo => "📋",
            Self::TwoMin => "⚡",
            Self::Review => "🔍",
            Self::Meetings => "📅",
            Self::Fyi => "💡",
        }
    }

    /// One-line description for report output.
    pub fn description(&self) -> &'static str {
        match self {
            Self::Todo => "Emails requiring action that cannot be completed in less than 2 minutes",
            Self::TwoMin => "Emails requiring action that can be resolved in less than 2 minutes",
            Self::Review => "Emails asking for feedback, review, or opinion on documents",
            Self::Meetings => "Meeting-related communications including invitations and notes",
            Self::Fyi => "Informational emails requiring no action",
        }
    }
}

impl fmt::Display for ActionLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

// ── Gmail system labels ─────────────────────────────────────────────

/// Gmail folder/marker labels that must never appear in a remove-set.
pub const PROTECTED_SYSTEM_LABELS: [&str; 8] = [
    "INBOX", "IMPORTANT", "STARRED", "SENT", "DRAFT", "SPAM", "TRASH", "UNREAD",
];

/// Labels that exclude a message from classification entirely.
pub const SKIP_FOLDER_LABELS: [&str; 4] = ["SPAM", "TRASH", "DRAFT", "SENT"];

/// True for any Gmail-owned label id/name this system must never mutate:
/// the fixed folder/marker set plus every `CATEGORY_*` label.
pub fn is_protected_label(name: &str) -> bool {
    PROTECTED_SYSTEM_LABELS.contains(&name) || name.starts_with("CATEGORY_")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn name_roundtrip() {
        for label in ActionLabel::ALL {
            assert_eq!(ActionLabel::from_name(label.name()), Some(label));
        }
    }

    #[test]
    fn foreign_name_is_none() {
        assert_eq!(ActionLabel::from_name("CATEGORY_PROMOTIONS"), None);
        assert_eq!(ActionLabel::from_name("INBOX"), None);
        assert_eq!(ActionLabel::from_name("Todo"), None); // case-sensitive
    }

    #[test]
    fn priority_order_matches_all() {
        let ranks: Vec<u8> = ActionLabel::ALL.iter().map(|l| l.priority()).collect();
        assert_eq!(ranks, vec![1, 2, 3, 4, 5]);
    }

    #[test]
    fn serde_wire_names() {
        assert_eq!(serde_json::to_string(&ActionLabel::TwoMin).unwrap(), "\"2min\"");
        assert_eq!(serde_json::to_string(&ActionLabel::Fyi).unwrap(), "\"fyi\"");
        let parsed: ActionLabel = serde_json::from_str("\"meetings\"").unwrap();
        assert_eq!(parsed, ActionLabel::Meetings);
    }

    #[test]
    fn display_metadata_is_complete() {
        for label in ActionLabel::ALL {
            assert!(!label.display_name().is_empty());
            assert!(!label.emoji().is_empty());
            assert!(!label.description().is_empty());
        }
    }

    #[test]
    fn protected_labels() {
        assert!(is_protected_label("INBOX"));
        assert!(is_protected_label("UNREAD"));
        assert!(is_protected_label("CATEGORY_PROMOTIONS"));
        assert!(is_protected_label("CATEGORY_SOCIAL"));
        assert!(!is_protected_label("todo"));
        assert!(!is_protected_label("fyi"));
        assert!(!is_protected_label("my-custom-label"));
    }
}

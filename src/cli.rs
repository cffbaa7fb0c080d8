//! Command-line surface.

use chrono::NaiveDate;
use clap::{Parser, Subcommand};

/// AI-powered daily briefing generator and Gmail triage tool.
#[derive(Debug, Parser)]
#[command(name = "daily-briefer", version, about)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Detailed progress output.
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Only the final report/document.
    #[arg(short, long, global = true)]
    pub quiet: bool,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Generate the daily briefing document.
    Brief {
        /// Target date, YYYY-MM-DD. Defaults to today.
        date: Option<NaiveDate>,

        /// Days of email to look back over.
        #[arg(long, default_value_t = 7)]
        days: u32,

        /// Maximum emails to collect.
        #[arg(long, default_value_t = 50)]
        max_emails: u32,
    },

    /// Classify unlabeled inbox emails and apply action labels.
    Label {
        /// Days to look back for emails.
        #[arg(short, long, default_value_t = 7)]
        days: u32,

        /// Maximum emails to process.
        #[arg(short = 'm', long, default_value_t = 50)]
        max_emails: u32,

        /// Preview what would be labeled without making changes.
        #[arg(long)]
        dry_run: bool,
    },

    /// Forward todo-labeled emails to the task inbox and archive them.
    Todos {
        /// Days to look back for todo emails.
        #[arg(long, default_value_t = 7)]
        days_back: u32,

        /// Maximum todo emails to process.
        #[arg(long, default_value_t = 20)]
        max_emails: u32,

        /// Preview what would be processed without forwarding/archiving.
        #[arg(long)]
        dry_run: bool,
    },
}

//! Daily Briefer — personal productivity automation.
//!
//! Aggregates email, calendar, and task data, classifies inbox email on
//! a dual-axis label scheme, and synthesizes a daily briefing document
//! through a dependency-ordered pipeline of narrative stages.

pub mod briefing;
pub mod classify;
pub mod cli;
pub mod collect;
pub mod config;
pub mod error;
pub mod forward;
pub mod labeler;
pub mod labels;
pub mod llm;
pub mod pipeline;
pub mod sources;

#[cfg(test)]
pub(crate) mod testutil;

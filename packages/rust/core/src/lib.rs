//! Core pipeline orchestration and domain logic for Scribe.
//!
//! This crate turns a conversation into a finished markdown document with
//! two sequential model calls: a research stage that may search the web,
//! and a writing stage that consumes the research brief.

pub mod agent;
pub mod history;
pub mod pipeline;
pub mod stage;

pub use history::format_history;
pub use pipeline::{
    EMPTY_SESSION, ProgressReporter, SilentProgress, generate_content,
    generate_content_with_progress,
};

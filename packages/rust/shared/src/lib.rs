//! Shared types, error model, and configuration for Scribe.
//!
//! This crate is the foundation depended on by all other Scribe crates.
//! It provides:
//! - [`ScribeError`] — the unified error type
//! - Conversation types ([`Message`], [`Role`], [`Session`], [`RequestId`])
//! - Configuration ([`AppConfig`], [`RuntimeConfig`], config loading)

pub mod config;
pub mod error;
pub mod types;

// Re-export public API at crate root for ergonomic imports.
pub use config::{
    AppConfig, LlmConfig, LlmSettings, RuntimeConfig, SearchConfig, SearchSettings, ServerConfig,
    config_dir, config_file_path, init_config, load_config, load_config_from,
};
pub use error::{Result, ScribeError};
pub use types::{Message, RequestId, Role, Session};

//! Shared types, error model, and configuration for the topic maps explorer.
//!
//! This crate is the foundation depended on by all other topicmaps crates.
//! It provides:
//! - [`TopicMapsError`] — the unified error type
//! - Domain types ([`TopicDefinition`], [`ResourceLocator`], [`OpenAction`])
//! - Configuration ([`AppConfig`], [`LayoutConfig`], config loading)

pub mod config;
pub mod error;
pub mod types;

// Re-export public API at crate root for ergonomic imports.
pub use config::{
    AppConfig, ExplorerConfig, LayoutConfig, config_dir, config_file_path, init_config,
    load_config, load_config_from,
};
pub use error::{Result, TopicMapsError};
pub use types::{Distros, OPEN_FILE_TITLE, OpenAction, ResourceLocator, TopicDefinition};

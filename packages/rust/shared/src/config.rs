//! Application configuration for the topic maps explorer.
//!
//! User config lives at `~/.topicmaps/topicmaps.toml`.
//! CLI flags override config file values, which override defaults.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{Result, TopicMapsError};

/// Default configuration file name.
const CONFIG_FILE_NAME: &str = "topicmaps.toml";

/// Default config directory name under the user's home.
const CONFIG_DIR_NAME: &str = ".topicmaps";

// ---------------------------------------------------------------------------
// Config structs (matching topicmaps.toml schema)
// ---------------------------------------------------------------------------

/// Top-level application config, deserialized from TOML.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Workspace naming conventions.
    #[serde(default)]
    pub layout: LayoutConfig,

    /// Explorer behaviour.
    #[serde(default)]
    pub explorer: ExplorerConfig,
}

/// `[layout]` section: where outlines, documents, and modules live.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LayoutConfig {
    /// Outline source directory, directly under the workspace root.
    #[serde(default = "default_topic_maps_dir")]
    pub topic_maps_dir: String,

    /// Outline source file name prefix.
    #[serde(default = "default_source_prefix")]
    pub source_prefix: String,

    /// Outline source file name suffix (including the dot).
    #[serde(default = "default_source_extension")]
    pub source_extension: String,

    /// Document extension (without the dot).
    #[serde(default = "default_doc_extension")]
    pub doc_extension: String,

    /// Module root directory, directly under the workspace root.
    #[serde(default = "default_modules_dir")]
    pub modules_dir: String,

    /// Append `.doc_extension` to the locators of included modules.
    #[serde(default)]
    pub module_locator_extension: bool,
}

impl Default for LayoutConfig {
    fn default() -> Self {
        Self {
            topic_maps_dir: default_topic_maps_dir(),
            source_prefix: default_source_prefix(),
            source_extension: default_source_extension(),
            doc_extension: default_doc_extension(),
            modules_dir: default_modules_dir(),
            module_locator_extension: false,
        }
    }
}

fn default_topic_maps_dir() -> String {
    "_topic_maps".into()
}
fn default_source_prefix() -> String {
    "_topic_map".into()
}
fn default_source_extension() -> String {
    ".yml".into()
}
fn default_doc_extension() -> String {
    "adoc".into()
}
fn default_modules_dir() -> String {
    "modules".into()
}

impl LayoutConfig {
    /// Check the naming conventions are usable.
    pub fn validate(&self) -> Result<()> {
        let single_segment = [
            ("topic_maps_dir", &self.topic_maps_dir),
            ("modules_dir", &self.modules_dir),
            ("doc_extension", &self.doc_extension),
        ];
        for (key, value) in single_segment {
            if value.is_empty() {
                return Err(TopicMapsError::validation(format!("layout.{key} is empty")));
            }
            if value.contains('/') || value.contains('\\') {
                return Err(TopicMapsError::validation(format!(
                    "layout.{key} must be a single path segment, got '{value}'"
                )));
            }
        }
        if self.doc_extension.starts_with('.') {
            return Err(TopicMapsError::validation(
                "layout.doc_extension must not start with a dot",
            ));
        }
        if self.source_prefix.is_empty() && self.source_extension.is_empty() {
            return Err(TopicMapsError::validation(
                "layout.source_prefix and layout.source_extension are both empty",
            ));
        }
        Ok(())
    }

    /// Whether a directory entry name is an outline source.
    pub fn is_outline_source(&self, name: &str) -> bool {
        name.starts_with(&self.source_prefix) && name.ends_with(&self.source_extension)
    }

    /// Message shown when no workspace folder has the topic map directory.
    pub fn missing_dir_message(&self) -> String {
        format!(
            "No \"{}\" directory found at the first level inside the workspace. \
             Please create the directory and place your topic map files in it.",
            self.topic_maps_dir
        )
    }
}

/// `[explorer]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExplorerConfig {
    /// Capacity of the change notification channel.
    #[serde(default = "default_notify_capacity")]
    pub notify_capacity: usize,

    /// Command used to open documents (receives the absolute path).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub open_command: Option<String>,
}

impl Default for ExplorerConfig {
    fn default() -> Self {
        Self {
            notify_capacity: default_notify_capacity(),
            open_command: None,
        }
    }
}

fn default_notify_capacity() -> usize {
    64
}

// ---------------------------------------------------------------------------
// Config loading
// ---------------------------------------------------------------------------

/// Get the path to the config directory (`~/.topicmaps/`).
pub fn config_dir() -> Result<PathBuf> {
    let home = dirs::home_dir()
        .ok_or_else(|| TopicMapsError::config("could not determine home directory"))?;
    Ok(home.join(CONFIG_DIR_NAME))
}

/// Get the path to the config file (`~/.topicmaps/topicmaps.toml`).
pub fn config_file_path() -> Result<PathBuf> {
    Ok(config_dir()?.join(CONFIG_FILE_NAME))
}

/// Load the application config from disk. Returns defaults if the file does not exist.
pub fn load_config() -> Result<AppConfig> {
    let path = config_file_path()?;

    if !path.exists() {
        tracing::debug!(?path, "config file not found, using defaults");
        return Ok(AppConfig::default());
    }

    load_config_from(&path)
}

/// Load the application config from a specific file path.
pub fn load_config_from(path: &Path) -> Result<AppConfig> {
    let content = std::fs::read_to_string(path).map_err(|e| TopicMapsError::io(path, e))?;

    let config: AppConfig = toml::from_str(&content).map_err(|e| {
        TopicMapsError::config(format!("failed to parse {}: {e}", path.display()))
    })?;
    config.layout.validate()?;
    Ok(config)
}

/// Create the config directory and write a default config file.
/// Returns the path to the created file.
pub fn init_config() -> Result<PathBuf> {
    let dir = config_dir()?;
    std::fs::create_dir_all(&dir).map_err(|e| TopicMapsError::io(&dir, e))?;

    let path = dir.join(CONFIG_FILE_NAME);
    let config = AppConfig::default();
    let content =
        toml::to_string_pretty(&config).map_err(|e| TopicMapsError::config(e.to_string()))?;

    std::fs::write(&path, content).map_err(|e| TopicMapsError::io(&path, e))?;
    tracing::info!(?path, "created default config file");

    Ok(path)
}

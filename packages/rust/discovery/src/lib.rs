//! Topic map source discovery and outline parsing.
//!
//! Before building a tree, the explorer locates the topic map directory
//! (`_topic_maps` by default) among the workspace folders and enumerates the
//! outline sources inside it. Outline text is parsed by [`parse_outline`].

pub mod fs;
mod parser;

use std::path::{Path, PathBuf};

use topicmaps_shared::{LayoutConfig, Result, TopicMapsError};
use tracing::{debug, info, instrument};

pub use fs::{DirEntry, EntryKind, FileSystem, LocalFs, MemoryFs};
pub use parser::{parse_outline, parse_outline_strict};

/// Find the first workspace folder with a topic map directory directly under it.
///
/// Returns the workspace folder (not the topic map directory). Folders that
/// cannot be inspected are skipped; `None` means no folder qualified.
#[instrument(skip_all, fields(folders = workspace_folders.len()))]
pub async fn locate_workspace_root(
    fs: &dyn FileSystem,
    workspace_folders: &[PathBuf],
    layout: &LayoutConfig,
) -> Option<PathBuf> {
    for folder in workspace_folders {
        let candidate = folder.join(&layout.topic_maps_dir);
        match fs.kind(&candidate).await {
            Ok(EntryKind::Directory) => {
                info!(root = %folder.display(), "found topic map directory");
                return Some(folder.clone());
            }
            Ok(_) => debug!(path = %candidate.display(), "not a directory, skipping"),
            Err(e) => debug!(path = %candidate.display(), error = %e, "not found, skipping"),
        }
    }
    None
}

/// List the outline source file names in `topic_maps_dir`, in enumeration order.
#[instrument(skip_all, fields(dir = %topic_maps_dir.display()))]
pub async fn list_outline_sources(
    fs: &dyn FileSystem,
    topic_maps_dir: &Path,
    layout: &LayoutConfig,
) -> Result<Vec<String>> {
    let entries = fs
        .read_dir(topic_maps_dir)
        .await
        .map_err(|e| TopicMapsError::io(topic_maps_dir, e))?;

    let sources: Vec<String> = entries
        .into_iter()
        .filter(|e| e.kind == EntryKind::File && layout.is_outline_source(&e.name))
        .map(|e| e.name)
        .collect();

    debug!(count = sources.len(), "outline sources listed");
    Ok(sources)
}

//! File system seam consumed by discovery and lazy expansion.
//!
//! Only the result contracts matter: a directory listing in enumeration
//! order, an entry type check, and a whole-file text read.

use std::collections::HashMap;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tokio::sync::Semaphore;

/// Type of a directory entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryKind {
    File,
    Directory,
    Other,
}

/// One entry of a directory listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirEntry {
    /// File name (no directory component).
    pub name: String,
    pub kind: EntryKind,
}

/// File system primitives used by the explorer.
#[async_trait]
pub trait FileSystem: Send + Sync {
    /// List a directory in enumeration order.
    async fn read_dir(&self, path: &Path) -> io::Result<Vec<DirEntry>>;

    /// Type of the entry at `path`.
    async fn kind(&self, path: &Path) -> io::Result<EntryKind>;

    /// Read a whole file as UTF-8 text.
    async fn read_to_string(&self, path: &Path) -> io::Result<String>;
}

// ---------------------------------------------------------------------------
// LocalFs
// ---------------------------------------------------------------------------

/// The real file system, via `tokio::fs`.
#[derive(Debug, Clone, Copy, Default)]
pub struct LocalFs;

#[async_trait]
impl FileSystem for LocalFs {
    async fn read_dir(&self, path: &Path) -> io::Result<Vec<DirEntry>> {
        let mut reader = tokio::fs::read_dir(path).await?;
        let mut entries = Vec::new();
        while let Some(entry) = reader.next_entry().await? {
            let file_type = entry.file_type().await?;
            entries.push(DirEntry {
                name: entry.file_name().to_string_lossy().into_owned(),
                kind: kind_of(file_type),
            });
        }
        Ok(entries)
    }

    async fn kind(&self, path: &Path) -> io::Result<EntryKind> {
        let meta = tokio::fs::metadata(path).await?;
        Ok(kind_of(meta.file_type()))
    }

    async fn read_to_string(&self, path: &Path) -> io::Result<String> {
        tokio::fs::read_to_string(path).await
    }
}

fn kind_of(file_type: std::fs::FileType) -> EntryKind {
    if file_type.is_file() {
        EntryKind::File
    } else if file_type.is_dir() {
        EntryKind::Directory
    } else {
        EntryKind::Other
    }
}

// ---------------------------------------------------------------------------
// MemoryFs
// ---------------------------------------------------------------------------

/// In-memory file system for embedding and tests.
///
/// Directories are implied by file paths. Listings follow insertion order.
/// Every `read_to_string` is counted per path, and an optional gate makes
/// each read consume one semaphore permit before it completes.
#[derive(Debug, Default)]
pub struct MemoryFs {
    files: Vec<(PathBuf, String)>,
    reads: Mutex<HashMap<PathBuf, usize>>,
    gate: Option<Arc<Semaphore>>,
}

impl MemoryFs {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add (or replace) a file.
    pub fn with_file(mut self, path: impl Into<PathBuf>, content: impl Into<String>) -> Self {
        let path = path.into();
        let content = content.into();
        match self.files.iter_mut().find(|(p, _)| *p == path) {
            Some(existing) => existing.1 = content,
            None => self.files.push((path, content)),
        }
        self
    }

    /// Make every read wait for (and consume) one permit of `gate`.
    pub fn gated(mut self, gate: Arc<Semaphore>) -> Self {
        self.gate = Some(gate);
        self
    }

    /// How many times `path` has been read.
    pub fn read_count(&self, path: impl AsRef<Path>) -> usize {
        let reads = self.reads.lock().unwrap_or_else(|e| e.into_inner());
        reads.get(path.as_ref()).copied().unwrap_or(0)
    }

    fn is_dir(&self, path: &Path) -> bool {
        self.files
            .iter()
            .any(|(p, _)| p.parent().is_some_and(|parent| parent.starts_with(path)))
    }
}

#[async_trait]
impl FileSystem for MemoryFs {
    async fn read_dir(&self, path: &Path) -> io::Result<Vec<DirEntry>> {
        if !self.is_dir(path) {
            return Err(not_found(path));
        }

        let mut entries: Vec<DirEntry> = Vec::new();
        for (file, _) in &self.files {
            let Ok(rest) = file.strip_prefix(path) else {
                continue;
            };
            let mut components = rest.components();
            let Some(first) = components.next() else {
                continue;
            };
            let name = first.as_os_str().to_string_lossy().into_owned();
            let kind = if components.next().is_some() {
                EntryKind::Directory
            } else {
                EntryKind::File
            };
            if !entries.iter().any(|e| e.name == name) {
                entries.push(DirEntry { name, kind });
            }
        }
        Ok(entries)
    }

    async fn kind(&self, path: &Path) -> io::Result<EntryKind> {
        if self.files.iter().any(|(p, _)| p == path) {
            Ok(EntryKind::File)
        } else if self.is_dir(path) {
            Ok(EntryKind::Directory)
        } else {
            Err(not_found(path))
        }
    }

    async fn read_to_string(&self, path: &Path) -> io::Result<String> {
        if let Some(gate) = &self.gate {
            gate.acquire()
                .await
                .map_err(|_| io::Error::other("read gate closed"))?
                .forget();
        }

        {
            let mut reads = self.reads.lock().unwrap_or_else(|e| e.into_inner());
            *reads.entry(path.to_path_buf()).or_default() += 1;
        }

        self.files
            .iter()
            .find(|(p, _)| p == path)
            .map(|(_, content)| content.clone())
            .ok_or_else(|| not_found(path))
    }
}

fn not_found(path: &Path) -> io::Error {
    io::Error::new(
        io::ErrorKind::NotFound,
        format!("{} does not exist", path.display()),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn memory_fs_lists_in_insertion_order() {
        let fs = MemoryFs::new()
            .with_file("/ws/_topic_maps/_topic_map_b.yml", "")
            .with_file("/ws/_topic_maps/_topic_map_a.yml", "")
            .with_file("/ws/_topic_maps/nested/x.yml", "");

        let entries = fs.read_dir(Path::new("/ws/_topic_maps")).await.unwrap();
        let names: Vec<_> = entries.iter().map(|e| e.name.as_str()).collect();
        assert_eq!(names, ["_topic_map_b.yml", "_topic_map_a.yml", "nested"]);
        assert_eq!(entries[2].kind, EntryKind::Directory);

        assert_eq!(fs.kind(Path::new("/ws")).await.unwrap(), EntryKind::Directory);
        assert!(fs.read_dir(Path::new("/missing")).await.is_err());
    }

    #[tokio::test]
    async fn memory_fs_counts_reads() {
        let fs = MemoryFs::new().with_file("/ws/a.adoc", "text");
        assert_eq!(fs.read_to_string(Path::new("/ws/a.adoc")).await.unwrap(), "text");
        assert!(fs.read_to_string(Path::new("/ws/b.adoc")).await.is_err());
        assert_eq!(fs.read_count("/ws/a.adoc"), 1);
        assert_eq!(fs.read_count("/ws/b.adoc"), 1);
    }

    #[tokio::test]
    async fn local_fs_reads_real_files() {
        let dir = tempfile::tempdir().expect("tempdir");
        std::fs::write(dir.path().join("doc.adoc"), "hello").expect("write");
        std::fs::create_dir(dir.path().join("modules")).expect("mkdir");

        let fs = LocalFs;
        let text = fs.read_to_string(&dir.path().join("doc.adoc")).await.unwrap();
        assert_eq!(text, "hello");
        assert_eq!(
            fs.kind(&dir.path().join("modules")).await.unwrap(),
            EntryKind::Directory
        );

        let mut names: Vec<_> = fs
            .read_dir(dir.path())
            .await
            .unwrap()
            .into_iter()
            .map(|e| e.name)
            .collect();
        names.sort();
        assert_eq!(names, ["doc.adoc", "modules"]);
    }
}

//! Reverse index from resource locator to tree node.

use std::collections::HashMap;

use crate::tree::{IndexEntry, NodePath};

/// Locator → node path. Last write wins; entries are only dropped when the
/// whole tree is rebuilt.
#[derive(Debug, Clone, Default)]
pub struct ResourceIndex {
    entries: HashMap<String, NodePath>,
}

impl ResourceIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Point `locator` at `path`, returning the path it replaced.
    pub fn insert(&mut self, locator: impl Into<String>, path: NodePath) -> Option<NodePath> {
        self.entries.insert(locator.into(), path)
    }

    /// Record builder entries for a subtree attached at `base`.
    pub fn record(&mut self, base: &NodePath, entries: impl IntoIterator<Item = IndexEntry>) {
        for entry in entries {
            self.insert(entry.locator, base.join(&entry.path));
        }
    }

    pub fn get(&self, locator: &str) -> Option<&NodePath> {
        self.entries.get(locator)
    }

    pub fn contains(&self, locator: &str) -> bool {
        self.entries.contains_key(locator)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &NodePath)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }
}

//! AsciiDoc include scanning.
//!
//! Documents embed modules with `include::modules/<name>.adoc[...]`
//! directives. The scanner finds every such directive whose target lives
//! under the module root and returns the module-relative names, in text
//! order, without deduplication.

use std::sync::LazyLock;

use regex::Regex;
use topicmaps_shared::{LayoutConfig, Result, TopicMapsError};
use tracing::trace;

/// Scanner built from the default layout (`modules`, `adoc`).
static DEFAULT_SCANNER: LazyLock<IncludeScanner> = LazyLock::new(|| {
    IncludeScanner::from_layout(&LayoutConfig::default()).expect("default include regex")
});

/// Finds module include directives in document text.
#[derive(Debug, Clone)]
pub struct IncludeScanner {
    pattern: Regex,
}

impl IncludeScanner {
    /// Scanner for `include::<modules_dir>/<name>.<doc_extension>`.
    pub fn new(modules_dir: &str, doc_extension: &str) -> Result<Self> {
        // The target ends at the attribute list, so `foo.adoc.orig[]` is no match.
        let source = format!(
            r"include::{}/((?:[^\s\[\]/]+/)*[^\s\[\]/]+)\.{}\[",
            regex::escape(modules_dir),
            regex::escape(doc_extension),
        );
        let pattern = Regex::new(&source)
            .map_err(|e| TopicMapsError::config(format!("invalid include pattern: {e}")))?;
        Ok(Self { pattern })
    }

    /// Scanner for the module root and extension of `layout`.
    pub fn from_layout(layout: &LayoutConfig) -> Result<Self> {
        Self::new(&layout.modules_dir, &layout.doc_extension)
    }

    /// Module-relative names of every include in `text`, duplicates preserved.
    pub fn scan(&self, text: &str) -> Vec<String> {
        let names: Vec<String> = self
            .pattern
            .captures_iter(text)
            .map(|caps| caps[1].to_string())
            .filter(|name| stays_under_root(name))
            .collect();
        trace!(count = names.len(), "includes scanned");
        names
    }
}

/// Whether a module-relative name has no `.` or `..` segment.
fn stays_under_root(name: &str) -> bool {
    name.split('/').all(|segment| segment != ".." && segment != ".")
}

/// Scan `text` with the default layout.
pub fn scan_includes(text: &str) -> Vec<String> {
    DEFAULT_SCANNER.scan(text)
}

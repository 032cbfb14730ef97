//! Core domain types for topic maps and their tree resources.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Title carried by every [`OpenAction`].
pub const OPEN_FILE_TITLE: &str = "Open File";

/// Rendered form of [`ResourceLocator::Invalid`].
const INVALID_SENTINEL: &str = "invalid:";

// ---------------------------------------------------------------------------
// TopicDefinition
// ---------------------------------------------------------------------------

/// One entry of a topic map outline.
///
/// A definition is a directory group when `dir` is set and a leaf document
/// reference otherwise. Field names follow the `_topic_map.yml` convention.
///
/// Deserialization is lenient: scalar `Name`/`Dir`/`File` values (`Dir: 4.14`)
/// become strings, other shapes become absent, and a nested topic that is
/// not a mapping becomes an empty (degenerate) definition so its siblings
/// survive.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TopicDefinition {
    /// Display name from the outline (not used for labels).
    #[serde(
        rename = "Name",
        default,
        deserialize_with = "lenient::text",
        skip_serializing_if = "Option::is_none"
    )]
    pub name: Option<String>,
    /// Group marker: directory name relative to the parent group.
    #[serde(
        rename = "Dir",
        default,
        deserialize_with = "lenient::text",
        skip_serializing_if = "Option::is_none"
    )]
    pub dir: Option<String>,
    /// Distributions this topic applies to. Carried, never interpreted.
    #[serde(
        rename = "Distros",
        default,
        deserialize_with = "lenient::distros",
        skip_serializing_if = "Option::is_none"
    )]
    pub distros: Option<Distros>,
    /// Nested topics of a group.
    #[serde(
        rename = "Topics",
        default,
        deserialize_with = "lenient::topics",
        skip_serializing_if = "Option::is_none"
    )]
    pub topics: Option<Vec<TopicDefinition>>,
    /// Leaf document base name, without extension.
    #[serde(
        rename = "File",
        default,
        deserialize_with = "lenient::text",
        skip_serializing_if = "Option::is_none"
    )]
    pub file: Option<String>,
}

impl TopicDefinition {
    /// A directory group with the given nested topics.
    pub fn group(dir: impl Into<String>, topics: Vec<TopicDefinition>) -> Self {
        Self {
            dir: Some(dir.into()),
            topics: Some(topics),
            ..Self::default()
        }
    }

    /// A leaf document reference.
    pub fn file(file: impl Into<String>) -> Self {
        Self {
            file: Some(file.into()),
            ..Self::default()
        }
    }

    /// The group directory, treating an empty string as absent.
    pub fn group_dir(&self) -> Option<&str> {
        self.dir.as_deref().filter(|d| !d.is_empty())
    }

    /// The document base name, treating an empty string as absent.
    pub fn file_name(&self) -> Option<&str> {
        self.file.as_deref().filter(|f| !f.is_empty())
    }
}

/// The `Distros` field: a comma-separated string or a list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Distros {
    List(Vec<String>),
    Text(String),
}

/// Field deserializers that never fail on an unexpected shape.
mod lenient {
    use serde::Deserialize;
    use serde::de::{Deserializer, IgnoredAny};

    use super::{Distros, TopicDefinition};

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Scalar {
        Text(String),
        Signed(i64),
        Unsigned(u64),
        Float(f64),
        Bool(bool),
        Other(IgnoredAny),
    }

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Entry {
        Topic(TopicDefinition),
        Other(IgnoredAny),
    }

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Entries {
        List(Vec<Entry>),
        Other(IgnoredAny),
    }

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum DistrosField {
        Distros(Distros),
        Other(IgnoredAny),
    }

    pub(super) fn text<'de, D: Deserializer<'de>>(d: D) -> Result<Option<String>, D::Error> {
        Ok(match Scalar::deserialize(d)? {
            Scalar::Text(s) => Some(s),
            Scalar::Signed(n) => Some(n.to_string()),
            Scalar::Unsigned(n) => Some(n.to_string()),
            Scalar::Float(n) => Some(n.to_string()),
            Scalar::Bool(b) => Some(b.to_string()),
            Scalar::Other(_) => None,
        })
    }

    pub(super) fn topics<'de, D: Deserializer<'de>>(
        d: D,
    ) -> Result<Option<Vec<TopicDefinition>>, D::Error> {
        Ok(match Entries::deserialize(d)? {
            Entries::List(entries) => Some(
                entries
                    .into_iter()
                    .map(|entry| match entry {
                        Entry::Topic(topic) => topic,
                        Entry::Other(_) => TopicDefinition::default(),
                    })
                    .collect(),
            ),
            Entries::Other(_) => None,
        })
    }

    pub(super) fn distros<'de, D: Deserializer<'de>>(d: D) -> Result<Option<Distros>, D::Error> {
        Ok(match DistrosField::deserialize(d)? {
            DistrosField::Distros(distros) => Some(distros),
            DistrosField::Other(_) => None,
        })
    }
}

// ---------------------------------------------------------------------------
// ResourceLocator
// ---------------------------------------------------------------------------

/// Identity of a file-like resource behind a tree node.
///
/// Concrete locators are workspace-relative, `/`-separated paths. They are
/// also the keys of the resource index.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "String", from = "String")]
pub enum ResourceLocator {
    /// A concrete workspace-relative path.
    Path(String),
    /// No openable resource.
    Invalid,
}

impl ResourceLocator {
    /// Locator of an outline document: `[parent_dir/]file.extension`.
    pub fn document(parent_dir: Option<&str>, file: &str, extension: &str) -> Self {
        let name = format!("{file}.{extension}");
        Self::join(parent_dir, &name)
    }

    /// Join `name` under an optional `/`-separated directory.
    pub fn join(dir: Option<&str>, name: &str) -> Self {
        match dir.map(|d| d.trim_end_matches('/')).filter(|d| !d.is_empty()) {
            Some(dir) => Self::Path(format!("{dir}/{name}")),
            None => Self::Path(name.to_string()),
        }
    }

    /// The concrete path, if any.
    pub fn as_path(&self) -> Option<&str> {
        match self {
            Self::Path(path) => Some(path),
            Self::Invalid => None,
        }
    }

    /// Whether this locator names an openable resource.
    pub fn is_concrete(&self) -> bool {
        matches!(self, Self::Path(_))
    }
}

impl fmt::Display for ResourceLocator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Path(path) => f.write_str(path),
            Self::Invalid => f.write_str(INVALID_SENTINEL),
        }
    }
}

impl From<String> for ResourceLocator {
    fn from(s: String) -> Self {
        if s.is_empty() || s == INVALID_SENTINEL {
            Self::Invalid
        } else {
            Self::Path(s)
        }
    }
}

impl From<&str> for ResourceLocator {
    fn from(s: &str) -> Self {
        Self::from(s.to_string())
    }
}

impl From<ResourceLocator> for String {
    fn from(locator: ResourceLocator) -> Self {
        locator.to_string()
    }
}

// ---------------------------------------------------------------------------
// OpenAction
// ---------------------------------------------------------------------------

/// Host-facing request to open the resource behind a leaf node.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OpenAction {
    /// Human-readable action title.
    pub title: String,
    /// Workspace-relative path of the resource to open.
    pub target: String,
}

impl OpenAction {
    /// "Open File" action for a concrete locator; `None` for the invalid sentinel.
    pub fn open(locator: &ResourceLocator) -> Option<Self> {
        locator.as_path().map(|target| Self {
            title: OPEN_FILE_TITLE.to_string(),
            target: target.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn topic_definition_uses_outline_field_names() {
        let json = r#"{
            "Name": "Introduction",
            "Dir": "intro",
            "Distros": ["openshift-enterprise"],
            "Topics": [{"Name": "Overview", "File": "overview"}]
        }"#;
        let def: TopicDefinition = serde_json::from_str(json).expect("deserialize");
        assert_eq!(def.group_dir(), Some("intro"));
        assert_eq!(
            def.distros,
            Some(Distros::List(vec!["openshift-enterprise".into()]))
        );

        let topics = def.topics.expect("topics");
        assert_eq!(topics.len(), 1);
        assert_eq!(topics[0].file_name(), Some("overview"));
        assert!(topics[0].group_dir().is_none());
    }

    #[test]
    fn distros_accepts_comma_separated_text() {
        let json = r#"{"File": "index", "Distros": "openshift-origin,openshift-enterprise"}"#;
        let def: TopicDefinition = serde_json::from_str(json).expect("deserialize");
        assert_eq!(
            def.distros,
            Some(Distros::Text("openshift-origin,openshift-enterprise".into()))
        );
    }

    #[test]
    fn scalar_fields_are_read_as_text() {
        let json = r#"{"Dir": 4.14, "Topics": [{"File": 404, "Name": true}]}"#;
        let def: TopicDefinition = serde_json::from_str(json).expect("deserialize");
        assert_eq!(def.group_dir(), Some("4.14"));
        let topics = def.topics.expect("topics");
        assert_eq!(topics[0].file_name(), Some("404"));
        assert_eq!(topics[0].name.as_deref(), Some("true"));
    }

    #[test]
    fn bad_nested_entries_become_degenerate() {
        let json = r#"{
            "Dir": "intro",
            "Distros": 7,
            "Topics": [
                {"File": "overview"}, "just-a-string", null, {"File": ["x"]}, {"File": "setup"}
            ]
        }"#;
        let def: TopicDefinition = serde_json::from_str(json).expect("deserialize");
        assert!(def.distros.is_none());

        let topics = def.topics.expect("topics");
        let files: Vec<_> = topics.iter().map(TopicDefinition::file_name).collect();
        assert_eq!(files, [Some("overview"), None, None, None, Some("setup")]);
        assert_eq!(topics[1], TopicDefinition::default());
    }

    #[test]
    fn non_list_topics_are_absent() {
        let def: TopicDefinition =
            serde_json::from_str(r#"{"Dir": "intro", "Topics": "oops"}"#).expect("deserialize");
        assert_eq!(def.group_dir(), Some("intro"));
        assert!(def.topics.is_none());
    }

    #[test]
    fn empty_dir_and_file_count_as_absent() {
        let def = TopicDefinition {
            dir: Some(String::new()),
            file: Some(String::new()),
            ..TopicDefinition::default()
        };
        assert!(def.group_dir().is_none());
        assert!(def.file_name().is_none());
    }

    #[test]
    fn document_locator_accumulates_parent_dir() {
        assert_eq!(
            ResourceLocator::document(Some("A/B"), "c", "adoc"),
            ResourceLocator::Path("A/B/c.adoc".into())
        );
        assert_eq!(
            ResourceLocator::document(None, "c", "adoc"),
            ResourceLocator::Path("c.adoc".into())
        );
        assert_eq!(
            ResourceLocator::join(Some("modules/"), "setup"),
            ResourceLocator::Path("modules/setup".into())
        );
    }

    #[test]
    fn invalid_sentinel_round_trips_through_strings() {
        assert_eq!(ResourceLocator::Invalid.to_string(), "invalid:");
        assert_eq!(ResourceLocator::from("invalid:"), ResourceLocator::Invalid);
        assert_eq!(ResourceLocator::from(""), ResourceLocator::Invalid);
        assert!(ResourceLocator::from("intro/overview.adoc").is_concrete());

        let json = serde_json::to_string(&ResourceLocator::Invalid).expect("serialize");
        assert_eq!(json, "\"invalid:\"");
    }

    #[test]
    fn open_action_only_for_concrete_locators() {
        let action = OpenAction::open(&ResourceLocator::Path("a.adoc".into())).expect("action");
        assert_eq!(action.title, OPEN_FILE_TITLE);
        assert_eq!(action.target, "a.adoc");
        assert!(OpenAction::open(&ResourceLocator::Invalid).is_none());
    }
}

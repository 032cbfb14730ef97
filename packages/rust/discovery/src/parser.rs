//! Topic map outline parser.
//!
//! An outline source holds one or more `---`-separated YAML documents:
//! - a mapping document is one topic definition
//! - a sequence document is a list of topic definitions
//! - an empty document is skipped

use serde::Deserialize;
use serde_yaml::Value;
use topicmaps_shared::{Result, TopicDefinition, TopicMapsError};
use tracing::warn;

/// Parse an outline source, recovering from failures.
///
/// Malformed YAML yields an empty list and a warning, never an error.
pub fn parse_outline(content: &str) -> Vec<TopicDefinition> {
    match parse_outline_strict(content) {
        Ok(topics) => topics,
        Err(e) => {
            warn!(error = %e, "error parsing topic map file");
            Vec::new()
        }
    }
}

/// Parse an outline source, failing on malformed YAML.
///
/// Documents with an unexpected shape are dropped with a warning; the
/// remaining documents are still returned.
pub fn parse_outline_strict(content: &str) -> Result<Vec<TopicDefinition>> {
    let mut topics = Vec::new();

    for (index, document) in serde_yaml::Deserializer::from_str(content).enumerate() {
        let value = Value::deserialize(document)
            .map_err(|e| TopicMapsError::parse(format!("document {index}: {e}")))?;

        match value {
            Value::Null => continue,
            Value::Sequence(items) => {
                for item in items {
                    push_definition(&mut topics, item, index);
                }
            }
            other => push_definition(&mut topics, other, index),
        }
    }

    Ok(topics)
}

fn push_definition(topics: &mut Vec<TopicDefinition>, value: Value, document: usize) {
    match serde_yaml::from_value::<TopicDefinition>(value) {
        Ok(def) => topics.push(def),
        Err(e) => warn!(document, error = %e, "skipping topic with unexpected shape"),
    }
}

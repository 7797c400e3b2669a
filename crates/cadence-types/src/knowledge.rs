//! Knowledge corpus types.
//!
//! The corpus is a JSON array of `{id, text, metadata}` items. Metadata
//! values are flattened to strings on load: lists become `", "`-joined
//! strings and scalars are stringified.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// One item of the source corpus file, before flattening.
#[derive(Debug, Clone, Deserialize)]
pub struct KnowledgeSourceItem {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub text: String,
    #[serde(default)]
    pub metadata: serde_json::Map<String, Value>,
}

/// A fact in the read-only knowledge corpus.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KnowledgeRecord {
    pub id: String,
    pub text: String,
    pub metadata: BTreeMap<String, String>,
}

impl KnowledgeRecord {
    pub fn genre(&self) -> Option<&str> {
        self.non_empty("genero")
    }

    pub fn activity(&self) -> Option<&str> {
        self.non_empty("actividad")
    }

    fn non_empty(&self, key: &str) -> Option<&str> {
        self.metadata
            .get(key)
            .map(String::as_str)
            .filter(|v| !v.is_empty())
    }
}

impl From<KnowledgeSourceItem> for KnowledgeRecord {
    fn from(item: KnowledgeSourceItem) -> Self {
        let mut metadata: BTreeMap<String, String> = item
            .metadata
            .into_iter()
            .map(|(key, value)| (key, flatten_value(&value)))
            .collect();
        metadata.insert("id".to_string(), item.id.clone());

        Self {
            id: item.id,
            text: item.text,
            metadata,
        }
    }
}

fn flatten_value(value: &Value) -> String {
    match value {
        Value::Array(items) => items
            .iter()
            .map(flatten_value)
            .collect::<Vec<_>>()
            .join(", "),
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

/// A knowledge record with its similarity to the query.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoredKnowledge {
    pub record: KnowledgeRecord,
    pub score: f32,
}

//! Semantic memory types: stored interaction summaries and their search results.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::user::UserId;

/// Best-effort tags lifted from marker phrases inside a memory's text.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemoryTags {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mood: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub weather: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time_period: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub playlist_recommended: Option<String>,
}

impl MemoryTags {
    /// Extract tags from the `Mood:`, `Clima:`, `Hora:` and `Playlist:` markers.
    ///
    /// The value is taken after the last occurrence of a marker. `Playlist:`
    /// keeps the whole remainder; the others stop at the first comma.
    /// Text without markers yields no tags.
    pub fn extract(text: &str) -> Self {
        Self {
            mood: after_marker(text, "Mood:", true),
            weather: after_marker(text, "Clima:", true),
            time_period: after_marker(text, "Hora:", true),
            playlist_recommended: after_marker(text, "Playlist:", false),
        }
    }
}

fn after_marker(text: &str, marker: &str, stop_at_comma: bool) -> Option<String> {
    let (_, rest) = text.rsplit_once(marker)?;
    let value = if stop_at_comma {
        rest.split(',').next().unwrap_or_default()
    } else {
        rest
    };
    Some(value.trim().to_string())
}

/// One stored interaction summary. Append-only.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MemoryRecord {
    pub id: Uuid,
    pub text: String,
    pub timestamp: DateTime<Utc>,
    /// Owner; `None` for records saved without a user context.
    pub user_id: Option<UserId>,
    #[serde(flatten)]
    pub tags: MemoryTags,
}

impl MemoryRecord {
    /// Build a new record stamped with the current time and the extracted tags.
    pub fn new(text: impl Into<String>, user_id: Option<UserId>) -> Self {
        let text = text.into();
        let tags = MemoryTags::extract(&text);
        Self {
            id: Uuid::now_v7(),
            text,
            timestamp: Utc::now(),
            user_id,
            tags,
        }
    }
}

/// Which owners a memory search may return.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OwnerScope {
    /// Every record, regardless of owner.
    Global,
    /// Only records owned by this user.
    User(UserId),
}

impl From<Option<UserId>> for OwnerScope {
    fn from(user: Option<UserId>) -> Self {
        match user {
            Some(id) => OwnerScope::User(id),
            None => OwnerScope::Global,
        }
    }
}

/// A memory with its similarity to the query (1 - cosine distance).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoredMemory {
    pub record: MemoryRecord,
    pub score: f32,
}

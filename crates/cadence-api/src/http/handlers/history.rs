//! GET /history - the authenticated user's chat messages, newest first.

use axum::Json;
use axum::extract::rejection::QueryRejection;
use axum::extract::{Query, State};
use serde::{Deserialize, Serialize};

use cadence_core::repository::message::MessageRepository;
use cadence_types::message::{HistoryMessage, HistoryRole};

use crate::http::auth::AuthUser;
use crate::http::error::AppError;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct HistoryQuery {
    #[serde(default = "default_limit")]
    pub limit: i64,
    #[serde(default)]
    pub offset: i64,
}

fn default_limit() -> i64 {
    50
}

impl HistoryQuery {
    /// Limit clamped to 1..=200, offset to >= 0.
    fn clamped(&self) -> (i64, i64) {
        (self.limit.clamp(1, 200), self.offset.max(0))
    }
}

#[derive(Debug, Serialize)]
pub struct HistoryEntry {
    pub id: i64,
    pub role: HistoryRole,
    pub content: String,
    pub created_at: String,
}

impl From<HistoryMessage> for HistoryEntry {
    fn from(m: HistoryMessage) -> Self {
        Self {
            id: m.id,
            role: m.role,
            content: m.content,
            created_at: m.created_at.to_rfc3339(),
        }
    }
}

pub async fn history(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    query: Result<Query<HistoryQuery>, QueryRejection>,
) -> Result<Json<Vec<HistoryEntry>>, AppError> {
    let Query(query) = query?;
    let (limit, offset) = query.clamped();
    let messages = state.storage.messages.list(user.id, limit, offset).await?;
    Ok(Json(messages.into_iter().map(HistoryEntry::from).collect()))
}

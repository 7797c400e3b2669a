//! SQLite chat history repository implementation.

use chrono::Utc;
use sqlx::Row;

use cadence_core::repository::message::MessageRepository;
use cadence_types::error::RepositoryError;
use cadence_types::message::{HistoryMessage, HistoryRole};
use cadence_types::user::UserId;

use super::pool::DatabasePool;
use super::{format_datetime, parse_datetime, query_error};

pub struct SqliteMessageRepository {
    pool: DatabasePool,
}

impl SqliteMessageRepository {
    pub fn new(pool: DatabasePool) -> Self {
        Self { pool }
    }
}

struct MessageRow {
    id: i64,
    user_id: i64,
    role: String,
    content: String,
    created_at: String,
}

impl MessageRow {
    fn from_row(row: &sqlx::sqlite::SqliteRow) -> Result<Self, sqlx::Error> {
        Ok(Self {
            id: row.try_get("id")?,
            user_id: row.try_get("user_id")?,
            role: row.try_get("role")?,
            content: row.try_get("content")?,
            created_at: row.try_get("created_at")?,
        })
    }

    fn into_message(self) -> Result<HistoryMessage, RepositoryError> {
        let role = self
            .role
            .parse::<HistoryRole>()
            .map_err(RepositoryError::Query)?;
        Ok(HistoryMessage {
            id: self.id,
            user_id: UserId(self.user_id),
            role,
            content: self.content,
            created_at: parse_datetime(&self.created_at)?,
        })
    }
}

impl MessageRepository for SqliteMessageRepository {
    async fn append(
        &self,
        user: UserId,
        role: HistoryRole,
        content: &str,
    ) -> Result<HistoryMessage, RepositoryError> {
        let now = Utc::now();
        let result = sqlx::query(
            "INSERT INTO messages (user_id, role, content, created_at) VALUES (?, ?, ?, ?)",
        )
        .bind(user.0)
        .bind(role.to_string())
        .bind(content)
        .bind(format_datetime(&now))
        .execute(&self.pool.writer)
        .await
        .map_err(query_error)?;

        Ok(HistoryMessage {
            id: result.last_insert_rowid(),
            user_id: user,
            role,
            content: content.to_string(),
            created_at: now,
        })
    }

    async fn list(
        &self,
        user: UserId,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<HistoryMessage>, RepositoryError> {
        let rows = sqlx::query(
            r#"SELECT * FROM messages
               WHERE user_id = ?
               ORDER BY created_at DESC, id DESC
               LIMIT ? OFFSET ?"#,
        )
        .bind(user.0)
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool.reader)
        .await
        .map_err(query_error)?;

        let mut messages = Vec::with_capacity(rows.len());
        for row in &rows {
            let r = MessageRow::from_row(row).map_err(query_error)?;
            messages.push(r.into_message()?);
        }
        Ok(messages)
    }
}

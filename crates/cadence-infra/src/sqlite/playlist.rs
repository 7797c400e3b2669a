//! SQLite playlist repository implementation.
//!
//! `(user_id, name)` is unique; `upsert` relies on `ON CONFLICT` so the
//! insert-or-overwrite happens in one statement on the writer connection.

use chrono::Utc;
use sqlx::Row;

use cadence_core::repository::playlist::PlaylistRepository;
use cadence_types::error::RepositoryError;
use cadence_types::playlist::Playlist;
use cadence_types::user::UserId;

use super::pool::DatabasePool;
use super::{format_datetime, parse_datetime, query_error};

pub struct SqlitePlaylistRepository {
    pool: DatabasePool,
}

impl SqlitePlaylistRepository {
    pub fn new(pool: DatabasePool) -> Self {
        Self { pool }
    }
}

// ---------------------------------------------------------------------------
// Internal row types
// ---------------------------------------------------------------------------

struct PlaylistRow {
    id: i64,
    user_id: i64,
    name: String,
    description: String,
    created_at: String,
    updated_at: String,
}

impl PlaylistRow {
    fn from_row(row: &sqlx::sqlite::SqliteRow) -> Result<Self, sqlx::Error> {
        Ok(Self {
            id: row.try_get("id")?,
            user_id: row.try_get("user_id")?,
            name: row.try_get("name")?,
            description: row.try_get("description")?,
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
        })
    }

    fn into_playlist(self) -> Result<Playlist, RepositoryError> {
        Ok(Playlist {
            id: self.id,
            user_id: UserId(self.user_id),
            name: self.name,
            description: self.description,
            created_at: parse_datetime(&self.created_at)?,
            updated_at: parse_datetime(&self.updated_at)?,
        })
    }
}

fn to_playlist(row: &sqlx::sqlite::SqliteRow) -> Result<Playlist, RepositoryError> {
    PlaylistRow::from_row(row)
        .map_err(query_error)?
        .into_playlist()
}

// ---------------------------------------------------------------------------
// PlaylistRepository impl
// ---------------------------------------------------------------------------

impl PlaylistRepository for SqlitePlaylistRepository {
    async fn list(&self, user: UserId) -> Result<Vec<Playlist>, RepositoryError> {
        let rows = sqlx::query("SELECT * FROM playlists WHERE user_id = ? ORDER BY name ASC")
            .bind(user.0)
            .fetch_all(&self.pool.reader)
            .await
            .map_err(query_error)?;

        rows.iter().map(to_playlist).collect()
    }

    async fn upsert(
        &self,
        user: UserId,
        name: &str,
        description: &str,
    ) -> Result<Playlist, RepositoryError> {
        let now = format_datetime(&Utc::now());
        sqlx::query(
            r#"INSERT INTO playlists (user_id, name, description, created_at, updated_at)
               VALUES (?, ?, ?, ?, ?)
               ON CONFLICT(user_id, name) DO UPDATE SET
                   description = excluded.description,
                   updated_at = excluded.updated_at"#,
        )
        .bind(user.0)
        .bind(name)
        .bind(description)
        .bind(&now)
        .bind(&now)
        .execute(&self.pool.writer)
        .await
        .map_err(query_error)?;

        // Read back through the writer so the row is visible immediately
        let row = sqlx::query("SELECT * FROM playlists WHERE user_id = ? AND name = ?")
            .bind(user.0)
            .bind(name)
            .fetch_one(&self.pool.writer)
            .await
            .map_err(query_error)?;
        to_playlist(&row)
    }

    async fn find_by_name(
        &self,
        user: UserId,
        name: &str,
    ) -> Result<Option<Playlist>, RepositoryError> {
        let row = sqlx::query("SELECT * FROM playlists WHERE user_id = ? AND name = ?")
            .bind(user.0)
            .bind(name)
            .fetch_optional(&self.pool.reader)
            .await
            .map_err(query_error)?;

        row.as_ref().map(to_playlist).transpose()
    }

    async fn update_description(
        &self,
        user: UserId,
        id: i64,
        description: &str,
    ) -> Result<Option<Playlist>, RepositoryError> {
        let result = sqlx::query(
            "UPDATE playlists SET description = ?, updated_at = ? WHERE id = ? AND user_id = ?",
        )
        .bind(description)
        .bind(format_datetime(&Utc::now()))
        .bind(id)
        .bind(user.0)
        .execute(&self.pool.writer)
        .await
        .map_err(query_error)?;

        if result.rows_affected() == 0 {
            return Ok(None);
        }

        let row = sqlx::query("SELECT * FROM playlists WHERE id = ?")
            .bind(id)
            .fetch_one(&self.pool.writer)
            .await
            .map_err(query_error)?;
        to_playlist(&row).map(Some)
    }

    async fn delete(&self, user: UserId, id: i64) -> Result<bool, RepositoryError> {
        let result = sqlx::query("DELETE FROM playlists WHERE id = ? AND user_id = ?")
            .bind(id)
            .bind(user.0)
            .execute(&self.pool.writer)
            .await
            .map_err(query_error)?;

        Ok(result.rows_affected() > 0)
    }
}

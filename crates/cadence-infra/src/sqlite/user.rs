//! SQLite user repository implementation.

use chrono::Utc;
use sqlx::Row;

use cadence_core::repository::user::UserRepository;
use cadence_types::error::RepositoryError;
use cadence_types::user::{User, UserId};

use super::pool::DatabasePool;
use super::{format_datetime, parse_datetime, query_error};

pub struct SqliteUserRepository {
    pool: DatabasePool,
}

impl SqliteUserRepository {
    pub fn new(pool: DatabasePool) -> Self {
        Self { pool }
    }
}

struct UserRow {
    id: i64,
    username: String,
    token_hash: String,
    created_at: String,
}

impl UserRow {
    fn from_row(row: &sqlx::sqlite::SqliteRow) -> Result<Self, sqlx::Error> {
        Ok(Self {
            id: row.try_get("id")?,
            username: row.try_get("username")?,
            token_hash: row.try_get("token_hash")?,
            created_at: row.try_get("created_at")?,
        })
    }

    fn into_user(self) -> Result<User, RepositoryError> {
        Ok(User {
            id: UserId(self.id),
            username: self.username,
            token_hash: self.token_hash,
            created_at: parse_datetime(&self.created_at)?,
        })
    }
}

impl SqliteUserRepository {
    async fn find_one(&self, sql: &str, value: &str) -> Result<Option<User>, RepositoryError> {
        let row = sqlx::query(sql)
            .bind(value)
            .fetch_optional(&self.pool.reader)
            .await
            .map_err(query_error)?;

        match row {
            Some(row) => UserRow::from_row(&row).map_err(query_error)?.into_user().map(Some),
            None => Ok(None),
        }
    }
}

impl UserRepository for SqliteUserRepository {
    async fn create(&self, username: &str, token_hash: &str) -> Result<User, RepositoryError> {
        let now = Utc::now();
        let result = sqlx::query(
            "INSERT INTO users (username, token_hash, created_at) VALUES (?, ?, ?)",
        )
        .bind(username)
        .bind(token_hash)
        .bind(format_datetime(&now))
        .execute(&self.pool.writer)
        .await;

        match result {
            Ok(done) => Ok(User {
                id: UserId(done.last_insert_rowid()),
                username: username.to_string(),
                token_hash: token_hash.to_string(),
                created_at: now,
            }),
            Err(sqlx::Error::Database(db_err)) if db_err.message().contains("UNIQUE") => Err(
                RepositoryError::Conflict(format!("username '{username}' already exists")),
            ),
            Err(e) => Err(query_error(e)),
        }
    }

    async fn find_by_token_hash(&self, token_hash: &str) -> Result<Option<User>, RepositoryError> {
        self.find_one("SELECT * FROM users WHERE token_hash = ?", token_hash)
            .await
    }

    async fn find_by_username(&self, username: &str) -> Result<Option<User>, RepositoryError> {
        self.find_one("SELECT * FROM users WHERE username = ?", username)
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sqlite::test_support::test_pool;

    #[tokio::test]
    async fn test_create_and_find() {
        let (pool, _dir) = test_pool().await;
        let repo = SqliteUserRepository::new(pool);

        let user = repo.create("ana", "abc123").await.unwrap();
        assert!(user.id.0 > 0);

        let by_token = repo.find_by_token_hash("abc123").await.unwrap().unwrap();
        assert_eq!(by_token.id, user.id);
        assert_eq!(by_token.username, "ana");

        let by_name = repo.find_by_username("ana").await.unwrap().unwrap();
        assert_eq!(by_name.token_hash, "abc123");

        assert!(repo.find_by_token_hash("other").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_duplicate_username_conflicts() {
        let (pool, _dir) = test_pool().await;
        let repo = SqliteUserRepository::new(pool);

        repo.create("ana", "h1").await.unwrap();
        let err = repo.create("ana", "h2").await.unwrap_err();
        assert!(matches!(err, RepositoryError::Conflict(msg) if msg.contains("ana")));
    }
}

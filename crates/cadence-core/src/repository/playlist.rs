//! Playlist repository trait definition and default-catalog seeding.

use cadence_types::error::RepositoryError;
use cadence_types::playlist::{DEFAULT_PLAYLISTS, Playlist};
use cadence_types::user::UserId;

/// Per-user playlist catalog. Every operation is scoped to `user`.
pub trait PlaylistRepository: Send + Sync {
    /// All playlists of `user`, ordered by name.
    fn list(
        &self,
        user: UserId,
    ) -> impl std::future::Future<Output = Result<Vec<Playlist>, RepositoryError>> + Send;

    /// Create a playlist, or overwrite the description when the name exists.
    fn upsert(
        &self,
        user: UserId,
        name: &str,
        description: &str,
    ) -> impl std::future::Future<Output = Result<Playlist, RepositoryError>> + Send;

    fn find_by_name(
        &self,
        user: UserId,
        name: &str,
    ) -> impl std::future::Future<Output = Result<Option<Playlist>, RepositoryError>> + Send;

    /// Returns `None` when the playlist does not exist or belongs to someone else.
    fn update_description(
        &self,
        user: UserId,
        id: i64,
        description: &str,
    ) -> impl std::future::Future<Output = Result<Option<Playlist>, RepositoryError>> + Send;

    /// Returns `false` when nothing owned by `user` matched.
    fn delete(
        &self,
        user: UserId,
        id: i64,
    ) -> impl std::future::Future<Output = Result<bool, RepositoryError>> + Send;
}

/// Create the starter playlists `user` does not have yet. Returns how many were added.
pub async fn seed_default_playlists<R: PlaylistRepository>(
    repo: &R,
    user: UserId,
) -> Result<usize, RepositoryError> {
    let existing: Vec<String> = repo.list(user).await?.into_iter().map(|p| p.name).collect();
    let mut added = 0;
    for &(name, description) in DEFAULT_PLAYLISTS {
        if existing.iter().any(|n| n == name) {
            continue;
        }
        repo.upsert(user, name, description).await?;
        added += 1;
    }
    Ok(added)
}

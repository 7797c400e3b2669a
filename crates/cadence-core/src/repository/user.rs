//! User repository trait definition.

use cadence_types::error::RepositoryError;
use cadence_types::user::User;

pub trait UserRepository: Send + Sync {
    /// Fails with `RepositoryError::Conflict` when the username is taken.
    fn create(
        &self,
        username: &str,
        token_hash: &str,
    ) -> impl std::future::Future<Output = Result<User, RepositoryError>> + Send;

    fn find_by_token_hash(
        &self,
        token_hash: &str,
    ) -> impl std::future::Future<Output = Result<Option<User>, RepositoryError>> + Send;

    fn find_by_username(
        &self,
        username: &str,
    ) -> impl std::future::Future<Output = Result<Option<User>, RepositoryError>> + Send;
}

//! Chat history repository trait definition.

use cadence_types::error::RepositoryError;
use cadence_types::message::{HistoryMessage, HistoryRole};
use cadence_types::user::UserId;

pub trait MessageRepository: Send + Sync {
    fn append(
        &self,
        user: UserId,
        role: HistoryRole,
        content: &str,
    ) -> impl std::future::Future<Output = Result<HistoryMessage, RepositoryError>> + Send;

    /// Newest first.
    fn list(
        &self,
        user: UserId,
        limit: i64,
        offset: i64,
    ) -> impl std::future::Future<Output = Result<Vec<HistoryMessage>, RepositoryError>> + Send;
}

//! The users repository port.

use async_trait::async_trait;
use uuid::Uuid;

use crate::http::context::RequestContext;
use crate::storage::models::User;

/// Error returned by repository operations.
///
/// Displays the underlying driver message unchanged.
#[derive(Debug, thiserror::Error)]
pub enum RepositoryError {
    #[error(transparent)]
    Database(#[from] sqlx::Error),
    #[error("duplicate key value violates unique constraint \"users_pkey\": id {0} already exists")]
    DuplicateKey(Uuid),
}

/// Storage operations on users.
///
/// Every call receives the request context of the caller; dropping the
/// returned future abandons the operation.
#[async_trait]
pub trait UsersRepository: Send + Sync {
    /// Insert a user and its creation event atomically.
    async fn create(
        &self,
        ctx: &RequestContext,
        id: Uuid,
        first_name: &str,
        last_name: &str,
    ) -> Result<(), RepositoryError>;

    /// Look up a user. `Ok(None)` when no row matches.
    async fn get(&self, ctx: &RequestContext, id: Uuid) -> Result<Option<User>, RepositoryError>;

    /// Remove a user. Deleting a missing id is not an error.
    async fn delete(&self, ctx: &RequestContext, id: Uuid) -> Result<(), RepositoryError>;

    /// All users, unordered.
    async fn list(&self, ctx: &RequestContext) -> Result<Vec<User>, RepositoryError>;

    /// Number of creation events recorded for `user_id`.
    async fn count_events(&self, ctx: &RequestContext, user_id: Uuid) -> Result<i64, RepositoryError>;
}

//! API key storage port used by the authentication middleware.

use crate::domain::{ApiKey, ApiKeyId, Role, UserId};
use crate::error::RepoError;

#[async_trait::async_trait]
pub trait ApiKeyRepository: Send + Sync + 'static {
    /// Looks up an active key by its SHA-256 hash and touches `last_used_at`.
    async fn verify_api_key_hash(&self, key_hash: &str) -> Result<Option<ApiKey>, RepoError>;

    /// Issues a key for `user_id` (a new user when `None`) acting as `role`.
    /// Returns the stored key and the raw secret, which is never stored.
    async fn create_api_key(
        &self,
        name: &str,
        role: Role,
        user_id: Option<UserId>,
    ) -> Result<(ApiKey, String), RepoError>;

    /// Counts active keys.
    async fn count_api_keys(&self) -> Result<i64, RepoError>;

    /// Lists active keys.
    async fn list_api_keys(&self) -> Result<Vec<ApiKey>, RepoError>;

    /// Deactivates a key. Returns `false` if no active key matched.
    async fn delete_api_key(&self, id: ApiKeyId) -> Result<bool, RepoError>;
}

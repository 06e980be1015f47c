//! User directory port: the role lookup the payment core depends on.

use crate::domain::{Role, UserId};
use crate::error::RepoError;

#[async_trait::async_trait]
pub trait UserDirectory: Send + Sync + 'static {
    /// Returns the role held by `user_id`, or `None` for unknown users.
    async fn role_of(&self, user_id: UserId) -> Result<Option<Role>, RepoError>;
}

use async_trait::async_trait;
use uuid::Uuid;

use crate::auth::repo_types::{NewUser, Token, User, UserChanges};
use crate::db::StoreResult;

#[async_trait]
pub trait UserStore: Send + Sync {
    /// Fails with `Duplicate { field: "email" }` when the email is taken.
    async fn insert_user(&self, new: NewUser) -> StoreResult<User>;

    /// Case-insensitive lookup.
    async fn find_user_by_email(&self, email: &str) -> StoreResult<Option<User>>;

    async fn find_user(&self, id: Uuid) -> StoreResult<Option<User>>;

    async fn update_user(&self, id: Uuid, changes: UserChanges) -> StoreResult<User>;

    /// Returns the user's token, storing `candidate_key` if they have none yet.
    async fn get_or_create_token(&self, user_id: Uuid, candidate_key: &str) -> StoreResult<Token>;

    async fn find_user_by_token(&self, key: &str) -> StoreResult<Option<User>>;
}

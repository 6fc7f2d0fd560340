//! Persistence seam shared by the services.
//!
//! Implemented by the Postgres client in `blogbot-db` and, for tests, by
//! [`memory::MemoryStore`].

#[cfg(any(test, feature = "memory-store"))]
pub mod memory;

use crate::model::{
    Id, ModelValidationError,
    post::{CreatePost, Post, PostMarker, PostText},
    user::{CreateUser, Email, UniqueField, User, UserAccount, UserMarker},
};
use async_trait::async_trait;
use thiserror::Error;

pub type Result<T, E = StoreError> = std::result::Result<T, E>;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("A user with the same {0} already exists")]
    Duplicate(UniqueField),
    #[error("An object in the store was invalid: {0}")]
    Data(#[from] ModelValidationError),
    #[error("Store backend failed: {0}")]
    Backend(#[source] Box<dyn std::error::Error + Send + Sync>),
}

#[async_trait]
pub trait UserStore: Send + Sync {
    async fn fetch_user(&self, user_id: Id<UserMarker>) -> Result<Option<User>>;

    async fn fetch_account_by_username(&self, username: &str) -> Result<Option<UserAccount>>;

    async fn fetch_user_by_email(&self, email: &Email) -> Result<Option<User>>;

    /// Fails with [`StoreError::Duplicate`] if the username or email is taken.
    async fn create_user(&self, user: &CreateUser) -> Result<User>;
}

#[async_trait]
pub trait PostStore: Send + Sync {
    /// All posts, newest first. Posts created in the same instant are ordered
    /// by descending id.
    async fn fetch_posts(&self) -> Result<Vec<Post>>;

    async fn fetch_post(&self, post_id: Id<PostMarker>) -> Result<Option<Post>>;

    async fn create_post(&self, post: &CreatePost) -> Result<Post>;

    /// Overwrites title and content. Returns `None` if the post is gone.
    async fn update_post(&self, post_id: Id<PostMarker>, text: &PostText) -> Result<Option<Post>>;

    /// Returns whether a post was removed.
    async fn delete_post(&self, post_id: Id<PostMarker>) -> Result<bool>;
}

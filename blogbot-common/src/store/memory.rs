use crate::{
    model::{
        Id,
        post::{CreatePost, Post, PostMarker, PostText},
        user::{CreateUser, Email, UniqueField, User, UserAccount, UserMarker},
    },
    store::{PostStore, Result, StoreError, UserStore},
};
use async_trait::async_trait;
use std::{
    collections::BTreeMap,
    sync::{Mutex, MutexGuard, PoisonError},
};
use time::OffsetDateTime;

#[derive(Clone, Debug)]
struct PostRow {
    author_id: Option<Id<UserMarker>>,
    text: PostText,
    created_at: OffsetDateTime,
}

#[derive(Debug, Default)]
struct MemoryState {
    accounts: BTreeMap<Id<UserMarker>, UserAccount>,
    posts: BTreeMap<Id<PostMarker>, PostRow>,
    last_user_id: i64,
    last_post_id: i64,
}

/// Process-local store with the same observable behaviour as the database.
#[derive(Debug, Default)]
pub struct MemoryStore {
    state: Mutex<MemoryState>,
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, MemoryState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Marks an account as active or inactive.
    pub fn set_active(&self, user_id: Id<UserMarker>, is_active: bool) {
        if let Some(account) = self.state().accounts.get_mut(&user_id) {
            account.is_active = is_active;
        }
    }

    /// Drops an account. Posts by that user keep existing without an author.
    pub fn remove_user(&self, user_id: Id<UserMarker>) {
        let mut state = self.state();
        state.accounts.remove(&user_id);
        for row in state.posts.values_mut() {
            if row.author_id == Some(user_id) {
                row.author_id = None;
            }
        }
    }
}

impl MemoryState {
    fn join(&self, post_id: Id<PostMarker>, row: &PostRow) -> Post {
        Post {
            id: post_id,
            author: row
                .author_id
                .and_then(|author_id| self.accounts.get(&author_id))
                .map(|account| account.user.clone()),
            text: row.text.clone(),
            created_at: row.created_at,
        }
    }
}

#[async_trait]
impl UserStore for MemoryStore {
    async fn fetch_user(&self, user_id: Id<UserMarker>) -> Result<Option<User>> {
        Ok(self
            .state()
            .accounts
            .get(&user_id)
            .map(|account| account.user.clone()))
    }

    async fn fetch_account_by_username(&self, username: &str) -> Result<Option<UserAccount>> {
        Ok(self
            .state()
            .accounts
            .values()
            .find(|account| account.user.username.get() == username)
            .cloned())
    }

    async fn fetch_user_by_email(&self, email: &Email) -> Result<Option<User>> {
        Ok(self
            .state()
            .accounts
            .values()
            .find(|account| &account.user.email == email)
            .map(|account| account.user.clone()))
    }

    async fn create_user(&self, user: &CreateUser) -> Result<User> {
        let mut state = self.state();

        for account in state.accounts.values() {
            if account.user.username == user.username {
                return Err(StoreError::Duplicate(UniqueField::Username));
            }
            if account.user.email == user.email {
                return Err(StoreError::Duplicate(UniqueField::Email));
            }
        }

        state.last_user_id += 1;
        let created = User {
            id: Id::new(state.last_user_id),
            username: user.username.clone(),
            email: user.email.clone(),
        };
        state.accounts.insert(
            created.id,
            UserAccount {
                user: created.clone(),
                password_hash: user.password_hash.clone(),
                is_active: true,
            },
        );

        Ok(created)
    }
}

#[async_trait]
impl PostStore for MemoryStore {
    async fn fetch_posts(&self) -> Result<Vec<Post>> {
        let state = self.state();

        let mut posts: Vec<Post> = state
            .posts
            .iter()
            .map(|(&post_id, row)| state.join(post_id, row))
            .collect();
        posts.sort_by(|a, b| {
            b.created_at
                .cmp(&a.created_at)
                .then_with(|| b.id.cmp(&a.id))
        });

        Ok(posts)
    }

    async fn fetch_post(&self, post_id: Id<PostMarker>) -> Result<Option<Post>> {
        let state = self.state();
        Ok(state.posts.get(&post_id).map(|row| state.join(post_id, row)))
    }

    async fn create_post(&self, post: &CreatePost) -> Result<Post> {
        let mut state = self.state();

        state.last_post_id += 1;
        let post_id = Id::new(state.last_post_id);
        let row = PostRow {
            author_id: Some(post.author),
            text: post.text.clone(),
            created_at: OffsetDateTime::now_utc(),
        };
        let created = state.join(post_id, &row);
        state.posts.insert(post_id, row);

        Ok(created)
    }

    async fn update_post(&self, post_id: Id<PostMarker>, text: &PostText) -> Result<Option<Post>> {
        let mut state = self.state();

        let Some(row) = state.posts.get_mut(&post_id) else {
            return Ok(None);
        };
        row.text = text.clone();
        let row = row.clone();

        Ok(Some(state.join(post_id, &row)))
    }

    async fn delete_post(&self, post_id: Id<PostMarker>) -> Result<bool> {
        Ok(self.state().posts.remove(&post_id).is_some())
    }
}

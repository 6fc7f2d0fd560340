use crate::{
    model::{
        Id,
        post::{CreatePost, Post, PostMarker, PostPatch, PostText},
        user::UserMarker,
    },
    store::{PostStore, StoreError, UserStore},
};
use std::{
    fmt::{Display, Formatter},
    sync::Arc,
};
use thiserror::Error;
use tracing::{debug, warn};

#[derive(Copy, Clone, Eq, PartialEq, Debug, Hash)]
pub enum PostAction {
    Edit,
    Delete,
}

impl Display for PostAction {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            PostAction::Edit => f.write_str("edit"),
            PostAction::Delete => f.write_str("delete"),
        }
    }
}

#[derive(Debug, Error)]
pub enum PostError {
    #[error("Post with id {0} was not found")]
    PostNotFound(Id<PostMarker>),
    #[error("Author with id {0} was not found")]
    AuthorNotFound(Id<UserMarker>),
    #[error("User {requester} is not owner of post {post} and cannot {action} it")]
    PermissionDenied {
        post: Id<PostMarker>,
        requester: Id<UserMarker>,
        action: PostAction,
    },
    #[error(transparent)]
    Store(#[from] StoreError),
}

pub struct PostService {
    posts: Arc<dyn PostStore>,
    users: Arc<dyn UserStore>,
}

impl PostService {
    #[must_use]
    pub fn new(posts: Arc<dyn PostStore>, users: Arc<dyn UserStore>) -> Self {
        Self { posts, users }
    }

    pub async fn list_posts(&self) -> Result<Vec<Post>, PostError> {
        Ok(self.posts.fetch_posts().await?)
    }

    pub async fn get_post(&self, post_id: Id<PostMarker>) -> Result<Post, PostError> {
        self.posts
            .fetch_post(post_id)
            .await?
            .ok_or(PostError::PostNotFound(post_id))
    }

    pub async fn create_post(
        &self,
        author: Id<UserMarker>,
        text: PostText,
    ) -> Result<Post, PostError> {
        if self.users.fetch_user(author).await?.is_none() {
            return Err(PostError::AuthorNotFound(author));
        }

        let post = self.posts.create_post(&CreatePost { author, text }).await?;

        debug!(post_id = %post.id, %author, "Created post");
        Ok(post)
    }

    pub async fn update_post(
        &self,
        post_id: Id<PostMarker>,
        requester: Id<UserMarker>,
        patch: PostPatch,
    ) -> Result<Post, PostError> {
        let post = self.fetch_owned(post_id, requester, PostAction::Edit).await?;

        let mut text = post.text;
        patch.apply_to(&mut text);

        let updated = self
            .posts
            .update_post(post_id, &text)
            .await?
            .ok_or(PostError::PostNotFound(post_id))?;

        debug!(%post_id, %requester, "Updated post");
        Ok(updated)
    }

    pub async fn delete_post(
        &self,
        post_id: Id<PostMarker>,
        requester: Id<UserMarker>,
    ) -> Result<(), PostError> {
        self.fetch_owned(post_id, requester, PostAction::Delete)
            .await?;

        if !self.posts.delete_post(post_id).await? {
            return Err(PostError::PostNotFound(post_id));
        }

        debug!(%post_id, %requester, "Deleted post");
        Ok(())
    }

    async fn fetch_owned(
        &self,
        post_id: Id<PostMarker>,
        requester: Id<UserMarker>,
        action: PostAction,
    ) -> Result<Post, PostError> {
        let post = self.get_post(post_id).await?;

        if !post.is_authored_by(requester) {
            warn!(%post_id, %requester, %action, "Rejected change by non-author");
            return Err(PostError::PermissionDenied {
                post: post_id,
                requester,
                action,
            });
        }

        Ok(post)
    }
}

#[cfg(test)]
mod tests {
    use crate::{
        model::{
            Id,
            auth::HashedPassword,
            post::{PostPatch, PostText, PostTitle},
            user::{CreateUser, Email, User, Username},
        },
        service::posts::{PostAction, PostError, PostService},
        store::{UserStore, memory::MemoryStore},
    };
    use std::sync::Arc;

    async fn setup() -> (PostService, Arc<MemoryStore>, User, User) {
        let store = Arc::new(MemoryStore::new());
        let password_hash = HashedPassword::hash("pw").unwrap();

        let mut users = Vec::new();
        for (name, email) in [("alice", "a@x.com"), ("bob", "b@x.com")] {
            let user = store
                .create_user(&CreateUser {
                    username: Username::new(name.to_owned()).unwrap(),
                    email: Email::new(email.to_owned()).unwrap(),
                    password_hash: password_hash.clone(),
                })
                .await
                .unwrap();
            users.push(user);
        }
        let bob = users.pop().unwrap();
        let alice = users.pop().unwrap();

        (
            PostService::new(store.clone(), store.clone()),
            store,
            alice,
            bob,
        )
    }

    fn text(title: &str, content: &str) -> PostText {
        PostText {
            title: PostTitle::new(title.to_owned()).unwrap(),
            content: content.to_owned(),
        }
    }

    #[tokio::test]
    async fn create_and_get() {
        let (posts, _, alice, _) = setup().await;

        let created = posts.create_post(alice.id, text("T", "C")).await.unwrap();
        assert_eq!(created.author, Some(alice.clone()));
        assert_eq!(created.text, text("T", "C"));

        let fetched = posts.get_post(created.id).await.unwrap();
        assert_eq!(fetched, created);
    }

    #[tokio::test]
    async fn create_requires_existing_author() {
        let (posts, _, _, _) = setup().await;

        let result = posts.create_post(Id::new(999), text("T", "C")).await;
        assert!(matches!(result, Err(PostError::AuthorNotFound(id)) if id == Id::new(999)));
        assert!(posts.list_posts().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn missing_post_is_not_found() {
        let (posts, _, alice, _) = setup().await;
        let missing = Id::new(999);

        assert!(matches!(
            posts.get_post(missing).await,
            Err(PostError::PostNotFound(_))
        ));
        assert!(matches!(
            posts
                .update_post(missing, alice.id, PostPatch::default())
                .await,
            Err(PostError::PostNotFound(_))
        ));
        assert!(matches!(
            posts.delete_post(missing, alice.id).await,
            Err(PostError::PostNotFound(_))
        ));
    }

    #[tokio::test]
    async fn newest_post_comes_first() {
        let (posts, _, alice, bob) = setup().await;

        let first = posts.create_post(alice.id, text("one", "")).await.unwrap();
        let second = posts.create_post(bob.id, text("two", "")).await.unwrap();
        let third = posts.create_post(alice.id, text("three", "")).await.unwrap();

        let ids: Vec<_> = posts
            .list_posts()
            .await
            .unwrap()
            .into_iter()
            .map(|post| post.id)
            .collect();
        assert_eq!(ids, [third.id, second.id, first.id]);

        let listed = posts.list_posts().await.unwrap();
        assert!(
            listed
                .windows(2)
                .all(|pair| pair[0].created_at >= pair[1].created_at)
        );
    }

    #[tokio::test]
    async fn author_updates_only_given_fields() {
        let (posts, _, alice, _) = setup().await;
        let post = posts.create_post(alice.id, text("T", "C")).await.unwrap();

        let patch = PostPatch {
            title: Some(PostTitle::new("T2".to_owned()).unwrap()),
            content: None,
        };
        let updated = posts.update_post(post.id, alice.id, patch).await.unwrap();

        assert_eq!(updated.text, text("T2", "C"));
        assert_eq!(updated.created_at, post.created_at);
        assert_eq!(posts.get_post(post.id).await.unwrap().text, text("T2", "C"));
    }

    #[tokio::test]
    async fn non_author_cannot_change_post() {
        let (posts, _, alice, bob) = setup().await;
        let post = posts.create_post(alice.id, text("T", "C")).await.unwrap();

        let patch = PostPatch {
            title: Some(PostTitle::new("hijacked".to_owned()).unwrap()),
            content: Some("hijacked".to_owned()),
        };
        let update = posts.update_post(post.id, bob.id, patch).await;
        assert!(matches!(
            update,
            Err(PostError::PermissionDenied {
                action: PostAction::Edit,
                ..
            })
        ));

        let delete = posts.delete_post(post.id, bob.id).await;
        assert!(matches!(
            delete,
            Err(PostError::PermissionDenied {
                action: PostAction::Delete,
                ..
            })
        ));

        assert_eq!(posts.get_post(post.id).await.unwrap(), post);
    }

    #[tokio::test]
    async fn authorless_post_is_frozen() {
        let (posts, store, alice, _) = setup().await;
        let post = posts.create_post(alice.id, text("T", "C")).await.unwrap();

        store.remove_user(alice.id);

        let orphan = posts.get_post(post.id).await.unwrap();
        assert_eq!(orphan.author, None);
        assert!(matches!(
            posts.delete_post(post.id, alice.id).await,
            Err(PostError::PermissionDenied { .. })
        ));
    }

    #[tokio::test]
    async fn author_deletes_post() {
        let (posts, _, alice, _) = setup().await;
        let post = posts.create_post(alice.id, text("T", "C")).await.unwrap();

        posts.delete_post(post.id, alice.id).await.unwrap();

        assert!(matches!(
            posts.get_post(post.id).await,
            Err(PostError::PostNotFound(_))
        ));
        assert!(posts.list_posts().await.unwrap().is_empty());
    }

    #[test]
    fn permission_message_names_owner_rule() {
        let err = PostError::PermissionDenied {
            post: Id::new(3),
            requester: Id::new(2),
            action: PostAction::Edit,
        };

        assert_eq!(
            err.to_string(),
            "User 2 is not owner of post 3 and cannot edit it"
        );
    }
}

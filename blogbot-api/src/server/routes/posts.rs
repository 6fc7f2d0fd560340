use crate::server::{
    Result, ServerError, ServerRouter,
    auth::AuthenticatedUser,
    json::{Created, Json},
};
use axum::{extract::State, http::StatusCode};
use axum_extra::routing::{RouterExt, TypedPath};
use blogbot_common::{
    model::{
        Id,
        post::{Post, PostMarker, PostPatch, PostText, PostTitle},
        user::Username,
    },
    service::posts::PostService,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use time::OffsetDateTime;

pub fn routes() -> ServerRouter {
    ServerRouter::new()
        .typed_get(list_posts)
        .typed_post(create_post)
        .typed_get(get_post)
        .typed_put(update_post)
        .typed_delete(delete_post)
}

/// A post as presented over HTTP, with the author reduced to their username.
#[derive(Clone, Eq, PartialEq, Debug, Hash, Serialize)]
struct PostView {
    id: Id<PostMarker>,
    title: PostTitle,
    content: String,
    author: Option<Username>,
    #[serde(with = "time::serde::rfc3339")]
    created_at: OffsetDateTime,
}

impl From<Post> for PostView {
    fn from(post: Post) -> Self {
        Self {
            id: post.id,
            title: post.text.title,
            content: post.text.content,
            author: post.author.map(|author| author.username),
            created_at: post.created_at,
        }
    }
}

#[derive(TypedPath, Deserialize)]
#[typed_path("/posts", rejection(ServerError))]
struct PostsPath();

async fn list_posts(
    PostsPath(): PostsPath,
    State(posts): State<Arc<PostService>>,
) -> Result<Json<Vec<PostView>>> {
    let posts = posts.list_posts().await?;

    Ok(Json(posts.into_iter().map(PostView::from).collect()))
}

async fn create_post(
    PostsPath(): PostsPath,
    State(posts): State<Arc<PostService>>,
    user: AuthenticatedUser,
    Json(text): Json<PostText>,
) -> Result<Created<PostView>> {
    let post = posts.create_post(user.user_id(), text).await?;

    Ok(Created(post.into()))
}

#[derive(TypedPath, Deserialize)]
#[typed_path("/posts/{id}", rejection(ServerError))]
struct PostPath {
    id: Id<PostMarker>,
}

async fn get_post(
    PostPath { id }: PostPath,
    State(posts): State<Arc<PostService>>,
) -> Result<Json<PostView>> {
    let post = posts.get_post(id).await?;

    Ok(Json(post.into()))
}

async fn update_post(
    PostPath { id }: PostPath,
    State(posts): State<Arc<PostService>>,
    user: AuthenticatedUser,
    Json(patch): Json<PostPatch>,
) -> Result<Json<PostView>> {
    let post = posts.update_post(id, user.user_id(), patch).await?;

    Ok(Json(post.into()))
}

async fn delete_post(
    PostPath { id }: PostPath,
    State(posts): State<Arc<PostService>>,
    user: AuthenticatedUser,
) -> Result<StatusCode> {
    posts.delete_post(id, user.user_id()).await?;

    Ok(StatusCode::NO_CONTENT)
}

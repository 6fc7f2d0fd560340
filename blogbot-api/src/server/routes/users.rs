use crate::server::{
    Result, ServerError, ServerRouter,
    auth::AuthenticatedUser,
    json::{Created, Json},
};
use axum::extract::State;
use axum_extra::routing::{RouterExt, TypedPath};
use blogbot_common::{
    model::{
        auth::{RefreshRequest, TokenPair},
        user::{Credentials, Registration, User},
    },
    service::auth::AuthService,
};
use serde::Deserialize;
use std::sync::Arc;

pub fn routes() -> ServerRouter {
    ServerRouter::new()
        .typed_post(register)
        .typed_post(login)
        .typed_post(refresh)
        .typed_get(me)
}

#[derive(TypedPath, Deserialize)]
#[typed_path("/users/register", rejection(ServerError))]
struct RegisterPath();

async fn register(
    RegisterPath(): RegisterPath,
    State(auth): State<Arc<AuthService>>,
    Json(registration): Json<Registration>,
) -> Result<Created<User>> {
    let user = auth.register(registration).await?;

    Ok(Created(user))
}

#[derive(TypedPath, Deserialize)]
#[typed_path("/users/login", rejection(ServerError))]
struct LoginPath();

async fn login(
    LoginPath(): LoginPath,
    State(auth): State<Arc<AuthService>>,
    Json(credentials): Json<Credentials>,
) -> Result<Json<TokenPair>> {
    let tokens = auth.login(&credentials).await?;

    Ok(Json(tokens))
}

#[derive(TypedPath, Deserialize)]
#[typed_path("/users/refresh", rejection(ServerError))]
struct RefreshPath();

async fn refresh(
    RefreshPath(): RefreshPath,
    State(auth): State<Arc<AuthService>>,
    Json(request): Json<RefreshRequest>,
) -> Result<Json<TokenPair>> {
    let tokens = auth
        .refresh(&request.refresh)
        .await
        .map_err(ServerError::RefreshRejected)?;

    Ok(Json(tokens))
}

#[derive(TypedPath, Deserialize)]
#[typed_path("/users/me", rejection(ServerError))]
struct MePath();

async fn me(
    MePath(): MePath,
    State(auth): State<Arc<AuthService>>,
    user: AuthenticatedUser,
) -> Result<Json<User>> {
    let user = auth.current_user(user.user_id()).await?;

    Ok(Json(user))
}

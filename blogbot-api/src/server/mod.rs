use axum::{
    Router,
    extract::{
        FromRef, Request,
        rejection::{JsonRejection, PathRejection},
    },
    http::{StatusCode, Uri},
    response::{IntoResponse, Response},
};
use axum_extra::typed_header::TypedHeaderRejection;
use blogbot_common::service::{
    auth::{AuthError, AuthService},
    posts::{PostError, PostService},
    token::TokenError,
};
use json::Json;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use thiserror::Error;
use tower_http::trace::TraceLayer;
use tracing::{debug, error};

mod auth;
mod json;
mod routes;
#[cfg(test)]
mod tests;

pub type ServerRouter = Router<ServerState>;

#[derive(Clone, FromRef)]
pub struct ServerState {
    pub auth: Arc<AuthService>,
    pub posts: Arc<PostService>,
}

pub fn routes() -> ServerRouter {
    routes::routes().fallback(fallback)
}

/// The complete application with access logging, ready to be served.
pub fn app(state: ServerState) -> Router {
    routes()
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

pub async fn fallback(request: Request) -> ServerError {
    ServerError::UnknownRoute(request.into_parts().0.uri)
}

pub type Result<T, E = ServerError> = std::result::Result<T, E>;

#[derive(Debug, Error)]
pub enum ServerError {
    #[error("Unknown route requested: {0}")]
    UnknownRoute(Uri),
    #[error("Path rejected: {0}")]
    PathRejection(#[from] PathRejection),
    #[error("Incoming JSON rejected: {0}")]
    JsonRejection(#[from] JsonRejection),
    #[error("JSON response could not be serialized: {0}")]
    JsonResponse(#[from] serde_json::Error),
    #[error("Authorization header was missing or invalid: {0}")]
    InvalidAuthorizationHeader(TypedHeaderRejection),
    #[error("The provided token was rejected: {0}")]
    InvalidToken(TokenError),
    #[error(transparent)]
    Auth(#[from] AuthError),
    #[error("Token refresh rejected: {0}")]
    RefreshRejected(AuthError),
    #[error(transparent)]
    Post(#[from] PostError),
}

impl ServerError {
    pub fn status(&self) -> StatusCode {
        match self {
            ServerError::UnknownRoute(_) | ServerError::PathRejection(_) => StatusCode::NOT_FOUND,
            ServerError::JsonRejection(_) => StatusCode::BAD_REQUEST,
            ServerError::InvalidAuthorizationHeader(_) => StatusCode::UNAUTHORIZED,
            ServerError::InvalidToken(err) => token_status(err),
            ServerError::Auth(err) => match err {
                AuthError::Conflict(_) => StatusCode::BAD_REQUEST,
                AuthError::InvalidCredentials | AuthError::UserNotFound(_) => {
                    StatusCode::UNAUTHORIZED
                }
                AuthError::Token(err) => token_status(err),
                AuthError::PasswordHash(_) | AuthError::Store(_) => {
                    StatusCode::INTERNAL_SERVER_ERROR
                }
            },
            ServerError::RefreshRejected(err) => match err {
                AuthError::Token(TokenError::Signing(_) | TokenError::ExpiryOutOfRange)
                | AuthError::PasswordHash(_)
                | AuthError::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
                _ => StatusCode::BAD_REQUEST,
            },
            ServerError::Post(err) => match err {
                PostError::PostNotFound(_) => StatusCode::NOT_FOUND,
                PostError::AuthorNotFound(_) | PostError::PermissionDenied { .. } => {
                    StatusCode::BAD_REQUEST
                }
                PostError::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
            },
            ServerError::JsonResponse(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

fn token_status(err: &TokenError) -> StatusCode {
    match err {
        TokenError::Invalid | TokenError::Expired | TokenError::Malformed => {
            StatusCode::UNAUTHORIZED
        }
        TokenError::Signing(_) | TokenError::ExpiryOutOfRange => {
            StatusCode::INTERNAL_SERVER_ERROR
        }
    }
}

#[derive(Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Hash, Serialize, Deserialize)]
struct ErrorResponse {
    status: u16,
    message: String,
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        let status = self.status();

        let message = if status.is_server_error() {
            error!(error = %self, %status, "Replying with error");
            "Internal server error".to_owned()
        } else {
            debug!(error = %self, %status, "Replying with error");
            self.to_string()
        };

        let error_response = ErrorResponse {
            status: status.as_u16(),
            message,
        };
        (status, Json(error_response)).into_response()
    }
}

use crate::{
    model::{
        Id,
        auth::{HashedPassword, PasswordHashError, TokenPair},
        user::{CreateUser, Credentials, Registration, UniqueField, User, UserMarker},
    },
    service::token::{TokenError, TokenSigner},
    store::{StoreError, UserStore},
};
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, warn};

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("A user with this {0} already exists")]
    Conflict(UniqueField),
    #[error("Invalid username or password")]
    InvalidCredentials,
    #[error(transparent)]
    Token(#[from] TokenError),
    #[error("User with id {0} was not found")]
    UserNotFound(Id<UserMarker>),
    #[error(transparent)]
    PasswordHash(#[from] PasswordHashError),
    #[error(transparent)]
    Store(StoreError),
}

impl From<StoreError> for AuthError {
    fn from(value: StoreError) -> Self {
        match value {
            StoreError::Duplicate(field) => AuthError::Conflict(field),
            other => AuthError::Store(other),
        }
    }
}

pub struct AuthService {
    users: Arc<dyn UserStore>,
    signer: TokenSigner,
}

impl AuthService {
    #[must_use]
    pub fn new(users: Arc<dyn UserStore>, signer: TokenSigner) -> Self {
        Self { users, signer }
    }

    pub async fn register(&self, registration: Registration) -> Result<User, AuthError> {
        let Registration {
            username,
            password,
            email,
        } = registration;

        if self
            .users
            .fetch_account_by_username(username.get())
            .await?
            .is_some()
        {
            return Err(AuthError::Conflict(UniqueField::Username));
        }
        if self.users.fetch_user_by_email(&email).await?.is_some() {
            return Err(AuthError::Conflict(UniqueField::Email));
        }

        let password_hash = HashedPassword::hash(&password)?;
        let user = self
            .users
            .create_user(&CreateUser {
                username,
                email,
                password_hash,
            })
            .await?;

        debug!(user_id = %user.id, username = %user.username, "Registered user");
        Ok(user)
    }

    pub async fn authenticate(&self, credentials: &Credentials) -> Result<User, AuthError> {
        let Some(account) = self
            .users
            .fetch_account_by_username(&credentials.username)
            .await?
        else {
            warn!(username = %credentials.username, "Login for unknown user");
            return Err(AuthError::InvalidCredentials);
        };

        if !account.is_active {
            warn!(user_id = %account.user.id, "Login for inactive user");
            return Err(AuthError::InvalidCredentials);
        }
        if !account.password_hash.verify(&credentials.password) {
            warn!(user_id = %account.user.id, "Login with wrong password");
            return Err(AuthError::InvalidCredentials);
        }

        Ok(account.user)
    }

    pub fn issue_tokens(&self, user_id: Id<UserMarker>) -> Result<TokenPair, AuthError> {
        Ok(self.signer.issue(user_id)?)
    }

    /// Authenticates and hands out a fresh token pair.
    pub async fn login(&self, credentials: &Credentials) -> Result<TokenPair, AuthError> {
        let user = self.authenticate(credentials).await?;
        let tokens = self.issue_tokens(user.id)?;

        debug!(user_id = %user.id, "Issued tokens on login");
        Ok(tokens)
    }

    pub fn verify_token(&self, token: &str) -> Result<Id<UserMarker>, TokenError> {
        self.signer.verify(token)
    }

    /// Re-issues both tokens for the user of a valid refresh token. The old
    /// refresh token stays usable until it expires.
    pub async fn refresh(&self, refresh_token: &str) -> Result<TokenPair, AuthError> {
        let user_id = self.signer.verify(refresh_token)?;
        if self.users.fetch_user(user_id).await?.is_none() {
            return Err(AuthError::UserNotFound(user_id));
        }

        let tokens = self.issue_tokens(user_id)?;

        debug!(%user_id, "Refreshed tokens");
        Ok(tokens)
    }

    pub async fn current_user(&self, user_id: Id<UserMarker>) -> Result<User, AuthError> {
        self.users
            .fetch_user(user_id)
            .await?
            .ok_or(AuthError::UserNotFound(user_id))
    }
}

use crate::{
    model::{
        Id,
        auth::{Claims, TokenPair},
        user::UserMarker,
    },
    util::PositiveDuration,
};
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation, decode, encode, errors::ErrorKind};
use std::fmt::{Debug, Formatter};
use thiserror::Error;
use time::{Duration, OffsetDateTime};

pub use jsonwebtoken::Algorithm;

pub const DEFAULT_ACCESS_TOKEN_TTL: Duration = Duration::minutes(60);
pub const DEFAULT_REFRESH_TOKEN_TTL: Duration = Duration::days(7);
/// Longest lifetime a signer accepts for either kind of token.
pub const MAX_TOKEN_TTL: Duration = Duration::days(10 * 365);

#[derive(Debug, Error)]
pub enum TokenError {
    #[error("The token signature is invalid")]
    Invalid,
    #[error("The token has expired")]
    Expired,
    #[error("The token could not be decoded")]
    Malformed,
    #[error("The token expiry is out of range")]
    ExpiryOutOfRange,
    #[error("Signing the token failed: {0}")]
    Signing(#[source] jsonwebtoken::errors::Error),
}

#[derive(Copy, Clone, Eq, PartialEq, Debug, Error)]
pub enum SigningConfigError {
    #[error("Only HMAC algorithms are supported for token signing, got {0:?}")]
    UnsupportedAlgorithm(Algorithm),
    #[error("The token signing secret must not be empty")]
    EmptySecret,
    #[error("Token lifetime {0} exceeds the maximum of {max}", max = MAX_TOKEN_TTL)]
    LifetimeTooLong(Duration),
}

/// Process-wide token settings. Built once at start-up and never changed.
#[derive(Clone)]
pub struct SigningConfig {
    pub algorithm: Algorithm,
    pub secret: Vec<u8>,
    pub access_ttl: PositiveDuration,
    pub refresh_ttl: PositiveDuration,
}

impl SigningConfig {
    /// HS256 with the default lifetimes of 60 minutes and 7 days.
    #[must_use]
    pub fn hs256(secret: impl Into<Vec<u8>>) -> Self {
        Self {
            algorithm: Algorithm::HS256,
            secret: secret.into(),
            access_ttl: PositiveDuration::new_unchecked(DEFAULT_ACCESS_TOKEN_TTL),
            refresh_ttl: PositiveDuration::new_unchecked(DEFAULT_REFRESH_TOKEN_TTL),
        }
    }
}

impl Debug for SigningConfig {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SigningConfig")
            .field("algorithm", &self.algorithm)
            .field("secret", &"[redacted]")
            .field("access_ttl", &self.access_ttl)
            .field("refresh_ttl", &self.refresh_ttl)
            .finish()
    }
}

/// Signs and checks access and refresh tokens. Pure computation, no I/O.
pub struct TokenSigner {
    header: Header,
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    validation: Validation,
    access_ttl: PositiveDuration,
    refresh_ttl: PositiveDuration,
}

impl TokenSigner {
    pub fn new(config: SigningConfig) -> Result<Self, SigningConfigError> {
        if !matches!(
            config.algorithm,
            Algorithm::HS256 | Algorithm::HS384 | Algorithm::HS512
        ) {
            return Err(SigningConfigError::UnsupportedAlgorithm(config.algorithm));
        }
        if config.secret.is_empty() {
            return Err(SigningConfigError::EmptySecret);
        }
        for ttl in [config.access_ttl, config.refresh_ttl] {
            if ttl.get() > MAX_TOKEN_TTL {
                return Err(SigningConfigError::LifetimeTooLong(ttl.get()));
            }
        }

        let mut validation = Validation::new(config.algorithm);
        validation.leeway = 0;
        validation.set_required_spec_claims(&["exp"]);

        Ok(Self {
            header: Header::new(config.algorithm),
            encoding_key: EncodingKey::from_secret(&config.secret),
            decoding_key: DecodingKey::from_secret(&config.secret),
            validation,
            access_ttl: config.access_ttl,
            refresh_ttl: config.refresh_ttl,
        })
    }

    pub fn sign(&self, claims: &Claims) -> Result<String, TokenError> {
        encode(&self.header, claims, &self.encoding_key).map_err(TokenError::Signing)
    }

    pub fn issue_at(
        &self,
        user_id: Id<UserMarker>,
        issued_at: OffsetDateTime,
    ) -> Result<TokenPair, TokenError> {
        let claims = |ttl| {
            Claims::expiring_after(user_id, issued_at, ttl).ok_or(TokenError::ExpiryOutOfRange)
        };
        let access = self.sign(&claims(self.access_ttl)?)?;
        let refresh = self.sign(&claims(self.refresh_ttl)?)?;

        Ok(TokenPair { access, refresh })
    }

    pub fn issue(&self, user_id: Id<UserMarker>) -> Result<TokenPair, TokenError> {
        self.issue_at(user_id, OffsetDateTime::now_utc())
    }

    /// Checks signature and expiry and returns the embedded user id. Whether
    /// that user still exists is left to the caller.
    pub fn verify(&self, token: &str) -> Result<Id<UserMarker>, TokenError> {
        let data = decode::<Claims>(token, &self.decoding_key, &self.validation).map_err(|err| {
            match err.kind() {
                ErrorKind::ExpiredSignature => TokenError::Expired,
                ErrorKind::InvalidToken
                | ErrorKind::Base64(_)
                | ErrorKind::Json(_)
                | ErrorKind::Utf8(_)
                | ErrorKind::MissingRequiredClaim(_) => TokenError::Malformed,
                _ => TokenError::Invalid,
            }
        })?;

        Ok(data.claims.user_id)
    }
}

impl Debug for TokenSigner {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenSigner")
            .field("algorithm", &self.header.alg)
            .field("access_ttl", &self.access_ttl)
            .field("refresh_ttl", &self.refresh_ttl)
            .finish_non_exhaustive()
    }
}

use crate::{
    model::{Id, user::UserMarker},
    util::PositiveDuration,
};
use argon2::{
    Argon2,
    password_hash::{self, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
};
use serde::{Deserialize, Serialize};
use std::fmt::{Debug, Formatter};
use thiserror::Error;
use time::OffsetDateTime;

pub const PASSWORD_SALT_LEN: usize = 16;

#[derive(Clone, Eq, PartialEq, Debug, Error)]
#[error("Hashing password failed: {0}")]
pub struct PasswordHashError(password_hash::Error);

#[derive(Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Default, Hash, Error)]
#[error("The stored password hash is not a valid PHC string")]
pub struct InvalidPasswordHashError;

/// Argon2id digest of a password in PHC string format (algorithm, params,
/// salt and hash in one string).
#[derive(Clone, Eq, PartialEq, Hash)]
pub struct HashedPassword(String);

impl HashedPassword {
    pub fn hash(password: &str) -> Result<Self, PasswordHashError> {
        let salt_bytes: [u8; PASSWORD_SALT_LEN] = rand::random();
        let salt = SaltString::encode_b64(&salt_bytes).map_err(PasswordHashError)?;

        let hash = Argon2::default()
            .hash_password(password.as_bytes(), &salt)
            .map_err(PasswordHashError)?;

        Ok(Self(hash.to_string()))
    }

    pub fn from_phc(phc: String) -> Result<Self, InvalidPasswordHashError> {
        PasswordHash::new(&phc).map_err(|_| InvalidPasswordHashError)?;
        Ok(Self(phc))
    }

    #[must_use]
    pub fn verify(&self, password: &str) -> bool {
        PasswordHash::new(&self.0).is_ok_and(|hash| {
            Argon2::default()
                .verify_password(password.as_bytes(), &hash)
                .is_ok()
        })
    }

    #[must_use]
    pub fn as_phc(&self) -> &str {
        &self.0
    }
}

impl Debug for HashedPassword {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("HashedPassword").field(&"[redacted]").finish()
    }
}

/// Payload of both access and refresh tokens.
#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Hash, Serialize, Deserialize)]
pub struct Claims {
    pub user_id: Id<UserMarker>,
    /// Expiry in seconds since the unix epoch.
    pub exp: i64,
}

impl Claims {
    /// `None` if the expiry lies beyond the last representable date.
    #[must_use]
    pub fn expiring_after(
        user_id: Id<UserMarker>,
        issued_at: OffsetDateTime,
        ttl: PositiveDuration,
    ) -> Option<Self> {
        let exp = issued_at.checked_add(ttl.get())?;

        Some(Self {
            user_id,
            exp: exp.unix_timestamp(),
        })
    }
}

#[derive(Clone, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub struct TokenPair {
    pub access: String,
    pub refresh: String,
}

impl Debug for TokenPair {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenPair")
            .field("access", &"[redacted]")
            .field("refresh", &"[redacted]")
            .finish()
    }
}

#[derive(Clone, Eq, PartialEq, Deserialize)]
pub struct RefreshRequest {
    pub refresh: String,
}

impl Debug for RefreshRequest {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RefreshRequest")
            .field("refresh", &"[redacted]")
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use crate::{
        model::{
            Id,
            auth::{Claims, HashedPassword},
        },
        util::PositiveDuration,
    };
    use time::{Duration, macros::datetime};

    #[test]
    fn password_hash_verifies_only_original() {
        let hash = HashedPassword::hash("pw1").unwrap();

        assert!(hash.verify("pw1"));
        assert!(!hash.verify("pw2"));
        assert!(!hash.verify(""));
        assert!(!hash.as_phc().contains("pw1"));
        assert_eq!(format!("{hash:?}"), "HashedPassword(\"[redacted]\")");
    }

    #[test]
    fn password_hashes_are_salted() {
        let first = HashedPassword::hash("same").unwrap();
        let second = HashedPassword::hash("same").unwrap();

        assert_ne!(first, second);
        assert!(first.verify("same") && second.verify("same"));
    }

    #[test]
    fn phc_round_trip() {
        let hash = HashedPassword::hash("pw1").unwrap();
        let restored = HashedPassword::from_phc(hash.as_phc().to_owned()).unwrap();

        assert!(restored.verify("pw1"));
        assert!(HashedPassword::from_phc("not a hash".to_owned()).is_err());
    }

    #[test]
    fn claims_expiry() {
        let issued_at = datetime!(2025-06-01 12:00 UTC);
        let ttl = PositiveDuration::new_unchecked(Duration::minutes(60));

        let claims = Claims::expiring_after(Id::new(7), issued_at, ttl).unwrap();

        assert_eq!(claims.user_id, Id::new(7));
        assert_eq!(claims.exp, issued_at.unix_timestamp() + 3600);
    }

    #[test]
    fn claims_expiry_past_last_date() {
        let issued_at = datetime!(9999-12-31 00:00 UTC);
        let ttl = PositiveDuration::new_unchecked(Duration::days(1));

        assert!(Claims::expiring_after(Id::new(7), issued_at, ttl).is_none());
    }
}

use blogbot_common::model::{
    ModelValidationError,
    auth::HashedPassword,
    post::{Post, PostText, PostTitle},
    user::{Email, User, UserAccount, Username},
};
use sqlx::FromRow;
use time::OffsetDateTime;

#[derive(Clone, Eq, PartialEq, Debug, Default, Hash, FromRow)]
pub(crate) struct UserRecord {
    pub user_id: i64,
    pub username: String,
    pub email: String,
}

#[derive(Clone, Eq, PartialEq, Debug, Default, Hash, FromRow)]
pub(crate) struct AccountRecord {
    pub user_id: i64,
    pub username: String,
    pub email: String,
    pub password_hash: String,
    pub is_active: bool,
}

/// A post joined with its (possibly missing) author.
#[derive(Clone, Eq, PartialEq, Debug, Hash, FromRow)]
pub(crate) struct FullPostRecord {
    pub post_id: i64,
    pub title: String,
    pub content: String,
    pub created_at: OffsetDateTime,
    pub author_id: Option<i64>,
    pub author_username: Option<String>,
    pub author_email: Option<String>,
}

impl TryFrom<UserRecord> for User {
    type Error = ModelValidationError;

    fn try_from(value: UserRecord) -> Result<Self, Self::Error> {
        Ok(Self {
            id: value.user_id.into(),
            username: Username::new(value.username)?,
            email: Email::new(value.email)?,
        })
    }
}

impl TryFrom<AccountRecord> for UserAccount {
    type Error = ModelValidationError;

    fn try_from(value: AccountRecord) -> Result<Self, Self::Error> {
        Ok(Self {
            user: User {
                id: value.user_id.into(),
                username: Username::new(value.username)?,
                email: Email::new(value.email)?,
            },
            password_hash: HashedPassword::from_phc(value.password_hash)?,
            is_active: value.is_active,
        })
    }
}

impl TryFrom<FullPostRecord> for Post {
    type Error = ModelValidationError;

    fn try_from(value: FullPostRecord) -> Result<Self, Self::Error> {
        let author = match (value.author_id, value.author_username, value.author_email) {
            (Some(user_id), Some(username), Some(email)) => Some(User::try_from(UserRecord {
                user_id,
                username,
                email,
            })?),
            _ => None,
        };

        Ok(Self {
            id: value.post_id.into(),
            author,
            text: PostText {
                title: PostTitle::new(value.title)?,
                content: value.content,
            },
            created_at: value.created_at,
        })
    }
}

use crate::record::{AccountRecord, FullPostRecord, UserRecord};
use async_trait::async_trait;
use blogbot_common::{
    model::{
        Id, ModelValidationError,
        post::{CreatePost, Post, PostMarker, PostText},
        user::{CreateUser, Email, UniqueField, User, UserAccount, UserMarker},
    },
    store::{PostStore, StoreError, UserStore},
};
use sqlx::{PgPool, migrate::MigrateError, postgres::PgPoolOptions, query, query_as};
use thiserror::Error;
use tracing::debug;

pub type Result<T, E = DbError> = std::result::Result<T, E>;

const MAX_CONNECTIONS: u32 = 5;
const USERS_EMAIL_CONSTRAINT: &str = "users_email_unique";

#[derive(Debug, Error)]
pub enum DbError {
    #[error("An object in the database was invalid: {0}")]
    Data(#[from] ModelValidationError),
    #[error("A user with the same {0} already exists")]
    Duplicate(UniqueField),
    #[error("Running migrations failed: {0}")]
    Migrate(#[from] MigrateError),
    #[error(transparent)]
    Sqlx(#[from] sqlx::Error),
}

impl From<DbError> for StoreError {
    fn from(value: DbError) -> Self {
        match value {
            DbError::Data(err) => StoreError::Data(err),
            DbError::Duplicate(field) => StoreError::Duplicate(field),
            other => StoreError::Backend(Box::new(other)),
        }
    }
}

#[derive(Clone, Debug)]
pub struct DbClient {
    pool: PgPool,
}

fn duplicate_field(err: &sqlx::Error) -> Option<UniqueField> {
    let sqlx::Error::Database(db_err) = err else {
        return None;
    };
    if !db_err.is_unique_violation() {
        return None;
    }

    if db_err.constraint() == Some(USERS_EMAIL_CONSTRAINT) {
        Some(UniqueField::Email)
    } else {
        Some(UniqueField::Username)
    }
}

impl DbClient {
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn connect(database_url: &str) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(MAX_CONNECTIONS)
            .connect(database_url)
            .await?;

        Ok(Self::new(pool))
    }

    pub async fn migrate(&self) -> Result<()> {
        sqlx::migrate!("./migrations").run(&self.pool).await?;
        debug!("Database migrations applied");
        Ok(())
    }

    pub async fn fetch_user(&self, user_id: Id<UserMarker>) -> Result<Option<User>> {
        let record = query_as::<_, UserRecord>(
            "
            SELECT
                users.user_id,
                users.username,
                users.email
            FROM
                users.users
            WHERE
                users.user_id = $1
            ",
        )
        .bind(user_id.get())
        .fetch_optional(&self.pool)
        .await?;

        let user = record.map(User::try_from).transpose()?;
        Ok(user)
    }

    pub async fn fetch_user_by_email(&self, email: &Email) -> Result<Option<User>> {
        let record = query_as::<_, UserRecord>(
            "
            SELECT
                users.user_id,
                users.username,
                users.email
            FROM
                users.users
            WHERE
                users.email = $1
            ",
        )
        .bind(email.get())
        .fetch_optional(&self.pool)
        .await?;

        let user = record.map(User::try_from).transpose()?;
        Ok(user)
    }

    pub async fn fetch_account_by_username(&self, username: &str) -> Result<Option<UserAccount>> {
        let record = query_as::<_, AccountRecord>(
            "
            SELECT
                users.user_id,
                users.username,
                users.email,
                users.password_hash,
                users.is_active
            FROM
                users.users
            WHERE
                users.username = $1
            ",
        )
        .bind(username)
        .fetch_optional(&self.pool)
        .await?;

        let account = record.map(UserAccount::try_from).transpose()?;
        Ok(account)
    }

    pub async fn create_user(&self, user: &CreateUser) -> Result<User> {
        let record = query_as::<_, UserRecord>(
            "
            INSERT INTO users.users (username, email, password_hash)
            VALUES ($1, $2, $3)
            RETURNING user_id, username, email
            ",
        )
        .bind(user.username.get())
        .bind(user.email.get())
        .bind(user.password_hash.as_phc())
        .fetch_one(&self.pool)
        .await
        .map_err(|err| match duplicate_field(&err) {
            Some(field) => DbError::Duplicate(field),
            None => DbError::Sqlx(err),
        })?;

        Ok(User::try_from(record)?)
    }

    pub async fn fetch_posts(&self) -> Result<Vec<Post>> {
        let records = query_as::<_, FullPostRecord>(
            "
            SELECT
                posts.post_id,
                posts.title,
                posts.content,
                posts.created_at,
                users.user_id AS author_id,
                users.username AS author_username,
                users.email AS author_email
            FROM
                blog.posts LEFT JOIN users.users ON users.user_id = posts.author_id
            ORDER BY
                posts.created_at DESC,
                posts.post_id DESC
            ",
        )
        .fetch_all(&self.pool)
        .await?;

        let posts = records
            .into_iter()
            .map(Post::try_from)
            .collect::<Result<_, _>>()?;
        Ok(posts)
    }

    pub async fn fetch_post(&self, post_id: Id<PostMarker>) -> Result<Option<Post>> {
        let record = query_as::<_, FullPostRecord>(
            "
            SELECT
                posts.post_id,
                posts.title,
                posts.content,
                posts.created_at,
                users.user_id AS author_id,
                users.username AS author_username,
                users.email AS author_email
            FROM
                blog.posts LEFT JOIN users.users ON users.user_id = posts.author_id
            WHERE
                posts.post_id = $1
            ",
        )
        .bind(post_id.get())
        .fetch_optional(&self.pool)
        .await?;

        let post = record.map(Post::try_from).transpose()?;
        Ok(post)
    }

    pub async fn create_post(&self, post: &CreatePost) -> Result<Post> {
        let record = query_as::<_, FullPostRecord>(
            "
            WITH inserted AS (
                INSERT INTO blog.posts (title, content, author_id)
                VALUES ($1, $2, $3)
                RETURNING post_id, title, content, created_at, author_id
            )
            SELECT
                inserted.post_id,
                inserted.title,
                inserted.content,
                inserted.created_at,
                users.user_id AS author_id,
                users.username AS author_username,
                users.email AS author_email
            FROM
                inserted LEFT JOIN users.users ON users.user_id = inserted.author_id
            ",
        )
        .bind(post.text.title.get())
        .bind(&post.text.content)
        .bind(post.author.get())
        .fetch_one(&self.pool)
        .await?;

        Ok(Post::try_from(record)?)
    }

    pub async fn update_post(
        &self,
        post_id: Id<PostMarker>,
        text: &PostText,
    ) -> Result<Option<Post>> {
        let record = query_as::<_, FullPostRecord>(
            "
            WITH updated AS (
                UPDATE blog.posts
                SET title = $2, content = $3
                WHERE post_id = $1
                RETURNING post_id, title, content, created_at, author_id
            )
            SELECT
                updated.post_id,
                updated.title,
                updated.content,
                updated.created_at,
                users.user_id AS author_id,
                users.username AS author_username,
                users.email AS author_email
            FROM
                updated LEFT JOIN users.users ON users.user_id = updated.author_id
            ",
        )
        .bind(post_id.get())
        .bind(text.title.get())
        .bind(&text.content)
        .fetch_optional(&self.pool)
        .await?;

        let post = record.map(Post::try_from).transpose()?;
        Ok(post)
    }

    pub async fn delete_post(&self, post_id: Id<PostMarker>) -> Result<bool> {
        let result = query("DELETE FROM blog.posts WHERE post_id = $1")
            .bind(post_id.get())
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }
}

#[async_trait]
impl UserStore for DbClient {
    async fn fetch_user(&self, user_id: Id<UserMarker>) -> Result<Option<User>, StoreError> {
        Ok(DbClient::fetch_user(self, user_id).await?)
    }

    async fn fetch_account_by_username(
        &self,
        username: &str,
    ) -> Result<Option<UserAccount>, StoreError> {
        Ok(DbClient::fetch_account_by_username(self, username).await?)
    }

    async fn fetch_user_by_email(&self, email: &Email) -> Result<Option<User>, StoreError> {
        Ok(DbClient::fetch_user_by_email(self, email).await?)
    }

    async fn create_user(&self, user: &CreateUser) -> Result<User, StoreError> {
        Ok(DbClient::create_user(self, user).await?)
    }
}

#[async_trait]
impl PostStore for DbClient {
    async fn fetch_posts(&self) -> Result<Vec<Post>, StoreError> {
        Ok(DbClient::fetch_posts(self).await?)
    }

    async fn fetch_post(&self, post_id: Id<PostMarker>) -> Result<Option<Post>, StoreError> {
        Ok(DbClient::fetch_post(self, post_id).await?)
    }

    async fn create_post(&self, post: &CreatePost) -> Result<Post, StoreError> {
        Ok(DbClient::create_post(self, post).await?)
    }

    async fn update_post(
        &self,
        post_id: Id<PostMarker>,
        text: &PostText,
    ) -> Result<Option<Post>, StoreError> {
        Ok(DbClient::update_post(self, post_id, text).await?)
    }

    async fn delete_post(&self, post_id: Id<PostMarker>) -> Result<bool, StoreError> {
        Ok(DbClient::delete_post(self, post_id).await?)
    }
}

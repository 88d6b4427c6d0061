//! Durable storage on PostgreSQL.
//!
//! Login uniqueness and author integrity are enforced by the schema; their
//! violations come back as typed [`DbError`]s.

use crate::{
    record::{PostRecord, UserRecord},
    storage::{DbError, Result, Storage},
};
use async_trait::async_trait;
use microblog_common::{
    model::{
        Id, MicroblogSnowflake, MicroblogSnowflakeGenerator,
        post::{CreatePost, Post, PostMarker},
        user::{CreateUser, User, UserLogin, UserMarker},
    },
    snowflake::{ProcessId, WorkerId},
};
use sqlx::{PgPool, migrate::Migrator, postgres::PgPoolOptions, query_as, query_scalar};
use std::sync::{Mutex, PoisonError};
use tracing::info;

static MIGRATOR: Migrator = sqlx::migrate!();

/// Unique index on `users.login`, see the initial migration.
const LOGIN_UNIQUE_INDEX: &str = "users_login_key";

/// Only a clash on the login index is a duplicate login. Anything else, such as
/// two generators sharing worker and process ids, is a plain database error.
fn user_insert_error(err: sqlx::Error, login: &UserLogin) -> DbError {
    match &err {
        sqlx::Error::Database(db_err)
            if db_err.is_unique_violation() && db_err.constraint() == Some(LOGIN_UNIQUE_INDEX) =>
        {
            DbError::DuplicateLogin(login.clone())
        }
        _ => err.into(),
    }
}

#[derive(Debug)]
pub struct PgStorage {
    pool: PgPool,
    snowflake_generator: Mutex<MicroblogSnowflakeGenerator>,
}

impl PgStorage {
    #[must_use]
    pub fn new(pool: PgPool, worker_id: WorkerId, process_id: ProcessId) -> Self {
        let snowflake_generator =
            Mutex::new(MicroblogSnowflakeGenerator::new(worker_id, process_id));

        Self {
            pool,
            snowflake_generator,
        }
    }

    /// Connects and brings the schema up to date.
    pub async fn connect(
        database_url: &str,
        max_connections: u32,
        worker_id: WorkerId,
        process_id: ProcessId,
    ) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(database_url)
            .await?;

        MIGRATOR.run(&pool).await?;
        info!("Database schema is up to date");

        Ok(Self::new(pool, worker_id, process_id))
    }

    fn next_snowflake(&self) -> MicroblogSnowflake {
        self.snowflake_generator
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .generate()
    }
}

#[async_trait]
impl Storage for PgStorage {
    async fn create_user(&self, user: &CreateUser) -> Result<Id<UserMarker>> {
        let user_snowflake = self.next_snowflake();

        let returned_snowflake: i64 = query_scalar(
            "
            INSERT INTO users.users (user_snowflake, login, password_hash)
            VALUES ($1, $2, $3)
            RETURNING users.user_snowflake
            ",
        )
        .bind(user_snowflake.get().cast_signed())
        .bind(user.login.get())
        .bind(user.password_hash.as_str())
        .fetch_one(&self.pool)
        .await
        .map_err(|err| user_insert_error(err, &user.login))?;

        Ok(returned_snowflake.cast_unsigned().into())
    }

    async fn create_post(&self, post: &CreatePost) -> Result<Post> {
        let post_snowflake = self.next_snowflake();

        let record = query_as::<_, PostRecord>(
            "
            INSERT INTO posts.posts (post_snowflake, user_snowflake, content)
            VALUES ($1, $2, $3)
            RETURNING posts.post_snowflake, posts.user_snowflake, posts.content
            ",
        )
        .bind(post_snowflake.get().cast_signed())
        .bind(post.author.snowflake().get().cast_signed())
        .bind(post.text.as_str())
        .fetch_one(&self.pool)
        .await
        .map_err(|err| match &err {
            sqlx::Error::Database(db_err) if db_err.is_foreign_key_violation() => {
                DbError::UnknownAuthor(post.author)
            }
            _ => err.into(),
        })?;

        Ok(record.into())
    }

    async fn fetch_user(&self, user_id: Id<UserMarker>) -> Result<Option<User>> {
        let record = query_as::<_, UserRecord>(
            "
            SELECT
                users.user_snowflake,
                users.login,
                users.password_hash
            FROM
                users.users
            WHERE
                users.user_snowflake = $1
            ",
        )
        .bind(user_id.snowflake().get().cast_signed())
        .fetch_optional(&self.pool)
        .await?;

        let user = record.map(User::try_from).transpose()?;
        Ok(user)
    }

    async fn fetch_user_by_login(&self, login: &UserLogin) -> Result<Option<User>> {
        let record = query_as::<_, UserRecord>(
            "
            SELECT
                users.user_snowflake,
                users.login,
                users.password_hash
            FROM
                users.users
            WHERE
                users.login = $1
            ",
        )
        .bind(login.get())
        .fetch_optional(&self.pool)
        .await?;

        let user = record.map(User::try_from).transpose()?;
        Ok(user)
    }

    async fn fetch_post(&self, post_id: Id<PostMarker>) -> Result<Option<Post>> {
        let record = query_as::<_, PostRecord>(
            "
            SELECT
                posts.post_snowflake,
                posts.user_snowflake,
                posts.content
            FROM
                posts.posts
            WHERE
                posts.post_snowflake = $1
            ",
        )
        .bind(post_id.snowflake().get().cast_signed())
        .fetch_optional(&self.pool)
        .await?;

        Ok(record.map(Post::from))
    }

    async fn fetch_posts_before(
        &self,
        author: Id<UserMarker>,
        before: Option<Id<PostMarker>>,
        limit: usize,
    ) -> Result<Vec<Post>> {
        let records = query_as::<_, PostRecord>(
            "
            SELECT
                posts.post_snowflake,
                posts.user_snowflake,
                posts.content
            FROM
                posts.posts
            WHERE
                posts.user_snowflake = $1
                AND ($2::BIGINT IS NULL OR posts.post_snowflake < $2)
            ORDER BY
                posts.post_snowflake DESC
            LIMIT $3
            ",
        )
        .bind(author.snowflake().get().cast_signed())
        .bind(before.map(|id| id.snowflake().get().cast_signed()))
        .bind(i64::try_from(limit).unwrap_or(i64::MAX))
        .fetch_all(&self.pool)
        .await?;

        Ok(records.into_iter().map(Post::from).collect())
    }
}

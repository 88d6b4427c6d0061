use async_trait::async_trait;
use microblog_common::model::{
    Id, ModelValidationError,
    page::CursorDecodeError,
    post::{CreatePost, Post, PostMarker},
    user::{CreateUser, User, UserLogin, UserMarker},
};
use std::{fmt::Debug, time::Duration};
use thiserror::Error;

pub type Result<T, E = DbError> = std::result::Result<T, E>;

#[derive(Debug, Error)]
pub enum DbError {
    #[error("Login {0} is already taken")]
    DuplicateLogin(UserLogin),
    #[error("Author {0} does not exist")]
    UnknownAuthor(Id<UserMarker>),
    #[error("User with id {0} was not found")]
    UserNotFound(Id<UserMarker>),
    #[error("Invalid page cursor: {0}")]
    InvalidCursor(#[from] InvalidCursorError),
    #[error("Storage operation did not finish within {0:?}")]
    Timeout(Duration),
    #[error("Storage backend is unavailable: {0}")]
    Unavailable(sqlx::Error),
    #[error("An object in the database was invalid: {0}")]
    Data(#[from] ModelValidationError),
    #[error("Running migrations failed: {0}")]
    Migrate(#[from] sqlx::migrate::MigrateError),
    #[error(transparent)]
    Sqlx(sqlx::Error),
}

#[derive(Clone, Eq, PartialEq, Debug, Error)]
pub enum InvalidCursorError {
    #[error(transparent)]
    Malformed(#[from] CursorDecodeError),
    #[error("The cursor points to no known post")]
    UnknownPost,
    #[error("The cursor points to a post by another author")]
    ForeignAuthor,
}

impl From<sqlx::Error> for DbError {
    fn from(err: sqlx::Error) -> Self {
        match &err {
            sqlx::Error::Io(_)
            | sqlx::Error::Tls(_)
            | sqlx::Error::PoolTimedOut
            | sqlx::Error::PoolClosed => Self::Unavailable(err),
            _ => Self::Sqlx(err),
        }
    }
}

/// Persistence of users and posts.
///
/// Implementations assign ids at insert time. Post ids of one instance are
/// strictly increasing, so id order is creation order.
#[async_trait]
pub trait Storage: Debug + Send + Sync {
    /// Fails with [`DbError::DuplicateLogin`] if the login exists. Concurrent
    /// calls with the same login have exactly one winner.
    async fn create_user(&self, user: &CreateUser) -> Result<Id<UserMarker>>;

    /// Fails with [`DbError::UnknownAuthor`] if the author does not exist.
    async fn create_post(&self, post: &CreatePost) -> Result<Post>;

    async fn fetch_user(&self, user_id: Id<UserMarker>) -> Result<Option<User>>;

    async fn fetch_user_by_login(&self, login: &UserLogin) -> Result<Option<User>>;

    async fn fetch_post(&self, post_id: Id<PostMarker>) -> Result<Option<Post>>;

    /// Up to `limit` posts of `author`, newest first, strictly older than
    /// `before` if given.
    async fn fetch_posts_before(
        &self,
        author: Id<UserMarker>,
        before: Option<Id<PostMarker>>,
        limit: usize,
    ) -> Result<Vec<Post>>;
}

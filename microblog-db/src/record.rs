use microblog_common::model::{
    ModelValidationError,
    auth::PasswordHash,
    post::Post,
    user::{User, UserLogin},
};
use sqlx::FromRow;

// Snowflakes stay below 2^63 until the 41st timestamp bit is reached, so the
// signed BIGINT order matches the unsigned snowflake order.

#[derive(Clone, Eq, PartialEq, Debug, Default, Hash, FromRow)]
pub(crate) struct UserRecord {
    pub user_snowflake: i64,
    pub login: String,
    pub password_hash: String,
}

#[derive(Clone, Eq, PartialEq, Debug, Default, Hash, FromRow)]
pub(crate) struct PostRecord {
    pub post_snowflake: i64,
    pub user_snowflake: i64,
    pub content: String,
}

impl TryFrom<UserRecord> for User {
    type Error = ModelValidationError;

    fn try_from(value: UserRecord) -> Result<Self, Self::Error> {
        Ok(Self {
            id: value.user_snowflake.cast_unsigned().into(),
            login: UserLogin::new(value.login)?,
            password_hash: PasswordHash::new(value.password_hash)?,
        })
    }
}

impl From<PostRecord> for Post {
    fn from(value: PostRecord) -> Self {
        Self {
            id: value.post_snowflake.cast_unsigned().into(),
            author_id: value.user_snowflake.cast_unsigned().into(),
            text: value.content,
        }
    }
}

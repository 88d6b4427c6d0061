use crate::{memory::MemoryStorage, storage::Storage};
use argon2::Params;
use microblog_common::{
    model::{
        Id,
        auth::{PasswordHash, PasswordHasher},
        post::{CreatePost, PostMarker},
        user::{CreateUser, UserLogin, UserMarker},
    },
    snowflake::{ProcessId, WorkerId},
};

pub fn memory_storage() -> MemoryStorage {
    MemoryStorage::new(WorkerId::new_unchecked(1), ProcessId::new_unchecked(1))
}

pub fn password_hash() -> PasswordHash {
    PasswordHasher::new(Params::new(8, 1, 1, None).unwrap())
        .hash("password")
        .unwrap()
}

pub async fn create_user(storage: &impl Storage, login: &str) -> Id<UserMarker> {
    storage
        .create_user(&CreateUser {
            login: UserLogin::new(login.to_owned()).unwrap(),
            password_hash: password_hash(),
        })
        .await
        .unwrap()
}

/// Publishes one post per text, in order.
pub async fn create_posts(
    storage: &impl Storage,
    author: Id<UserMarker>,
    texts: impl IntoIterator<Item = String>,
) -> Vec<Id<PostMarker>> {
    let mut ids = Vec::new();
    for text in texts {
        let post = storage
            .create_post(&CreatePost { author, text })
            .await
            .unwrap();
        ids.push(post.id);
    }
    ids
}

//! Volatile storage, lost when the process exits.
//!
//! Users and posts live behind separate locks and no code path holds both at
//! once, so writing posts never blocks reading users and vice versa.

use crate::storage::{DbError, Result, Storage};
use async_trait::async_trait;
use microblog_common::{
    model::{
        Id, MicroblogSnowflakeGenerator,
        post::{CreatePost, Post, PostMarker},
        user::{CreateUser, User, UserLogin, UserMarker},
    },
    snowflake::{ProcessId, WorkerId},
};
use std::{
    collections::{BTreeMap, HashMap},
    ops::Bound,
};
use tokio::sync::RwLock;
use tracing::debug;

#[derive(Debug)]
pub struct MemoryStorage {
    users: RwLock<UserTable>,
    posts: RwLock<PostTable>,
}

#[derive(Debug)]
struct UserTable {
    snowflake_generator: MicroblogSnowflakeGenerator,
    by_id: HashMap<Id<UserMarker>, User>,
    by_login: HashMap<UserLogin, Id<UserMarker>>,
}

#[derive(Debug)]
struct PostTable {
    snowflake_generator: MicroblogSnowflakeGenerator,
    by_author: BTreeMap<(Id<UserMarker>, Id<PostMarker>), Post>,
    authors: HashMap<Id<PostMarker>, Id<UserMarker>>,
}

impl MemoryStorage {
    #[must_use]
    pub fn new(worker_id: WorkerId, process_id: ProcessId) -> Self {
        let snowflake_generator = MicroblogSnowflakeGenerator::new(worker_id, process_id);

        Self {
            users: RwLock::new(UserTable {
                snowflake_generator,
                by_id: HashMap::new(),
                by_login: HashMap::new(),
            }),
            posts: RwLock::new(PostTable {
                snowflake_generator,
                by_author: BTreeMap::new(),
                authors: HashMap::new(),
            }),
        }
    }
}

#[async_trait]
impl Storage for MemoryStorage {
    async fn create_user(&self, user: &CreateUser) -> Result<Id<UserMarker>> {
        let mut users = self.users.write().await;

        if users.by_login.contains_key(&user.login) {
            return Err(DbError::DuplicateLogin(user.login.clone()));
        }

        let id = Id::new(users.snowflake_generator.generate());
        users.by_login.insert(user.login.clone(), id);
        users.by_id.insert(
            id,
            User {
                id,
                login: user.login.clone(),
                password_hash: user.password_hash.clone(),
            },
        );

        debug!(user_id = %id, "Stored user in memory");
        Ok(id)
    }

    async fn create_post(&self, post: &CreatePost) -> Result<Post> {
        // Users are never removed, so the author cannot vanish once seen.
        if !self.users.read().await.by_id.contains_key(&post.author) {
            return Err(DbError::UnknownAuthor(post.author));
        }

        let mut posts = self.posts.write().await;

        let id = Id::new(posts.snowflake_generator.generate());
        let stored = Post {
            id,
            author_id: post.author,
            text: post.text.clone(),
        };
        posts.authors.insert(id, post.author);
        posts.by_author.insert((post.author, id), stored.clone());

        Ok(stored)
    }

    async fn fetch_user(&self, user_id: Id<UserMarker>) -> Result<Option<User>> {
        Ok(self.users.read().await.by_id.get(&user_id).cloned())
    }

    async fn fetch_user_by_login(&self, login: &UserLogin) -> Result<Option<User>> {
        let users = self.users.read().await;

        Ok(users
            .by_login
            .get(login)
            .and_then(|id| users.by_id.get(id))
            .cloned())
    }

    async fn fetch_post(&self, post_id: Id<PostMarker>) -> Result<Option<Post>> {
        let posts = self.posts.read().await;

        Ok(posts
            .authors
            .get(&post_id)
            .and_then(|author| posts.by_author.get(&(*author, post_id)))
            .cloned())
    }

    async fn fetch_posts_before(
        &self,
        author: Id<UserMarker>,
        before: Option<Id<PostMarker>>,
        limit: usize,
    ) -> Result<Vec<Post>> {
        let lower = Bound::Included((author, Id::from(u64::MIN)));
        let upper = match before {
            Some(before) => Bound::Excluded((author, before)),
            None => Bound::Included((author, Id::from(u64::MAX))),
        };

        let posts = self.posts.read().await;

        Ok(posts
            .by_author
            .range((lower, upper))
            .rev()
            .take(limit)
            .map(|(_, post)| post.clone())
            .collect())
    }
}

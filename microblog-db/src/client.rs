use crate::{
    pagination,
    storage::{DbError, Result, Storage},
};
use microblog_common::model::{
    Id,
    page::{Page, PageLimit},
    post::{CreatePost, Post, PostMarker},
    user::{CreateUser, User, UserLogin, UserMarker},
};
use std::{sync::Arc, time::Duration};
use tokio::time::timeout;
use tracing::warn;

/// Entry point to the storage backend. Every call is bounded by a deadline and
/// fails with [`DbError::Timeout`] when it runs out. Nothing is retried.
#[derive(Clone, Debug)]
pub struct DbClient {
    storage: Arc<dyn Storage>,
    deadline: Duration,
}

impl DbClient {
    #[must_use]
    pub fn new(storage: Arc<dyn Storage>, deadline: Duration) -> Self {
        Self { storage, deadline }
    }

    async fn bounded<T>(&self, operation: impl Future<Output = Result<T>>) -> Result<T> {
        if let Ok(result) = timeout(self.deadline, operation).await {
            result
        } else {
            warn!(deadline = ?self.deadline, "Storage operation timed out");
            Err(DbError::Timeout(self.deadline))
        }
    }

    pub async fn create_user(&self, user: &CreateUser) -> Result<Id<UserMarker>> {
        self.bounded(self.storage.create_user(user)).await
    }

    pub async fn create_post(&self, post: &CreatePost) -> Result<Post> {
        self.bounded(self.storage.create_post(post)).await
    }

    pub async fn fetch_user(&self, user_id: Id<UserMarker>) -> Result<Option<User>> {
        self.bounded(self.storage.fetch_user(user_id)).await
    }

    pub async fn fetch_user_by_login(&self, login: &UserLogin) -> Result<Option<User>> {
        self.bounded(self.storage.fetch_user_by_login(login)).await
    }

    pub async fn fetch_post(&self, post_id: Id<PostMarker>) -> Result<Option<Post>> {
        self.bounded(self.storage.fetch_post(post_id)).await
    }

    /// One page of `author`'s posts, newest first. `cursor` is the opaque
    /// string handed out with the previous page.
    pub async fn list_posts_by_author(
        &self,
        author: Id<UserMarker>,
        cursor: Option<&str>,
        limit: PageLimit,
    ) -> Result<Page> {
        self.bounded(pagination::list_posts_by_author(
            self.storage.as_ref(),
            author,
            cursor,
            limit,
        ))
        .await
    }
}

#[cfg(test)]
mod tests {
    use crate::{
        client::DbClient,
        storage::{DbError, Result, Storage},
        test_util::memory_storage,
    };
    use async_trait::async_trait;
    use microblog_common::model::{
        Id,
        page::PageLimit,
        post::{CreatePost, Post, PostMarker},
        user::{CreateUser, User, UserLogin, UserMarker},
    };
    use std::{future::pending, sync::Arc, time::Duration};

    /// A backend that never answers.
    #[derive(Debug)]
    struct Unresponsive;

    #[async_trait]
    impl Storage for Unresponsive {
        async fn create_user(&self, _: &CreateUser) -> Result<Id<UserMarker>> {
            pending().await
        }

        async fn create_post(&self, _: &CreatePost) -> Result<Post> {
            pending().await
        }

        async fn fetch_user(&self, _: Id<UserMarker>) -> Result<Option<User>> {
            pending().await
        }

        async fn fetch_user_by_login(&self, _: &UserLogin) -> Result<Option<User>> {
            pending().await
        }

        async fn fetch_post(&self, _: Id<PostMarker>) -> Result<Option<Post>> {
            pending().await
        }

        async fn fetch_posts_before(
            &self,
            _: Id<UserMarker>,
            _: Option<Id<PostMarker>>,
            _: usize,
        ) -> Result<Vec<Post>> {
            pending().await
        }
    }

    #[tokio::test]
    async fn stalled_backend_times_out() {
        let deadline = Duration::from_millis(20);
        let client = DbClient::new(Arc::new(Unresponsive), deadline);

        let err = client.fetch_post(Id::from(1)).await.unwrap_err();
        assert!(matches!(err, DbError::Timeout(d) if d == deadline));

        let err = client
            .list_posts_by_author(Id::from(1), None, PageLimit::default())
            .await
            .unwrap_err();
        assert!(matches!(err, DbError::Timeout(_)));
    }

    #[tokio::test]
    async fn answers_within_deadline_pass_through() {
        let client = DbClient::new(Arc::new(memory_storage()), Duration::from_secs(5));

        assert!(client.fetch_post(Id::from(1)).await.unwrap().is_none());
        assert!(matches!(
            client
                .list_posts_by_author(Id::from(1), None, PageLimit::default())
                .await,
            Err(DbError::UserNotFound(_))
        ));
    }
}

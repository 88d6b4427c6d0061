//! Newest-first paging over one author's posts.
//!
//! Each page is fetched with one extra post of lookahead. If the lookahead
//! exists it is dropped and the cursor of the page's last post is handed out;
//! if it does not, the page is the last one and carries no cursor.

use crate::storage::{DbError, InvalidCursorError, Result, Storage};
use microblog_common::model::{
    Id,
    page::{Page, PageCursor, PageLimit},
    post::PostMarker,
    user::UserMarker,
};

pub async fn list_posts_by_author(
    storage: &dyn Storage,
    author: Id<UserMarker>,
    cursor: Option<&str>,
    limit: PageLimit,
) -> Result<Page> {
    if storage.fetch_user(author).await?.is_none() {
        return Err(DbError::UserNotFound(author));
    }

    let before = match cursor {
        Some(cursor) => Some(resolve_cursor(storage, author, cursor).await?),
        None => None,
    };

    let limit = limit.as_usize();
    let mut posts = storage.fetch_posts_before(author, before, limit + 1).await?;

    let next_cursor = if posts.len() > limit {
        posts.truncate(limit);
        posts.last().map(|post| PageCursor::new(post.id))
    } else {
        None
    };

    Ok(Page { posts, next_cursor })
}

/// A cursor is only valid if it names an existing post of the requested author.
async fn resolve_cursor(
    storage: &dyn Storage,
    author: Id<UserMarker>,
    cursor: &str,
) -> Result<Id<PostMarker>> {
    let cursor: PageCursor = cursor.parse().map_err(InvalidCursorError::Malformed)?;

    match storage.fetch_post(cursor.post_id()).await? {
        Some(post) if post.author_id == author => Ok(post.id),
        Some(_) => Err(InvalidCursorError::ForeignAuthor.into()),
        None => Err(InvalidCursorError::UnknownPost.into()),
    }
}

use crate::server::{Result, ServerError, ServerRouter, auth::AuthenticatedUser, json::Json};
use axum::extract::State;
use axum_extra::routing::{RouterExt, TypedPath};
use microblog_common::model::{
    Id,
    post::{CreatePost, Post, PostContent, PostMarker},
};
use microblog_db::client::DbClient;
use serde::Deserialize;
use tracing::info;

pub fn routes() -> ServerRouter {
    ServerRouter::new()
        .typed_get(get_post)
        .typed_post(create_post)
}

#[derive(TypedPath, Deserialize)]
#[typed_path("/api/v1/posts/{id}", rejection(ServerError))]
struct GetPostPath {
    id: Id<PostMarker>,
}

async fn get_post(
    GetPostPath { id }: GetPostPath,
    State(db): State<DbClient>,
) -> Result<Json<Post>> {
    let post = db
        .fetch_post(id)
        .await?
        .ok_or(ServerError::PostByIdNotFound(id))?;

    Ok(Json(post))
}

#[derive(TypedPath)]
#[typed_path("/api/v1/posts")]
struct CreatePostPath;

async fn create_post(
    _: CreatePostPath,
    State(db): State<DbClient>,
    user: AuthenticatedUser,
    Json(PostContent { text }): Json<PostContent>,
) -> Result<Json<Post>> {
    let post = db
        .create_post(&CreatePost {
            author: user.user_id(),
            text,
        })
        .await?;

    info!(post_id = %post.id, author_id = %post.author_id, "Published post");
    Ok(Json(post))
}

use crate::server::{
    InvalidPathArgument, Result, ServerRouter,
    json::{Json, Query},
};
use axum::extract::State;
use axum_extra::routing::{RouterExt, TypedPath};
use microblog_common::model::{
    Id,
    page::{Page, PageLimit},
    user::UserMarker,
};
use microblog_db::client::DbClient;
use serde::{Deserialize, Deserializer, de::Error};
use std::{fmt::Display, str::FromStr};

pub fn routes() -> ServerRouter {
    ServerRouter::new().typed_get(get_user_posts)
}

#[derive(TypedPath, Deserialize)]
#[typed_path("/api/v1/users/{id}/posts", rejection(InvalidPathArgument))]
struct GetUserPostsPath {
    id: Id<UserMarker>,
}

/// `page` is the cursor from a previous response, `size` the page limit.
/// Empty values count as absent.
#[derive(Clone, Eq, PartialEq, Debug, Default, Deserialize)]
struct PageQuery {
    #[serde(default, deserialize_with = "empty_as_none")]
    page: Option<String>,
    #[serde(default, deserialize_with = "empty_as_none")]
    size: Option<u32>,
}

fn empty_as_none<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: FromStr,
    T::Err: Display,
{
    Option::<String>::deserialize(deserializer)?
        .filter(|raw| !raw.is_empty())
        .map(|raw| raw.parse().map_err(D::Error::custom))
        .transpose()
}

async fn get_user_posts(
    GetUserPostsPath { id }: GetUserPostsPath,
    Query(query): Query<PageQuery>,
    State(db): State<DbClient>,
) -> Result<Json<Page>> {
    let limit = query
        .size
        .map(PageLimit::try_from)
        .transpose()?
        .unwrap_or_default();

    let page = db
        .list_posts_by_author(id, query.page.as_deref(), limit)
        .await?;

    Ok(Json(page))
}

use crate::server::ServerRouter;
use axum::Router;

mod auth;
mod posts;
mod users;

pub fn routes() -> ServerRouter {
    Router::new()
        .merge(auth::routes())
        .merge(posts::routes())
        .merge(users::routes())
}

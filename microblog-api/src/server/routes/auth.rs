use crate::{
    credentials::CredentialService,
    server::{Result, ServerRouter, json::Json},
};
use axum::extract::State;
use axum_extra::routing::{RouterExt, TypedPath};
use microblog_common::model::{Id, auth::AuthToken, user::UserMarker};
use serde::{Deserialize, Serialize};

pub fn routes() -> ServerRouter {
    ServerRouter::new()
        .typed_post(register)
        .typed_post(login)
}

#[derive(Clone, Eq, PartialEq, Deserialize)]
struct LoginCredentials {
    login: String,
    password: String,
}

#[derive(TypedPath)]
#[typed_path("/api/v1/register")]
struct RegisterPath;

#[derive(Copy, Clone, Eq, PartialEq, Debug, Hash, Serialize)]
struct RegisteredUser {
    id: Id<UserMarker>,
}

async fn register(
    _: RegisterPath,
    State(credentials): State<CredentialService>,
    Json(body): Json<LoginCredentials>,
) -> Result<Json<RegisteredUser>> {
    let id = credentials.register(body.login, body.password).await?;

    Ok(Json(RegisteredUser { id }))
}

#[derive(TypedPath)]
#[typed_path("/api/v1/login")]
struct LoginPath;

#[derive(Clone, Debug, Serialize)]
struct IssuedToken {
    token: AuthToken,
}

async fn login(
    _: LoginPath,
    State(credentials): State<CredentialService>,
    Json(body): Json<LoginCredentials>,
) -> Result<Json<IssuedToken>> {
    let token = credentials.authenticate(body.login, body.password).await?;

    Ok(Json(IssuedToken { token }))
}

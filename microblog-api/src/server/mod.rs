use crate::credentials::{CredentialError, CredentialService};
use axum::{
    Router,
    extract::{
        FromRef, Request,
        rejection::{JsonRejection, PathRejection, QueryRejection},
    },
    http::{StatusCode, Uri},
    response::{IntoResponse, Response},
};
use axum_extra::typed_header::TypedHeaderRejection;
use json::Json;
use microblog_common::model::{Id, page::PageLimitError, post::PostMarker};
use microblog_db::{client::DbClient, storage::DbError};
use serde::Serialize;
use thiserror::Error;
use tower_http::trace::TraceLayer;
use tracing::{debug, error};

mod auth;
mod json;
mod routes;

pub type ServerRouter = Router<ServerState>;

#[derive(Clone, Debug, FromRef)]
pub struct ServerState {
    pub db_client: DbClient,
    pub credentials: CredentialService,
}

pub fn routes() -> ServerRouter {
    routes::routes().fallback(fallback)
}

/// The complete application with tracing, ready to be served.
pub fn app(state: ServerState) -> Router {
    routes()
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

pub async fn fallback(request: Request) -> ServerError {
    ServerError::UnknownRoute(request.into_parts().0.uri)
}

pub type Result<T, E = ServerError> = std::result::Result<T, E>;

#[derive(Debug, Error)]
pub enum ServerError {
    #[error("Unknown route requested: {0}")]
    UnknownRoute(Uri),
    #[error("Path rejected: {0}")]
    PathRejection(#[from] PathRejection),
    #[error("Path argument rejected: {0}")]
    InvalidPathArgument(PathRejection),
    #[error("Query rejected: {0}")]
    QueryRejection(#[from] QueryRejection),
    #[error("Incoming JSON rejected: {0}")]
    JsonRejection(#[from] JsonRejection),
    #[error("JSON response could not be serialized: {0}")]
    JsonResponse(#[from] serde_json::Error),
    #[error("Authorization header was missing or invalid: {0}")]
    InvalidAuthorizationHeader(TypedHeaderRejection),
    #[error(transparent)]
    InvalidPageLimit(#[from] PageLimitError),
    #[error("Post with id {0} was not found.")]
    PostByIdNotFound(Id<PostMarker>),
    #[error(transparent)]
    Credentials(#[from] CredentialError),
    #[error(transparent)]
    Database(#[from] DbError),
}

/// Path rejection for routes where a malformed path segment is a bad argument
/// rather than a missing resource.
#[derive(Debug)]
pub struct InvalidPathArgument(PathRejection);

impl From<PathRejection> for InvalidPathArgument {
    fn from(rejection: PathRejection) -> Self {
        Self(rejection)
    }
}

impl IntoResponse for InvalidPathArgument {
    fn into_response(self) -> Response {
        ServerError::InvalidPathArgument(self.0).into_response()
    }
}

const BAD_CREDENTIALS: &str = "invalid login or password";
const BAD_TOKEN: &str = "missing, invalid or expired bearer token";

fn db_status(err: &DbError) -> StatusCode {
    match err {
        DbError::UserNotFound(_)
        | DbError::DuplicateLogin(_)
        | DbError::UnknownAuthor(_)
        | DbError::InvalidCursor(_) => StatusCode::BAD_REQUEST,
        DbError::Timeout(_) => StatusCode::GATEWAY_TIMEOUT,
        DbError::Unavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
        DbError::Data(_) | DbError::Migrate(_) | DbError::Sqlx(_) => {
            StatusCode::INTERNAL_SERVER_ERROR
        }
    }
}

impl ServerError {
    #[must_use]
    pub fn status(&self) -> StatusCode {
        match self {
            ServerError::UnknownRoute(_)
            | ServerError::PathRejection(_)
            | ServerError::PostByIdNotFound(_) => StatusCode::NOT_FOUND,
            ServerError::InvalidAuthorizationHeader(_) => StatusCode::UNAUTHORIZED,
            ServerError::InvalidPathArgument(_)
            | ServerError::QueryRejection(_)
            | ServerError::JsonRejection(_)
            | ServerError::InvalidPageLimit(_) => StatusCode::BAD_REQUEST,
            ServerError::JsonResponse(_) => StatusCode::INTERNAL_SERVER_ERROR,
            ServerError::Credentials(err) => match err {
                CredentialError::InvalidLoginFormat(_)
                | CredentialError::DuplicateLogin(_)
                | CredentialError::UnknownLogin(_)
                | CredentialError::WrongPassword(_) => StatusCode::BAD_REQUEST,
                CredentialError::InvalidToken(_) | CredentialError::UnknownSubject(_) => {
                    StatusCode::UNAUTHORIZED
                }
                CredentialError::Hash(_) | CredentialError::HashTask(_) => {
                    StatusCode::INTERNAL_SERVER_ERROR
                }
                CredentialError::Database(err) => db_status(err),
            },
            ServerError::Database(err) => db_status(err),
        }
    }

    /// What the client gets to see. Server-side failures and anything that
    /// would reveal whether a login exists are replaced by fixed texts.
    #[must_use]
    pub fn public_message(&self) -> String {
        match self {
            ServerError::UnknownRoute(_) => "route not found".to_owned(),
            ServerError::PathRejection(_) => "resource not found".to_owned(),
            ServerError::InvalidPathArgument(err) => err.body_text(),
            ServerError::QueryRejection(err) => err.body_text(),
            ServerError::JsonRejection(err) => err.body_text(),
            ServerError::InvalidAuthorizationHeader(_) => BAD_TOKEN.to_owned(),
            ServerError::Credentials(
                CredentialError::UnknownLogin(_) | CredentialError::WrongPassword(_),
            ) => BAD_CREDENTIALS.to_owned(),
            ServerError::Credentials(
                CredentialError::InvalidToken(_) | CredentialError::UnknownSubject(_),
            ) => BAD_TOKEN.to_owned(),
            _ => {
                let status = self.status();
                if status.is_server_error() {
                    status
                        .canonical_reason()
                        .unwrap_or("internal server error")
                        .to_lowercase()
                } else {
                    self.to_string()
                }
            }
        }
    }
}

#[derive(Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Hash, Serialize)]
struct ErrorResponse {
    status: u16,
    error: String,
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        let status = self.status();

        if status.is_server_error() {
            error!(error = %self, %status, "Replying with error");
        } else {
            debug!(error = %self, %status, "Rejecting request");
        }

        let error_response = ErrorResponse {
            status: status.as_u16(),
            error: self.public_message(),
        };
        (status, Json(error_response)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use crate::{credentials::CredentialError, server::ServerError};
    use axum::http::StatusCode;
    use microblog_common::model::{Id, page::PageLimitError, user::UserLogin};
    use microblog_db::storage::{DbError, InvalidCursorError};
    use std::time::Duration;

    #[test]
    fn storage_failures_map_to_gateway_statuses() {
        let timeout = ServerError::Database(DbError::Timeout(Duration::from_secs(1)));
        assert_eq!(timeout.status(), StatusCode::GATEWAY_TIMEOUT);
        assert_eq!(timeout.public_message(), "gateway timeout");

        let via_credentials = ServerError::Credentials(CredentialError::Database(
            DbError::Timeout(Duration::from_secs(1)),
        ));
        assert_eq!(via_credentials.status(), StatusCode::GATEWAY_TIMEOUT);
    }

    #[test]
    fn bad_credentials_look_the_same() {
        let unknown = ServerError::Credentials(CredentialError::UnknownLogin("bob".to_owned()));
        let wrong = ServerError::Credentials(CredentialError::WrongPassword(
            UserLogin::new("bob".to_owned()).unwrap(),
        ));

        assert_eq!(unknown.status(), StatusCode::BAD_REQUEST);
        assert_eq!(wrong.status(), StatusCode::BAD_REQUEST);
        assert_eq!(unknown.public_message(), wrong.public_message());
    }

    #[test]
    fn client_errors_keep_their_message() {
        let cursor = ServerError::Database(DbError::InvalidCursor(InvalidCursorError::UnknownPost));
        assert_eq!(cursor.status(), StatusCode::BAD_REQUEST);
        assert!(cursor.public_message().contains("cursor"));

        let limit = ServerError::InvalidPageLimit(PageLimitError(0));
        assert_eq!(limit.status(), StatusCode::BAD_REQUEST);

        let missing = ServerError::Database(DbError::UserNotFound(Id::from(7)));
        assert_eq!(missing.status(), StatusCode::BAD_REQUEST);
        assert_eq!(missing.public_message(), "User with id 7 was not found");
    }
}

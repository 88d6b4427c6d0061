use argon2::Params;
use axum::{
    Router,
    body::Body,
    http::{Method, Request, StatusCode, header},
};
use http_body_util::BodyExt;
use microblog_api::{
    credentials::CredentialService,
    server::{self, ServerState},
};
use microblog_common::{
    model::{
        auth::{PasswordHasher, TokenSigner},
        user::UserLogin,
    },
    snowflake::{ProcessId, WorkerId},
};
use microblog_db::{client::DbClient, memory::MemoryStorage};
use serde_json::{Value, json};
use std::{sync::Arc, time::Duration};
use tower::ServiceExt;

fn app() -> Router {
    let storage = MemoryStorage::new(WorkerId::new_unchecked(1), ProcessId::new_unchecked(1));
    let db_client = DbClient::new(Arc::new(storage), Duration::from_secs(5));
    let credentials = CredentialService::new(
        db_client.clone(),
        PasswordHasher::new(Params::new(8, 1, 1, None).unwrap()),
        TokenSigner::new(b"integration secret"),
    )
    .unwrap();

    server::app(ServerState {
        db_client,
        credentials,
    })
}

async fn call(
    app: &Router,
    method: Method,
    uri: &str,
    token: Option<&str>,
    body: Option<Value>,
) -> (StatusCode, Value) {
    let mut request = Request::builder().method(method).uri(uri);
    if let Some(token) = token {
        request = request.header(header::AUTHORIZATION, format!("Bearer {token}"));
    }
    let request = match body {
        Some(body) => request
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string())),
        None => request.body(Body::empty()),
    }
    .unwrap();

    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };

    (status, value)
}

async fn register(app: &Router, login: &str, password: &str) -> String {
    let (status, body) = call(
        app,
        Method::POST,
        "/api/v1/register",
        None,
        Some(json!({ "login": login, "password": password })),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{body}");

    body["id"].as_str().unwrap().to_owned()
}

async fn login(app: &Router, login: &str, password: &str) -> String {
    let (status, body) = call(
        app,
        Method::POST,
        "/api/v1/login",
        None,
        Some(json!({ "login": login, "password": password })),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{body}");

    body["token"].as_str().unwrap().to_owned()
}

async fn publish(app: &Router, token: &str, text: &str) -> Value {
    let (status, body) = call(
        app,
        Method::POST,
        "/api/v1/posts",
        Some(token),
        Some(json!({ "text": text })),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{body}");

    body
}

#[tokio::test]
async fn register_login_publish_and_fetch() {
    let app = app();

    let user_id = register(&app, "alice", "wonderland").await;
    let token = login(&app, "alice", "wonderland").await;

    let post = publish(&app, &token, "hello").await;
    assert_eq!(post["authorId"], user_id.as_str());
    assert_eq!(post["text"], "hello");
    assert!(post["createdAt"].as_str().unwrap().ends_with('Z'));

    let uri = format!("/api/v1/posts/{}", post["id"].as_str().unwrap());
    let (status, fetched) = call(&app, Method::GET, &uri, None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(fetched, post);
}

#[tokio::test]
async fn registration_errors() {
    let app = app();
    register(&app, "alice", "pw").await;

    let (status, body) = call(
        &app,
        Method::POST,
        "/api/v1/register",
        None,
        Some(json!({ "login": "alice", "password": "other" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["status"], 400);

    let (status, _) = call(
        &app,
        Method::POST,
        "/api/v1/register",
        None,
        Some(json!({ "login": "Alice1", "password": "pw" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = call(
        &app,
        Method::POST,
        "/api/v1/register",
        None,
        Some(json!({ "login": "bob" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn bad_credentials_share_one_answer() {
    let app = app();
    register(&app, "alice", "wonderland").await;

    let (wrong_status, wrong_body) = call(
        &app,
        Method::POST,
        "/api/v1/login",
        None,
        Some(json!({ "login": "alice", "password": "nope" })),
    )
    .await;
    let (unknown_status, unknown_body) = call(
        &app,
        Method::POST,
        "/api/v1/login",
        None,
        Some(json!({ "login": "mallory", "password": "nope" })),
    )
    .await;

    assert_eq!(wrong_status, StatusCode::BAD_REQUEST);
    assert_eq!(wrong_status, unknown_status);
    assert_eq!(wrong_body, unknown_body);
}

#[tokio::test]
async fn publishing_requires_a_valid_token() {
    let app = app();
    register(&app, "alice", "wonderland").await;

    let body = Some(json!({ "text": "hi" }));

    let (status, _) = call(&app, Method::POST, "/api/v1/posts", None, body.clone()).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _) = call(
        &app,
        Method::POST,
        "/api/v1/posts",
        Some("not.a.token"),
        body.clone(),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let foreign = TokenSigner::new(b"someone else")
        .issue(&UserLogin::new("alice".to_owned()).unwrap())
        .unwrap();
    let (status, _) = call(
        &app,
        Method::POST,
        "/api/v1/posts",
        Some(foreign.as_str()),
        body,
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let token = login(&app, "alice", "wonderland").await;
    let (status, _) = call(
        &app,
        Method::POST,
        "/api/v1/posts",
        Some(&token),
        Some(json!({ "content": "wrong field" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn unknown_posts_and_routes_are_not_found() {
    let app = app();

    let (status, body) = call(&app, Method::GET, "/api/v1/posts/12345", None, None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["status"], 404);

    let (status, _) = call(&app, Method::GET, "/api/v1/posts/not-a-number", None, None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = call(&app, Method::GET, "/nowhere", None, None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn paging_through_an_author() {
    let app = app();
    let user_id = register(&app, "alice", "wonderland").await;
    let token = login(&app, "alice", "wonderland").await;

    let mut published = Vec::new();
    for n in 0..5 {
        let post = publish(&app, &token, &format!("post {n}")).await;
        published.push(post["id"].as_str().unwrap().to_owned());
    }
    published.reverse();

    let mut seen = Vec::new();
    let mut uri = format!("/api/v1/users/{user_id}/posts?size=2");
    let mut pages = 0;
    loop {
        let (status, page) = call(&app, Method::GET, &uri, None, None).await;
        assert_eq!(status, StatusCode::OK, "{page}");
        pages += 1;

        for post in page["posts"].as_array().unwrap() {
            seen.push(post["id"].as_str().unwrap().to_owned());
        }

        match page.get("nextPage").and_then(Value::as_str) {
            Some(cursor) => uri = format!("/api/v1/users/{user_id}/posts?size=2&page={cursor}"),
            None => break,
        }
    }

    assert_eq!(pages, 3);
    assert_eq!(seen, published);
}

#[tokio::test]
async fn paging_argument_errors() {
    let app = app();
    let user_id = register(&app, "alice", "wonderland").await;
    let token = login(&app, "alice", "wonderland").await;
    publish(&app, &token, "only post").await;

    let (status, page) = call(
        &app,
        Method::GET,
        &format!("/api/v1/users/{user_id}/posts?page=&size="),
        None,
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(page["posts"].as_array().unwrap().len(), 1);
    assert!(page.get("nextPage").is_none());

    for query in ["size=0", "size=101", "size=abc", "page=!!!", "page=AAAAAAAAAAE"] {
        let uri = format!("/api/v1/users/{user_id}/posts?{query}");
        let (status, _) = call(&app, Method::GET, &uri, None, None).await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "{query}");
    }

}

#[tokio::test]
async fn listing_rejects_bad_authors_as_arguments() {
    let app = app();

    let (status, body) = call(&app, Method::GET, "/api/v1/users/999/posts", None, None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["status"], 400);

    let (status, body) = call(
        &app,
        Method::GET,
        "/api/v1/users/not-a-number/posts",
        None,
        None,
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["status"], 400);
}

use std::sync::Arc;

use api_adapters::{router, AppState};
use axum::body::{to_bytes, Body};
use axum::http::{header, Request, StatusCode};
use axum::Router;
use chrono::Utc;
use domains::{AuthError, CodeSnippet, MockStore, MockTokenVerifier, Store, StoreError, SystemClock, User};
use serde_json::{json, Value};
use services::Services;
use storage_adapters::MemoryStore;
use tower::ServiceExt;
use uuid::Uuid;

/// Tokens in these tests are just the caller's user id.
fn verifier() -> Arc<MockTokenVerifier> {
    let mut verifier = MockTokenVerifier::new();
    verifier
        .expect_verify()
        .returning(|token| Uuid::parse_str(token).map_err(|_| AuthError::Invalid("not a test token".into())));
    Arc::new(verifier)
}

fn app_with(store: Arc<dyn Store>) -> Router {
    let services = Services::new(store, Arc::new(SystemClock));
    router(AppState::new(services, verifier()))
}

async fn seed_user(store: &Arc<dyn Store>, username: &str) -> User {
    let user = User {
        id: Uuid::now_v7(),
        username: username.into(),
        first_name: username.into(),
        last_name: "Api".into(),
        email: format!("{username}@example.com"),
        created_at: Utc::now(),
    };
    let mut uow = store.begin().await.unwrap();
    uow.insert_user(&user).await.unwrap();
    uow.commit().await.unwrap();
    user
}

async fn seed_snippet(store: &Arc<dyn Store>, owner: &User) -> CodeSnippet {
    let snippet = CodeSnippet {
        id: Uuid::now_v7(),
        owner_id: owner.id,
        title: "hello.rs".into(),
        language: "rust".into(),
        created_at: Utc::now(),
    };
    let mut uow = store.begin().await.unwrap();
    uow.insert_snippet(&snippet).await.unwrap();
    uow.commit().await.unwrap();
    snippet
}

fn request(method: &str, uri: &str, caller: Option<&User>, body: Option<Value>) -> Request<Body> {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(user) = caller {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", user.id));
    }
    match body {
        Some(json) => builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(json.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    }
}

async fn send(app: &Router, req: Request<Body>) -> (StatusCode, Value) {
    let response = app.clone().oneshot(req).await.unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let body = if bytes.is_empty() { Value::Null } else { serde_json::from_slice(&bytes).unwrap() };
    (status, body)
}

#[tokio::test]
async fn health_needs_no_token() {
    let app = app_with(Arc::new(MemoryStore::new()));
    let (status, body) = send(&app, request("GET", "/health", None, None)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
}

#[tokio::test]
async fn missing_or_bad_token_is_unauthorized() {
    let app = app_with(Arc::new(MemoryStore::new()));

    let (status, body) = send(&app, request("GET", "/api/me/friend-requests", None, None)).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"], "unauthorized");

    let req = Request::builder()
        .uri("/api/me/friend-requests")
        .header(header::AUTHORIZATION, "Bearer garbage")
        .body(Body::empty())
        .unwrap();
    let (status, _) = send(&app, req).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn friend_request_flow_maps_errors_to_status_codes() {
    let store: Arc<dyn Store> = Arc::new(MemoryStore::new());
    let alice = seed_user(&store, "alice").await;
    let bob = seed_user(&store, "bob").await;
    let app = app_with(store);

    let (status, body) = send(
        &app,
        request("POST", "/api/friend-requests", Some(&alice), Some(json!({ "addressee": "bob" }))),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["status"], "pending");
    assert_eq!(body["requesterName"], "alice");

    // Reversed duplicate
    let (status, body) = send(
        &app,
        request("POST", "/api/friend-requests", Some(&bob), Some(json!({ "addressee": "alice" }))),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"], "conflict");

    // Self request
    let (status, _) = send(
        &app,
        request("POST", "/api/friend-requests", Some(&alice), Some(json!({ "addressee": "ALICE" }))),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    // The requester cannot accept their own request
    let (status, _) = send(&app, request("POST", "/api/friend-requests/bob/accept", Some(&alice), None)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, body) = send(&app, request("POST", "/api/friend-requests/alice/accept", Some(&bob), None)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "accepted");

    let (status, body) = send(&app, request("GET", "/api/users/bob/friends", Some(&alice), None)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body.as_array().unwrap().len(), 1);
    assert_eq!(body[0]["userName"], "alice");

    let (status, _) = send(&app, request("DELETE", "/api/friends/bob", Some(&alice), None)).await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    let (_, body) = send(&app, request("GET", "/api/relationships/bob", Some(&alice), None)).await;
    assert_eq!(body, Value::Null);
}

#[tokio::test]
async fn only_the_author_may_delete_a_comment() {
    let store: Arc<dyn Store> = Arc::new(MemoryStore::new());
    let alice = seed_user(&store, "alice").await;
    let bob = seed_user(&store, "bob").await;
    let snippet = seed_snippet(&store, &alice).await;
    let app = app_with(store);

    let uri = format!("/api/snippets/{}/comments", snippet.id);
    let (status, body) = send(&app, request("POST", &uri, Some(&bob), Some(json!({ "content": "  nice  " })))).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["content"], "nice");
    let comment_id = body["id"].as_str().unwrap().to_string();

    let delete_uri = format!("/api/comments/{comment_id}");
    let (status, body) = send(&app, request("DELETE", &delete_uri, Some(&alice), None)).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["error"], "forbidden");

    let (status, _) = send(&app, request("DELETE", &delete_uri, Some(&bob), None)).await;
    assert_eq!(status, StatusCode::NO_CONTENT);
}

#[tokio::test]
async fn like_toggles_and_feed_validates_sort() {
    let store: Arc<dyn Store> = Arc::new(MemoryStore::new());
    let alice = seed_user(&store, "alice").await;
    let snippet = seed_snippet(&store, &alice).await;
    let app = app_with(store);

    let uri = format!("/api/snippets/{}/like", snippet.id);
    let (_, body) = send(&app, request("POST", &uri, Some(&alice), None)).await;
    assert_eq!(body["state"], "liked");
    let (_, body) = send(&app, request("POST", &uri, Some(&alice), None)).await;
    assert_eq!(body["state"], "unliked");

    let (status, _) = send(&app, request("GET", "/api/snippets?sort=bogus", Some(&alice), None)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, body) = send(&app, request("GET", "/api/snippets?sort=popular&pageSize=5", Some(&alice), None)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["items"][0]["title"], "hello.rs");
    assert_eq!(body["items"][0]["likeCount"], 0);
    assert_eq!(body["totalCount"], 1);
    assert_eq!(body["pageSize"], 5);
    assert_eq!(body["hasNextPage"], false);
}

#[tokio::test]
async fn malformed_input_gets_the_json_error_body() {
    let store: Arc<dyn Store> = Arc::new(MemoryStore::new());
    let alice = seed_user(&store, "alice").await;
    let app = app_with(store);

    let bad_requests = [
        request("POST", "/api/snippets/not-a-uuid/like", Some(&alice), None),
        request("POST", "/api/friend-requests", Some(&alice), Some(json!({}))),
        request("POST", "/api/blocks", Some(&alice), Some(json!({ "user": 42 }))),
        request("GET", "/api/snippets?page=-1", Some(&alice), None),
        Request::builder()
            .method("POST")
            .uri("/api/friend-requests")
            .header(header::AUTHORIZATION, format!("Bearer {}", alice.id))
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from("{not json"))
            .unwrap(),
    ];
    for req in bad_requests {
        let uri = req.uri().to_string();
        let (status, body) = send(&app, req).await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "{uri}");
        assert_eq!(body["error"], "invalid_argument", "{uri}");
        assert!(body["message"].as_str().is_some_and(|m| !m.is_empty()), "{uri}");
    }
}

#[tokio::test]
async fn storage_failure_is_an_opaque_500() {
    let mut store = MockStore::new();
    store
        .expect_begin()
        .returning(|| Err(StoreError::Backend(anyhow::anyhow!("connection to db-primary:5432 refused"))));
    let caller = User {
        id: Uuid::now_v7(),
        username: "alice".into(),
        first_name: "Alice".into(),
        last_name: "Api".into(),
        email: "alice@example.com".into(),
        created_at: Utc::now(),
    };
    let app = app_with(Arc::new(store));

    let (status, body) = send(&app, request("GET", "/api/me/friend-requests", Some(&caller), None)).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["error"], "internal");
    assert!(!body.to_string().contains("db-primary"));
}

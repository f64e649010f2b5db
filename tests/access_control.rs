//! Router-level authentication and role checks.
//!
//! Every request here is answered before any query runs, so the pool is
//! created lazily and never connects.

use axum::{
    body::{to_bytes, Body},
    http::{header, Request, StatusCode},
    Router,
};
use booklend_server::{
    api,
    config::AppConfig,
    models::{Role, User, UserClaims},
    AppState,
};
use chrono::Utc;
use serde_json::{json, Value};
use sqlx::postgres::PgPoolOptions;
use tower::ServiceExt;
use uuid::Uuid;

fn app() -> (Router, AppConfig) {
    let config = AppConfig::default();
    let pool = PgPoolOptions::new()
        .connect_lazy(&config.database.url)
        .unwrap();
    (api::router(AppState::new(config.clone(), pool)), config)
}

fn token(config: &AppConfig, role: Role) -> String {
    let now = Utc::now();
    let user = User {
        id: Uuid::new_v4(),
        name: "Tester".into(),
        email: "tester@library.com".into(),
        password: String::new(),
        role,
        is_active: true,
        created_at: now,
        updated_at: now,
    };
    UserClaims::new(&user, 1)
        .create_token(&config.auth.jwt_secret)
        .unwrap()
}

fn get(uri: &str, bearer: Option<&str>) -> Request<Body> {
    let mut request = Request::builder().method("GET").uri(uri);
    if let Some(token) = bearer {
        request = request.header(header::AUTHORIZATION, format!("Bearer {}", token));
    }
    request.body(Body::empty()).unwrap()
}

fn post_json(uri: &str, bearer: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header(header::AUTHORIZATION, format!("Bearer {}", bearer))
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

async fn json_body(response: axum::response::Response) -> Value {
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

#[tokio::test]
async fn test_health_needs_no_database() {
    let (app, _) = app();

    let response = app.oneshot(get("/api/v1/health", None)).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    assert_eq!(body["status"], "healthy");
}

#[tokio::test]
async fn test_missing_token_is_unauthorized() {
    let (app, _) = app();

    let response = app.oneshot(get("/api/v1/loans/my-loans", None)).await.unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    let body = json_body(response).await;
    assert_eq!(body["error"], "NotAuthorized");
}

#[tokio::test]
async fn test_garbage_token_is_unauthorized() {
    let (app, _) = app();

    let response = app
        .oneshot(get("/api/v1/loans/active", Some("not-a-jwt")))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_token_signed_with_other_secret_is_unauthorized() {
    let (app, config) = app();
    let mut other = config.clone();
    other.auth.jwt_secret = "some-other-secret".into();
    let forged = token(&other, Role::Admin);

    let response = app
        .oneshot(get("/api/v1/loans/active", Some(&forged)))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_member_cannot_list_active_loans() {
    let (app, config) = app();
    let member = token(&config, Role::Member);

    let response = app
        .oneshot(get("/api/v1/loans/active", Some(&member)))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    let body = json_body(response).await;
    assert_eq!(body["message"], "ADMIN role required");
}

#[tokio::test]
async fn test_admin_cannot_borrow() {
    let (app, config) = app();
    let admin = token(&config, Role::Admin);

    let response = app
        .oneshot(post_json(
            "/api/v1/loans/issue",
            &admin,
            json!({ "book_id": Uuid::new_v4() }),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_admin_cannot_return() {
    let (app, config) = app();
    let admin = token(&config, Role::Admin);

    let response = app
        .oneshot(post_json(
            &format!("/api/v1/loans/return/{}", Uuid::new_v4()),
            &admin,
            json!({}),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_admin_cannot_read_member_dashboard() {
    let (app, config) = app();
    let admin = token(&config, Role::Admin);

    let response = app
        .oneshot(get("/api/v1/users/dashboard-stats", Some(&admin)))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_member_cannot_manage_users_or_books() {
    let (app, config) = app();
    let member = token(&config, Role::Member);

    let users = app
        .clone()
        .oneshot(get("/api/v1/users", Some(&member)))
        .await
        .unwrap();
    assert_eq!(users.status(), StatusCode::FORBIDDEN);

    let stats = app
        .clone()
        .oneshot(get("/api/v1/admin/dashboard-stats", Some(&member)))
        .await
        .unwrap();
    assert_eq!(stats.status(), StatusCode::FORBIDDEN);

    let create = app
        .oneshot(post_json(
            "/api/v1/books",
            &member,
            json!({ "title": "Dune", "isbn": "9780441172719", "quantity": 1 }),
        ))
        .await
        .unwrap();
    assert_eq!(create.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_invalid_book_is_rejected_before_storage() {
    let (app, config) = app();
    let admin = token(&config, Role::Admin);

    let response = app
        .oneshot(post_json(
            "/api/v1/books",
            &admin,
            json!({ "title": "", "isbn": "9780441172719", "quantity": -1 }),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_openapi_document_is_served() {
    let (app, _) = app();

    let response = app
        .oneshot(get("/api-docs/openapi.json", None))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    assert!(body["paths"]["/loans/issue"].is_object());
}

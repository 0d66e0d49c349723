//! HTTP layer tests: the full router over the in-memory store

use std::sync::Arc;

use axum::{
    body::Body,
    http::{header, Method, Request, StatusCode},
    Router,
};
use chrono::Utc;
use serde_json::{json, Value};
use tower::ServiceExt;

use unilib_server::{
    api,
    config::{
        AppConfig, AuthConfig, DatabaseConfig, EmailConfig, LendingConfig, LoggingConfig,
        SchedulerConfig, ServerConfig,
    },
    models::{enums::UserRole, user::UserClaims},
    AppState,
};

use crate::common::{harness, Harness};

const SECRET: &str = "router-test-secret";

fn app(h: &Harness) -> Router {
    let config = AppConfig {
        server: ServerConfig::default(),
        database: DatabaseConfig::default(),
        auth: AuthConfig {
            jwt_secret: SECRET.to_string(),
        },
        logging: LoggingConfig::default(),
        email: EmailConfig::default(),
        lending: LendingConfig::default(),
        scheduler: SchedulerConfig::default(),
    };

    api::router(AppState {
        config: Arc::new(config),
        services: Arc::new(h.services.clone()),
    })
}

fn token(user_id: i32, role: UserRole) -> String {
    let now = Utc::now().timestamp();
    UserClaims {
        sub: user_id.to_string(),
        user_id,
        role,
        exp: now + 3600,
        iat: now,
    }
    .create_token(SECRET)
    .unwrap()
}

async fn call(app: &Router, method: Method, uri: &str, token: Option<&str>, body: Option<Value>) -> (StatusCode, Value) {
    let mut request = Request::builder().method(method).uri(uri);
    if let Some(token) = token {
        request = request.header(header::AUTHORIZATION, format!("Bearer {}", token));
    }
    let request = match body {
        Some(body) => request
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => request.body(Body::empty()).unwrap(),
    };

    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, value)
}

#[tokio::test]
async fn test_health_needs_no_token() {
    let h = harness();
    let app = app(&h);

    let (status, body) = call(&app, Method::GET, "/api/v1/health", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "healthy");

    let (status, body) = call(&app, Method::GET, "/api/v1/ready", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ready");
}

#[tokio::test]
async fn test_missing_or_bad_token_is_unauthorized() {
    let h = harness();
    let app = app(&h);

    let (status, _) = call(&app, Method::GET, "/api/v1/books", None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _) = call(&app, Method::GET, "/api/v1/books", Some("garbage"), None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_registration_starts_pending() {
    let h = harness();
    let app = app(&h);

    let (status, body) = call(
        &app,
        Method::POST,
        "/api/v1/users",
        None,
        Some(json!({ "email": "ada@university.example", "name": "Ada" })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["status"], "PENDING");
    assert_eq!(body["role"], "USER");

    let (status, _) = call(
        &app,
        Method::POST,
        "/api/v1/users",
        None,
        Some(json!({ "email": "not-an-email", "name": "Bad" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_only_admins_assign_roles_at_registration() {
    let h = harness();
    let ada = h.member("ada").await;
    let app = app(&h);
    let body = json!({ "email": "boss@university.example", "name": "Boss", "role": "ADMIN" });

    let (status, _) = call(&app, Method::POST, "/api/v1/users", None, Some(body.clone())).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let member = token(ada.id, UserRole::User);
    let (status, _) = call(&app, Method::POST, "/api/v1/users", Some(&member), Some(body.clone())).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let admin = token(999, UserRole::Admin);
    let (status, created) = call(&app, Method::POST, "/api/v1/users", Some(&admin), Some(body)).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(created["role"], "ADMIN");
    assert_eq!(created["status"], "PENDING");
}

#[tokio::test]
async fn test_admin_routes_reject_members() {
    let h = harness();
    let ada = h.member("ada").await;
    let app = app(&h);
    let member = token(ada.id, UserRole::User);

    for uri in ["/api/v1/admin/sweeps/overdue", "/api/v1/admin/sweeps/lost", "/api/v1/admin/sweeps/holds"] {
        let (status, _) = call(&app, Method::POST, uri, Some(&member), None).await;
        assert_eq!(status, StatusCode::FORBIDDEN);
    }

    let (status, body) = call(
        &app,
        Method::POST,
        "/api/v1/admin/sweeps/overdue",
        Some(&token(1000, UserRole::Admin)),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["transitioned"], 0);
}

#[tokio::test]
async fn test_borrow_over_http() {
    let h = harness();
    let ada = h.member("ada").await;
    let bob = h.member("bob").await;
    let book = h.book("Dune", 1).await;
    let app = app(&h);
    let ada_token = token(ada.id, UserRole::User);
    let bob_token = token(bob.id, UserRole::User);

    let (status, record) = call(
        &app,
        Method::POST,
        "/api/v1/borrows",
        Some(&ada_token),
        Some(json!({ "book_id": book.id })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(record["status"], "BORROWED");
    assert_eq!(record["user_id"], ada.id);

    let (status, _) = call(
        &app,
        Method::POST,
        "/api/v1/borrows",
        Some(&ada_token),
        Some(json!({ "book_id": book.id })),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (status, body) = call(
        &app,
        Method::POST,
        "/api/v1/borrows",
        Some(&bob_token),
        Some(json!({ "book_id": book.id })),
    )
    .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["message"], "Book is not available");

    // Members cannot borrow on someone else's behalf
    let (status, _) = call(
        &app,
        Method::POST,
        "/api/v1/borrows",
        Some(&bob_token),
        Some(json!({ "book_id": book.id, "user_id": ada.id })),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, page) = call(&app, Method::GET, "/api/v1/borrows/mine", Some(&ada_token), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(page["total"], 1);
    assert_eq!(page["items"][0]["book_id"], book.id);

    let (status, hold) = call(
        &app,
        Method::POST,
        "/api/v1/holds",
        Some(&bob_token),
        Some(json!({ "book_id": book.id })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(hold["status"], "WAITING");
    assert_eq!(hold["queue_position"], 1);
}

#[tokio::test]
async fn test_state_conflict_reports_current_status() {
    let h = harness();
    let ada = h.member("ada").await;
    let app = app(&h);
    let admin = token(1000, UserRole::Admin);

    let (status, body) = call(
        &app,
        Method::POST,
        &format!("/api/v1/users/{}/approve", ada.id),
        Some(&admin),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["current_status"], "APPROVED");
}

#[tokio::test]
async fn test_eligibility_is_private() {
    let h = harness();
    let ada = h.member("ada").await;
    let bob = h.member("bob").await;
    let app = app(&h);

    let uri = format!("/api/v1/users/{}/eligibility", ada.id);
    let (status, body) = call(&app, Method::GET, &uri, Some(&token(ada.id, UserRole::User)), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["is_eligible"], true);

    let (status, _) = call(&app, Method::GET, &uri, Some(&token(bob.id, UserRole::User)), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#![allow(dead_code)]

use std::sync::Arc;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use serde_json::{json, Value};
use tower::ServiceExt; // for `app.oneshot()`

use tapaal::config::ChatConfig;
use tapaal::services::chat_service::ChatClient;
use tapaal::{db, routes, AppState};

fn app_on(pool: sqlx::SqlitePool) -> Router {
    let chat = ChatClient::new(&ChatConfig {
        api_base: "http://127.0.0.1:9".into(),
        timeout_secs: 1,
        ..ChatConfig::default()
    })
    .expect("chat client");
    routes::app(
        AppState {
            pool,
            chat: Arc::new(chat),
        },
        None,
    )
}

pub async fn test_app() -> Router {
    app_on(db::connect_in_memory().await.expect("in-memory db"))
}

/// Router over a database file with a multi-connection pool, so concurrent
/// requests really contend for the write lock. Keep the `TempDir` alive.
pub async fn file_app(max_connections: u32) -> (Router, tempfile::TempDir) {
    let dir = tempfile::tempdir().expect("temp dir");
    let url = format!("sqlite://{}", dir.path().join("tapaal.db").display());
    let pool = db::connect(&url, max_connections).await.expect("file db");
    db::run_migrations(&pool).await.expect("migrations");
    (app_on(pool), dir)
}

pub async fn send(app: &Router, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    let builder = Request::builder().method(method).uri(uri);
    let request = match body {
        Some(b) => builder
            .header("content-type", "application/json")
            .body(Body::from(b.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or_else(|_| Value::String(String::from_utf8_lossy(&bytes).into()))
    };
    (status, value)
}

pub async fn get(app: &Router, uri: &str) -> (StatusCode, Value) {
    send(app, "GET", uri, None).await
}

pub async fn post(app: &Router, uri: &str, body: Value) -> (StatusCode, Value) {
    send(app, "POST", uri, Some(body)).await
}

pub async fn put(app: &Router, uri: &str, body: Value) -> (StatusCode, Value) {
    send(app, "PUT", uri, Some(body)).await
}

pub async fn delete(app: &Router, uri: &str) -> (StatusCode, Value) {
    send(app, "DELETE", uri, None).await
}

pub async fn create_department(app: &Router, name: &str, code: &str) -> Value {
    let (status, body) = post(app, "/api/departments", json!({"name": name, "code": code})).await;
    assert_eq!(status, StatusCode::CREATED, "{body}");
    body["data"].clone()
}

pub async fn create_inward(app: &Router, subject: &str, sender: &str, department: &str) -> Value {
    let (status, body) = post(
        app,
        "/api/mails",
        json!({"type": "inward", "subject": subject, "sender": sender, "department": department}),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "{body}");
    body["data"].clone()
}

pub async fn create_outward(app: &Router, subject: &str, receiver: &str, department: &str) -> Value {
    let (status, body) = post(
        app,
        "/api/mails",
        json!({"type": "outward", "subject": subject, "receiver": receiver, "department": department}),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "{body}");
    body["data"].clone()
}

pub fn current_year() -> i32 {
    use chrono::Datelike;
    chrono::Utc::now().year()
}

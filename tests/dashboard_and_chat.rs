mod common;

use axum::http::StatusCode;
use serde_json::json;

use common::*;

#[tokio::test]
async fn dashboard_on_empty_store_is_all_zero() {
    let app = test_app().await;
    let (status, body) = get(&app, "/api/dashboard").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);
    assert_eq!(body["data"]["stats"]["totalInward"], 0);
    assert_eq!(body["data"]["realData"]["recentMails"].as_array().unwrap().len(), 0);
}

#[tokio::test]
async fn add_sample_data_seeds_once_and_returns_refreshed_dashboard() {
    let app = test_app().await;

    let (status, body) = post(&app, "/api/dashboard", json!({"action": "addSampleData"})).await;
    assert_eq!(status, StatusCode::OK, "{body}");
    let stats = &body["data"]["stats"];
    assert_eq!(stats["totalInward"], 2);
    assert_eq!(stats["totalOutward"], 2);
    assert_eq!(stats["departments"], 3);
    assert_eq!(stats["users"], 4);
    assert_eq!(stats["pending"], 1);
    assert_eq!(stats["completed"], 1);
    assert_eq!(body["data"]["realData"]["recentMails"].as_array().unwrap().len(), 4);

    let (_, body) = post(&app, "/api/dashboard", json!({"action": "addSampleData"})).await;
    assert_eq!(body["data"]["stats"]["totalInward"], 2);
    assert_eq!(body["data"]["stats"]["users"], 4);

    let (_, body) = get(&app, "/api/tracking").await;
    assert_eq!(body["data"].as_array().unwrap().len(), 4);
}

#[tokio::test]
async fn unknown_dashboard_action_is_rejected() {
    let app = test_app().await;
    let (status, body) = post(&app, "/api/dashboard", json!({"action": "dropEverything"})).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Unknown action: dropEverything");

    let (status, _) = post(&app, "/api/dashboard", json!({})).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn malformed_json_gets_the_error_envelope() {
    let app = test_app().await;
    let request = axum::http::Request::builder()
        .method("POST")
        .uri("/api/mails")
        .header("content-type", "application/json")
        .body(axum::body::Body::from("{not json"))
        .unwrap();
    let response = tower::ServiceExt::oneshot(app, request).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let body: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(body["success"], false);
}

#[tokio::test]
async fn chat_requires_a_message() {
    let app = test_app().await;
    let (status, body) = post(&app, "/api/chat", json!({"message": "   "})).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Message is required");
}

#[tokio::test]
async fn chat_without_api_key_is_a_server_error_and_logs_nothing() {
    let app = test_app().await;
    let (status, body) = post(
        &app,
        "/api/chat",
        json!({"message": "Where is INW-2024-001?", "userId": "u-1", "history": [{"role": "user", "content": "hi"}]}),
    )
    .await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert!(body["error"].as_str().unwrap().contains("not configured"));

    let (status, body) = get(&app, "/api/chat/history/u-1").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"].as_array().unwrap().len(), 0);
}

#[tokio::test]
async fn healthz_answers() {
    let app = test_app().await;
    let (status, body) = get(&app, "/healthz").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, "ok");
}

use axum::extract::rejection::JsonRejection;
use axum::http::{HeaderValue, Method};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Serialize;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::error::AppError;
use crate::AppState;

pub mod chat;
pub mod dashboard;
pub mod departments;
pub mod mails;
pub mod search;
pub mod system;
pub mod tracking;
pub mod users;

/// Envelope shared by every endpoint.
#[derive(Debug, Serialize)]
pub struct ApiResponse<T: Serialize> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl<T: Serialize> ApiResponse<T> {
    pub fn failure(error: String) -> Self {
        Self { success: false, data: None, error: Some(error), message: None }
    }
}

pub fn ok<T: Serialize>(data: T) -> Json<ApiResponse<T>> {
    Json(ApiResponse { success: true, data: Some(data), error: None, message: None })
}

pub fn ok_with_message<T: Serialize>(data: T, message: impl Into<String>) -> Json<ApiResponse<T>> {
    Json(ApiResponse { success: true, data: Some(data), error: None, message: Some(message.into()) })
}

/// Unwrap a JSON body, turning malformed input into a 400 with the envelope.
pub fn json_body<T>(body: Result<Json<T>, JsonRejection>) -> Result<T, AppError> {
    body.map(|Json(v)| v)
        .map_err(|rejection| AppError::validation(rejection.body_text()))
}

fn cors(allow_origin: Option<&str>) -> CorsLayer {
    let layer = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE, Method::OPTIONS])
        .allow_headers(Any);
    match allow_origin.and_then(|o| o.parse::<HeaderValue>().ok()) {
        Some(origin) => layer.allow_origin(origin),
        None => layer.allow_origin(Any),
    }
}

pub fn api_routes() -> Router<AppState> {
    Router::new()
        .route("/api/mails", get(mails::list_mails).post(mails::create_mail))
        .route(
            "/api/mails/:mail_type/:mail_id",
            get(mails::get_mail)
                .put(mails::update_mail)
                .delete(mails::delete_mail),
        )
        .route("/api/tracking", get(tracking::list_tracking))
        .route("/api/tracking/:tracking_id", get(tracking::get_tracking))
        .route(
            "/api/tracking/:tracking_id/timeline",
            post(tracking::append_timeline),
        )
        .route(
            "/api/departments",
            get(departments::list_departments).post(departments::create_department),
        )
        .route("/api/departments/stats", get(departments::department_stats))
        .route(
            "/api/departments/:id",
            get(departments::get_department)
                .put(departments::update_department)
                .delete(departments::delete_department),
        )
        .route("/api/users", get(users::list_users).post(users::create_user))
        .route("/api/users/activity", get(users::user_activity))
        .route(
            "/api/users/:id",
            get(users::get_user)
                .put(users::update_user)
                .delete(users::delete_user),
        )
        .route("/api/search/:query", get(search::search))
        .route("/api/system/overview", get(system::overview))
        .route(
            "/api/dashboard",
            get(dashboard::get_dashboard).post(dashboard::dashboard_action),
        )
        .route("/api/chat", post(chat::chat))
        .route("/api/chat/history/:user_id", get(chat::chat_history))
}

/// Full application router with state, CORS and request tracing.
pub fn app(state: AppState, cors_allow_origin: Option<&str>) -> Router {
    Router::new()
        .route("/healthz", get(|| async { "ok" }))
        .merge(api_routes())
        .layer(TraceLayer::new_for_http())
        .layer(cors(cors_allow_origin))
        .with_state(state)
}

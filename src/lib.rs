pub mod config;
pub mod db;
pub mod error;
pub mod models;
pub mod routes;
pub mod services;
pub mod telemetry;

use std::sync::Arc;

use services::chat_service::ChatClient;

/// Handles shared by every request. Built once by the process entry point.
#[derive(Clone)]
pub struct AppState {
    pub pool: sqlx::SqlitePool,
    pub chat: Arc<ChatClient>,
}

impl axum::extract::FromRef<AppState> for sqlx::SqlitePool {
    fn from_ref(state: &AppState) -> Self {
        state.pool.clone()
    }
}

impl axum::extract::FromRef<AppState> for Arc<ChatClient> {
    fn from_ref(state: &AppState) -> Self {
        state.chat.clone()
    }
}

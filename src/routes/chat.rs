use std::sync::Arc;

use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::Json;
use sqlx::SqlitePool;

use crate::error::AppResult;
use crate::models::chat::{ChatLogEntry, ChatReply, ChatRequest};
use crate::routes::{json_body, ok, ApiResponse};
use crate::services::chat_service::{self, ChatClient};

/// POST /api/chat {message, history?, userId?}
pub async fn chat(
    State(pool): State<SqlitePool>,
    State(client): State<Arc<ChatClient>>,
    body: Result<Json<ChatRequest>, JsonRejection>,
) -> AppResult<Json<ApiResponse<ChatReply>>> {
    let req = json_body(body)?;
    Ok(ok(chat_service::chat(&pool, &client, req).await?))
}

/// GET /api/chat/history/:user_id
pub async fn chat_history(
    State(pool): State<SqlitePool>,
    Path(user_id): Path<String>,
) -> AppResult<Json<ApiResponse<Vec<ChatLogEntry>>>> {
    Ok(ok(chat_service::history(&pool, &user_id).await?))
}

/// User endpoints
use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use serde::Deserialize;
use sqlx::SqlitePool;

use crate::error::AppResult;
use crate::models::user::{UserActivity, UserPayload, UserView};
use crate::routes::{json_body, ok, ok_with_message, ApiResponse};
use crate::services::{stats_service, user_service};

#[derive(Debug, Deserialize)]
pub struct UserListQuery {
    pub department: Option<String>,
}

pub async fn list_users(
    State(pool): State<SqlitePool>,
    Query(q): Query<UserListQuery>,
) -> AppResult<Json<ApiResponse<Vec<UserView>>>> {
    let users = user_service::list_users(&pool, q.department.as_deref()).await?;
    Ok(ok(users.iter().map(UserView::from).collect()))
}

pub async fn create_user(
    State(pool): State<SqlitePool>,
    body: Result<Json<UserPayload>, JsonRejection>,
) -> AppResult<(StatusCode, Json<ApiResponse<UserView>>)> {
    let user = user_service::create_user(&pool, json_body(body)?).await?;
    Ok((StatusCode::CREATED, ok(UserView::from(&user))))
}

/// GET /api/users/activity
pub async fn user_activity(
    State(pool): State<SqlitePool>,
) -> AppResult<Json<ApiResponse<Vec<UserActivity>>>> {
    Ok(ok(stats_service::user_activity(&pool).await?))
}

pub async fn get_user(
    State(pool): State<SqlitePool>,
    Path(id): Path<String>,
) -> AppResult<Json<ApiResponse<UserView>>> {
    let user = user_service::get_user(&pool, &id).await?;
    Ok(ok(UserView::from(&user)))
}

pub async fn update_user(
    State(pool): State<SqlitePool>,
    Path(id): Path<String>,
    body: Result<Json<UserPayload>, JsonRejection>,
) -> AppResult<Json<ApiResponse<UserView>>> {
    let user = user_service::update_user(&pool, &id, json_body(body)?).await?;
    Ok(ok(UserView::from(&user)))
}

pub async fn delete_user(
    State(pool): State<SqlitePool>,
    Path(id): Path<String>,
) -> AppResult<Json<ApiResponse<String>>> {
    user_service::delete_user(&pool, &id).await?;
    Ok(ok_with_message(id, "User deleted"))
}

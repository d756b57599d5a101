use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::Json;
use sqlx::SqlitePool;

use crate::error::AppResult;
use crate::models::tracking::{TimelinePayload, TrackingView};
use crate::routes::{json_body, ok, ApiResponse};
use crate::services::tracking_service;

/// GET /api/tracking - every tracking event with its timeline
pub async fn list_tracking(
    State(pool): State<SqlitePool>,
) -> AppResult<Json<ApiResponse<Vec<TrackingView>>>> {
    Ok(ok(tracking_service::list_tracking(&pool).await?))
}

/// GET /api/tracking/:tracking_id - tracking id or internal id
pub async fn get_tracking(
    State(pool): State<SqlitePool>,
    Path(tracking_id): Path<String>,
) -> AppResult<Json<ApiResponse<TrackingView>>> {
    Ok(ok(tracking_service::get_tracking(&pool, &tracking_id).await?))
}

/// POST /api/tracking/:tracking_id/timeline
pub async fn append_timeline(
    State(pool): State<SqlitePool>,
    Path(tracking_id): Path<String>,
    body: Result<Json<TimelinePayload>, JsonRejection>,
) -> AppResult<Json<ApiResponse<TrackingView>>> {
    let payload = json_body(body)?;
    Ok(ok(
        tracking_service::append_timeline(&pool, &tracking_id, payload).await?,
    ))
}

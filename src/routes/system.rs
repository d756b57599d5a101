use axum::extract::State;
use axum::Json;
use sqlx::SqlitePool;

use crate::error::AppResult;
use crate::routes::{ok, ApiResponse};
use crate::services::stats_service::{self, SystemOverview};

/// GET /api/system/overview
pub async fn overview(
    State(pool): State<SqlitePool>,
) -> AppResult<Json<ApiResponse<SystemOverview>>> {
    Ok(ok(stats_service::system_overview(&pool).await?))
}

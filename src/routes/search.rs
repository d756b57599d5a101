use axum::extract::{Path, State};
use axum::Json;
use sqlx::SqlitePool;

use crate::error::AppResult;
use crate::routes::{ok, ApiResponse};
use crate::services::search_service::{self, SearchResults};

/// GET /api/search/:query
pub async fn search(
    State(pool): State<SqlitePool>,
    Path(query): Path<String>,
) -> AppResult<Json<ApiResponse<SearchResults>>> {
    Ok(ok(search_service::search(&pool, &query).await?))
}

use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::Json;
use serde::Deserialize;
use sqlx::SqlitePool;

use crate::error::{AppError, AppResult};
use crate::routes::{json_body, ok, ok_with_message, ApiResponse};
use crate::services::dashboard_service::{self, Dashboard};

#[derive(Debug, Deserialize)]
pub struct DashboardAction {
    pub action: Option<String>,
}

/// GET /api/dashboard
pub async fn get_dashboard(
    State(pool): State<SqlitePool>,
) -> AppResult<Json<ApiResponse<Dashboard>>> {
    Ok(ok(dashboard_service::dashboard(&pool).await?))
}

/// POST /api/dashboard {"action": "addSampleData"}
pub async fn dashboard_action(
    State(pool): State<SqlitePool>,
    body: Result<Json<DashboardAction>, JsonRejection>,
) -> AppResult<Json<ApiResponse<Dashboard>>> {
    let req = json_body(body)?;
    match req.action.as_deref() {
        Some("addSampleData") => {
            let inserted = dashboard_service::add_sample_data(&pool).await?;
            let dashboard = dashboard_service::dashboard(&pool).await?;
            Ok(ok_with_message(
                dashboard,
                format!("Sample data added ({inserted} new records)"),
            ))
        }
        Some(other) => Err(AppError::validation(format!("Unknown action: {other}"))),
        None => Err(AppError::validation("Action is required")),
    }
}

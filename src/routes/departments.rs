/// Department endpoints
use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use sqlx::SqlitePool;

use crate::error::AppResult;
use crate::models::department::{DepartmentPayload, DepartmentStats, DepartmentView};
use crate::routes::{json_body, ok, ok_with_message, ApiResponse};
use crate::services::{department_service, stats_service};

pub async fn list_departments(
    State(pool): State<SqlitePool>,
) -> AppResult<Json<ApiResponse<Vec<DepartmentView>>>> {
    let departments = department_service::list_departments(&pool).await?;
    Ok(ok(departments.iter().map(DepartmentView::from).collect()))
}

pub async fn create_department(
    State(pool): State<SqlitePool>,
    body: Result<Json<DepartmentPayload>, JsonRejection>,
) -> AppResult<(StatusCode, Json<ApiResponse<DepartmentView>>)> {
    let dept = department_service::create_department(&pool, json_body(body)?).await?;
    Ok((StatusCode::CREATED, ok(DepartmentView::from(&dept))))
}

/// GET /api/departments/stats
pub async fn department_stats(
    State(pool): State<SqlitePool>,
) -> AppResult<Json<ApiResponse<Vec<DepartmentStats>>>> {
    Ok(ok(stats_service::department_stats(&pool).await?))
}

pub async fn get_department(
    State(pool): State<SqlitePool>,
    Path(id): Path<String>,
) -> AppResult<Json<ApiResponse<DepartmentView>>> {
    let dept = department_service::get_department(&pool, &id).await?;
    Ok(ok(DepartmentView::from(&dept)))
}

pub async fn update_department(
    State(pool): State<SqlitePool>,
    Path(id): Path<String>,
    body: Result<Json<DepartmentPayload>, JsonRejection>,
) -> AppResult<Json<ApiResponse<DepartmentView>>> {
    let dept = department_service::update_department(&pool, &id, json_body(body)?).await?;
    Ok(ok(DepartmentView::from(&dept)))
}

pub async fn delete_department(
    State(pool): State<SqlitePool>,
    Path(id): Path<String>,
) -> AppResult<Json<ApiResponse<String>>> {
    department_service::delete_department(&pool, &id).await?;
    Ok(ok_with_message(id, "Department deleted"))
}

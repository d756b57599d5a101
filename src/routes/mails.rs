/// Mail endpoints
use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use serde::Deserialize;
use sqlx::SqlitePool;

use crate::error::AppResult;
use crate::models::mail::{MailFilters, MailPayload, MailView};
use crate::routes::{json_body, ok, ok_with_message, ApiResponse};
use crate::services::mail_service;

#[derive(Debug, Deserialize)]
pub struct MailListQuery {
    #[serde(rename = "type")]
    pub kind: Option<String>,
    pub status: Option<String>,
    pub department: Option<String>,
    pub priority: Option<String>,
    pub search: Option<String>,
}

/// GET /api/mails?type=inward|outward&department=&status=&priority=&search=
pub async fn list_mails(
    State(pool): State<SqlitePool>,
    Query(q): Query<MailListQuery>,
) -> AppResult<Json<ApiResponse<Vec<MailView>>>> {
    let filters = MailFilters {
        status: q.status,
        department: q.department,
        priority: q.priority,
        search: q.search,
    };
    let mails = match q.kind.as_deref().filter(|k| !k.trim().is_empty()) {
        Some(kind) => {
            let kind = mail_service::parse_kind(Some(kind))?;
            mail_service::list_mails(&pool, kind, &filters).await?
        }
        None => mail_service::list_all_mails(&pool, &filters).await?,
    };
    Ok(ok(mails.iter().map(|m| m.view()).collect()))
}

/// POST /api/mails - body carries `type` plus the mail fields
pub async fn create_mail(
    State(pool): State<SqlitePool>,
    body: Result<Json<MailPayload>, JsonRejection>,
) -> AppResult<(StatusCode, Json<ApiResponse<MailView>>)> {
    let payload = json_body(body)?;
    let kind = mail_service::parse_kind(payload.kind.as_deref())?;
    let mail = mail_service::create_mail(&pool, kind, payload).await?;
    let message = format!("{} mail {} created", kind.label(), mail.mail_id());
    Ok((StatusCode::CREATED, ok_with_message(mail.view(), message)))
}

/// GET /api/mails/:mail_type/:mail_id - mail id or internal id
pub async fn get_mail(
    State(pool): State<SqlitePool>,
    Path((mail_type, mail_id)): Path<(String, String)>,
) -> AppResult<Json<ApiResponse<MailView>>> {
    let kind = mail_service::parse_kind(Some(&mail_type))?;
    let mail = mail_service::get_mail(&pool, kind, &mail_id).await?;
    Ok(ok(mail.view()))
}

/// PUT /api/mails/:mail_type/:mail_id
pub async fn update_mail(
    State(pool): State<SqlitePool>,
    Path((mail_type, mail_id)): Path<(String, String)>,
    body: Result<Json<MailPayload>, JsonRejection>,
) -> AppResult<Json<ApiResponse<MailView>>> {
    let kind = mail_service::parse_kind(Some(&mail_type))?;
    let payload = json_body(body)?;
    let mail = mail_service::update_mail(&pool, kind, &mail_id, payload).await?;
    Ok(ok(mail.view()))
}

/// DELETE /api/mails/:mail_type/:mail_id
pub async fn delete_mail(
    State(pool): State<SqlitePool>,
    Path((mail_type, mail_id)): Path<(String, String)>,
) -> AppResult<Json<ApiResponse<MailView>>> {
    let kind = mail_service::parse_kind(Some(&mail_type))?;
    let mail = mail_service::delete_mail(&pool, kind, &mail_id).await?;
    let message = format!("Mail {} deleted", mail.mail_id());
    Ok(ok_with_message(mail.view(), message))
}

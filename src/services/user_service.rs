/// User management
use sqlx::SqlitePool;

use crate::db::{is_unique_violation, now_millis};
use crate::error::{AppError, AppResult};
use crate::models::department::RecordStatus;
use crate::models::user::{Role, User, UserPayload};
use crate::services::department_service;

const SELECT_USER: &str = "SELECT u.id, u.name, u.email, u.role, u.status, u.department_id, \
     d.name AS department_name, u.created_at \
     FROM users u LEFT JOIN departments d ON d.id = u.department_id";

fn parse_role(value: &str) -> AppResult<Role> {
    Role::parse(value).ok_or_else(|| AppError::validation(format!("Invalid role: {value}")))
}

fn parse_status(value: &str) -> AppResult<RecordStatus> {
    RecordStatus::parse(value)
        .ok_or_else(|| AppError::validation(format!("Invalid user status: {value}")))
}

async fn resolve_department_id(pool: &SqlitePool, key: &str) -> AppResult<Option<String>> {
    if key.trim().is_empty() {
        return Ok(None);
    }
    let dept = department_service::find_department(pool, key)
        .await?
        .ok_or_else(|| AppError::validation(format!("Department not found: {key}")))?;
    Ok(Some(dept.id))
}

fn duplicate_email(e: sqlx::Error, email: &str) -> AppError {
    if is_unique_violation(&e) {
        AppError::validation(format!("A user with email {email} already exists"))
    } else {
        e.into()
    }
}

pub async fn create_user(pool: &SqlitePool, req: UserPayload) -> AppResult<User> {
    let name = req
        .name
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .ok_or_else(|| AppError::validation("Name is required"))?
        .to_string();
    let email = req
        .email
        .as_deref()
        .map(str::trim)
        .filter(|s| s.contains('@'))
        .ok_or_else(|| AppError::validation("A valid email is required"))?
        .to_lowercase();
    let role = parse_role(req.role.as_deref().unwrap_or("Staff"))?;
    let status = match req.status.as_deref() {
        Some(s) => parse_status(s)?,
        None => RecordStatus::Active,
    };
    let department_id = match req.department.as_deref() {
        Some(key) => resolve_department_id(pool, key).await?,
        None => None,
    };
    let id = uuid::Uuid::new_v4().to_string();

    sqlx::query(
        "INSERT INTO users (id, name, email, role, status, department_id, created_at) \
         VALUES (?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(&id)
    .bind(&name)
    .bind(&email)
    .bind(role.as_str())
    .bind(status.as_str())
    .bind(&department_id)
    .bind(now_millis())
    .execute(pool)
    .await
    .map_err(|e| duplicate_email(e, &email))?;

    tracing::info!(user = %email, role = role.as_str(), "user created");
    get_user(pool, &id).await
}

/// All users, optionally restricted to one department (id, name or code).
pub async fn list_users(pool: &SqlitePool, department: Option<&str>) -> AppResult<Vec<User>> {
    match department.map(str::trim).filter(|d| !d.is_empty()) {
        Some(key) => {
            let Some(dept) = department_service::find_department(pool, key).await? else {
                return Ok(Vec::new());
            };
            let sql = format!("{SELECT_USER} WHERE u.department_id = ? ORDER BY u.name ASC");
            Ok(sqlx::query_as::<_, User>(&sql)
                .bind(&dept.id)
                .fetch_all(pool)
                .await?)
        }
        None => {
            let sql = format!("{SELECT_USER} ORDER BY u.name ASC");
            Ok(sqlx::query_as::<_, User>(&sql).fetch_all(pool).await?)
        }
    }
}

pub async fn get_user(pool: &SqlitePool, id: &str) -> AppResult<User> {
    let sql = format!("{SELECT_USER} WHERE u.id = ?");
    sqlx::query_as::<_, User>(&sql)
        .bind(id)
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| AppError::not_found(format!("User not found: {id}")))
}

pub async fn update_user(pool: &SqlitePool, id: &str, req: UserPayload) -> AppResult<User> {
    let existing = get_user(pool, id).await?;
    let name = match req.name.as_deref().map(str::trim) {
        Some("") => return Err(AppError::validation("Name cannot be empty")),
        Some(n) => n.to_string(),
        None => existing.name,
    };
    let email = match req.email.as_deref().map(str::trim) {
        Some(e) if !e.contains('@') => {
            return Err(AppError::validation("A valid email is required"))
        }
        Some(e) => e.to_lowercase(),
        None => existing.email,
    };
    let role = match req.role.as_deref() {
        Some(r) => parse_role(r)?,
        None => existing.role,
    };
    let status = match req.status.as_deref() {
        Some(s) => parse_status(s)?,
        None => existing.status,
    };
    // An empty department clears the association.
    let department_id = match req.department.as_deref() {
        Some(key) => resolve_department_id(pool, key).await?,
        None => existing.department_id,
    };

    sqlx::query(
        "UPDATE users SET name = ?, email = ?, role = ?, status = ?, department_id = ? WHERE id = ?",
    )
    .bind(&name)
    .bind(&email)
    .bind(role.as_str())
    .bind(status.as_str())
    .bind(&department_id)
    .bind(&existing.id)
    .execute(pool)
    .await
    .map_err(|e| duplicate_email(e, &email))?;

    get_user(pool, &existing.id).await
}

pub async fn delete_user(pool: &SqlitePool, id: &str) -> AppResult<()> {
    let result = sqlx::query("DELETE FROM users WHERE id = ?")
        .bind(id)
        .execute(pool)
        .await?;
    if result.rows_affected() == 0 {
        return Err(AppError::not_found(format!("User not found: {id}")));
    }
    tracing::info!(user_id = %id, "user deleted");
    Ok(())
}

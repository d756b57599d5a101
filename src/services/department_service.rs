/// Department management
use sqlx::{SqliteConnection, SqliteExecutor, SqlitePool};

use crate::db::{self, is_unique_violation, now_millis};
use crate::error::{AppError, AppResult};
use crate::models::department::{Department, DepartmentPayload, RecordStatus};
use crate::models::fold;

const SELECT_DEPARTMENT: &str =
    "SELECT id, name, code, head, status, created_at FROM departments";

fn required(value: Option<&str>, field: &str) -> AppResult<String> {
    match value.map(str::trim) {
        Some(v) if !v.is_empty() => Ok(v.to_string()),
        _ => Err(AppError::validation(format!("{field} is required"))),
    }
}

fn parse_status(value: Option<&str>) -> AppResult<Option<RecordStatus>> {
    value
        .map(|s| {
            RecordStatus::parse(s)
                .ok_or_else(|| AppError::validation(format!("Invalid department status: {s}")))
        })
        .transpose()
}

pub async fn create_department(pool: &SqlitePool, req: DepartmentPayload) -> AppResult<Department> {
    let name = required(req.name.as_deref(), "Department name")?;
    let code = required(req.code.as_deref(), "Department code")?.to_uppercase();
    let status = parse_status(req.status.as_deref())?.unwrap_or_default();
    let id = uuid::Uuid::new_v4().to_string();

    sqlx::query(
        "INSERT INTO departments (id, name, code, head, status, created_at) VALUES (?, ?, ?, ?, ?, ?)",
    )
    .bind(&id)
    .bind(&name)
    .bind(&code)
    .bind(&req.head)
    .bind(status.as_str())
    .bind(now_millis())
    .execute(pool)
    .await
    .map_err(|e| {
        if is_unique_violation(&e) {
            AppError::validation(format!("Department {name} ({code}) already exists"))
        } else {
            e.into()
        }
    })?;

    tracing::info!(department = %name, code = %code, "department created");
    get_department(pool, &id).await
}

pub async fn list_departments(pool: &SqlitePool) -> AppResult<Vec<Department>> {
    let sql = format!("{SELECT_DEPARTMENT} ORDER BY name ASC");
    Ok(sqlx::query_as::<_, Department>(&sql).fetch_all(pool).await?)
}

pub async fn get_department(pool: &SqlitePool, id: &str) -> AppResult<Department> {
    find_department(pool, id)
        .await?
        .ok_or_else(|| AppError::not_found(format!("Department not found: {id}")))
}

/// Look a department up by id, then name, then code. Name and code compare
/// case-insensitively, including non-ASCII letters.
pub async fn find_department<'e>(
    executor: impl SqliteExecutor<'e>,
    key: &str,
) -> AppResult<Option<Department>> {
    let key = key.trim();
    let mut departments = sqlx::query_as::<_, Department>(SELECT_DEPARTMENT)
        .fetch_all(executor)
        .await?;
    let folded = fold(key);
    let found = departments
        .iter()
        .position(|d| d.id == key)
        .or_else(|| departments.iter().position(|d| fold(&d.name) == folded))
        .or_else(|| departments.iter().position(|d| fold(&d.code) == folded));
    Ok(found.map(|i| departments.swap_remove(i)))
}

/// Apply the supplied fields. A rename is copied onto the tracking events of
/// the department's mails in the same transaction.
pub async fn update_department(
    pool: &SqlitePool,
    id: &str,
    req: DepartmentPayload,
) -> AppResult<Department> {
    let pool = pool.clone();
    let id = id.to_string();
    db::spawn_write(async move {
        let mut conn = db::begin_immediate(&pool).await?;
        let result = update_in(&mut conn, &id, req).await;
        db::finish(conn, result).await
    })
    .await
}

async fn update_in(
    conn: &mut SqliteConnection,
    id: &str,
    req: DepartmentPayload,
) -> AppResult<Department> {
    let existing = find_department(&mut *conn, id)
        .await?
        .ok_or_else(|| AppError::not_found(format!("Department not found: {id}")))?;
    let name = match req.name.as_deref() {
        Some(_) => required(req.name.as_deref(), "Department name")?,
        None => existing.name.clone(),
    };
    let code = match req.code.as_deref() {
        Some(_) => required(req.code.as_deref(), "Department code")?.to_uppercase(),
        None => existing.code.clone(),
    };
    let head = req.head.or(existing.head.clone());
    let status = parse_status(req.status.as_deref())?.unwrap_or(existing.status);

    sqlx::query("UPDATE departments SET name = ?, code = ?, head = ?, status = ? WHERE id = ?")
        .bind(&name)
        .bind(&code)
        .bind(&head)
        .bind(status.as_str())
        .bind(&existing.id)
        .execute(&mut *conn)
        .await
        .map_err(|e| {
            if is_unique_violation(&e) {
                AppError::validation(format!("Department {name} ({code}) already exists"))
            } else {
                e.into()
            }
        })?;

    if name != existing.name {
        let refreshed = sqlx::query(
            "UPDATE tracking_events SET department = ?1 \
             WHERE inward_mail_id IN (SELECT id FROM inward_mails WHERE department_id = ?2) \
                OR outward_mail_id IN (SELECT id FROM outward_mails WHERE department_id = ?2)",
        )
        .bind(&name)
        .bind(&existing.id)
        .execute(&mut *conn)
        .await?;
        tracing::info!(
            department_id = %existing.id,
            from = %existing.name,
            to = %name,
            tracking_events = refreshed.rows_affected(),
            "department renamed"
        );
    }

    find_department(&mut *conn, &existing.id)
        .await?
        .ok_or_else(|| AppError::not_found(format!("Department not found: {id}")))
}

/// Departments that still own mails cannot be removed. The check and the
/// delete share one write transaction.
pub async fn delete_department(pool: &SqlitePool, id: &str) -> AppResult<()> {
    let pool = pool.clone();
    let id = id.to_string();
    db::spawn_write(async move {
        let mut conn = db::begin_immediate(&pool).await?;
        let result = delete_in(&mut conn, &id).await;
        db::finish(conn, result).await
    })
    .await
}

async fn delete_in(conn: &mut SqliteConnection, id: &str) -> AppResult<()> {
    let owned: i64 = sqlx::query_scalar(
        "SELECT (SELECT COUNT(*) FROM inward_mails WHERE department_id = ?1) + \
                (SELECT COUNT(*) FROM outward_mails WHERE department_id = ?1)",
    )
    .bind(id)
    .fetch_one(&mut *conn)
    .await?;
    if owned > 0 {
        return Err(AppError::validation(format!(
            "Department still owns {owned} mail(s)"
        )));
    }

    let result = sqlx::query("DELETE FROM departments WHERE id = ?")
        .bind(id)
        .execute(&mut *conn)
        .await?;
    if result.rows_affected() == 0 {
        return Err(AppError::not_found(format!("Department not found: {id}")));
    }
    tracing::info!(department_id = %id, "department deleted");
    Ok(())
}

use anyhow::Result;
use sqlx::pool::PoolConnection;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::{Executor, Sqlite, SqlitePool};
use std::future::Future;
use std::str::FromStr;
use std::time::Duration;

use crate::error::{AppError, AppResult};

/// How long a writer waits for the database lock before giving up.
const BUSY_TIMEOUT: Duration = Duration::from_secs(10);

/// Schema migrations, applied in order on every start. Each script is idempotent.
const MIGRATIONS: &[(&str, &str)] = &[("0001_init", include_str!("../../migrations/0001_init.sql"))];

/// Open the pool behind `AppState`. The caller owns it and closes it on shutdown.
pub async fn connect(database_url: &str, max_connections: u32) -> Result<SqlitePool> {
    let options = SqliteConnectOptions::from_str(database_url)?
        .create_if_missing(true)
        .foreign_keys(true)
        .busy_timeout(BUSY_TIMEOUT);
    let pool = SqlitePoolOptions::new()
        .max_connections(max_connections)
        .connect_with(options)
        .await?;
    Ok(pool)
}

/// Single-connection in-memory pool. The connection is never recycled, so the
/// database lives as long as the pool.
pub async fn connect_in_memory() -> Result<SqlitePool> {
    let options = SqliteConnectOptions::from_str("sqlite::memory:")?.foreign_keys(true);
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .idle_timeout(None)
        .max_lifetime(None)
        .connect_with(options)
        .await?;
    run_migrations(&pool).await?;
    Ok(pool)
}

pub async fn run_migrations(pool: &SqlitePool) -> Result<()> {
    for (name, sql) in MIGRATIONS {
        pool.execute(*sql).await?;
        tracing::debug!(migration = %name, "migration applied");
    }
    Ok(())
}

/// Start a write transaction holding the write lock from its first statement.
///
/// A deferred `BEGIN` that reads before it writes fails with SQLITE_BUSY as
/// soon as another writer is active, without waiting on the busy timeout.
/// `BEGIN IMMEDIATE` waits for the lock instead.
pub async fn begin_immediate(pool: &SqlitePool) -> Result<PoolConnection<Sqlite>, sqlx::Error> {
    let mut conn = pool.acquire().await?;
    sqlx::query("BEGIN IMMEDIATE").execute(&mut *conn).await?;
    Ok(conn)
}

/// Commit on `Ok`, roll back on `Err` (or when the commit itself fails).
pub async fn finish<T, E>(mut conn: PoolConnection<Sqlite>, result: Result<T, E>) -> Result<T, E>
where
    E: From<sqlx::Error>,
{
    match result {
        Ok(value) => match sqlx::query("COMMIT").execute(&mut *conn).await {
            Ok(_) => Ok(value),
            Err(e) => {
                rollback(conn).await;
                Err(e.into())
            }
        },
        Err(e) => {
            rollback(conn).await;
            Err(e)
        }
    }
}

async fn rollback(mut conn: PoolConnection<Sqlite>) {
    if let Err(e) = sqlx::query("ROLLBACK").execute(&mut *conn).await {
        // The transaction state is unknown; keep the connection out of the pool.
        tracing::warn!(error = %e, "rollback failed, closing connection");
        let _ = sqlx::Connection::close(conn.detach()).await;
    }
}

/// Run a write unit on its own task. Dropping the request future then cannot
/// leave a connection parked in the middle of an open transaction.
pub async fn spawn_write<T, F>(unit: F) -> AppResult<T>
where
    T: Send + 'static,
    F: Future<Output = AppResult<T>> + Send + 'static,
{
    tokio::spawn(unit)
        .await
        .map_err(|e| AppError::Internal(anyhow::anyhow!("write task failed: {e}")))?
}

pub fn now_millis() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

/// Render stored epoch millis for API responses.
pub fn to_rfc3339(millis: i64) -> String {
    chrono::DateTime::from_timestamp_millis(millis)
        .unwrap_or_default()
        .to_rfc3339_opts(chrono::SecondsFormat::Millis, true)
}

/// True when the error is a UNIQUE constraint violation on insert.
pub fn is_unique_violation(err: &sqlx::Error) -> bool {
    match err {
        sqlx::Error::Database(db) => db.is_unique_violation(),
        _ => false,
    }
}

/// SQLITE_BUSY / SQLITE_LOCKED and their extended codes.
pub fn is_busy(err: &sqlx::Error) -> bool {
    match err {
        sqlx::Error::Database(db) => matches!(
            db.code().as_deref(),
            Some("5") | Some("6") | Some("261") | Some("517")
        ),
        _ => false,
    }
}

/// Accept `sqlite:foo.db`, `sqlite://foo.db`, `file:foo.db` or a bare path.
pub fn normalize_sqlite_url(input: &str) -> String {
    if input.starts_with("sqlite://") || input.starts_with("sqlite::memory:") {
        return input.to_string();
    }
    if let Some(rest) = input.strip_prefix("sqlite:") {
        return format!("sqlite://{}", rest.trim_start_matches('/'));
    }
    if let Some(rest) = input.strip_prefix("file:") {
        return format!("sqlite://{}", rest);
    }
    format!("sqlite://{}", input)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalizes_sqlite_urls() {
        assert_eq!(normalize_sqlite_url("sqlite://a.db"), "sqlite://a.db");
        assert_eq!(normalize_sqlite_url("sqlite:a.db"), "sqlite://a.db");
        assert_eq!(normalize_sqlite_url("file:data/a.db"), "sqlite://data/a.db");
        assert_eq!(normalize_sqlite_url("a.db"), "sqlite://a.db");
        assert_eq!(normalize_sqlite_url("sqlite::memory:"), "sqlite::memory:");
    }

    #[test]
    fn renders_millis_as_utc() {
        assert_eq!(to_rfc3339(0), "1970-01-01T00:00:00.000Z");
    }
}

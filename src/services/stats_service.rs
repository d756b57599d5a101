/// Cross-cutting read views: system overview, department stats, user activity
use std::collections::BTreeMap;

use serde::Serialize;
use sqlx::SqlitePool;

use crate::error::AppResult;
use crate::models::department::DepartmentStats;
use crate::models::mail::{Mail, MailFilters, MailKind, MailStatus};
use crate::models::user::UserActivity;
use crate::services::{department_service, mail_service, tracking_service, user_service};

#[derive(Debug, Clone, Copy, Serialize)]
pub struct Tally {
    pub total: i64,
    pub active: i64,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SystemOverview {
    pub mails: Tally,
    pub inward_mails: Tally,
    pub outward_mails: Tally,
    pub users: Tally,
    pub departments: Tally,
    pub tracking_events: Tally,
    /// Number of mails per status, both kinds together. Keys are the stored
    /// canonical form (`PENDING`, `IN_TRANSIT`), not the per-kind lowercase
    /// rendering used on mail and tracking views.
    pub mails_by_status: BTreeMap<String, i64>,
}

async fn count(pool: &SqlitePool, sql: &str) -> Result<i64, sqlx::Error> {
    sqlx::query_scalar(sql).fetch_one(pool).await
}

fn closed_statuses_sql() -> String {
    MailStatus::ALL
        .iter()
        .filter(|s| s.is_closed())
        .map(|s| format!("'{}'", s.as_str()))
        .collect::<Vec<_>>()
        .join(", ")
}

async fn tally_mails(pool: &SqlitePool, kind: MailKind) -> Result<Tally, sqlx::Error> {
    let total_sql = format!("SELECT COUNT(*) FROM {}", kind.table());
    let active_sql = format!(
        "SELECT COUNT(*) FROM {} WHERE status NOT IN ({})",
        kind.table(),
        closed_statuses_sql()
    );
    let (total, active) = tokio::try_join!(count(pool, &total_sql), count(pool, &active_sql))?;
    Ok(Tally { total, active })
}

async fn tally(pool: &SqlitePool, table: &str, active_where: &str) -> Result<Tally, sqlx::Error> {
    let total_sql = format!("SELECT COUNT(*) FROM {table}");
    let active_sql = format!("SELECT COUNT(*) FROM {table} WHERE {active_where}");
    let (total, active) = tokio::try_join!(count(pool, &total_sql), count(pool, &active_sql))?;
    Ok(Tally { total, active })
}

async fn status_counts(pool: &SqlitePool) -> Result<BTreeMap<String, i64>, sqlx::Error> {
    let rows: Vec<(String, i64)> = sqlx::query_as(
        "SELECT status, COUNT(*) FROM ( \
             SELECT status FROM inward_mails UNION ALL SELECT status FROM outward_mails \
         ) GROUP BY status",
    )
    .fetch_all(pool)
    .await?;
    Ok(rows.into_iter().collect())
}

/// Independent counts, run concurrently. Concurrent writes may make the
/// individual numbers disagree with each other.
pub async fn system_overview(pool: &SqlitePool) -> AppResult<SystemOverview> {
    let tracking_active = format!("current_status NOT IN ({})", closed_statuses_sql());
    let (inward, outward, users, departments, tracking, by_status) = tokio::try_join!(
        tally_mails(pool, MailKind::Inward),
        tally_mails(pool, MailKind::Outward),
        tally(pool, "users", "status = 'Active'"),
        tally(pool, "departments", "status = 'Active'"),
        tally(pool, "tracking_events", &tracking_active),
        status_counts(pool),
    )?;

    Ok(SystemOverview {
        mails: Tally {
            total: inward.total + outward.total,
            active: inward.active + outward.active,
        },
        inward_mails: inward,
        outward_mails: outward,
        users,
        departments,
        tracking_events: tracking,
        mails_by_status: by_status,
    })
}

fn department_id(mail: &Mail) -> &str {
    match mail {
        Mail::Inward(m) => &m.department_id,
        Mail::Outward(m) => &m.department_id,
    }
}

/// Per-department counts, filtered in memory over the full data set. Mails
/// and tracking events are attributed through the department id, so a
/// renamed department keeps its counts.
pub async fn department_stats(pool: &SqlitePool) -> AppResult<Vec<DepartmentStats>> {
    let filters = MailFilters::default();
    let (departments, users, inward, outward, events) = tokio::try_join!(
        department_service::list_departments(pool),
        user_service::list_users(pool, None),
        mail_service::list_mails(pool, MailKind::Inward, &filters),
        mail_service::list_mails(pool, MailKind::Outward, &filters),
        tracking_service::load_events(pool),
    )?;

    Ok(departments
        .iter()
        .map(|d| {
            let dept_inward: Vec<&Mail> =
                inward.iter().filter(|m| department_id(m) == d.id).collect();
            let dept_outward: Vec<&Mail> =
                outward.iter().filter(|m| department_id(m) == d.id).collect();
            let owns = |mail_ref: Option<&str>, mails: &[&Mail]| {
                mail_ref.is_some_and(|r| mails.iter().any(|m| m.id() == r))
            };
            DepartmentStats {
                id: d.id.clone(),
                name: d.name.clone(),
                code: d.code.clone(),
                status: d.status.as_str(),
                users: users
                    .iter()
                    .filter(|u| u.department_id.as_deref() == Some(d.id.as_str()))
                    .count(),
                inward_mails: dept_inward.len(),
                outward_mails: dept_outward.len(),
                tracking_events: events
                    .iter()
                    .filter(|e| {
                        owns(e.inward_mail_id.as_deref(), dept_inward.as_slice())
                            || owns(e.outward_mail_id.as_deref(), dept_outward.as_slice())
                    })
                    .count(),
                pending_inward: dept_inward
                    .iter()
                    .filter(|m| m.status() == MailStatus::Pending)
                    .count(),
                completed_inward: dept_inward
                    .iter()
                    .filter(|m| m.status() == MailStatus::Completed)
                    .count(),
            }
        })
        .collect())
}

/// Per-user counts: inward mails received by or handed over to the user,
/// outward mails sent by them, tracking events assigned to them.
pub async fn user_activity(pool: &SqlitePool) -> AppResult<Vec<UserActivity>> {
    let filters = MailFilters::default();
    let (users, inward, outward, events) = tokio::try_join!(
        user_service::list_users(pool, None),
        mail_service::list_mails(pool, MailKind::Inward, &filters),
        mail_service::list_mails(pool, MailKind::Outward, &filters),
        tracking_service::load_events(pool),
    )?;

    Ok(users
        .iter()
        .map(|u| {
            let inward_mails = inward
                .iter()
                .filter(|m| match m {
                    Mail::Inward(m) => {
                        u.matches_name(m.received_by.as_deref())
                            || u.matches_name(m.handover_to.as_deref())
                    }
                    Mail::Outward(_) => false,
                })
                .count();
            let outward_mails = outward
                .iter()
                .filter(|m| match m {
                    Mail::Outward(m) => u.matches_name(m.sent_by.as_deref()),
                    Mail::Inward(_) => false,
                })
                .count();
            let assigned_tracking = events
                .iter()
                .filter(|e| u.matches_name(e.assigned_to.as_deref()))
                .count();
            UserActivity {
                id: u.id.clone(),
                name: u.name.clone(),
                email: u.email.clone(),
                role: u.role.as_str(),
                department: u.department_name.clone(),
                inward_mails,
                outward_mails,
                assigned_tracking,
                total_activity: inward_mails + outward_mails + assigned_tracking,
            }
        })
        .collect())
}

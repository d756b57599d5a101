/// Inward/outward mail store
use std::time::Duration;

use chrono::Datelike;
use sqlx::{QueryBuilder, Sqlite, SqliteConnection, SqliteExecutor, SqlitePool};

use crate::db::{self, is_busy, is_unique_violation, now_millis};
use crate::error::{AppError, AppResult};
use crate::models::fold;
use crate::models::mail::{
    format_mail_id, parse_mail_seq, InwardMail, Mail, MailFilters, MailKind, MailPayload,
    MailStatus, OutwardMail, Priority,
};
use crate::services::{department_service, tracking_service};

/// Attempts at claiming a fresh mail id / tracking id before giving up.
const MAX_CREATE_ATTEMPTS: u32 = 5;
const RETRY_BACKOFF: Duration = Duration::from_millis(20);

const SELECT_INWARD: &str = "SELECT m.id, m.mail_id, m.tracking_id, m.subject, m.details, m.sender, \
     m.priority, m.status, m.department_id, d.name AS department_name, m.received_by, m.handover_to, \
     m.delivery_mode, m.reference_details, m.created_at, m.updated_at \
     FROM inward_mails m JOIN departments d ON d.id = m.department_id";

const SELECT_OUTWARD: &str = "SELECT m.id, m.mail_id, m.tracking_id, m.subject, m.details, m.receiver, \
     m.priority, m.status, m.department_id, d.name AS department_name, m.sent_by, m.due_date, \
     m.attachments, m.cost, m.delivery_mode, m.reference_details, m.created_at, m.updated_at \
     FROM outward_mails m JOIN departments d ON d.id = m.department_id";

fn select_sql(kind: MailKind) -> &'static str {
    match kind {
        MailKind::Inward => SELECT_INWARD,
        MailKind::Outward => SELECT_OUTWARD,
    }
}

/// Parse the `type` discriminator of a request.
pub fn parse_kind(raw: Option<&str>) -> AppResult<MailKind> {
    let raw = raw
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .ok_or_else(|| AppError::validation("Mail type is required (inward or outward)"))?;
    MailKind::parse(raw).ok_or_else(|| {
        AppError::validation(format!("Invalid mail type: {raw} (expected inward or outward)"))
    })
}

fn parse_priority(raw: Option<&str>) -> AppResult<Option<Priority>> {
    raw.map(|p| Priority::parse(p).ok_or_else(|| AppError::validation(format!("Invalid priority: {p}"))))
        .transpose()
}

fn parse_status(raw: Option<&str>) -> AppResult<Option<MailStatus>> {
    raw.map(|s| MailStatus::parse(s).ok_or_else(|| AppError::validation(format!("Invalid status: {s}"))))
        .transpose()
}

fn non_empty(value: Option<&str>) -> Option<String> {
    value.map(str::trim).filter(|s| !s.is_empty()).map(str::to_string)
}

fn required(value: Option<&str>, field: &str) -> AppResult<String> {
    non_empty(value).ok_or_else(|| AppError::validation(format!("{field} is required")))
}

fn search_hit(mail: &Mail, needle: &str) -> bool {
    let (party, details) = match mail {
        Mail::Inward(m) => (&m.sender, m.details.as_deref()),
        Mail::Outward(m) => (&m.receiver, m.details.as_deref()),
    };
    fold(mail.subject()).contains(needle)
        || fold(party).contains(needle)
        || details.is_some_and(|d| fold(d).contains(needle))
}

pub async fn fetch_mail<'e>(
    executor: impl SqliteExecutor<'e>,
    kind: MailKind,
    key: &str,
) -> Result<Option<Mail>, sqlx::Error> {
    let sql = format!(
        "{} WHERE m.mail_id = ?1 OR m.id = ?1 \
         ORDER BY CASE WHEN m.mail_id = ?1 THEN 0 ELSE 1 END LIMIT 1",
        select_sql(kind)
    );
    let key = key.trim();
    Ok(match kind {
        MailKind::Inward => sqlx::query_as::<_, InwardMail>(&sql)
            .bind(key)
            .fetch_optional(executor)
            .await?
            .map(Mail::Inward),
        MailKind::Outward => sqlx::query_as::<_, OutwardMail>(&sql)
            .bind(key)
            .fetch_optional(executor)
            .await?
            .map(Mail::Outward),
    })
}

/// Highest sequence already issued under `prefix` plus one.
async fn next_sequence<'e>(
    executor: impl SqliteExecutor<'e>,
    kind: MailKind,
    prefix: &str,
) -> Result<i64, sqlx::Error> {
    let sql = format!("SELECT mail_id FROM {} WHERE mail_id LIKE ?", kind.table());
    let ids: Vec<String> = sqlx::query_scalar(&sql)
        .bind(format!("{prefix}%"))
        .fetch_all(executor)
        .await?;
    let max = ids
        .iter()
        .filter_map(|id| parse_mail_seq(id, prefix))
        .max()
        .unwrap_or(0);
    Ok(max + 1)
}

/// Validated create input, resolved once before the insert loop.
struct NewMail {
    kind: MailKind,
    subject: String,
    details: Option<String>,
    party: String,
    priority: Priority,
    status: MailStatus,
    department_key: String,
    req: MailPayload,
}

fn validate_new(kind: MailKind, req: MailPayload) -> AppResult<NewMail> {
    let party = match kind {
        MailKind::Inward => required(req.sender.as_deref(), "Sender")?,
        MailKind::Outward => required(req.receiver.as_deref(), "Receiver")?,
    };
    let subject = required(req.subject.as_deref(), "Subject")?;
    let department_key = required(req.department.as_deref(), "Department")?;
    let priority = parse_priority(req.priority.as_deref())?.unwrap_or_default();
    let status = parse_status(req.status.as_deref())?.unwrap_or(MailStatus::Pending);
    Ok(NewMail {
        kind,
        subject,
        details: non_empty(req.details.as_deref()),
        party,
        priority,
        status,
        department_key,
        req,
    })
}

/// Create a mail and its tracking event in one write transaction.
///
/// The mail id is `{INW|OUT}-{year}-{seq}` where `seq` continues from the
/// highest id issued this year. The transaction holds the write lock from
/// the start, so concurrent creates queue up instead of racing; a UNIQUE or
/// BUSY failure that still gets through is rolled back and retried.
pub async fn create_mail(pool: &SqlitePool, kind: MailKind, req: MailPayload) -> AppResult<Mail> {
    let new = validate_new(kind, req)?;
    let pool = pool.clone();
    let mail = db::spawn_write(async move { create_with_retry(&pool, &new).await }).await?;
    tracing::info!(
        mail_id = %mail.mail_id(),
        kind = kind.as_str(),
        department = %mail.department_name(),
        "mail created"
    );
    Ok(mail)
}

async fn create_with_retry(pool: &SqlitePool, new: &NewMail) -> AppResult<Mail> {
    let mut attempt = 0;
    loop {
        attempt += 1;
        let result = match db::begin_immediate(pool).await {
            Ok(mut conn) => {
                let result = try_create(&mut conn, new).await;
                db::finish(conn, result).await
            }
            Err(e) => Err(e.into()),
        };
        match result {
            Err(AppError::Database(e))
                if attempt < MAX_CREATE_ATTEMPTS && (is_unique_violation(&e) || is_busy(&e)) =>
            {
                let backoff = RETRY_BACKOFF * 2u32.pow(attempt - 1);
                tracing::debug!(attempt, error = %e, "mail create contention, retrying");
                tokio::time::sleep(backoff).await;
            }
            other => return other,
        }
    }
}

async fn try_create(conn: &mut SqliteConnection, new: &NewMail) -> AppResult<Mail> {
    let department = department_service::find_department(&mut *conn, &new.department_key)
        .await?
        .ok_or_else(|| AppError::validation(format!("Department not found: {}", new.department_key)))?;

    // Tracking ids embed the creation millis; keep them strictly increasing per kind.
    let last: Option<i64> =
        sqlx::query_scalar("SELECT MAX(created_at) FROM tracking_events WHERE mail_type = ?")
            .bind(new.kind.label())
            .fetch_one(&mut *conn)
            .await?;
    let now = last.map_or(now_millis(), |l| now_millis().max(l + 1));
    let year = chrono::DateTime::from_timestamp_millis(now)
        .unwrap_or_default()
        .year();
    let prefix = format!("{}-{}-", new.kind.prefix(), year);
    let seq = next_sequence(&mut *conn, new.kind, &prefix).await?;
    let mail_id = format_mail_id(new.kind, year, seq);
    let tracking_id = tracking_service::generate_event_id(new.kind, now);
    let id = uuid::Uuid::new_v4().to_string();
    let req = &new.req;

    match new.kind {
        MailKind::Inward => {
            sqlx::query(
                "INSERT INTO inward_mails (id, mail_id, tracking_id, subject, details, sender, priority, \
                 status, department_id, received_by, handover_to, delivery_mode, reference_details, \
                 created_at, updated_at) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
            )
            .bind(&id)
            .bind(&mail_id)
            .bind(&tracking_id)
            .bind(&new.subject)
            .bind(&new.details)
            .bind(&new.party)
            .bind(new.priority.as_str())
            .bind(new.status.as_str())
            .bind(&department.id)
            .bind(non_empty(req.received_by.as_deref()))
            .bind(non_empty(req.handover_to.as_deref()))
            .bind(non_empty(req.delivery_mode.as_deref()))
            .bind(non_empty(req.reference_details.as_deref()))
            .bind(now)
            .bind(now)
            .execute(&mut *conn)
            .await?;
        }
        MailKind::Outward => {
            sqlx::query(
                "INSERT INTO outward_mails (id, mail_id, tracking_id, subject, details, receiver, priority, \
                 status, department_id, sent_by, due_date, attachments, cost, delivery_mode, \
                 reference_details, created_at, updated_at) \
                 VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
            )
            .bind(&id)
            .bind(&mail_id)
            .bind(&tracking_id)
            .bind(&new.subject)
            .bind(&new.details)
            .bind(&new.party)
            .bind(new.priority.as_str())
            .bind(new.status.as_str())
            .bind(&department.id)
            .bind(non_empty(req.sent_by.as_deref()))
            .bind(req.due_date)
            .bind(req.attachments.as_ref().map(|a| a.count()).unwrap_or(0))
            .bind(req.cost)
            .bind(non_empty(req.delivery_mode.as_deref()))
            .bind(non_empty(req.reference_details.as_deref()))
            .bind(now)
            .bind(now)
            .execute(&mut *conn)
            .await?;
        }
    }

    let mail = fetch_mail(&mut *conn, new.kind, &id)
        .await?
        .ok_or_else(|| AppError::Internal(anyhow::anyhow!("mail {mail_id} vanished after insert")))?;
    tracking_service::record_initial_event(conn, &mail, &tracking_id, now).await?;
    Ok(mail)
}

/// Newest first. `department` matches the department name exactly and
/// `search` is a substring of subject, party or details; both ignore case.
pub async fn list_mails(
    pool: &SqlitePool,
    kind: MailKind,
    filters: &MailFilters,
) -> AppResult<Vec<Mail>> {
    let status = parse_status(non_empty(filters.status.as_deref()).as_deref())?;
    let priority = parse_priority(non_empty(filters.priority.as_deref()).as_deref())?;

    let mut qb: QueryBuilder<Sqlite> = QueryBuilder::new(select_sql(kind));
    qb.push(" WHERE 1 = 1");
    if let Some(status) = status {
        qb.push(" AND m.status = ").push_bind(status.as_str());
    }
    if let Some(priority) = priority {
        qb.push(" AND m.priority = ").push_bind(priority.as_str());
    }
    qb.push(" ORDER BY m.created_at DESC, m.mail_id DESC");

    let mails: Vec<Mail> = match kind {
        MailKind::Inward => qb
            .build_query_as::<InwardMail>()
            .fetch_all(pool)
            .await?
            .into_iter()
            .map(Mail::Inward)
            .collect(),
        MailKind::Outward => qb
            .build_query_as::<OutwardMail>()
            .fetch_all(pool)
            .await?
            .into_iter()
            .map(Mail::Outward)
            .collect(),
    };

    // Text filters run here so case folding covers non-ASCII input.
    let department = non_empty(filters.department.as_deref()).map(|d| fold(&d));
    let needle = non_empty(filters.search.as_deref()).map(|t| fold(&t));
    Ok(mails
        .into_iter()
        .filter(|m| department.as_ref().map_or(true, |d| fold(m.department_name()) == *d))
        .filter(|m| needle.as_ref().map_or(true, |n| search_hit(m, n)))
        .collect())
}

/// Both kinds merged, newest first.
pub async fn list_all_mails(pool: &SqlitePool, filters: &MailFilters) -> AppResult<Vec<Mail>> {
    let (mut inward, outward) = tokio::try_join!(
        list_mails(pool, MailKind::Inward, filters),
        list_mails(pool, MailKind::Outward, filters),
    )?;
    inward.extend(outward);
    inward.sort_by(|a, b| b.created_at().cmp(&a.created_at()));
    Ok(inward)
}

/// Resolve by generated mail id first, then by internal id.
pub async fn get_mail(pool: &SqlitePool, kind: MailKind, key: &str) -> AppResult<Mail> {
    fetch_mail(pool, kind, key)
        .await?
        .ok_or_else(|| AppError::not_found(format!("Mail not found: {key}")))
}

/// Replace the supplied fields. A status change appends a timeline entry in
/// the same transaction; the tracking event's copies are refreshed either way.
pub async fn update_mail(
    pool: &SqlitePool,
    kind: MailKind,
    key: &str,
    req: MailPayload,
) -> AppResult<Mail> {
    let pool = pool.clone();
    let key = key.to_string();
    let updated = db::spawn_write(async move {
        let mut conn = db::begin_immediate(&pool).await?;
        let result = update_in(&mut conn, kind, &key, req).await;
        db::finish(conn, result).await
    })
    .await?;
    tracing::info!(mail_id = %updated.mail_id(), "mail updated");
    Ok(updated)
}

async fn update_in(
    conn: &mut SqliteConnection,
    kind: MailKind,
    key: &str,
    req: MailPayload,
) -> AppResult<Mail> {
    let priority = parse_priority(req.priority.as_deref())?;
    let status = parse_status(req.status.as_deref())?;

    let existing = fetch_mail(&mut *conn, kind, key)
        .await?
        .ok_or_else(|| AppError::not_found(format!("Mail not found: {key}")))?;

    let department_id = match non_empty(req.department.as_deref()) {
        Some(dept_key) => {
            department_service::find_department(&mut *conn, &dept_key)
                .await?
                .ok_or_else(|| AppError::validation(format!("Department not found: {dept_key}")))?
                .id
        }
        None => match &existing {
            Mail::Inward(m) => m.department_id.clone(),
            Mail::Outward(m) => m.department_id.clone(),
        },
    };
    if matches!(req.subject.as_deref().map(str::trim), Some("")) {
        return Err(AppError::validation("Subject cannot be empty"));
    }
    let now = now_millis();

    match &existing {
        Mail::Inward(m) => {
            if matches!(req.sender.as_deref().map(str::trim), Some("")) {
                return Err(AppError::validation("Sender cannot be empty"));
            }
            sqlx::query(
                "UPDATE inward_mails SET subject = ?, details = ?, sender = ?, priority = ?, status = ?, \
                 department_id = ?, received_by = ?, handover_to = ?, delivery_mode = ?, \
                 reference_details = ?, updated_at = ? WHERE id = ?",
            )
            .bind(non_empty(req.subject.as_deref()).unwrap_or_else(|| m.subject.clone()))
            .bind(req.details.clone().or_else(|| m.details.clone()))
            .bind(non_empty(req.sender.as_deref()).unwrap_or_else(|| m.sender.clone()))
            .bind(priority.unwrap_or(m.priority).as_str())
            .bind(status.unwrap_or(m.status).as_str())
            .bind(&department_id)
            .bind(req.received_by.clone().or_else(|| m.received_by.clone()))
            .bind(req.handover_to.clone().or_else(|| m.handover_to.clone()))
            .bind(req.delivery_mode.clone().or_else(|| m.delivery_mode.clone()))
            .bind(req.reference_details.clone().or_else(|| m.reference_details.clone()))
            .bind(now)
            .bind(&m.id)
            .execute(&mut *conn)
            .await?;
        }
        Mail::Outward(m) => {
            if matches!(req.receiver.as_deref().map(str::trim), Some("")) {
                return Err(AppError::validation("Receiver cannot be empty"));
            }
            sqlx::query(
                "UPDATE outward_mails SET subject = ?, details = ?, receiver = ?, priority = ?, status = ?, \
                 department_id = ?, sent_by = ?, due_date = ?, attachments = ?, cost = ?, \
                 delivery_mode = ?, reference_details = ?, updated_at = ? WHERE id = ?",
            )
            .bind(non_empty(req.subject.as_deref()).unwrap_or_else(|| m.subject.clone()))
            .bind(req.details.clone().or_else(|| m.details.clone()))
            .bind(non_empty(req.receiver.as_deref()).unwrap_or_else(|| m.receiver.clone()))
            .bind(priority.unwrap_or(m.priority).as_str())
            .bind(status.unwrap_or(m.status).as_str())
            .bind(&department_id)
            .bind(req.sent_by.clone().or_else(|| m.sent_by.clone()))
            .bind(req.due_date.or(m.due_date))
            .bind(req.attachments.as_ref().map(|a| a.count()).unwrap_or(m.attachments))
            .bind(req.cost.or(m.cost))
            .bind(req.delivery_mode.clone().or_else(|| m.delivery_mode.clone()))
            .bind(req.reference_details.clone().or_else(|| m.reference_details.clone()))
            .bind(now)
            .bind(&m.id)
            .execute(&mut *conn)
            .await?;
        }
    }

    let updated = fetch_mail(&mut *conn, kind, existing.id())
        .await?
        .ok_or_else(|| AppError::not_found(format!("Mail not found: {key}")))?;
    tracking_service::sync_from_mail(&mut *conn, &updated).await?;

    if let Some(new_status) = status.filter(|s| *s != existing.status()) {
        let event = tracking_service::event_for_mail(&mut *conn, kind, updated.id())
            .await?
            .ok_or_else(|| {
                AppError::Internal(anyhow::anyhow!("mail {} has no tracking event", updated.mail_id()))
            })?;
        let remarks = req
            .remarks
            .clone()
            .unwrap_or_else(|| format!("Status changed to {}", new_status.present(kind)));
        let updated_by = non_empty(req.updated_by.as_deref())
            .unwrap_or_else(|| tracking_service::SYSTEM_USER.to_string());
        tracking_service::append_entry(
            &mut *conn,
            &event.id,
            new_status,
            Some(&remarks),
            &updated_by,
            None,
        )
        .await?;
    }
    Ok(updated)
}

/// Remove a mail. Its tracking event and timeline go with it.
pub async fn delete_mail(pool: &SqlitePool, kind: MailKind, key: &str) -> AppResult<Mail> {
    let pool = pool.clone();
    let key = key.to_string();
    let mail = db::spawn_write(async move {
        let mut conn = db::begin_immediate(&pool).await?;
        let result = delete_in(&mut conn, kind, &key).await;
        db::finish(conn, result).await
    })
    .await?;
    tracing::info!(mail_id = %mail.mail_id(), "mail deleted");
    Ok(mail)
}

async fn delete_in(conn: &mut SqliteConnection, kind: MailKind, key: &str) -> AppResult<Mail> {
    let mail = fetch_mail(&mut *conn, kind, key)
        .await?
        .ok_or_else(|| AppError::not_found(format!("Mail not found: {key}")))?;
    let sql = format!("DELETE FROM {} WHERE id = ?", kind.table());
    sqlx::query(&sql).bind(mail.id()).execute(&mut *conn).await?;
    Ok(mail)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kind_is_required_and_validated() {
        assert!(matches!(parse_kind(None), Err(AppError::Validation(_))));
        assert!(matches!(parse_kind(Some("  ")), Err(AppError::Validation(_))));
        assert!(matches!(parse_kind(Some("sideways")), Err(AppError::Validation(_))));
        assert_eq!(parse_kind(Some("Outward")).unwrap(), MailKind::Outward);
    }

    #[test]
    fn create_validation_names_the_missing_field() {
        let err = validate_new(
            MailKind::Outward,
            MailPayload {
                subject: Some("Reply".into()),
                department: Some("Finance".into()),
                ..Default::default()
            },
        )
        .err()
        .unwrap();
        assert_eq!(err.to_string(), "Receiver is required");

        let err = validate_new(
            MailKind::Inward,
            MailPayload {
                sender: Some("ACME".into()),
                subject: Some("Tax".into()),
                department: Some("Finance".into()),
                priority: Some("urgent".into()),
                ..Default::default()
            },
        )
        .err()
        .unwrap();
        assert_eq!(err.to_string(), "Invalid priority: urgent");
    }
}

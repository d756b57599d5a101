/// Tracking events and their append-only timelines
use std::collections::HashMap;

use sqlx::{SqliteConnection, SqliteExecutor, SqlitePool};

use crate::db::{self, now_millis};
use crate::error::{AppError, AppResult};
use crate::models::mail::{Mail, MailKind, MailStatus};
use crate::models::tracking::{TimelineEvent, TimelinePayload, TrackingEvent, TrackingView};

pub const SYSTEM_USER: &str = "System";

const SELECT_TRACKING: &str = "SELECT t.id, t.event_id, t.inward_mail_id, t.outward_mail_id, \
     COALESCE(i.mail_id, o.mail_id) AS mail_code, t.mail_type, t.subject, t.sender, t.receiver, \
     t.priority, t.department, t.current_status, t.assigned_to, t.created_at, t.last_updated \
     FROM tracking_events t \
     LEFT JOIN inward_mails i ON i.id = t.inward_mail_id \
     LEFT JOIN outward_mails o ON o.id = t.outward_mail_id";

const SELECT_TIMELINE: &str =
    "SELECT id, tracking_event_id, event, remarks, updated_by, timestamp FROM timeline_events";

/// `TRK-INW-1717171717171`
pub fn generate_event_id(kind: MailKind, created_at_millis: i64) -> String {
    format!("TRK-{}-{}", kind.prefix(), created_at_millis)
}

/// Denormalized columns copied from a mail: (sender, receiver, assigned_to).
fn parties(mail: &Mail) -> (Option<String>, Option<String>, Option<String>) {
    match mail {
        Mail::Inward(m) => (
            Some(m.sender.clone()),
            m.received_by.clone(),
            m.handover_to.clone(),
        ),
        Mail::Outward(m) => (m.sent_by.clone(), Some(m.receiver.clone()), m.sent_by.clone()),
    }
}

/// Create the tracking event for a freshly inserted mail, seeded with one
/// timeline entry carrying the mail's initial status. Runs on the caller's
/// transaction so the mail never exists without it.
pub async fn record_initial_event(
    conn: &mut SqliteConnection,
    mail: &Mail,
    event_id: &str,
    now: i64,
) -> Result<String, sqlx::Error> {
    let kind = mail.kind();
    let id = uuid::Uuid::new_v4().to_string();
    let (sender, receiver, assigned_to) = parties(mail);
    let (inward_id, outward_id) = match kind {
        MailKind::Inward => (Some(mail.id()), None),
        MailKind::Outward => (None, Some(mail.id())),
    };

    sqlx::query(
        "INSERT INTO tracking_events (id, event_id, inward_mail_id, outward_mail_id, mail_type, \
         subject, sender, receiver, priority, department, current_status, assigned_to, created_at, last_updated) \
         VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(&id)
    .bind(event_id)
    .bind(inward_id)
    .bind(outward_id)
    .bind(kind.label())
    .bind(mail.subject())
    .bind(&sender)
    .bind(&receiver)
    .bind(mail.priority().as_str())
    .bind(mail.department_name())
    .bind(mail.status().as_str())
    .bind(&assigned_to)
    .bind(now)
    .bind(now)
    .execute(&mut *conn)
    .await?;

    let remarks = match kind {
        MailKind::Inward => "Mail received",
        MailKind::Outward => "Mail dispatched",
    };
    insert_timeline_row(conn, &id, mail.status(), Some(remarks), SYSTEM_USER, now).await?;
    Ok(id)
}

async fn insert_timeline_row(
    conn: &mut SqliteConnection,
    tracking_event_id: &str,
    status: MailStatus,
    remarks: Option<&str>,
    updated_by: &str,
    timestamp: i64,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        "INSERT INTO timeline_events (tracking_event_id, event, remarks, updated_by, timestamp) \
         VALUES (?, ?, ?, ?, ?)",
    )
    .bind(tracking_event_id)
    .bind(status.as_str())
    .bind(remarks)
    .bind(updated_by)
    .bind(timestamp)
    .execute(conn)
    .await?;
    Ok(())
}

/// Append one entry and move the tracking event to `status`.
pub async fn append_entry(
    conn: &mut SqliteConnection,
    tracking_event_id: &str,
    status: MailStatus,
    remarks: Option<&str>,
    updated_by: &str,
    assigned_to: Option<&str>,
) -> Result<(), sqlx::Error> {
    // Never earlier than the entries already present.
    let last: Option<i64> =
        sqlx::query_scalar("SELECT MAX(timestamp) FROM timeline_events WHERE tracking_event_id = ?")
            .bind(tracking_event_id)
            .fetch_one(&mut *conn)
            .await?;
    let now = last.map_or(now_millis(), |l| now_millis().max(l));
    insert_timeline_row(conn, tracking_event_id, status, remarks, updated_by, now).await?;
    sqlx::query(
        "UPDATE tracking_events SET current_status = ?, last_updated = ?, \
         assigned_to = COALESCE(?, assigned_to) WHERE id = ?",
    )
    .bind(status.as_str())
    .bind(now)
    .bind(assigned_to)
    .bind(tracking_event_id)
    .execute(conn)
    .await?;
    Ok(())
}

/// Refresh the denormalized copies after the source mail was edited.
pub async fn sync_from_mail(conn: &mut SqliteConnection, mail: &Mail) -> Result<(), sqlx::Error> {
    let (sender, receiver, assigned_to) = parties(mail);
    let column = match mail.kind() {
        MailKind::Inward => "inward_mail_id",
        MailKind::Outward => "outward_mail_id",
    };
    let sql = format!(
        "UPDATE tracking_events SET subject = ?, sender = ?, receiver = ?, priority = ?, \
         department = ?, assigned_to = COALESCE(?, assigned_to) WHERE {column} = ?"
    );
    sqlx::query(&sql)
        .bind(mail.subject())
        .bind(&sender)
        .bind(&receiver)
        .bind(mail.priority().as_str())
        .bind(mail.department_name())
        .bind(&assigned_to)
        .bind(mail.id())
        .execute(conn)
        .await?;
    Ok(())
}

pub async fn find_event<'e>(
    executor: impl SqliteExecutor<'e>,
    key: &str,
) -> Result<Option<TrackingEvent>, sqlx::Error> {
    let sql = format!(
        "{SELECT_TRACKING} WHERE t.event_id = ?1 OR t.id = ?1 \
         ORDER BY CASE WHEN t.event_id = ?1 THEN 0 ELSE 1 END LIMIT 1"
    );
    sqlx::query_as::<_, TrackingEvent>(&sql)
        .bind(key.trim())
        .fetch_optional(executor)
        .await
}

pub async fn event_for_mail<'e>(
    executor: impl SqliteExecutor<'e>,
    kind: MailKind,
    mail_internal_id: &str,
) -> Result<Option<TrackingEvent>, sqlx::Error> {
    let column = match kind {
        MailKind::Inward => "t.inward_mail_id",
        MailKind::Outward => "t.outward_mail_id",
    };
    let sql = format!("{SELECT_TRACKING} WHERE {column} = ?");
    sqlx::query_as::<_, TrackingEvent>(&sql)
        .bind(mail_internal_id)
        .fetch_optional(executor)
        .await
}

/// Entries in append order. Same-millisecond entries fall back to row id.
pub async fn timeline_for<'e>(
    executor: impl SqliteExecutor<'e>,
    tracking_event_id: &str,
) -> Result<Vec<TimelineEvent>, sqlx::Error> {
    let sql = format!("{SELECT_TIMELINE} WHERE tracking_event_id = ? ORDER BY timestamp ASC, id ASC");
    sqlx::query_as::<_, TimelineEvent>(&sql)
        .bind(tracking_event_id)
        .fetch_all(executor)
        .await
}

pub async fn load_events(pool: &SqlitePool) -> AppResult<Vec<TrackingEvent>> {
    let sql = format!("{SELECT_TRACKING} ORDER BY t.created_at DESC, t.event_id DESC");
    Ok(sqlx::query_as::<_, TrackingEvent>(&sql).fetch_all(pool).await?)
}

/// GET /api/tracking
pub async fn list_tracking(pool: &SqlitePool) -> AppResult<Vec<TrackingView>> {
    let events = load_events(pool).await?;
    let sql = format!("{SELECT_TIMELINE} ORDER BY timestamp ASC, id ASC");
    let entries = sqlx::query_as::<_, TimelineEvent>(&sql).fetch_all(pool).await?;

    let mut by_event: HashMap<String, Vec<TimelineEvent>> = HashMap::new();
    for entry in entries {
        by_event
            .entry(entry.tracking_event_id.clone())
            .or_default()
            .push(entry);
    }

    Ok(events
        .iter()
        .map(|e| {
            let timeline = by_event.get(&e.id).map(Vec::as_slice).unwrap_or(&[]);
            TrackingView::new(e, timeline)
        })
        .collect())
}

/// GET /api/tracking/:tracking_id
pub async fn get_tracking(pool: &SqlitePool, key: &str) -> AppResult<TrackingView> {
    let event = find_event(pool, key)
        .await?
        .ok_or_else(|| AppError::not_found(format!("Tracking event not found: {key}")))?;
    let timeline = timeline_for(pool, &event.id).await?;
    Ok(TrackingView::new(&event, &timeline))
}

/// Append a status change and mirror it onto the source mail, atomically.
pub async fn append_timeline(
    pool: &SqlitePool,
    key: &str,
    req: TimelinePayload,
) -> AppResult<TrackingView> {
    let raw_status = req
        .status
        .as_deref()
        .ok_or_else(|| AppError::validation("Status is required"))?;
    let status = MailStatus::parse(raw_status)
        .ok_or_else(|| AppError::validation(format!("Invalid status: {raw_status}")))?;
    let updated_by = req
        .updated_by
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .unwrap_or(SYSTEM_USER)
        .to_string();

    let event = {
        let pool = pool.clone();
        let key = key.to_string();
        let updated_by = updated_by.clone();
        db::spawn_write(async move {
            let mut conn = db::begin_immediate(&pool).await?;
            let result = append_in(&mut conn, &key, status, &req, &updated_by).await;
            db::finish(conn, result).await
        })
        .await?
    };

    tracing::info!(tracking_id = %event.event_id, status = status.as_str(), by = %updated_by, "timeline appended");
    get_tracking(pool, &event.id).await
}

async fn append_in(
    conn: &mut SqliteConnection,
    key: &str,
    status: MailStatus,
    req: &TimelinePayload,
    updated_by: &str,
) -> AppResult<TrackingEvent> {
    let event = find_event(&mut *conn, key)
        .await?
        .ok_or_else(|| AppError::not_found(format!("Tracking event not found: {key}")))?;

    append_entry(
        &mut *conn,
        &event.id,
        status,
        req.remarks.as_deref(),
        updated_by,
        req.assigned_to.as_deref(),
    )
    .await?;

    let (table, mail_ref) = match (&event.inward_mail_id, &event.outward_mail_id) {
        (Some(id), _) => (MailKind::Inward.table(), id),
        (None, Some(id)) => (MailKind::Outward.table(), id),
        (None, None) => {
            return Err(AppError::Internal(anyhow::anyhow!(
                "tracking event {} has no mail",
                event.event_id
            )))
        }
    };
    let sql = format!("UPDATE {table} SET status = ?, updated_at = ? WHERE id = ?");
    sqlx::query(&sql)
        .bind(status.as_str())
        .bind(now_millis())
        .bind(mail_ref)
        .execute(&mut *conn)
        .await?;
    Ok(event)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn event_ids_carry_kind_and_millis() {
        assert_eq!(generate_event_id(MailKind::Inward, 1700000000123), "TRK-INW-1700000000123");
        assert_eq!(generate_event_id(MailKind::Outward, 5), "TRK-OUT-5");
    }
}

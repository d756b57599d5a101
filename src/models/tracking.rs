use serde::{Deserialize, Serialize};

use crate::db::to_rfc3339;
use crate::models::mail::{MailKind, MailStatus, Priority};

/// Status-tracking shadow of exactly one mail. Subject, parties, priority and
/// department are copied from the mail so reads need no join.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct TrackingEvent {
    pub id: String,
    pub event_id: String,
    pub inward_mail_id: Option<String>,
    pub outward_mail_id: Option<String>,
    /// Human-readable id of the source mail.
    pub mail_code: Option<String>,
    #[sqlx(try_from = "String")]
    pub mail_type: MailKind,
    pub subject: String,
    pub sender: Option<String>,
    pub receiver: Option<String>,
    #[sqlx(try_from = "String")]
    pub priority: Priority,
    pub department: Option<String>,
    #[sqlx(try_from = "String")]
    pub current_status: MailStatus,
    pub assigned_to: Option<String>,
    pub created_at: i64,
    pub last_updated: i64,
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct TimelineEvent {
    pub id: i64,
    pub tracking_event_id: String,
    #[sqlx(try_from = "String")]
    pub event: MailStatus,
    pub remarks: Option<String>,
    pub updated_by: String,
    pub timestamp: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct TimelineEntryView {
    pub status: String,
    pub timestamp: String,
    pub user: String,
    pub remarks: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TrackingView {
    pub id: String,
    pub tracking_id: String,
    pub mail_type: &'static str,
    pub mail_id: Option<String>,
    pub subject: String,
    pub sender: Option<String>,
    pub receiver: Option<String>,
    pub priority: &'static str,
    pub department: Option<String>,
    pub current_status: String,
    pub assigned_to: Option<String>,
    pub created_at: String,
    pub last_updated: String,
    pub timeline: Vec<TimelineEntryView>,
}

impl TrackingView {
    pub fn new(event: &TrackingEvent, timeline: &[TimelineEvent]) -> Self {
        let kind = event.mail_type;
        Self {
            id: event.id.clone(),
            tracking_id: event.event_id.clone(),
            mail_type: kind.label(),
            mail_id: event.mail_code.clone(),
            subject: event.subject.clone(),
            sender: event.sender.clone(),
            receiver: event.receiver.clone(),
            priority: event.priority.as_str(),
            department: event.department.clone(),
            current_status: event.current_status.present(kind),
            assigned_to: event.assigned_to.clone(),
            created_at: to_rfc3339(event.created_at),
            last_updated: to_rfc3339(event.last_updated),
            timeline: timeline
                .iter()
                .map(|t| TimelineEntryView {
                    status: t.event.present(kind),
                    timestamp: to_rfc3339(t.timestamp),
                    user: t.updated_by.clone(),
                    remarks: t.remarks.clone(),
                })
                .collect(),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimelinePayload {
    #[serde(alias = "event")]
    pub status: Option<String>,
    pub remarks: Option<String>,
    pub updated_by: Option<String>,
    pub assigned_to: Option<String>,
}

/// Mail records and the closed vocabularies they carry
use serde::{Deserialize, Serialize};

use crate::db::to_rfc3339;

#[derive(Debug, thiserror::Error)]
#[error("unknown {kind} value: {value}")]
pub struct UnknownVariant {
    pub kind: &'static str,
    pub value: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MailKind {
    Inward,
    Outward,
}

impl MailKind {
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "inward" => Some(Self::Inward),
            "outward" => Some(Self::Outward),
            _ => None,
        }
    }

    /// URL / request form.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Inward => "inward",
            Self::Outward => "outward",
        }
    }

    /// Tracking `mailType` literal.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Inward => "Inward",
            Self::Outward => "Outward",
        }
    }

    pub fn prefix(&self) -> &'static str {
        match self {
            Self::Inward => "INW",
            Self::Outward => "OUT",
        }
    }

    pub fn table(&self) -> &'static str {
        match self {
            Self::Inward => "inward_mails",
            Self::Outward => "outward_mails",
        }
    }
}

impl TryFrom<String> for MailKind {
    type Error = UnknownVariant;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value).ok_or(UnknownVariant { kind: "mail type", value })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MailStatus {
    Pending,
    Assigned,
    InProgress,
    InTransit,
    Sent,
    Delivered,
    Completed,
    Returned,
    Rejected,
}

impl MailStatus {
    pub const ALL: [MailStatus; 9] = [
        Self::Pending,
        Self::Assigned,
        Self::InProgress,
        Self::InTransit,
        Self::Sent,
        Self::Delivered,
        Self::Completed,
        Self::Returned,
        Self::Rejected,
    ];

    /// Case-insensitive; `-`, `_` and spaces are interchangeable.
    pub fn parse(s: &str) -> Option<Self> {
        let key: String = s
            .trim()
            .chars()
            .map(|c| if c == '-' || c == ' ' { '_' } else { c.to_ascii_uppercase() })
            .collect();
        match key.as_str() {
            "PENDING" => Some(Self::Pending),
            "ASSIGNED" => Some(Self::Assigned),
            "IN_PROGRESS" => Some(Self::InProgress),
            "IN_TRANSIT" => Some(Self::InTransit),
            "SENT" => Some(Self::Sent),
            "DELIVERED" => Some(Self::Delivered),
            "COMPLETED" => Some(Self::Completed),
            "RETURNED" => Some(Self::Returned),
            "REJECTED" => Some(Self::Rejected),
            _ => None,
        }
    }

    /// Stored form.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "PENDING",
            Self::Assigned => "ASSIGNED",
            Self::InProgress => "IN_PROGRESS",
            Self::InTransit => "IN_TRANSIT",
            Self::Sent => "SENT",
            Self::Delivered => "DELIVERED",
            Self::Completed => "COMPLETED",
            Self::Returned => "RETURNED",
            Self::Rejected => "REJECTED",
        }
    }

    /// Read-boundary form: `in_progress` for inward, `in-transit` for outward.
    pub fn present(&self, kind: MailKind) -> String {
        let lower = self.as_str().to_lowercase();
        match kind {
            MailKind::Inward => lower,
            MailKind::Outward => lower.replace('_', "-"),
        }
    }

    /// No further work expected on the mail.
    pub fn is_closed(&self) -> bool {
        matches!(
            self,
            Self::Completed | Self::Delivered | Self::Returned | Self::Rejected
        )
    }
}

impl TryFrom<String> for MailStatus {
    type Error = UnknownVariant;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value).ok_or(UnknownVariant { kind: "status", value })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Priority {
    Low,
    #[default]
    Normal,
    Medium,
    High,
    Important,
}

impl Priority {
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "low" => Some(Self::Low),
            "normal" => Some(Self::Normal),
            "medium" => Some(Self::Medium),
            "high" => Some(Self::High),
            "important" => Some(Self::Important),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Low => "Low",
            Self::Normal => "Normal",
            Self::Medium => "Medium",
            Self::High => "High",
            Self::Important => "Important",
        }
    }
}

impl TryFrom<String> for Priority {
    type Error = UnknownVariant;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value).ok_or(UnknownVariant { kind: "priority", value })
    }
}

/// `INW-2024-007`. Sequences below 1000 are padded to three digits.
pub fn format_mail_id(kind: MailKind, year: i32, seq: i64) -> String {
    format!("{}-{}-{:03}", kind.prefix(), year, seq)
}

/// Sequence part of a mail id with the given `{PREFIX}-{year}-` prefix.
pub fn parse_mail_seq(mail_id: &str, prefix: &str) -> Option<i64> {
    mail_id.strip_prefix(prefix)?.parse().ok()
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct InwardMail {
    pub id: String,
    pub mail_id: String,
    pub tracking_id: String,
    pub subject: String,
    pub details: Option<String>,
    pub sender: String,
    #[sqlx(try_from = "String")]
    pub priority: Priority,
    #[sqlx(try_from = "String")]
    pub status: MailStatus,
    pub department_id: String,
    pub department_name: String,
    pub received_by: Option<String>,
    pub handover_to: Option<String>,
    pub delivery_mode: Option<String>,
    pub reference_details: Option<String>,
    pub created_at: i64,
    pub updated_at: i64,
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct OutwardMail {
    pub id: String,
    pub mail_id: String,
    pub tracking_id: String,
    pub subject: String,
    pub details: Option<String>,
    pub receiver: String,
    #[sqlx(try_from = "String")]
    pub priority: Priority,
    #[sqlx(try_from = "String")]
    pub status: MailStatus,
    pub department_id: String,
    pub department_name: String,
    pub sent_by: Option<String>,
    pub due_date: Option<chrono::NaiveDate>,
    pub attachments: i64,
    pub cost: Option<f64>,
    pub delivery_mode: Option<String>,
    pub reference_details: Option<String>,
    pub created_at: i64,
    pub updated_at: i64,
}

/// Either kind of mail, as loaded from the store.
#[derive(Debug, Clone)]
pub enum Mail {
    Inward(InwardMail),
    Outward(OutwardMail),
}

impl Mail {
    pub fn kind(&self) -> MailKind {
        match self {
            Self::Inward(_) => MailKind::Inward,
            Self::Outward(_) => MailKind::Outward,
        }
    }

    pub fn id(&self) -> &str {
        match self {
            Self::Inward(m) => &m.id,
            Self::Outward(m) => &m.id,
        }
    }

    pub fn mail_id(&self) -> &str {
        match self {
            Self::Inward(m) => &m.mail_id,
            Self::Outward(m) => &m.mail_id,
        }
    }

    pub fn subject(&self) -> &str {
        match self {
            Self::Inward(m) => &m.subject,
            Self::Outward(m) => &m.subject,
        }
    }

    pub fn status(&self) -> MailStatus {
        match self {
            Self::Inward(m) => m.status,
            Self::Outward(m) => m.status,
        }
    }

    pub fn priority(&self) -> Priority {
        match self {
            Self::Inward(m) => m.priority,
            Self::Outward(m) => m.priority,
        }
    }

    pub fn department_name(&self) -> &str {
        match self {
            Self::Inward(m) => &m.department_name,
            Self::Outward(m) => &m.department_name,
        }
    }

    pub fn created_at(&self) -> i64 {
        match self {
            Self::Inward(m) => m.created_at,
            Self::Outward(m) => m.created_at,
        }
    }

    pub fn view(&self) -> MailView {
        match self {
            Self::Inward(m) => MailView::from(m),
            Self::Outward(m) => MailView::from(m),
        }
    }
}

/// Response shape for both mail kinds. Legacy field names (`senderName`,
/// `description`) are filled from the canonical columns.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MailView {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: &'static str,
    pub mail_id: String,
    pub tracking_id: String,
    pub subject: String,
    pub details: Option<String>,
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sender: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sender_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub receiver: Option<String>,
    pub priority: &'static str,
    pub status: String,
    pub department: String,
    pub department_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub received_by: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub handover_to: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sent_by: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub due_date: Option<chrono::NaiveDate>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub attachments: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cost: Option<f64>,
    pub delivery_mode: Option<String>,
    pub reference_details: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

impl From<&InwardMail> for MailView {
    fn from(m: &InwardMail) -> Self {
        Self {
            id: m.id.clone(),
            kind: MailKind::Inward.as_str(),
            mail_id: m.mail_id.clone(),
            tracking_id: m.tracking_id.clone(),
            subject: m.subject.clone(),
            details: m.details.clone(),
            description: m.details.clone(),
            sender: Some(m.sender.clone()),
            sender_name: Some(m.sender.clone()),
            receiver: None,
            priority: m.priority.as_str(),
            status: m.status.present(MailKind::Inward),
            department: m.department_name.clone(),
            department_id: m.department_id.clone(),
            received_by: m.received_by.clone(),
            handover_to: m.handover_to.clone(),
            sent_by: None,
            due_date: None,
            attachments: None,
            cost: None,
            delivery_mode: m.delivery_mode.clone(),
            reference_details: m.reference_details.clone(),
            created_at: to_rfc3339(m.created_at),
            updated_at: to_rfc3339(m.updated_at),
        }
    }
}

impl From<&OutwardMail> for MailView {
    fn from(m: &OutwardMail) -> Self {
        Self {
            id: m.id.clone(),
            kind: MailKind::Outward.as_str(),
            mail_id: m.mail_id.clone(),
            tracking_id: m.tracking_id.clone(),
            subject: m.subject.clone(),
            details: m.details.clone(),
            description: m.details.clone(),
            sender: None,
            sender_name: None,
            receiver: Some(m.receiver.clone()),
            priority: m.priority.as_str(),
            status: m.status.present(MailKind::Outward),
            department: m.department_name.clone(),
            department_id: m.department_id.clone(),
            received_by: None,
            handover_to: None,
            sent_by: m.sent_by.clone(),
            due_date: m.due_date,
            attachments: Some(m.attachments),
            cost: m.cost,
            delivery_mode: m.delivery_mode.clone(),
            reference_details: m.reference_details.clone(),
            created_at: to_rfc3339(m.created_at),
            updated_at: to_rfc3339(m.updated_at),
        }
    }
}

/// Attachments arrive either as a count or as the list itself.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum AttachmentsInput {
    Count(i64),
    List(Vec<serde_json::Value>),
}

impl AttachmentsInput {
    pub fn count(&self) -> i64 {
        match self {
            Self::Count(n) => (*n).max(0),
            Self::List(items) => items.len() as i64,
        }
    }
}

/// Create/update body for either kind. Legacy aliases are folded into the
/// canonical field here and nowhere else.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MailPayload {
    #[serde(rename = "type")]
    pub kind: Option<String>,
    pub subject: Option<String>,
    #[serde(alias = "description")]
    pub details: Option<String>,
    #[serde(alias = "senderName")]
    pub sender: Option<String>,
    #[serde(alias = "receiverName")]
    pub receiver: Option<String>,
    pub priority: Option<String>,
    pub status: Option<String>,
    /// Department id, name or code.
    #[serde(alias = "departmentId")]
    pub department: Option<String>,
    pub received_by: Option<String>,
    pub handover_to: Option<String>,
    pub sent_by: Option<String>,
    pub due_date: Option<chrono::NaiveDate>,
    pub attachments: Option<AttachmentsInput>,
    pub cost: Option<f64>,
    pub delivery_mode: Option<String>,
    pub reference_details: Option<String>,
    /// Remarks for the timeline entry written on a status change.
    pub remarks: Option<String>,
    pub updated_by: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct MailFilters {
    pub status: Option<String>,
    pub department: Option<String>,
    pub priority: Option<String>,
    pub search: Option<String>,
}

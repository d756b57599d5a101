use serde::{Deserialize, Serialize};

use crate::db::to_rfc3339;
use crate::models::mail::UnknownVariant;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RecordStatus {
    #[default]
    Active,
    Inactive,
}

impl RecordStatus {
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "active" => Some(Self::Active),
            "inactive" => Some(Self::Inactive),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Active => "Active",
            Self::Inactive => "Inactive",
        }
    }
}

impl TryFrom<String> for RecordStatus {
    type Error = UnknownVariant;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value).ok_or(UnknownVariant { kind: "status", value })
    }
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct Department {
    pub id: String,
    pub name: String,
    pub code: String,
    pub head: Option<String>,
    #[sqlx(try_from = "String")]
    pub status: RecordStatus,
    pub created_at: i64,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DepartmentView {
    pub id: String,
    pub name: String,
    pub code: String,
    pub head: Option<String>,
    pub status: &'static str,
    pub created_at: String,
}

impl From<&Department> for DepartmentView {
    fn from(d: &Department) -> Self {
        Self {
            id: d.id.clone(),
            name: d.name.clone(),
            code: d.code.clone(),
            head: d.head.clone(),
            status: d.status.as_str(),
            created_at: to_rfc3339(d.created_at),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct DepartmentPayload {
    pub name: Option<String>,
    pub code: Option<String>,
    pub head: Option<String>,
    pub status: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DepartmentStats {
    pub id: String,
    pub name: String,
    pub code: String,
    pub status: &'static str,
    pub users: usize,
    pub inward_mails: usize,
    pub outward_mails: usize,
    pub tracking_events: usize,
    pub pending_inward: usize,
    pub completed_inward: usize,
}

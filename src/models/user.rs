use serde::{Deserialize, Serialize};

use crate::db::to_rfc3339;
use crate::models::department::RecordStatus;
use crate::models::mail::UnknownVariant;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Admin,
    Hod,
    Officer,
    Clerk,
    Staff,
}

impl Role {
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "admin" => Some(Self::Admin),
            "hod" | "head of department" => Some(Self::Hod),
            "officer" => Some(Self::Officer),
            "clerk" => Some(Self::Clerk),
            "staff" => Some(Self::Staff),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Admin => "Admin",
            Self::Hod => "HOD",
            Self::Officer => "Officer",
            Self::Clerk => "Clerk",
            Self::Staff => "Staff",
        }
    }
}

impl TryFrom<String> for Role {
    type Error = UnknownVariant;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value).ok_or(UnknownVariant { kind: "role", value })
    }
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct User {
    pub id: String,
    pub name: String,
    pub email: String,
    #[sqlx(try_from = "String")]
    pub role: Role,
    #[sqlx(try_from = "String")]
    pub status: RecordStatus,
    pub department_id: Option<String>,
    pub department_name: Option<String>,
    pub created_at: i64,
}

impl User {
    /// Mail fields reference people by display name.
    pub fn matches_name(&self, other: Option<&str>) -> bool {
        other.is_some_and(|o| super::fold(o) == super::fold(&self.name))
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserView {
    pub id: String,
    pub name: String,
    pub email: String,
    pub role: &'static str,
    pub status: &'static str,
    pub department_id: Option<String>,
    pub department: Option<String>,
    pub created_at: String,
}

impl From<&User> for UserView {
    fn from(u: &User) -> Self {
        Self {
            id: u.id.clone(),
            name: u.name.clone(),
            email: u.email.clone(),
            role: u.role.as_str(),
            status: u.status.as_str(),
            department_id: u.department_id.clone(),
            department: u.department_name.clone(),
            created_at: to_rfc3339(u.created_at),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserPayload {
    pub name: Option<String>,
    pub email: Option<String>,
    pub role: Option<String>,
    pub status: Option<String>,
    /// Department id, name or code.
    #[serde(alias = "departmentId")]
    pub department: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserActivity {
    pub id: String,
    pub name: String,
    pub email: String,
    pub role: &'static str,
    pub department: Option<String>,
    pub inward_mails: usize,
    pub outward_mails: usize,
    pub assigned_tracking: usize,
    pub total_activity: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn role_parse_accepts_known_titles() {
        assert_eq!(Role::parse("hod"), Some(Role::Hod));
        assert_eq!(Role::parse("Head of Department"), Some(Role::Hod));
        assert_eq!(Role::parse("CLERK"), Some(Role::Clerk));
        assert_eq!(Role::Hod.as_str(), "HOD");
        assert_eq!(Role::parse("janitor"), None);
    }

    #[test]
    fn name_match_ignores_case_and_padding() {
        let u = User {
            id: "u1".into(),
            name: "Asha Rao".into(),
            email: "asha@example.gov".into(),
            role: Role::Officer,
            status: RecordStatus::Active,
            department_id: None,
            department_name: None,
            created_at: 0,
        };
        assert!(u.matches_name(Some(" asha rao")));
        assert!(!u.matches_name(Some("Asha")));
        assert!(!u.matches_name(None));
    }
}

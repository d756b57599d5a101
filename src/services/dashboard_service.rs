/// Dashboard payload and sample-data seeding
use serde::Serialize;
use sqlx::SqlitePool;

use crate::error::AppResult;
use crate::models::department::{DepartmentPayload, DepartmentStats};
use crate::models::mail::{MailFilters, MailKind, MailPayload, MailStatus, MailView};
use crate::models::user::UserPayload;
use crate::services::stats_service::{self, SystemOverview};
use crate::services::{department_service, mail_service, user_service};

const RECENT_LIMIT: usize = 10;

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardStats {
    pub total_inward: i64,
    pub total_outward: i64,
    pub pending: i64,
    pub completed: i64,
    pub departments: i64,
    pub users: i64,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RealData {
    pub recent_mails: Vec<MailView>,
    pub department_stats: Vec<DepartmentStats>,
    pub overview: SystemOverview,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Dashboard {
    pub stats: DashboardStats,
    pub real_data: RealData,
}

pub async fn dashboard(pool: &SqlitePool) -> AppResult<Dashboard> {
    let filters = MailFilters::default();
    let (overview, department_stats, mut recent) = tokio::try_join!(
        stats_service::system_overview(pool),
        stats_service::department_stats(pool),
        mail_service::list_all_mails(pool, &filters),
    )?;
    recent.truncate(RECENT_LIMIT);

    let by_status = |s: MailStatus| overview.mails_by_status.get(s.as_str()).copied().unwrap_or(0);
    let stats = DashboardStats {
        total_inward: overview.inward_mails.total,
        total_outward: overview.outward_mails.total,
        pending: by_status(MailStatus::Pending),
        completed: by_status(MailStatus::Completed) + by_status(MailStatus::Delivered),
        departments: overview.departments.total,
        users: overview.users.total,
    };

    Ok(Dashboard {
        stats,
        real_data: RealData {
            recent_mails: recent.iter().map(|m| m.view()).collect(),
            department_stats,
            overview,
        },
    })
}

struct SampleMail {
    kind: MailKind,
    subject: &'static str,
    party: &'static str,
    department: &'static str,
    priority: &'static str,
    status: &'static str,
    person: &'static str,
}

const SAMPLE_DEPARTMENTS: &[(&str, &str, &str)] = &[
    ("Finance", "FIN", "R. Sharma"),
    ("Administration", "ADM", "P. Iyer"),
    ("Public Works", "PWD", "S. Khan"),
];

const SAMPLE_USERS: &[(&str, &str, &str, &str)] = &[
    ("R. Sharma", "r.sharma@tapaal.local", "HOD", "FIN"),
    ("Meena Joshi", "meena.joshi@tapaal.local", "Clerk", "FIN"),
    ("P. Iyer", "p.iyer@tapaal.local", "Admin", "ADM"),
    ("Arjun Das", "arjun.das@tapaal.local", "Officer", "PWD"),
];

const SAMPLE_MAILS: &[SampleMail] = &[
    SampleMail {
        kind: MailKind::Inward,
        subject: "Budget allocation for Q3",
        party: "State Treasury",
        department: "FIN",
        priority: "High",
        status: "PENDING",
        person: "Meena Joshi",
    },
    SampleMail {
        kind: MailKind::Inward,
        subject: "Road repair tender queries",
        party: "City Contractors Association",
        department: "PWD",
        priority: "Medium",
        status: "ASSIGNED",
        person: "Arjun Das",
    },
    SampleMail {
        kind: MailKind::Outward,
        subject: "Audit compliance report",
        party: "Accountant General Office",
        department: "FIN",
        priority: "Important",
        status: "IN_TRANSIT",
        person: "R. Sharma",
    },
    SampleMail {
        kind: MailKind::Outward,
        subject: "Staff transfer orders",
        party: "District Collectorate",
        department: "ADM",
        priority: "Normal",
        status: "DELIVERED",
        person: "P. Iyer",
    },
];

/// Insert the sample departments, users and mails that are not present yet.
/// Running it twice adds no duplicate departments or users.
pub async fn add_sample_data(pool: &SqlitePool) -> AppResult<usize> {
    let mut inserted = 0;

    for (name, code, head) in SAMPLE_DEPARTMENTS {
        if department_service::find_department(pool, code).await?.is_some() {
            continue;
        }
        department_service::create_department(
            pool,
            DepartmentPayload {
                name: Some(name.to_string()),
                code: Some(code.to_string()),
                head: Some(head.to_string()),
                status: None,
            },
        )
        .await?;
        inserted += 1;
    }

    let existing = user_service::list_users(pool, None).await?;
    for (name, email, role, dept) in SAMPLE_USERS {
        if existing.iter().any(|u| u.email.eq_ignore_ascii_case(email)) {
            continue;
        }
        user_service::create_user(
            pool,
            UserPayload {
                name: Some(name.to_string()),
                email: Some(email.to_string()),
                role: Some(role.to_string()),
                status: None,
                department: Some(dept.to_string()),
            },
        )
        .await?;
        inserted += 1;
    }

    let filters = MailFilters::default();
    let (inward, outward) = tokio::try_join!(
        mail_service::list_mails(pool, MailKind::Inward, &filters),
        mail_service::list_mails(pool, MailKind::Outward, &filters),
    )?;
    for sample in SAMPLE_MAILS {
        let present = inward
            .iter()
            .chain(outward.iter())
            .any(|m| m.kind() == sample.kind && m.subject() == sample.subject);
        if present {
            continue;
        }
        let mut payload = MailPayload {
            subject: Some(sample.subject.to_string()),
            department: Some(sample.department.to_string()),
            priority: Some(sample.priority.to_string()),
            status: Some(sample.status.to_string()),
            details: Some(format!("Sample correspondence: {}", sample.subject)),
            delivery_mode: Some("Post".to_string()),
            ..Default::default()
        };
        match sample.kind {
            MailKind::Inward => {
                payload.sender = Some(sample.party.to_string());
                payload.received_by = Some(sample.person.to_string());
                payload.handover_to = Some(sample.person.to_string());
            }
            MailKind::Outward => {
                payload.receiver = Some(sample.party.to_string());
                payload.sent_by = Some(sample.person.to_string());
            }
        }
        mail_service::create_mail(pool, sample.kind, payload).await?;
        inserted += 1;
    }

    tracing::info!(inserted, "sample data added");
    Ok(inserted)
}

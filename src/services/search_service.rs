/// Free-text search across every entity type. Substring match, no ranking.
use serde::Serialize;
use sqlx::SqlitePool;

use crate::error::{AppError, AppResult};
use crate::models::department::DepartmentView;
use crate::models::fold;
use crate::models::mail::{InwardMail, Mail, MailFilters, MailKind, MailView, OutwardMail};
use crate::models::tracking::{TrackingEvent, TrackingView};
use crate::models::user::{User, UserView};
use crate::services::{department_service, mail_service, tracking_service, user_service};

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchResults {
    pub query: String,
    pub inward_mails: Vec<MailView>,
    pub outward_mails: Vec<MailView>,
    pub departments: Vec<DepartmentView>,
    pub users: Vec<UserView>,
    pub tracking_events: Vec<TrackingView>,
    pub total: usize,
}

fn contains(haystack: &str, needle: &str) -> bool {
    fold(haystack).contains(needle)
}

fn contains_opt(haystack: Option<&str>, needle: &str) -> bool {
    haystack.is_some_and(|h| contains(h, needle))
}

// Inward and outward mails deliberately match different field sets.
fn inward_matches(m: &InwardMail, q: &str) -> bool {
    contains(&m.subject, q)
        || contains(&m.sender, q)
        || contains(&m.mail_id, q)
        || contains(&m.tracking_id, q)
        || contains_opt(m.details.as_deref(), q)
}

fn outward_matches(m: &OutwardMail, q: &str) -> bool {
    contains(&m.subject, q) || contains(&m.receiver, q) || contains(&m.mail_id, q)
}

fn user_matches(u: &User, q: &str) -> bool {
    contains(&u.name, q) || contains(&u.email, q) || contains(u.role.as_str(), q)
}

fn tracking_matches(e: &TrackingEvent, q: &str) -> bool {
    contains(&e.event_id, q)
        || contains(&e.subject, q)
        || contains_opt(e.sender.as_deref(), q)
        || contains_opt(e.receiver.as_deref(), q)
}

pub async fn search(pool: &SqlitePool, query: &str) -> AppResult<SearchResults> {
    let q = fold(query);
    if q.is_empty() {
        return Err(AppError::validation("Search query cannot be empty"));
    }

    let filters = MailFilters::default();
    let (inward, outward, departments, users, events) = tokio::try_join!(
        mail_service::list_mails(pool, MailKind::Inward, &filters),
        mail_service::list_mails(pool, MailKind::Outward, &filters),
        department_service::list_departments(pool),
        user_service::list_users(pool, None),
        tracking_service::load_events(pool),
    )?;

    let inward_mails: Vec<MailView> = inward
        .iter()
        .filter(|m| matches!(m, Mail::Inward(m) if inward_matches(m, &q)))
        .map(Mail::view)
        .collect();
    let outward_mails: Vec<MailView> = outward
        .iter()
        .filter(|m| matches!(m, Mail::Outward(m) if outward_matches(m, &q)))
        .map(Mail::view)
        .collect();
    let departments: Vec<DepartmentView> = departments
        .iter()
        .filter(|d| contains(&d.name, &q) || contains(&d.code, &q))
        .map(DepartmentView::from)
        .collect();
    let users: Vec<UserView> = users
        .iter()
        .filter(|u| user_matches(u, &q))
        .map(UserView::from)
        .collect();

    let mut tracking_events = Vec::new();
    for event in events.iter().filter(|e| tracking_matches(e, &q)) {
        let timeline = tracking_service::timeline_for(pool, &event.id).await?;
        tracking_events.push(TrackingView::new(event, &timeline));
    }

    let total = inward_mails.len()
        + outward_mails.len()
        + departments.len()
        + users.len()
        + tracking_events.len();
    tracing::debug!(query = %q, total, "search");

    Ok(SearchResults {
        query: query.trim().to_string(),
        inward_mails,
        outward_mails,
        departments,
        users,
        tracking_events,
        total,
    })
}

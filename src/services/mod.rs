pub mod chat_service;
pub mod dashboard_service;
pub mod department_service;
pub mod mail_service;
pub mod search_service;
pub mod stats_service;
pub mod tracking_service;
pub mod user_service;

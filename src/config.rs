use anyhow::{Context, Result};
use std::env;
use std::str::FromStr;

use crate::db::normalize_sqlite_url;

#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub port: u16,
    pub db_max_connections: u32,
    /// `None` allows any origin.
    pub cors_allow_origin: Option<String>,
    pub chat: ChatConfig,
}

#[derive(Debug, Clone)]
pub struct ChatConfig {
    pub api_key: Option<String>,
    pub model: String,
    pub api_base: String,
    pub timeout_secs: u64,
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            model: "gemini-1.5-flash".into(),
            api_base: "https://generativelanguage.googleapis.com/v1beta".into(),
            timeout_secs: 30,
        }
    }
}

fn var(name: &str) -> Option<String> {
    env::var(name).ok().map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

fn parsed<T>(name: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match var(name) {
        Some(v) => v.parse().with_context(|| format!("{name} has an invalid value: {v}")),
        None => Ok(default),
    }
}

impl Config {
    /// Read configuration from the environment (after `.env` was loaded).
    pub fn from_env() -> Result<Self> {
        let raw_url = var("DATABASE_URL").unwrap_or_else(|| "sqlite://tapaal.db".into());
        let defaults = ChatConfig::default();
        Ok(Config {
            database_url: normalize_sqlite_url(&raw_url),
            port: parsed("PORT", 3030)?,
            db_max_connections: parsed("DB_MAX_CONNECTIONS", 5)?,
            cors_allow_origin: var("CORS_ALLOW_ORIGIN"),
            chat: ChatConfig {
                api_key: var("GEMINI_API_KEY"),
                model: var("GEMINI_MODEL").unwrap_or(defaults.model),
                api_base: var("GEMINI_API_BASE").unwrap_or(defaults.api_base),
                timeout_secs: parsed("CHAT_TIMEOUT_SECS", defaults.timeout_secs)?,
            },
        })
    }
}

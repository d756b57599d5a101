/// Chat proxy to the Gemini generateContent API
use std::time::Duration;

use reqwest::Client;
use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;

use crate::config::ChatConfig;
use crate::db::now_millis;
use crate::error::{AppError, AppResult};
use crate::models::chat::{ChatLogEntry, ChatReply, ChatRequest, ChatTurn};

const SYSTEM_PROMPT: &str = "You are the assistant of Tapaal, a government correspondence \
tracking system. Help staff with inward and outward mail, departments, tracking ids and \
status timelines. Answer briefly.";

/// History turns forwarded upstream.
const MAX_HISTORY: usize = 20;

// -- Gemini wire types --

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateRequest {
    system_instruction: Content,
    contents: Vec<Content>,
}

#[derive(Serialize, Deserialize)]
struct Content {
    #[serde(skip_serializing_if = "Option::is_none")]
    role: Option<String>,
    parts: Vec<Part>,
}

#[derive(Serialize, Deserialize)]
struct Part {
    #[serde(default)]
    text: String,
}

#[derive(Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Deserialize)]
struct Candidate {
    content: Option<Content>,
}

fn gemini_role(role: &str) -> &'static str {
    match role.trim().to_ascii_lowercase().as_str() {
        "model" | "assistant" | "bot" => "model",
        _ => "user",
    }
}

/// Immutable handle to the upstream API, shared through `AppState`.
pub struct ChatClient {
    client: Client,
    base_url: String,
    model: String,
    api_key: Option<String>,
}

impl ChatClient {
    pub fn new(config: &ChatConfig) -> anyhow::Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;
        Ok(Self {
            client,
            base_url: config.api_base.trim_end_matches('/').to_string(),
            model: config.model.clone(),
            api_key: config.api_key.clone().filter(|k| !k.is_empty()),
        })
    }

    pub fn is_configured(&self) -> bool {
        self.api_key.is_some()
    }

    fn build_request(message: &str, history: &[ChatTurn]) -> GenerateRequest {
        let skip = history.len().saturating_sub(MAX_HISTORY);
        let mut contents: Vec<Content> = history
            .iter()
            .skip(skip)
            .filter(|t| !t.content.trim().is_empty())
            .map(|t| Content {
                role: Some(gemini_role(&t.role).to_string()),
                parts: vec![Part { text: t.content.clone() }],
            })
            .collect();
        contents.push(Content {
            role: Some("user".to_string()),
            parts: vec![Part { text: message.to_string() }],
        });
        GenerateRequest {
            system_instruction: Content {
                role: None,
                parts: vec![Part { text: SYSTEM_PROMPT.to_string() }],
            },
            contents,
        }
    }

    /// POST {base}/models/{model}:generateContent
    pub async fn generate(&self, message: &str, history: &[ChatTurn]) -> AppResult<String> {
        let api_key = self
            .api_key
            .as_deref()
            .ok_or_else(|| AppError::Upstream("Chat is not configured (GEMINI_API_KEY missing)".into()))?;
        let url = format!("{}/models/{}:generateContent", self.base_url, self.model);

        let resp = self
            .client
            .post(&url)
            .header("x-goog-api-key", api_key)
            .json(&Self::build_request(message, history))
            .send()
            .await
            .map_err(|e| AppError::Upstream(format!("Chat request failed: {e}")))?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(AppError::Upstream(format!(
                "Chat API returned {status}: {}",
                body.chars().take(300).collect::<String>()
            )));
        }

        let parsed: GenerateResponse = resp
            .json()
            .await
            .map_err(|e| AppError::Upstream(format!("Chat API response unreadable: {e}")))?;
        let text = parsed
            .candidates
            .into_iter()
            .filter_map(|c| c.content)
            .flat_map(|c| c.parts)
            .map(|p| p.text)
            .collect::<Vec<_>>()
            .join("");
        if text.trim().is_empty() {
            return Err(AppError::Upstream("Chat API returned no text".into()));
        }
        Ok(text)
    }
}

/// Proxy one message. With a `userId` the exchange is appended to the log.
pub async fn chat(pool: &SqlitePool, client: &ChatClient, req: ChatRequest) -> AppResult<ChatReply> {
    let message = req.message.trim();
    if message.is_empty() {
        return Err(AppError::validation("Message is required"));
    }

    let response = client.generate(message, &req.history).await?;

    if let Some(user_id) = req.user_id.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
        sqlx::query("INSERT INTO chat_logs (user_id, message, response, created_at) VALUES (?, ?, ?, ?)")
            .bind(user_id)
            .bind(message)
            .bind(&response)
            .bind(now_millis())
            .execute(pool)
            .await?;
    }
    tracing::debug!(history = req.history.len(), "chat reply relayed");
    Ok(ChatReply { response })
}

pub async fn history(pool: &SqlitePool, user_id: &str) -> AppResult<Vec<ChatLogEntry>> {
    Ok(sqlx::query_as::<_, ChatLogEntry>(
        "SELECT id, user_id, message, response, created_at FROM chat_logs \
         WHERE user_id = ? ORDER BY created_at ASC, id ASC",
    )
    .bind(user_id)
    .fetch_all(pool)
    .await?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_keeps_recent_history_and_maps_roles() {
        let history: Vec<ChatTurn> = (0..25)
            .map(|i| ChatTurn {
                role: if i % 2 == 0 { "user".into() } else { "Assistant".into() },
                content: format!("turn {i}"),
            })
            .collect();
        let req = ChatClient::build_request("where is INW-2024-001?", &history);
        assert_eq!(req.contents.len(), MAX_HISTORY + 1);
        assert_eq!(req.contents[0].parts[0].text, "turn 5");
        assert_eq!(req.contents[0].role.as_deref(), Some("model"));
        assert_eq!(req.contents[1].role.as_deref(), Some("user"));
        assert_eq!(
            req.contents.last().unwrap().parts[0].text,
            "where is INW-2024-001?"
        );
    }

    #[tokio::test]
    async fn unconfigured_client_fails_as_upstream_error() {
        let client = ChatClient::new(&ChatConfig {
            api_key: None,
            model: "gemini-1.5-flash".into(),
            api_base: "http://127.0.0.1:9".into(),
            timeout_secs: 1,
        })
        .unwrap();
        assert!(!client.is_configured());
        let err = client.generate("hello", &[]).await.unwrap_err();
        assert!(matches!(err, AppError::Upstream(_)));
    }
}

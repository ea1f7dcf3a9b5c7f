//! Telegram Bot API messenger.

use anyhow::Context;
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;

use super::Messenger;

const API_BASE: &str = "https://api.telegram.org";

/// Posts to chats through a bot token.
#[derive(Clone, Debug)]
pub struct TelegramClient {
    base_url: String,
    token: String,
    http: reqwest::Client,
}

#[derive(Debug, Deserialize)]
struct ApiResponse {
    ok: bool,
    #[serde(default)]
    description: Option<String>,
}

impl TelegramClient {
    pub fn new(token: String) -> Self {
        Self::with_base_url(API_BASE.to_string(), token)
    }

    pub fn with_base_url(base_url: String, token: String) -> Self {
        Self {
            base_url,
            token,
            http: reqwest::Client::builder()
                .timeout(std::time::Duration::from_secs(15))
                .build()
                .unwrap_or_default(),
        }
    }

    fn method_url(&self, method: &str) -> String {
        format!(
            "{}/bot{}/{}",
            self.base_url.trim_end_matches('/'),
            self.token,
            method
        )
    }

    async fn call(&self, method: &str, payload: serde_json::Value) -> anyhow::Result<()> {
        let res = self
            .http
            .post(self.method_url(method))
            .json(&payload)
            .send()
            .await
            .with_context(|| format!("telegram {}: send", method))?;

        let status = res.status();
        let body = res.text().await.unwrap_or_default();
        let parsed: Option<ApiResponse> = serde_json::from_str(&body).ok();

        match parsed {
            Some(ApiResponse { ok: true, .. }) if status.is_success() => Ok(()),
            Some(ApiResponse { description, .. }) => Err(anyhow::anyhow!(
                "telegram {} failed: {} - {}",
                method,
                status,
                description.unwrap_or(body)
            )),
            None => Err(anyhow::anyhow!(
                "telegram {} failed: {} - {}",
                method,
                status,
                body
            )),
        }
    }
}

#[async_trait]
impl Messenger for TelegramClient {
    async fn send_message(&self, chat_id: &str, text: &str) -> anyhow::Result<()> {
        self.call(
            "sendMessage",
            json!({ "chat_id": chat_id, "text": text, "parse_mode": "HTML" }),
        )
        .await
    }

    async fn send_chat_action(&self, chat_id: &str, action: &str) -> anyhow::Result<()> {
        self.call(
            "sendChatAction",
            json!({ "chat_id": chat_id, "action": action }),
        )
        .await
    }
}

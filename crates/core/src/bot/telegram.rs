use crate::bot::{Messenger, Update, UpdateFeed, User};
use crate::config::Settings;
use crate::error::{BondError, BondResult};
use anyhow::Context;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::time::Duration;

const PARSE_MODE: &str = "Markdown";

// Headroom on top of the long-poll timeout so the HTTP client never cuts a poll short.
const HTTP_TIMEOUT_SLACK_SECS: u64 = 10;

#[derive(Debug, Clone)]
pub struct TelegramClient {
    http: reqwest::Client,
    base_url: String,
    token: String,
    poll_timeout_secs: u64,
}

#[derive(Debug, Deserialize)]
struct ApiResponse<T> {
    ok: bool,
    result: Option<T>,
    #[serde(default)]
    description: Option<String>,
}

#[derive(Debug, Serialize)]
struct GetUpdatesRequest {
    offset: i64,
    timeout: u64,
    allowed_updates: [&'static str; 1],
}

#[derive(Debug, Serialize)]
struct SendMessageRequest<'a> {
    chat_id: i64,
    text: &'a str,
    parse_mode: &'static str,
}

impl TelegramClient {
    pub fn from_settings(settings: &Settings) -> anyhow::Result<Self> {
        let token = settings.require_telegram_bot_token()?.to_string();

        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(
                settings.telegram_poll_timeout_secs + HTTP_TIMEOUT_SLACK_SECS,
            ))
            .build()
            .context("failed to build telegram http client")?;

        Ok(Self {
            http,
            base_url: settings.telegram_api_base_url.clone(),
            token,
            poll_timeout_secs: settings.telegram_poll_timeout_secs,
        })
    }

    /// Builds the client and verifies the token with `getMe`.
    pub async fn connect(settings: &Settings) -> BondResult<Self> {
        let client = Self::from_settings(settings).map_err(BondError::bot)?;
        let me = client.get_me().await.map_err(BondError::bot)?;
        tracing::info!(bot_id = me.id, username = ?me.username, "telegram bot authorized");
        Ok(client)
    }

    pub async fn get_me(&self) -> anyhow::Result<User> {
        self.call("getMe", &serde_json::json!({})).await
    }

    fn method_url(&self, method: &str) -> String {
        format!(
            "{}/bot{}/{}",
            self.base_url.trim_end_matches('/'),
            self.token,
            method
        )
    }

    async fn call<B, T>(&self, method: &'static str, body: &B) -> anyhow::Result<T>
    where
        B: Serialize + ?Sized + Sync,
        T: DeserializeOwned,
    {
        let res = self
            .http
            .post(self.method_url(method))
            .json(body)
            .send()
            .await
            .map_err(reqwest::Error::without_url)
            .with_context(|| format!("telegram {method} request failed"))?;

        let status = res.status();
        let text = res
            .text()
            .await
            .map_err(reqwest::Error::without_url)
            .with_context(|| format!("failed to read telegram {method} response"))?;

        let parsed = serde_json::from_str::<ApiResponse<T>>(&text)
            .with_context(|| format!("telegram {method} HTTP {status}: unexpected body: {text}"))?;

        if !parsed.ok {
            anyhow::bail!(
                "telegram {method} HTTP {status}: {}",
                parsed.description.unwrap_or_default()
            );
        }

        parsed
            .result
            .with_context(|| format!("telegram {method} returned ok without result"))
    }
}

#[async_trait::async_trait]
impl UpdateFeed for TelegramClient {
    async fn get_updates(&self, offset: i64) -> anyhow::Result<Vec<Update>> {
        let req = GetUpdatesRequest {
            offset,
            timeout: self.poll_timeout_secs,
            allowed_updates: ["message"],
        };
        self.call("getUpdates", &req).await
    }
}

#[async_trait::async_trait]
impl Messenger for TelegramClient {
    async fn send_markdown(&self, chat_id: i64, text: &str) -> anyhow::Result<()> {
        let req = SendMessageRequest {
            chat_id,
            text,
            parse_mode: PARSE_MODE,
        };
        let _: serde_json::Value = self.call("sendMessage", &req).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn decodes_get_updates_payload() {
        let v = json!({
            "ok": true,
            "result": [
                {
                    "update_id": 1001,
                    "message": {
                        "message_id": 5,
                        "from": {"id": 7, "is_bot": false, "username": "alice"},
                        "chat": {"id": -42, "type": "group"},
                        "date": 1_600_000_000,
                        "text": "/list"
                    }
                },
                {"update_id": 1002, "edited_message": {"message_id": 5}}
            ]
        });
        let parsed: ApiResponse<Vec<Update>> = serde_json::from_value(v).unwrap();
        assert!(parsed.ok);
        let updates = parsed.result.unwrap();
        assert_eq!(updates.len(), 2);
        let msg = updates[0].message.as_ref().unwrap();
        assert_eq!(msg.chat.id, -42);
        assert_eq!(msg.text.as_deref(), Some("/list"));
        assert!(updates[1].message.is_none());
    }

    #[test]
    fn decodes_error_payload() {
        let v = json!({"ok": false, "error_code": 401, "description": "Unauthorized"});
        let parsed: ApiResponse<User> = serde_json::from_value(v).unwrap();
        assert!(!parsed.ok);
        assert_eq!(parsed.description.as_deref(), Some("Unauthorized"));
    }

    #[test]
    fn send_message_uses_markdown() {
        let req = SendMessageRequest {
            chat_id: 1,
            text: "*x*",
            parse_mode: PARSE_MODE,
        };
        assert_eq!(
            serde_json::to_value(&req).unwrap(),
            json!({"chat_id": 1, "text": "*x*", "parse_mode": "Markdown"})
        );
    }

    #[test]
    fn method_url_does_not_double_slash() {
        let settings = Settings {
            telegram_bot_token: Some("123:abc".to_string()),
            telegram_api_base_url: "https://api.telegram.org/".to_string(),
            ..Settings::default()
        };
        let client = TelegramClient::from_settings(&settings).unwrap();
        assert_eq!(
            client.method_url("getMe"),
            "https://api.telegram.org/bot123:abc/getMe"
        );
    }
}

pub mod command;
pub mod dispatcher;
pub mod poller;
pub mod telegram;

use serde::Deserialize;

/// Outbound side of the messaging platform.
#[async_trait::async_trait]
pub trait Messenger: Send + Sync {
    /// Sends `text` rendered as platform Markdown.
    async fn send_markdown(&self, chat_id: i64, text: &str) -> anyhow::Result<()>;
}

/// Inbound side of the messaging platform: long-polled updates starting at `offset`.
#[async_trait::async_trait]
pub trait UpdateFeed: Send + Sync {
    async fn get_updates(&self, offset: i64) -> anyhow::Result<Vec<Update>>;
}

#[derive(Debug, Clone, Deserialize)]
pub struct Update {
    pub update_id: i64,
    #[serde(default)]
    pub message: Option<Message>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Message {
    pub chat: Chat,
    #[serde(default)]
    pub from: Option<User>,
    #[serde(default)]
    pub text: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Chat {
    pub id: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct User {
    pub id: i64,
    #[serde(default)]
    pub username: Option<String>,
}

pub mod memory;
pub mod postgres;
pub mod watchlist;

use anyhow::Context;

pub use memory::MemoryStore;
pub use postgres::PgStore;

/// Last processed Telegram update id.
pub const UPDATE_ID_KEY: &str = "TELEGRAM_UPDATE_ID";
/// Set of every chat id that has ever messaged the bot.
pub const CHAT_ID_KEY: &str = "TELEGRAM_CHAT_ID";
/// JSON-encoded array of cached bonds.
pub const BOND_CACHE_KEY: &str = "JISILU";

/// Minimal string/set key-value store. Keys are independent; no cross-key transactions.
#[async_trait::async_trait]
pub trait KvStore: Send + Sync {
    async fn get(&self, key: &str) -> anyhow::Result<Option<String>>;

    async fn set(&self, key: &str, value: &str) -> anyhow::Result<()>;

    async fn sadd(&self, key: &str, member: &str) -> anyhow::Result<()>;

    async fn srem(&self, key: &str, member: &str) -> anyhow::Result<()>;

    async fn smembers(&self, key: &str) -> anyhow::Result<Vec<String>>;
}

pub async fn migrate(pool: &sqlx::PgPool) -> anyhow::Result<()> {
    sqlx::migrate!("./migrations")
        .run(pool)
        .await
        .context("sqlx migrations failed")?;
    Ok(())
}

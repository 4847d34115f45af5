use super::KvStore;
use anyhow::Context;
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;

#[derive(Debug, Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    /// Connects, runs migrations and pings the database.
    pub async fn connect(database_url: &str) -> anyhow::Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(5)
            .connect(database_url)
            .await
            .context("connect DATABASE_URL failed")?;

        super::migrate(&pool).await?;

        sqlx::query("SELECT 1")
            .persistent(false)
            .execute(&pool)
            .await
            .context("store ping failed")?;

        Ok(Self { pool })
    }

    pub async fn close(&self) {
        self.pool.close().await;
    }
}

#[async_trait::async_trait]
impl KvStore for PgStore {
    async fn get(&self, key: &str) -> anyhow::Result<Option<String>> {
        let value: Option<String> = sqlx::query_scalar("SELECT value FROM kv_strings WHERE key = $1")
            .bind(key)
            .fetch_optional(&self.pool)
            .await
            .with_context(|| format!("get {key} failed"))?;
        Ok(value)
    }

    async fn set(&self, key: &str, value: &str) -> anyhow::Result<()> {
        sqlx::query(
            "INSERT INTO kv_strings (key, value, updated_at) VALUES ($1, $2, now()) \
             ON CONFLICT (key) DO UPDATE SET value = EXCLUDED.value, updated_at = EXCLUDED.updated_at",
        )
        .bind(key)
        .bind(value)
        .execute(&self.pool)
        .await
        .with_context(|| format!("set {key} failed"))?;
        Ok(())
    }

    async fn sadd(&self, key: &str, member: &str) -> anyhow::Result<()> {
        sqlx::query(
            "INSERT INTO kv_sets (key, member) VALUES ($1, $2) \
             ON CONFLICT (key, member) DO NOTHING",
        )
        .bind(key)
        .bind(member)
        .execute(&self.pool)
        .await
        .with_context(|| format!("sadd {key} failed"))?;
        Ok(())
    }

    async fn srem(&self, key: &str, member: &str) -> anyhow::Result<()> {
        sqlx::query("DELETE FROM kv_sets WHERE key = $1 AND member = $2")
            .bind(key)
            .bind(member)
            .execute(&self.pool)
            .await
            .with_context(|| format!("srem {key} failed"))?;
        Ok(())
    }

    async fn smembers(&self, key: &str) -> anyhow::Result<Vec<String>> {
        let members: Vec<String> =
            sqlx::query_scalar("SELECT member FROM kv_sets WHERE key = $1 ORDER BY member ASC")
                .bind(key)
                .fetch_all(&self.pool)
                .await
                .with_context(|| format!("smembers {key} failed"))?;
        Ok(members)
    }
}

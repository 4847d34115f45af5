pub mod bot;
pub mod domain;
pub mod error;
pub mod format;
pub mod ingest;
pub mod notify;
pub mod storage;
pub mod time;

pub mod config {
    use anyhow::Context;

    const DEFAULT_JISILU_URL: &str =
        "https://www.jisilu.cn/data/calendar/get_calendar_data/?qtype=CNV";
    const DEFAULT_TELEGRAM_API_BASE_URL: &str = "https://api.telegram.org";
    const DEFAULT_FETCH_WINDOW_DAYS: i64 = 14;
    const DEFAULT_UPSTREAM_TIMEOUT_SECS: u64 = 30;
    const DEFAULT_TELEGRAM_POLL_TIMEOUT_SECS: u64 = 60;
    const DEFAULT_POLL_BACKOFF_MAX_SECS: u64 = 60;
    const DEFAULT_PORT: u16 = 8000;

    #[derive(Debug, Clone)]
    pub struct Settings {
        pub database_url: Option<String>,
        pub telegram_bot_token: Option<String>,
        pub sentry_dsn: Option<String>,
        pub jisilu_url: String,
        pub fetch_window_days: i64,
        pub upstream_timeout_secs: u64,
        pub telegram_api_base_url: String,
        pub telegram_poll_timeout_secs: u64,
        pub poll_backoff_max_secs: u64,
        pub port: u16,
    }

    impl Default for Settings {
        fn default() -> Self {
            Self {
                database_url: None,
                telegram_bot_token: None,
                sentry_dsn: None,
                jisilu_url: DEFAULT_JISILU_URL.to_string(),
                fetch_window_days: DEFAULT_FETCH_WINDOW_DAYS,
                upstream_timeout_secs: DEFAULT_UPSTREAM_TIMEOUT_SECS,
                telegram_api_base_url: DEFAULT_TELEGRAM_API_BASE_URL.to_string(),
                telegram_poll_timeout_secs: DEFAULT_TELEGRAM_POLL_TIMEOUT_SECS,
                poll_backoff_max_secs: DEFAULT_POLL_BACKOFF_MAX_SECS,
                port: DEFAULT_PORT,
            }
        }
    }

    impl Settings {
        pub fn from_env() -> anyhow::Result<Self> {
            let defaults = Self::default();

            let fetch_window_days = parse_env("FETCH_WINDOW_DAYS", defaults.fetch_window_days);
            anyhow::ensure!(
                fetch_window_days >= 1,
                "FETCH_WINDOW_DAYS must be >= 1 (got {fetch_window_days})"
            );

            Ok(Self {
                database_url: std::env::var("DATABASE_URL").ok(),
                telegram_bot_token: std::env::var("TGBOT_TOKEN").ok(),
                sentry_dsn: std::env::var("SENTRY_DSN").ok(),
                jisilu_url: std::env::var("JISILU_URL")
                    .ok()
                    .filter(|s| !s.trim().is_empty())
                    .unwrap_or(defaults.jisilu_url),
                fetch_window_days,
                upstream_timeout_secs: parse_env(
                    "UPSTREAM_TIMEOUT_SECS",
                    defaults.upstream_timeout_secs,
                ),
                telegram_api_base_url: std::env::var("TELEGRAM_API_BASE_URL")
                    .ok()
                    .filter(|s| !s.trim().is_empty())
                    .unwrap_or(defaults.telegram_api_base_url),
                telegram_poll_timeout_secs: parse_env(
                    "TELEGRAM_POLL_TIMEOUT_SECS",
                    defaults.telegram_poll_timeout_secs,
                ),
                poll_backoff_max_secs: parse_env(
                    "POLL_BACKOFF_MAX_SECS",
                    defaults.poll_backoff_max_secs,
                ),
                port: parse_env("PORT", defaults.port),
            })
        }

        pub fn require_database_url(&self) -> anyhow::Result<&str> {
            self.database_url
                .as_deref()
                .context("DATABASE_URL is required")
        }

        pub fn require_telegram_bot_token(&self) -> anyhow::Result<&str> {
            self.telegram_bot_token
                .as_deref()
                .context("TGBOT_TOKEN is required")
        }

        pub fn fetch_window(&self) -> chrono::Duration {
            chrono::Duration::days(self.fetch_window_days)
        }
    }

    fn parse_env<T: std::str::FromStr>(key: &str, default: T) -> T {
        std::env::var(key)
            .ok()
            .and_then(|s| s.trim().parse::<T>().ok())
            .unwrap_or(default)
    }

}

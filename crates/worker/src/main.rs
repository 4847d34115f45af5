use anyhow::Context;
use bond_reminder_core::bot::telegram::TelegramClient;
use bond_reminder_core::bot::Messenger;
use bond_reminder_core::ingest::cache;
use bond_reminder_core::ingest::provider::{BondSource, JisiluClient};
use bond_reminder_core::storage::PgStore;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Debug, Parser)]
#[command(name = "bond_reminder_worker")]
struct Args {
    #[command(subcommand)]
    job: Job,

    /// Do everything except writing the cache or sending messages.
    #[arg(long, global = true)]
    dry_run: bool,
}

#[derive(Debug, Subcommand)]
enum Job {
    /// Refresh the bond cache from jisilu.
    Fetch {
        /// Override FETCH_WINDOW_DAYS for this run.
        #[arg(long)]
        window_days: Option<i64>,
    },
    /// Send listing and subscription digests to every registered chat.
    Notify {
        /// Calendar date to treat as today (YYYY-MM-DD). Defaults to today's CST date.
        #[arg(long)]
        date: Option<String>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let settings = bond_reminder_core::config::Settings::from_env()?;
    let _sentry_guard = init_sentry(&settings);

    tracing_subscriber::registry()
        .with(EnvFilter::from_default_env())
        .with(tracing_subscriber::fmt::layer())
        .with(sentry_tracing::layer())
        .init();

    let args = Args::parse();

    let res = match args.job {
        Job::Fetch { window_days } => run_fetch(&settings, window_days, args.dry_run).await,
        Job::Notify { date } => run_notify(&settings, date.as_deref(), args.dry_run).await,
    };

    if let Err(err) = &res {
        sentry_anyhow::capture_anyhow(err);
    }
    res
}

async fn run_fetch(
    settings: &bond_reminder_core::config::Settings,
    window_days: Option<i64>,
    dry_run: bool,
) -> anyhow::Result<()> {
    let window = match window_days {
        Some(days) => {
            anyhow::ensure!(days >= 1, "--window-days must be >= 1 (got {days})");
            chrono::Duration::days(days)
        }
        None => settings.fetch_window(),
    };
    let source = JisiluClient::from_settings(settings)?;
    let now = chrono::Utc::now();

    if dry_run {
        let bonds = source.fetch_calendar(now, now + window).await?;
        let events = bonds.iter().filter(|b| b.is_event()).count();
        tracing::info!(
            dry_run = true,
            bonds = bonds.len(),
            events,
            window_days = window.num_days(),
            "fetched bond calendar (cache not written)"
        );
        return Ok(());
    }

    let store = PgStore::connect(settings.require_database_url()?)
        .await
        .context("key-value store unreachable")?;
    let res = cache::refresh(&source, &store, now, window).await;
    store.close().await;

    let n = res?;
    tracing::info!(bonds = n, "fetch job done");
    Ok(())
}

async fn run_notify(
    settings: &bond_reminder_core::config::Settings,
    date_arg: Option<&str>,
    dry_run: bool,
) -> anyhow::Result<()> {
    let today = match date_arg {
        Some(s) => chrono::NaiveDate::parse_from_str(s, "%Y-%m-%d")
            .with_context(|| format!("invalid --date {s}"))?,
        None => bond_reminder_core::time::cn_market::today(chrono::Utc::now()),
    };

    let store = PgStore::connect(settings.require_database_url()?)
        .await
        .context("key-value store unreachable")?;

    let telegram = if dry_run {
        None
    } else {
        Some(
            TelegramClient::connect(settings)
                .await
                .context("telegram bot API unreachable")?,
        )
    };

    let res = bond_reminder_core::notify::notify_all(
        &store,
        telegram.as_ref().map(|t| t as &dyn Messenger),
        today,
    )
    .await;
    store.close().await;

    let report = res?;
    tracing::info!(
        %today,
        dry_run,
        chats = report.chats,
        sent = report.sent,
        skipped = report.skipped,
        failed = report.failed,
        "notify job done"
    );
    Ok(())
}

fn init_sentry(settings: &bond_reminder_core::config::Settings) -> Option<sentry::ClientInitGuard> {
    let dsn = settings.sentry_dsn.as_deref()?;
    Some(sentry::init((
        dsn,
        sentry::ClientOptions {
            release: sentry::release_name!(),
            ..Default::default()
        },
    )))
}

use anyhow::Context;
use bond_reminder_core::bot::poller::Poller;
use bond_reminder_core::bot::telegram::TelegramClient;
use bond_reminder_core::ingest::provider::JisiluClient;
use bond_reminder_core::storage::PgStore;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod app;

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

    let db_url = settings.require_database_url()?;
    let store = Arc::new(
        PgStore::connect(db_url)
            .await
            .context("key-value store unreachable")?,
    );

    let telegram = Arc::new(
        TelegramClient::connect(&settings)
            .await
            .context("telegram bot API unreachable")?,
    );
    let source = Arc::new(JisiluClient::from_settings(&settings)?);

    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let poller = Poller::new(
        telegram.clone(),
        telegram.clone(),
        store.clone(),
        Duration::from_secs(settings.poll_backoff_max_secs),
    );
    let poller_task = tokio::spawn(async move {
        if let Err(err) = poller.run(shutdown_rx).await {
            sentry_anyhow::capture_anyhow(&err);
            tracing::error!(error = %err, "telegram polling loop exited with error");
        }
    });

    let state = app::AppState {
        store: store.clone(),
        source,
        messenger: telegram,
        fetch_window: settings.fetch_window(),
    };
    let app = app::router(state);

    let addr = std::net::SocketAddr::from(([0, 0, 0, 0], settings.port));

    tracing::info!(%addr, "api listening");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    let _ = shutdown_tx.send(true);
    if let Err(err) = poller_task.await {
        tracing::error!(error = %err, "telegram polling task panicked");
    }
    store.close().await;

    Ok(())
}

async fn shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
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

use axum::{extract::State, http::StatusCode, routing::get, routing::post, Router};
use bond_reminder_core::bot::Messenger;
use bond_reminder_core::ingest::{cache, provider::BondSource};
use bond_reminder_core::storage::KvStore;
use bond_reminder_core::{notify, time::cn_market};
use std::sync::Arc;
use tower_http::trace::TraceLayer;

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn KvStore>,
    pub source: Arc<dyn BondSource>,
    pub messenger: Arc<dyn Messenger>,
    pub fetch_window: chrono::Duration,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(index))
        .route("/healthz", get(healthz))
        .route("/fetch", post(fetch))
        .route("/notify", post(notify))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
}

async fn index() -> &'static str {
    "Hey there!"
}

async fn healthz() -> &'static str {
    "ok"
}

async fn fetch(State(state): State<AppState>) -> (StatusCode, String) {
    let res = cache::refresh(
        state.source.as_ref(),
        state.store.as_ref(),
        chrono::Utc::now(),
        state.fetch_window,
    )
    .await;

    match res {
        Ok(_) => (StatusCode::OK, "OK".to_string()),
        Err(err) => {
            let err = anyhow::Error::new(err);
            sentry_anyhow::capture_anyhow(&err);
            tracing::error!(error = %err, "fetch failed");
            (StatusCode::INTERNAL_SERVER_ERROR, err.to_string())
        }
    }
}

async fn notify(State(state): State<AppState>) -> (StatusCode, String) {
    let today = cn_market::today(chrono::Utc::now());
    let res = notify::notify_all(
        state.store.as_ref(),
        Some(state.messenger.as_ref()),
        today,
    )
    .await;

    match res {
        Ok(_) => (StatusCode::OK, "OK".to_string()),
        Err(err) => {
            let err = anyhow::Error::new(err);
            sentry_anyhow::capture_anyhow(&err);
            tracing::error!(error = %err, "notify failed");
            (StatusCode::INTERNAL_SERVER_ERROR, err.to_string())
        }
    }
}

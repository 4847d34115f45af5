use crate::domain::bond::Bond;
use crate::error::{BondError, BondResult};
use crate::ingest::provider::BondSource;
use crate::storage::{KvStore, BOND_CACHE_KEY};
use chrono::{DateTime, Duration, Utc};

/// Fetches `[now, now + window]` from upstream and replaces the whole cache.
///
/// The cache is written without an expiry; freshness relies on scheduled re-fetches.
/// On any fetch or decode failure the previous cache is left untouched.
pub async fn refresh(
    source: &dyn BondSource,
    store: &dyn KvStore,
    now: DateTime<Utc>,
    window: Duration,
) -> BondResult<usize> {
    let end = now + window;
    let bonds = source.fetch_calendar(now, end).await?;

    let encoded = serde_json::to_string(&bonds).map_err(|source| BondError::Decode {
        stage: "encode",
        source,
    })?;

    store
        .set(BOND_CACHE_KEY, &encoded)
        .await
        .map_err(BondError::store)?;

    tracing::info!(
        source = source.source_name(),
        bonds = bonds.len(),
        start = now.timestamp(),
        end = end.timestamp(),
        "bond cache refreshed"
    );
    Ok(bonds.len())
}

/// Reads the cached bonds, keeping only listing/subscription events when `events_only`.
pub async fn get_bonds(store: &dyn KvStore, events_only: bool) -> BondResult<Vec<Bond>> {
    let raw = store
        .get(BOND_CACHE_KEY)
        .await
        .map_err(BondError::store)?
        .ok_or(BondError::CacheMiss)?;

    let bonds = serde_json::from_str::<Vec<Bond>>(&raw).map_err(|source| BondError::Decode {
        stage: "cache",
        source,
    })?;

    if events_only {
        return Ok(bonds.into_iter().filter(Bond::is_event).collect());
    }
    Ok(bonds)
}

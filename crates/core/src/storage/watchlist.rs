use super::{KvStore, CHAT_ID_KEY, UPDATE_ID_KEY};
use crate::error::{BondError, BondResult};

pub async fn register_chat(store: &dyn KvStore, chat_id: &str) -> BondResult<()> {
    store
        .sadd(CHAT_ID_KEY, chat_id)
        .await
        .map_err(BondError::store)
}

pub async fn list_chats(store: &dyn KvStore) -> BondResult<Vec<String>> {
    store.smembers(CHAT_ID_KEY).await.map_err(BondError::store)
}

/// The watchlist set is keyed by the bare chat id.
pub async fn add_fragment(store: &dyn KvStore, chat_id: &str, fragment: &str) -> BondResult<()> {
    store
        .sadd(chat_id, fragment)
        .await
        .map_err(BondError::store)
}

pub async fn remove_fragment(store: &dyn KvStore, chat_id: &str, fragment: &str) -> BondResult<()> {
    store
        .srem(chat_id, fragment)
        .await
        .map_err(BondError::store)
}

pub async fn list_fragments(store: &dyn KvStore, chat_id: &str) -> BondResult<Vec<String>> {
    store.smembers(chat_id).await.map_err(BondError::store)
}

/// Missing or unparsable cursor reads as 0 so polling starts from the oldest pending update.
pub async fn load_update_cursor(store: &dyn KvStore) -> BondResult<i64> {
    let raw = store.get(UPDATE_ID_KEY).await.map_err(BondError::store)?;
    let Some(raw) = raw else {
        return Ok(0);
    };
    match raw.trim().parse::<i64>() {
        Ok(v) => Ok(v),
        Err(err) => {
            tracing::warn!(value = %raw, error = %err, "stored update_id is not an integer; starting from 0");
            Ok(0)
        }
    }
}

pub async fn save_update_cursor(store: &dyn KvStore, update_id: i64) -> BondResult<()> {
    store
        .set(UPDATE_ID_KEY, &update_id.to_string())
        .await
        .map_err(BondError::store)
}

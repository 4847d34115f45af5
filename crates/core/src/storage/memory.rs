use super::KvStore;
use std::collections::{BTreeMap, BTreeSet};
use tokio::sync::Mutex;

/// In-process store for tests.
#[derive(Debug, Default)]
pub struct MemoryStore {
    strings: Mutex<BTreeMap<String, String>>,
    sets: Mutex<BTreeMap<String, BTreeSet<String>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait::async_trait]
impl KvStore for MemoryStore {
    async fn get(&self, key: &str) -> anyhow::Result<Option<String>> {
        Ok(self.strings.lock().await.get(key).cloned())
    }

    async fn set(&self, key: &str, value: &str) -> anyhow::Result<()> {
        self.strings
            .lock()
            .await
            .insert(key.to_string(), value.to_string());
        Ok(())
    }

    async fn sadd(&self, key: &str, member: &str) -> anyhow::Result<()> {
        self.sets
            .lock()
            .await
            .entry(key.to_string())
            .or_default()
            .insert(member.to_string());
        Ok(())
    }

    async fn srem(&self, key: &str, member: &str) -> anyhow::Result<()> {
        let mut sets = self.sets.lock().await;
        if let Some(set) = sets.get_mut(key) {
            set.remove(member);
            if set.is_empty() {
                sets.remove(key);
            }
        }
        Ok(())
    }

    async fn smembers(&self, key: &str) -> anyhow::Result<Vec<String>> {
        Ok(self
            .sets
            .lock()
            .await
            .get(key)
            .map(|s| s.iter().cloned().collect())
            .unwrap_or_default())
    }
}

use crate::bot::dispatcher::Dispatcher;
use crate::bot::{Messenger, Update, UpdateFeed};
use crate::storage::{watchlist, KvStore};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;

/// Sequential consumer of inbound updates.
///
/// Each update is fully handled (reply sent, cursor persisted) before the next one is read.
/// The cursor advances even when handling or sending fails.
pub struct Poller {
    feed: Arc<dyn UpdateFeed>,
    messenger: Arc<dyn Messenger>,
    store: Arc<dyn KvStore>,
    dispatcher: Dispatcher,
    backoff_max: Duration,
}

impl Poller {
    pub fn new(
        feed: Arc<dyn UpdateFeed>,
        messenger: Arc<dyn Messenger>,
        store: Arc<dyn KvStore>,
        backoff_max: Duration,
    ) -> Self {
        let dispatcher = Dispatcher::new(store.clone());
        Self {
            feed,
            messenger,
            store,
            dispatcher,
            backoff_max,
        }
    }

    /// Runs until `shutdown` flips to `true` or its sender is dropped.
    ///
    /// An unreadable cursor is treated as 0 rather than stopping the loop.
    pub async fn run(&self, mut shutdown: watch::Receiver<bool>) -> anyhow::Result<()> {
        let mut cursor = match watchlist::load_update_cursor(self.store.as_ref()).await {
            Ok(cursor) => cursor,
            Err(err) => {
                tracing::warn!(error = %err, "failed to load update cursor; starting from 0");
                0
            }
        };
        let mut consecutive_failures: u32 = 0;

        tracing::info!(cursor, "telegram polling started");

        loop {
            if *shutdown.borrow() {
                break;
            }

            let res = tokio::select! {
                res = self.feed.get_updates(cursor + 1) => res,
                _ = shutdown.changed() => break,
            };

            match res {
                Ok(updates) => {
                    consecutive_failures = 0;
                    for update in updates {
                        self.process(&update).await;
                        cursor = cursor.max(update.update_id);
                    }
                }
                Err(err) => {
                    consecutive_failures = consecutive_failures.saturating_add(1);
                    let backoff = backoff_delay(consecutive_failures, self.backoff_max);
                    tracing::warn!(
                        consecutive_failures,
                        ?backoff,
                        error = %err,
                        "telegram getUpdates failed; backing off"
                    );
                    tokio::select! {
                        _ = tokio::time::sleep(backoff) => {}
                        _ = shutdown.changed() => break,
                    }
                }
            }
        }

        tracing::info!(cursor, "telegram polling stopped");
        Ok(())
    }

    async fn process(&self, update: &Update) {
        if let Some(message) = &update.message {
            let chat_id = message.chat.id;
            let username = message
                .from
                .as_ref()
                .and_then(|u| u.username.as_deref())
                .unwrap_or_default();
            tracing::info!(
                update_id = update.update_id,
                chat_id,
                username,
                text = message.text.as_deref().unwrap_or_default(),
                "inbound message"
            );

            let reply = self
                .dispatcher
                .handle(chat_id, message.text.as_deref())
                .await;

            if let Err(err) = self.messenger.send_markdown(chat_id, &reply).await {
                sentry_anyhow::capture_anyhow(&err);
                tracing::error!(chat_id, error = %err, "failed to send reply");
            }
        }

        if let Err(err) = watchlist::save_update_cursor(self.store.as_ref(), update.update_id).await
        {
            tracing::error!(update_id = update.update_id, error = %err, "failed to persist update cursor");
        }
    }
}

/// `1s, 2s, 4s, ...` capped at `max`.
pub fn backoff_delay(consecutive_failures: u32, max: Duration) -> Duration {
    let exp = consecutive_failures.saturating_sub(1).min(32);
    let secs = 1u64 << exp;
    Duration::from_secs(secs).min(max)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bot::dispatcher::{ACK_TEXT, NOT_A_COMMAND_TEXT};
    use crate::bot::{Chat, Message};
    use crate::storage::{MemoryStore, UPDATE_ID_KEY};
    use std::collections::VecDeque;
    use tokio::sync::Mutex;

    struct ScriptedFeed {
        script: Mutex<VecDeque<anyhow::Result<Vec<Update>>>>,
        offsets: Mutex<Vec<i64>>,
        shutdown: watch::Sender<bool>,
    }

    #[async_trait::async_trait]
    impl UpdateFeed for ScriptedFeed {
        async fn get_updates(&self, offset: i64) -> anyhow::Result<Vec<Update>> {
            self.offsets.lock().await.push(offset);
            match self.script.lock().await.pop_front() {
                Some(step) => step,
                None => {
                    let _ = self.shutdown.send(true);
                    Ok(Vec::new())
                }
            }
        }
    }

    #[derive(Default)]
    struct RecordingMessenger {
        sent: Mutex<Vec<(i64, String)>>,
        fail: bool,
    }

    #[async_trait::async_trait]
    impl Messenger for RecordingMessenger {
        async fn send_markdown(&self, chat_id: i64, text: &str) -> anyhow::Result<()> {
            if self.fail {
                anyhow::bail!("chat not found");
            }
            self.sent.lock().await.push((chat_id, text.to_string()));
            Ok(())
        }
    }

    fn msg(update_id: i64, chat_id: i64, text: &str) -> Update {
        Update {
            update_id,
            message: Some(Message {
                chat: Chat { id: chat_id },
                from: None,
                text: Some(text.to_string()),
            }),
        }
    }

    fn feed(
        script: Vec<anyhow::Result<Vec<Update>>>,
    ) -> (Arc<ScriptedFeed>, watch::Receiver<bool>) {
        let (tx, rx) = watch::channel(false);
        let feed = Arc::new(ScriptedFeed {
            script: Mutex::new(script.into()),
            offsets: Mutex::new(Vec::new()),
            shutdown: tx,
        });
        (feed, rx)
    }

    #[tokio::test]
    async fn replies_in_order_and_persists_cursor() {
        let store = Arc::new(MemoryStore::new());
        store.set(UPDATE_ID_KEY, "99").await.unwrap();
        let (feed, rx) = feed(vec![Ok(vec![
            msg(100, 1, "/add 东财"),
            Update {
                update_id: 101,
                message: None,
            },
            msg(102, 1, "hi"),
        ])]);
        let messenger = Arc::new(RecordingMessenger::default());

        Poller::new(feed.clone(), messenger.clone(), store.clone(), Duration::ZERO)
            .run(rx)
            .await
            .unwrap();

        let sent = messenger.sent.lock().await.clone();
        assert_eq!(
            sent,
            vec![
                (1, ACK_TEXT.to_string()),
                (1, NOT_A_COMMAND_TEXT.to_string())
            ]
        );
        assert_eq!(store.get(UPDATE_ID_KEY).await.unwrap().as_deref(), Some("102"));
        assert_eq!(*feed.offsets.lock().await, vec![100, 103]);
    }

    #[tokio::test]
    async fn cursor_advances_when_send_fails() {
        let store = Arc::new(MemoryStore::new());
        let (feed, rx) = feed(vec![Ok(vec![msg(5, 1, "/start")])]);
        let messenger = Arc::new(RecordingMessenger {
            fail: true,
            ..Default::default()
        });

        Poller::new(feed.clone(), messenger, store.clone(), Duration::ZERO)
            .run(rx)
            .await
            .unwrap();

        assert_eq!(store.get(UPDATE_ID_KEY).await.unwrap().as_deref(), Some("5"));
        assert_eq!(*feed.offsets.lock().await, vec![1, 6]);
    }

    #[tokio::test]
    async fn read_failures_back_off_and_resume_from_same_offset() {
        let store = Arc::new(MemoryStore::new());
        let (feed, rx) = feed(vec![
            Err(anyhow::anyhow!("connection reset")),
            Err(anyhow::anyhow!("connection reset")),
            Ok(vec![msg(1, 3, "/list")]),
        ]);
        let messenger = Arc::new(RecordingMessenger::default());

        Poller::new(feed.clone(), messenger.clone(), store, Duration::ZERO)
            .run(rx)
            .await
            .unwrap();

        assert_eq!(*feed.offsets.lock().await, vec![1, 1, 1, 2]);
        assert_eq!(messenger.sent.lock().await.len(), 1);
    }

    struct UnreadableStore {
        inner: MemoryStore,
    }

    #[async_trait::async_trait]
    impl KvStore for UnreadableStore {
        async fn get(&self, _key: &str) -> anyhow::Result<Option<String>> {
            anyhow::bail!("connection refused")
        }

        async fn set(&self, key: &str, value: &str) -> anyhow::Result<()> {
            self.inner.set(key, value).await
        }

        async fn sadd(&self, key: &str, member: &str) -> anyhow::Result<()> {
            self.inner.sadd(key, member).await
        }

        async fn srem(&self, key: &str, member: &str) -> anyhow::Result<()> {
            self.inner.srem(key, member).await
        }

        async fn smembers(&self, key: &str) -> anyhow::Result<Vec<String>> {
            self.inner.smembers(key).await
        }
    }

    #[tokio::test]
    async fn unreadable_cursor_polls_from_start() {
        let store = Arc::new(UnreadableStore {
            inner: MemoryStore::new(),
        });
        let (feed, rx) = feed(vec![Ok(vec![msg(7, 1, "/start")])]);
        let messenger = Arc::new(RecordingMessenger::default());

        Poller::new(feed.clone(), messenger.clone(), store.clone(), Duration::ZERO)
            .run(rx)
            .await
            .unwrap();

        assert_eq!(*feed.offsets.lock().await, vec![1, 8]);
        assert_eq!(messenger.sent.lock().await.len(), 1);
        assert_eq!(
            store.inner.get(UPDATE_ID_KEY).await.unwrap().as_deref(),
            Some("7")
        );
    }

    #[test]
    fn backoff_doubles_and_caps() {
        let max = Duration::from_secs(60);
        assert_eq!(backoff_delay(1, max), Duration::from_secs(1));
        assert_eq!(backoff_delay(2, max), Duration::from_secs(2));
        assert_eq!(backoff_delay(4, max), Duration::from_secs(8));
        assert_eq!(backoff_delay(7, max), Duration::from_secs(60));
        assert_eq!(backoff_delay(u32::MAX, max), Duration::from_secs(60));
    }
}

use crate::bot::Messenger;
use crate::error::BondResult;
use crate::format::{format_listing_digest, format_subscription_digest, match_watchlist};
use crate::ingest::cache;
use crate::storage::{watchlist, KvStore};
use chrono::NaiveDate;
use serde::Serialize;

/// Outcome counts of one notify cycle.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct NotifyReport {
    pub chats: usize,
    pub sent: usize,
    pub skipped: usize,
    pub failed: usize,
}

/// Per-chat digest: today's subscriptions plus watchlist hits.
/// `None` when the chat has nothing to be told.
pub fn compose_digest(subscription_digest: &str, listing_digest: &str) -> Option<String> {
    if subscription_digest.is_empty() && listing_digest.is_empty() {
        return None;
    }
    Some(format!("{subscription_digest}\n{listing_digest}"))
}

/// Sends each registered chat its digest for `today`.
///
/// Loading the bond cache or the chat registry aborts the cycle. Failures scoped to one
/// chat (watchlist read, non-numeric id, send) are logged and counted, and the cycle moves
/// on to the next chat.
///
/// When `messenger` is `None` digests are computed and logged but nothing is sent.
pub async fn notify_all(
    store: &dyn KvStore,
    messenger: Option<&dyn Messenger>,
    today: NaiveDate,
) -> BondResult<NotifyReport> {
    let bonds = cache::get_bonds(store, false).await?;
    let chat_ids = watchlist::list_chats(store).await?;
    tracing::info!(chats = chat_ids.len(), bonds = bonds.len(), %today, "notify cycle started");

    let subscription_digest = format_subscription_digest(&bonds, today);

    let mut report = NotifyReport {
        chats: chat_ids.len(),
        ..Default::default()
    };

    for chat_key in &chat_ids {
        let fragments = match watchlist::list_fragments(store, chat_key).await {
            Ok(f) => f,
            Err(err) => {
                report.failed += 1;
                tracing::error!(chat_id = %chat_key, error = %err, "failed to load watchlist; skipping chat");
                continue;
            }
        };

        let matched = match_watchlist(&fragments, &bonds);
        let listing_digest = format_listing_digest(&matched);

        let Some(text) = compose_digest(&subscription_digest, &listing_digest) else {
            report.skipped += 1;
            continue;
        };

        let Ok(chat_id) = chat_key.parse::<i64>() else {
            report.failed += 1;
            tracing::error!(chat_id = %chat_key, "registered chat id is not an integer; skipping chat");
            continue;
        };

        let Some(messenger) = messenger else {
            report.sent += 1;
            tracing::info!(chat_id, matched = matched.len(), digest = %text, "dry run: digest not sent");
            continue;
        };

        match messenger.send_markdown(chat_id, &text).await {
            Ok(()) => {
                report.sent += 1;
                tracing::debug!(chat_id, matched = matched.len(), "digest sent");
            }
            Err(err) => {
                report.failed += 1;
                sentry_anyhow::capture_anyhow(&err);
                tracing::error!(chat_id, error = %err, "failed to send digest");
            }
        }
    }

    tracing::info!(
        chats = report.chats,
        sent = report.sent,
        skipped = report.skipped,
        failed = report.failed,
        "notify cycle finished"
    );
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::bond::Bond;
    use crate::error::BondError;
    use crate::storage::{MemoryStore, BOND_CACHE_KEY};
    use tokio::sync::Mutex;

    #[derive(Default)]
    struct RecordingMessenger {
        sent: Mutex<Vec<(i64, String)>>,
        fail_for: Option<i64>,
    }

    #[async_trait::async_trait]
    impl Messenger for RecordingMessenger {
        async fn send_markdown(&self, chat_id: i64, text: &str) -> anyhow::Result<()> {
            if self.fail_for == Some(chat_id) {
                anyhow::bail!("Forbidden: bot was blocked by the user");
            }
            self.sent.lock().await.push((chat_id, text.to_string()));
            Ok(())
        }
    }

    fn bond(title: &str, start: &str) -> Bond {
        Bond {
            id: "1".to_string(),
            code: "123001".to_string(),
            title: title.to_string(),
            start: start.to_string(),
        }
    }

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2021, 6, 15).unwrap()
    }

    async fn seeded(bonds: &[Bond]) -> MemoryStore {
        let store = MemoryStore::new();
        store
            .set(BOND_CACHE_KEY, &serde_json::to_string(bonds).unwrap())
            .await
            .unwrap();
        store
    }

    #[test]
    fn compose_joins_with_newline() {
        assert_eq!(compose_digest("", ""), None);
        assert_eq!(compose_digest("a", "").as_deref(), Some("a\n"));
        assert_eq!(compose_digest("", "b").as_deref(), Some("\nb"));
        assert_eq!(compose_digest("a", "b").as_deref(), Some("a\nb"));
    }

    #[tokio::test]
    async fn chat_with_nothing_new_gets_no_message() {
        let store = seeded(&[bond("东财转债上市日", "2021-06-20")]).await;
        watchlist::register_chat(&store, "1").await.unwrap();
        let messenger = RecordingMessenger::default();

        let report = notify_all(&store, Some(&messenger as &dyn Messenger), today())
            .await
            .unwrap();

        assert!(messenger.sent.lock().await.is_empty());
        assert_eq!(report.skipped, 1);
        assert_eq!(report.sent, 0);
    }

    #[tokio::test]
    async fn watchlist_hits_and_today_subscriptions_are_combined() {
        let store = seeded(&[
            bond("东财转债上市日", "2021-06-20"),
            bond("南银转债申购日", "2021-06-15"),
        ])
        .await;
        watchlist::register_chat(&store, "1").await.unwrap();
        watchlist::register_chat(&store, "2").await.unwrap();
        watchlist::add_fragment(&store, "1", "东财A").await.unwrap();
        let messenger = RecordingMessenger::default();

        let report = notify_all(&store, Some(&messenger as &dyn Messenger), today())
            .await
            .unwrap();
        assert_eq!(report.sent, 2);

        let sent = messenger.sent.lock().await.clone();
        let subscription = "*打新提醒:*\n```\n南银转债申购日 2021-06-15\n```";
        assert!(sent.contains(&(
            1,
            format!("{subscription}\n*上市提醒:*\n```\n东财A 2021-06-20\n```")
        )));
        assert!(sent.contains(&(2, format!("{subscription}\n"))));
    }

    #[tokio::test]
    async fn missing_cache_aborts_the_cycle() {
        let store = MemoryStore::new();
        watchlist::register_chat(&store, "1").await.unwrap();
        let messenger = RecordingMessenger::default();
        let err = notify_all(&store, Some(&messenger as &dyn Messenger), today())
            .await
            .unwrap_err();
        assert!(matches!(err, BondError::CacheMiss));
    }

    #[tokio::test]
    async fn one_failing_chat_does_not_block_others() {
        let store = seeded(&[bond("南银转债申购日", "2021-06-15")]).await;
        for chat in ["1", "2", "not-a-number"] {
            watchlist::register_chat(&store, chat).await.unwrap();
        }
        let messenger = RecordingMessenger {
            fail_for: Some(1),
            ..Default::default()
        };

        let report = notify_all(&store, Some(&messenger as &dyn Messenger), today())
            .await
            .unwrap();

        assert_eq!(report.chats, 3);
        assert_eq!(report.sent, 1);
        assert_eq!(report.failed, 2);
        let sent = messenger.sent.lock().await.clone();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].0, 2);
    }

    #[tokio::test]
    async fn dry_run_counts_without_sending() {
        let store = seeded(&[bond("南银转债申购日", "2021-06-15")]).await;
        watchlist::register_chat(&store, "1").await.unwrap();
        let report = notify_all(&store, None, today()).await.unwrap();
        assert_eq!(report.sent, 1);
    }
}

//! Change feed over the libSQL timer table.
//!
//! libSQL has no push notifications, so each subscription runs a task that
//! polls the session's row and emits an event whenever it differs from the
//! last observed value. Writes from every process sharing the database,
//! including this one, show up this way.

use std::time::Duration;

use async_trait::async_trait;
use tokio::time::{interval, MissedTickBehavior};

use super::LibSqlTimerStore;
use crate::error::Result;
use crate::models::{ChangeEvent, ChangeKind, SessionId, TimerRecord};
use crate::remote::{PushChannel, RecordStore, Subscription, SubscriptionSender};

/// Polling [`PushChannel`] for a [`LibSqlTimerStore`]
#[derive(Clone)]
pub struct LibSqlChangeFeed {
    store: LibSqlTimerStore,
    poll_interval: Duration,
}

impl LibSqlChangeFeed {
    pub const fn new(store: LibSqlTimerStore, poll_interval: Duration) -> Self {
        Self {
            store,
            poll_interval,
        }
    }
}

#[async_trait]
impl PushChannel for LibSqlChangeFeed {
    async fn subscribe(&self, session_id: &SessionId) -> Result<Subscription> {
        // The first read doubles as the connectivity check and the baseline.
        let baseline = self.store.fetch(session_id).await?;
        let (sender, subscription) = Subscription::channel();

        tokio::spawn(poll_changes(
            self.store.clone(),
            session_id.clone(),
            self.poll_interval,
            baseline,
            sender,
        ));

        Ok(subscription)
    }
}

async fn poll_changes(
    store: LibSqlTimerStore,
    session_id: SessionId,
    poll_interval: Duration,
    mut last_seen: Option<TimerRecord>,
    sender: SubscriptionSender,
) {
    let mut ticker = interval(poll_interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
    // Skip the immediate first tick; the baseline was just read.
    ticker.tick().await;

    loop {
        tokio::select! {
            () = sender.closed() => break,
            _ = ticker.tick() => {}
        }

        let current = match store.fetch(&session_id).await {
            Ok(current) => current,
            Err(e) => {
                tracing::warn!(session = %session_id, "Change feed poll failed: {e}");
                sender.send(Err(e)).await.ok();
                break;
            }
        };

        let Some(record) = current else {
            continue;
        };
        if last_seen.as_ref() == Some(&record) {
            continue;
        }

        let kind = if last_seen.is_some() {
            ChangeKind::Update
        } else {
            ChangeKind::Insert
        };
        last_seen = Some(record.clone());

        if sender.send(Ok(ChangeEvent { kind, record })).await.is_err() {
            break;
        }
    }

    tracing::debug!(session = %session_id, "Change feed stopped");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::Database;
    use crate::models::TimerPatch;
    use pretty_assertions::assert_eq;
    use std::sync::Arc;
    use tokio::time::timeout;

    async fn setup() -> (LibSqlTimerStore, LibSqlChangeFeed) {
        let db = Database::open_in_memory().await.unwrap();
        let store = LibSqlTimerStore::new(Arc::new(db));
        let feed = LibSqlChangeFeed::new(store.clone(), Duration::from_millis(10));
        (store, feed)
    }

    fn session() -> SessionId {
        SessionId::new("feed").unwrap()
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_emits_insert_then_update() {
        let (store, feed) = setup().await;
        let mut subscription = feed.subscribe(&session()).await.unwrap();

        store.fetch_or_create(&session(), 1).await.unwrap();
        let inserted = timeout(Duration::from_secs(2), subscription.next())
            .await
            .unwrap()
            .unwrap()
            .unwrap();
        assert_eq!(inserted.kind, ChangeKind::Insert);

        store
            .update(&session(), &TimerPatch::start(10), 10)
            .await
            .unwrap();
        let updated = timeout(Duration::from_secs(2), subscription.next())
            .await
            .unwrap()
            .unwrap()
            .unwrap();
        assert_eq!(updated.kind, ChangeKind::Update);
        assert!(updated.record.is_running);
        assert_eq!(updated.record.start_time, Some(10));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_unchanged_row_emits_nothing() {
        let (store, feed) = setup().await;
        store.fetch_or_create(&session(), 1).await.unwrap();
        let mut subscription = feed.subscribe(&session()).await.unwrap();

        let quiet = timeout(Duration::from_millis(100), subscription.next()).await;
        assert!(quiet.is_err());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_other_sessions_are_not_reported() {
        let (store, feed) = setup().await;
        store.fetch_or_create(&session(), 1).await.unwrap();
        let mut subscription = feed.subscribe(&session()).await.unwrap();

        let other = SessionId::new("other").unwrap();
        store
            .update(&other, &TimerPatch::start(3), 3)
            .await
            .unwrap();

        let quiet = timeout(Duration::from_millis(100), subscription.next()).await;
        assert!(quiet.is_err());
    }
}

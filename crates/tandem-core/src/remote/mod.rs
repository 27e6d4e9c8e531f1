//! Remote record store and push channel seams.
//!
//! The sync engine talks to the shared store only through these two traits,
//! so any backend offering point read, upsert-on-absence, partial update by
//! key, and a per-session change stream can drive it.

mod memory;

use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::error::Result;
use crate::models::{ChangeEvent, SessionId, TimerPatch, TimerRecord};

pub use memory::MemoryRemote;

/// Buffer size for per-subscription delivery queues.
pub const SUBSCRIPTION_BUFFER: usize = 64;

/// Keyed table of timer records.
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Point read by session.
    async fn fetch(&self, session_id: &SessionId) -> Result<Option<TimerRecord>>;

    /// Read the record, inserting a stopped one stamped `now_ms` if absent.
    async fn fetch_or_create(&self, session_id: &SessionId, now_ms: i64) -> Result<TimerRecord>;

    /// Apply a partial update and return the stored record.
    async fn update(
        &self,
        session_id: &SessionId,
        patch: &TimerPatch,
        updated_at: i64,
    ) -> Result<TimerRecord>;
}

/// Per-session stream of record changes.
///
/// Delivery is at-least-once with no ordering guarantee across retries.
#[async_trait]
pub trait PushChannel: Send + Sync {
    /// Open a subscription to every insert/update on the session's record.
    async fn subscribe(&self, session_id: &SessionId) -> Result<Subscription>;
}

/// An open push subscription.
///
/// Yields change events until the channel closes (`None`). An `Err` item
/// reports a channel failure; the subscription should then be dropped.
#[derive(Debug)]
pub struct Subscription {
    receiver: mpsc::Receiver<Result<ChangeEvent>>,
}

/// Producer half of a [`Subscription`], held by channel backends.
pub type SubscriptionSender = mpsc::Sender<Result<ChangeEvent>>;

impl Subscription {
    /// Create a connected sender/subscription pair.
    pub fn channel() -> (SubscriptionSender, Self) {
        let (sender, receiver) = mpsc::channel(SUBSCRIPTION_BUFFER);
        (sender, Self { receiver })
    }

    /// Wait for the next delivery.
    pub async fn next(&mut self) -> Option<Result<ChangeEvent>> {
        self.receiver.recv().await
    }
}

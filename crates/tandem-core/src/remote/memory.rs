//! In-process record store and push channel.
//!
//! Every clone shares one table and one subscriber list, so several
//! `SharedTimer`s attached to the same `MemoryRemote` behave like
//! participants on separate devices. Fault injection switches cover channel
//! outages, forced disconnects, held or duplicated delivery, failing reads
//! or writes, and writes that never complete.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use tokio::sync::mpsc::error::TrySendError;

use super::{PushChannel, RecordStore, Subscription, SubscriptionSender};
use crate::error::{Error, Result};
use crate::models::{ChangeEvent, ChangeKind, SessionId, TimerPatch, TimerRecord};

#[derive(Debug)]
struct Inner {
    records: HashMap<SessionId, TimerRecord>,
    subscribers: HashMap<SessionId, Vec<SubscriptionSender>>,
    channel_available: bool,
    reads_fail: bool,
    writes_fail: bool,
    writes_hang: bool,
    hold_delivery: bool,
    held: Vec<ChangeEvent>,
    duplicate_delivery: bool,
}

impl Default for Inner {
    fn default() -> Self {
        Self {
            records: HashMap::new(),
            subscribers: HashMap::new(),
            channel_available: true,
            reads_fail: false,
            writes_fail: false,
            writes_hang: false,
            hold_delivery: false,
            held: Vec::new(),
            duplicate_delivery: false,
        }
    }
}

impl Inner {
    fn publish(&mut self, event: ChangeEvent) {
        if self.hold_delivery {
            self.held.push(event);
            return;
        }
        let copies = if self.duplicate_delivery { 2 } else { 1 };
        let Some(senders) = self.subscribers.get_mut(&event.record.session_id) else {
            return;
        };
        senders.retain(|sender| {
            for _ in 0..copies {
                match sender.try_send(Ok(event.clone())) {
                    Ok(()) => {}
                    Err(TrySendError::Full(_)) => {
                        tracing::warn!(
                            session = %event.record.session_id,
                            "Dropping change event for a subscriber that is not keeping up"
                        );
                    }
                    Err(TrySendError::Closed(_)) => return false,
                }
            }
            true
        });
    }
}

/// Shared in-memory remote backend.
#[derive(Debug, Clone, Default)]
pub struct MemoryRemote {
    inner: Arc<Mutex<Inner>>,
}

impl MemoryRemote {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Current stored record for a session.
    pub fn record(&self, session_id: &SessionId) -> Option<TimerRecord> {
        self.lock().records.get(session_id).cloned()
    }

    /// Number of live subscriptions for a session.
    pub fn subscriber_count(&self, session_id: &SessionId) -> usize {
        self.lock()
            .subscribers
            .get(session_id)
            .map_or(0, |senders| senders.iter().filter(|s| !s.is_closed()).count())
    }

    /// Close every open subscription; clients see their channel drop.
    pub fn disconnect_all(&self) {
        self.lock().subscribers.clear();
    }

    /// Take the push channel down (closing open subscriptions) or bring it back.
    pub fn set_channel_available(&self, available: bool) {
        let mut inner = self.lock();
        inner.channel_available = available;
        if !available {
            inner.subscribers.clear();
        }
    }

    pub fn set_reads_fail(&self, fail: bool) {
        self.lock().reads_fail = fail;
    }

    pub fn set_writes_fail(&self, fail: bool) {
        self.lock().writes_fail = fail;
    }

    /// Make every subsequent `update` wait forever without touching the record.
    pub fn set_writes_hang(&self, hang: bool) {
        self.lock().writes_hang = hang;
    }

    /// Deliver every subsequent event twice.
    pub fn set_duplicate_delivery(&self, duplicate: bool) {
        self.lock().duplicate_delivery = duplicate;
    }

    /// Queue events instead of delivering them, simulating a slow channel.
    pub fn hold_delivery(&self) {
        self.lock().hold_delivery = true;
    }

    /// Deliver everything queued since [`Self::hold_delivery`].
    pub fn release_delivery(&self) {
        let mut inner = self.lock();
        inner.hold_delivery = false;
        let held = std::mem::take(&mut inner.held);
        for event in held {
            inner.publish(event);
        }
    }
}

#[async_trait]
impl RecordStore for MemoryRemote {
    async fn fetch(&self, session_id: &SessionId) -> Result<Option<TimerRecord>> {
        let inner = self.lock();
        if inner.reads_fail {
            return Err(Error::Remote("memory remote read failure".into()));
        }
        Ok(inner.records.get(session_id).cloned())
    }

    async fn fetch_or_create(&self, session_id: &SessionId, now_ms: i64) -> Result<TimerRecord> {
        let mut inner = self.lock();
        if inner.reads_fail {
            return Err(Error::Remote("memory remote read failure".into()));
        }
        if let Some(record) = inner.records.get(session_id) {
            return Ok(record.clone());
        }
        if inner.writes_fail {
            return Err(Error::Remote("memory remote write failure".into()));
        }

        let record = TimerRecord::new(session_id.clone(), now_ms);
        inner.records.insert(session_id.clone(), record.clone());
        inner.publish(ChangeEvent {
            kind: ChangeKind::Insert,
            record: record.clone(),
        });
        Ok(record)
    }

    async fn update(
        &self,
        session_id: &SessionId,
        patch: &TimerPatch,
        updated_at: i64,
    ) -> Result<TimerRecord> {
        let hang = self.lock().writes_hang;
        if hang {
            std::future::pending::<()>().await;
        }

        let mut guard = self.lock();
        let inner = &mut *guard;
        if inner.writes_fail {
            return Err(Error::Remote("memory remote write failure".into()));
        }

        let kind = if inner.records.contains_key(session_id) {
            ChangeKind::Update
        } else {
            ChangeKind::Insert
        };
        let stored = inner
            .records
            .entry(session_id.clone())
            .or_insert_with(|| TimerRecord::new(session_id.clone(), updated_at));
        stored.apply_patch(patch, updated_at);
        let record = stored.clone();

        inner.publish(ChangeEvent {
            kind,
            record: record.clone(),
        });
        Ok(record)
    }
}

#[async_trait]
impl PushChannel for MemoryRemote {
    async fn subscribe(&self, session_id: &SessionId) -> Result<Subscription> {
        let mut inner = self.lock();
        if !inner.channel_available {
            return Err(Error::Channel("memory channel unavailable".into()));
        }
        let (sender, subscription) = Subscription::channel();
        inner
            .subscribers
            .entry(session_id.clone())
            .or_default()
            .push(sender);
        Ok(subscription)
    }
}

//! Local mirror of the shared timer.
//!
//! [`TimerStateStore`] holds the client's copy of the timer fields plus the
//! bookkeeping for in-flight operations. It is a `tokio::sync::watch` cell:
//! every transition is applied atomically under the cell's lock, and once a
//! setter returns any read (direct, or through a receiver held by a task
//! scheduled earlier) observes the new value. Mutation is crate-private so
//! only the command and listener paths can change timer fields.

use std::sync::Arc;

use serde::Serialize;
use tokio::sync::watch;

use crate::models::{OperationToken, TimerFields, TimerPatch, TimerRecord};

/// Health of the push channel subscription.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionState {
    #[default]
    Disconnected,
    Connecting,
    Connected,
}

/// Counters describing what the sync engine has done so far.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct SyncStats {
    pub echoes_suppressed: u64,
    pub remote_applied: u64,
    pub refreshes: u64,
    pub fallback_clears: u64,
    pub rejected_commands: u64,
    pub write_failures: u64,
    pub reconnects: u64,
}

/// Point-in-time copy of the mirror.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct TimerSnapshot {
    pub fields: TimerFields,
    /// Bumped on every change to `fields`
    pub revision: u64,
    pub sync_in_progress: bool,
    pub pending_token: Option<OperationToken>,
    /// Local time (Unix ms) the mirror was last confirmed against the remote
    pub last_sync_at: Option<i64>,
    pub connection: ConnectionState,
    /// Most recent recoverable failure, for user-visible warnings
    pub last_warning: Option<String>,
    pub stats: SyncStats,
}

impl TimerSnapshot {
    pub fn display_time(&self, now_ms: i64) -> u64 {
        self.fields.display_time(now_ms)
    }

    pub const fn is_running(&self) -> bool {
        self.fields.is_running
    }

    pub fn is_connected(&self) -> bool {
        self.connection == ConnectionState::Connected
    }
}

/// How a push notification was handled.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum NotificationOutcome {
    /// Treated as the echo of our own pending write; payload not applied
    EchoSuppressed(OperationToken),
    /// Treated as an echo, but the payload differed from the optimistic
    /// fields, so another write may have landed in the same window
    EchoDiverged(OperationToken),
    /// Applied as a remote-origin update
    Applied,
}

/// Shared handle to the mirror; clones observe the same state.
#[derive(Clone, Debug)]
pub struct TimerStateStore {
    cell: Arc<watch::Sender<TimerSnapshot>>,
}

impl TimerStateStore {
    /// Create a mirror seeded with `fields`, confirmed at `synced_at`.
    pub fn new(fields: TimerFields, synced_at: Option<i64>) -> Self {
        let (cell, _) = watch::channel(TimerSnapshot {
            fields: fields.normalized(),
            last_sync_at: synced_at,
            ..TimerSnapshot::default()
        });
        Self {
            cell: Arc::new(cell),
        }
    }

    /// Copy of the latest state.
    pub fn snapshot(&self) -> TimerSnapshot {
        self.cell.borrow().clone()
    }

    /// Latest timer fields.
    pub fn fields(&self) -> TimerFields {
        self.cell.borrow().fields
    }

    /// Receiver notified on every transition.
    pub fn subscribe(&self) -> watch::Receiver<TimerSnapshot> {
        self.cell.subscribe()
    }

    /// Atomically claim the in-progress slot and apply an optimistic update.
    ///
    /// `plan` sees the current fields and returns the patch to apply. Returns
    /// `None` without touching the fields when a sync is already in progress.
    pub(crate) fn stage_command(
        &self,
        token: OperationToken,
        plan: impl FnOnce(TimerFields) -> TimerPatch,
    ) -> Option<TimerPatch> {
        let mut staged = None;
        self.cell.send_if_modified(|state| {
            if state.sync_in_progress {
                state.stats.rejected_commands += 1;
                return false;
            }
            let patch = plan(state.fields);
            state.fields = patch.apply_to(state.fields);
            state.revision += 1;
            state.sync_in_progress = true;
            state.pending_token = Some(token);
            staged = Some(patch);
            true
        });
        staged
    }

    /// Clear the pending pair if it still belongs to `token`.
    ///
    /// Used by the echo fallback timer. Returns whether anything was
    /// cleared; a newer operation's token is left alone.
    pub(crate) fn expire_pending(&self, token: OperationToken) -> bool {
        self.cell.send_if_modified(|state| {
            if state.pending_token != Some(token) {
                return false;
            }
            state.sync_in_progress = false;
            state.pending_token = None;
            state.stats.fallback_clears += 1;
            true
        })
    }

    /// Handle one push notification.
    ///
    /// While a write is pending the notification is taken as its echo: the
    /// pending pair is cleared and the payload dropped. A payload that does
    /// not match the optimistic fields is reported as diverged so the caller
    /// can re-fetch. Otherwise the payload overwrites the fields.
    pub(crate) fn handle_notification(
        &self,
        record: &TimerRecord,
        now_ms: i64,
    ) -> NotificationOutcome {
        let mut outcome = NotificationOutcome::Applied;
        self.cell.send_modify(|state| {
            if let (true, Some(token)) = (state.sync_in_progress, state.pending_token) {
                state.sync_in_progress = false;
                state.pending_token = None;
                state.stats.echoes_suppressed += 1;
                state.last_sync_at = Some(now_ms);
                outcome = if record.fields().normalized() == state.fields {
                    NotificationOutcome::EchoSuppressed(token)
                } else {
                    NotificationOutcome::EchoDiverged(token)
                };
                return;
            }
            state.fields = record.fields().normalized();
            state.revision += 1;
            state.last_sync_at = Some(now_ms);
            state.stats.remote_applied += 1;
        });
        outcome
    }

    /// Apply an explicitly fetched authoritative record.
    ///
    /// `based_on` is the revision observed before the read was issued. The
    /// record is refused while a local write is pending or when the fields
    /// changed since, because the read may predate that change. Returns
    /// whether the record was applied.
    pub(crate) fn apply_fetched(&self, record: &TimerRecord, now_ms: i64, based_on: u64) -> bool {
        self.cell.send_if_modified(|state| {
            if state.sync_in_progress || state.revision != based_on {
                return false;
            }
            state.fields = record.fields().normalized();
            state.revision += 1;
            state.last_sync_at = Some(now_ms);
            state.stats.refreshes += 1;
            true
        })
    }

    pub(crate) fn set_connection(&self, connection: ConnectionState) {
        self.cell.send_if_modified(|state| {
            if state.connection == connection {
                return false;
            }
            state.connection = connection;
            true
        });
    }

    pub(crate) fn record_reconnect(&self) {
        self.cell.send_modify(|state| state.stats.reconnects += 1);
    }

    pub(crate) fn record_warning(&self, message: impl Into<String>) {
        let message = message.into();
        self.cell.send_modify(|state| state.last_warning = Some(message));
    }

    pub(crate) fn record_write_failure(&self, token: OperationToken, message: String) {
        self.cell.send_modify(|state| {
            if state.pending_token == Some(token) {
                state.sync_in_progress = false;
                state.pending_token = None;
            }
            state.stats.write_failures += 1;
            state.last_warning = Some(message);
        });
    }
}

//! Periodic reconciliation against the remote store.

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};

use super::{refresh_from_remote, ListenerHandle, SyncContext};

/// Why a sweep re-fetched the record.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum SweepReason {
    /// The push channel is down
    Disconnected,
    /// The mirror was never confirmed, or is running and was not
    /// confirmed recently
    Stale,
}

pub(crate) struct ReconciliationSweeper {
    ctx: SyncContext,
    listener: ListenerHandle,
}

impl ReconciliationSweeper {
    pub(crate) const fn new(ctx: SyncContext, listener: ListenerHandle) -> Self {
        Self { ctx, listener }
    }

    pub(crate) fn spawn(self, mut shutdown: watch::Receiver<bool>) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = interval(self.ctx.settings.sweep_interval());
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            // The first tick completes immediately; attach just fetched.
            ticker.tick().await;

            loop {
                tokio::select! {
                    _ = shutdown.changed() => break,
                    _ = ticker.tick() => {
                        self.sweep().await;
                    }
                }
            }
        })
    }

    /// Run one reconciliation pass.
    pub(crate) async fn sweep(&self) -> Option<SweepReason> {
        let reason = self.reason()?;
        tracing::debug!(session = %self.ctx.session_id, ?reason, "Reconciling timer with remote");

        if reason == SweepReason::Disconnected {
            self.listener.request_resubscribe();
        }
        refresh_from_remote(&self.ctx).await;
        Some(reason)
    }

    fn reason(&self) -> Option<SweepReason> {
        let snapshot = self.ctx.state.snapshot();
        if !snapshot.is_connected() {
            return Some(SweepReason::Disconnected);
        }
        let Some(synced_at) = snapshot.last_sync_at else {
            // Never confirmed against the remote
            return Some(SweepReason::Stale);
        };
        if !snapshot.is_running() {
            return None;
        }

        let stale_after = i64::try_from(self.ctx.settings.stale_after_ms).unwrap_or(i64::MAX);
        let stale = self.ctx.clock.now_ms().saturating_sub(synced_at) > stale_after;
        stale.then_some(SweepReason::Stale)
    }
}

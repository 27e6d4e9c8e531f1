//! Synchronization engine for one session's shared timer.
//!
//! The pieces here all act on one [`TimerStateStore`]:
//!
//! - [`CommandExecutor`] applies `toggle`/`reset` optimistically and hands
//!   the patch to the [`RemoteMutator`].
//! - [`RemoteMutator`] owns the pending operation token and the echo
//!   fallback timer.
//! - [`ChangeListener`] consumes the push channel, suppresses echoes and
//!   reconnects after failures.
//! - [`ReconciliationSweeper`] re-fetches when the channel is down or the
//!   mirror went stale.
//! - [`DisplayClock`] publishes the derived display time.

mod display;
mod executor;
mod listener;
mod mutator;
mod sweeper;

use std::sync::Arc;

use crate::clock::Clock;
use crate::config::SyncSettings;
use crate::models::SessionId;
use crate::remote::{PushChannel, RecordStore};
use crate::state::TimerStateStore;

pub(crate) use display::DisplayClock;
pub use executor::{CommandOutcome, RejectReason};
pub(crate) use executor::CommandExecutor;
pub(crate) use listener::{ChangeListener, ListenerHandle};
pub(crate) use mutator::RemoteMutator;
pub(crate) use sweeper::ReconciliationSweeper;

/// Everything a sync task needs, cheap to clone.
#[derive(Clone)]
pub(crate) struct SyncContext {
    pub session_id: SessionId,
    pub state: TimerStateStore,
    pub store: Arc<dyn RecordStore>,
    pub channel: Arc<dyn PushChannel>,
    pub clock: Arc<dyn Clock>,
    pub settings: SyncSettings,
}

/// Fetch the authoritative record and apply it to the mirror.
///
/// Shared by the listener's catch-up and the sweeper. Skipped while a local
/// write is pending. Returns whether the mirror was updated.
pub(crate) async fn refresh_from_remote(ctx: &SyncContext) -> bool {
    let before = ctx.state.snapshot();
    if before.sync_in_progress {
        tracing::debug!(session = %ctx.session_id, "Skipping refresh while a sync is in progress");
        return false;
    }

    match ctx.store.fetch(&ctx.session_id).await {
        Ok(Some(record)) => {
            if !record.fields().is_consistent() {
                tracing::warn!(session = %ctx.session_id, "Repairing inconsistent timer record");
            }
            let applied = ctx
                .state
                .apply_fetched(&record, ctx.clock.now_ms(), before.revision);
            if !applied {
                tracing::debug!(session = %ctx.session_id, "Discarding refresh overtaken by a local change");
            }
            applied
        }
        Ok(None) => {
            tracing::debug!(session = %ctx.session_id, "No remote timer record to refresh from");
            false
        }
        Err(e) => {
            tracing::warn!(session = %ctx.session_id, "Failed to refresh timer: {e}");
            ctx.state.record_warning(format!("Failed to refresh timer: {e}"));
            false
        }
    }
}

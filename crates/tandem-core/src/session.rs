//! Consumer-facing handle on one session's shared timer.

use std::sync::Arc;

use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::clock::{Clock, SystemClock};
use crate::config::SyncSettings;
use crate::error::Result;
use crate::models::{SessionId, TimerFields};
use crate::remote::{PushChannel, RecordStore};
use crate::state::{TimerSnapshot, TimerStateStore};
use crate::sync::{
    ChangeListener, CommandExecutor, CommandOutcome, DisplayClock, ReconciliationSweeper,
    SyncContext,
};

/// A participant's live view of a session timer.
///
/// Attaching spawns the background listener, sweeper and display tasks on
/// the current Tokio runtime. They run until [`SharedTimer::close`] is
/// awaited or the handle is dropped.
pub struct SharedTimer {
    ctx: SyncContext,
    executor: CommandExecutor,
    display: DisplayClock,
    shutdown: watch::Sender<bool>,
    tasks: Vec<JoinHandle<()>>,
}

impl SharedTimer {
    /// Attach to `session_id` using the system clock.
    pub async fn attach(
        session_id: SessionId,
        store: Arc<dyn RecordStore>,
        channel: Arc<dyn PushChannel>,
        settings: SyncSettings,
    ) -> Result<Self> {
        Self::attach_with_clock(session_id, store, channel, settings, Arc::new(SystemClock)).await
    }

    /// Attach with an explicit clock.
    ///
    /// Creates the record on first access. A failed initial read is not
    /// fatal: the timer starts stopped and converges on the first catch-up
    /// fetch or sweep.
    pub async fn attach_with_clock(
        session_id: SessionId,
        store: Arc<dyn RecordStore>,
        channel: Arc<dyn PushChannel>,
        settings: SyncSettings,
        clock: Arc<dyn Clock>,
    ) -> Result<Self> {
        settings.validate()?;

        let now = clock.now_ms();
        let state = match store.fetch_or_create(&session_id, now).await {
            Ok(record) => {
                if !record.fields().is_consistent() {
                    tracing::warn!(session = %session_id, "Repairing inconsistent timer record");
                }
                TimerStateStore::new(record.fields(), Some(now))
            }
            Err(e) => {
                tracing::warn!(session = %session_id, "Failed to load timer, starting stopped: {e}");
                let state = TimerStateStore::new(TimerFields::stopped(), None);
                state.record_warning(format!("Failed to load timer: {e}"));
                state
            }
        };

        let ctx = SyncContext {
            session_id,
            state,
            store,
            channel,
            clock,
            settings,
        };

        let (shutdown, shutdown_rx) = watch::channel(false);
        let listener = ChangeListener::new(ctx.clone());
        let sweeper = ReconciliationSweeper::new(ctx.clone(), listener.handle());
        let tasks = vec![
            listener.spawn(shutdown_rx.clone()),
            sweeper.spawn(shutdown_rx),
        ];
        let display = DisplayClock::spawn(&ctx.state, ctx.clock.clone(), settings.display_tick());

        tracing::info!(session = %ctx.session_id, "Attached to shared timer");
        Ok(Self {
            executor: CommandExecutor::new(ctx.clone()),
            ctx,
            display,
            shutdown,
            tasks,
        })
    }

    pub const fn session_id(&self) -> &SessionId {
        &self.ctx.session_id
    }

    /// Elapsed time to show right now (ms).
    pub fn display_time(&self) -> u64 {
        self.ctx.state.snapshot().display_time(self.ctx.clock.now_ms())
    }

    pub fn is_running(&self) -> bool {
        self.ctx.state.snapshot().is_running()
    }

    /// Whether a local command is still waiting for confirmation.
    pub fn is_syncing(&self) -> bool {
        self.ctx.state.snapshot().sync_in_progress
    }

    /// Start a paused timer or pause a running one.
    ///
    /// Rejected with no effect while an earlier command is still syncing.
    /// A failed write returns an error but keeps the optimistic state.
    pub async fn toggle(&self) -> Result<CommandOutcome> {
        self.executor.toggle().await
    }

    /// Stop the timer and zero it, with the same guard as [`Self::toggle`].
    pub async fn reset(&self) -> Result<CommandOutcome> {
        self.executor.reset().await
    }

    /// Copy of the full mirror state.
    pub fn snapshot(&self) -> TimerSnapshot {
        self.ctx.state.snapshot()
    }

    /// Receiver notified on every mirror transition.
    pub fn subscribe(&self) -> watch::Receiver<TimerSnapshot> {
        self.ctx.state.subscribe()
    }

    /// Receiver of display time ticks.
    pub fn display(&self) -> watch::Receiver<u64> {
        self.display.subscribe()
    }

    /// Last value published by the display clock (ms).
    pub fn displayed_time(&self) -> u64 {
        self.display.current()
    }

    /// Wait until no command is syncing.
    ///
    /// Bounded by the echo fallback window after the last successful write.
    pub async fn wait_until_synced(&self) {
        let mut changes = self.ctx.state.subscribe();
        changes.wait_for(|state| !state.sync_in_progress).await.ok();
    }

    /// Stop the background tasks and wait for them to finish.
    pub async fn close(mut self) {
        self.shutdown.send_replace(true);
        for task in std::mem::take(&mut self.tasks) {
            if let Err(e) = task.await {
                tracing::debug!(session = %self.ctx.session_id, "Sync task ended abnormally: {e}");
            }
        }
        tracing::info!(session = %self.ctx.session_id, "Detached from shared timer");
    }
}

impl Drop for SharedTimer {
    fn drop(&mut self) {
        for task in &self.tasks {
            task.abort();
        }
    }
}

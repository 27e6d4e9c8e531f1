//! Display time publisher.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::sleep;

use crate::clock::Clock;
use crate::state::TimerStateStore;

/// Publishes the elapsed time to show, recomputed from absolute timestamps.
///
/// Ticks every `tick` while the timer runs and idles on mirror changes while
/// it is paused. The task stops when the clock is dropped.
pub(crate) struct DisplayClock {
    value: watch::Receiver<u64>,
    task: JoinHandle<()>,
}

impl DisplayClock {
    pub(crate) fn spawn(state: &TimerStateStore, clock: Arc<dyn Clock>, tick: Duration) -> Self {
        let mut changes = state.subscribe();
        let initial = changes.borrow().display_time(clock.now_ms());
        let (sender, value) = watch::channel(initial);

        let task = tokio::spawn(async move {
            loop {
                let snapshot = changes.borrow_and_update().clone();
                let display_time = snapshot.display_time(clock.now_ms());
                sender.send_if_modified(|current| {
                    if *current == display_time {
                        return false;
                    }
                    *current = display_time;
                    true
                });

                let changed = if snapshot.is_running() {
                    tokio::select! {
                        changed = changes.changed() => changed,
                        () = sleep(tick) => Ok(()),
                    }
                } else {
                    changes.changed().await
                };
                if changed.is_err() {
                    break;
                }
            }
        });

        Self { value, task }
    }

    /// Latest published display time (ms).
    pub(crate) fn current(&self) -> u64 {
        *self.value.borrow()
    }

    /// Receiver notified whenever the display time changes.
    pub(crate) fn subscribe(&self) -> watch::Receiver<u64> {
        self.value.clone()
    }
}

impl Drop for DisplayClock {
    fn drop(&mut self) {
        self.task.abort();
    }
}

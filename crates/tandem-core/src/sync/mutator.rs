//! Remote writes and the echo fallback timer.

use std::sync::{Mutex, PoisonError};

use tokio::task::JoinHandle;

use super::SyncContext;
use crate::error::{Error, Result};
use crate::models::{OperationToken, TimerFields, TimerPatch, TimerRecord};

/// Issues timer patches against the remote store.
///
/// The mutator is the only writer of the pending operation token. Staging a
/// command claims it under a fresh token; a failed write releases it, and a
/// successful one leaves it for the echo or the fallback timer to clear.
pub(crate) struct RemoteMutator {
    ctx: SyncContext,
    fallback: Mutex<Option<JoinHandle<()>>>,
}

impl RemoteMutator {
    pub(crate) const fn new(ctx: SyncContext) -> Self {
        Self {
            ctx,
            fallback: Mutex::new(None),
        }
    }

    /// Generate a token and atomically stage `plan` under it.
    ///
    /// Returns `None` when another operation is still in flight.
    pub(crate) fn stage(
        &self,
        plan: impl FnOnce(TimerFields) -> TimerPatch,
    ) -> Option<(OperationToken, TimerPatch)> {
        let token = OperationToken::new();
        self.ctx
            .state
            .stage_command(token, plan)
            .map(|patch| (token, patch))
    }

    /// Write a staged patch with a fresh `updated_at`.
    ///
    /// The write is bounded by `write_timeout`. If the returned future is
    /// dropped before the write settles, the pending pair is released as
    /// for a failed write.
    pub(crate) async fn mutate(&self, token: OperationToken, patch: TimerPatch) -> Result<TimerRecord> {
        let mut in_flight = InFlightWrite::new(&self.ctx, token);
        let updated_at = self.ctx.clock.now_ms();
        let write = self
            .ctx
            .store
            .update(&self.ctx.session_id, &patch, updated_at);
        let result = match tokio::time::timeout(self.ctx.settings.write_timeout(), write).await {
            Ok(result) => result,
            Err(_) => Err(Error::Remote(format!(
                "write timed out after {} ms",
                self.ctx.settings.write_timeout_ms
            ))),
        };
        in_flight.settle();

        match result {
            Ok(record) => {
                self.arm_fallback(token);
                Ok(record)
            }
            Err(e) => {
                tracing::warn!(session = %self.ctx.session_id, %token, "Failed to save timer change: {e}");
                self.ctx
                    .state
                    .record_write_failure(token, format!("Failed to save timer change: {e}"));
                Err(Error::Remote(e.to_string()))
            }
        }
    }

    /// Force-clear the pending pair if no echo arrives in time.
    fn arm_fallback(&self, token: OperationToken) {
        if self.ctx.state.snapshot().pending_token != Some(token) {
            // Echo already handled
            return;
        }

        let state = self.ctx.state.clone();
        let session_id = self.ctx.session_id.clone();
        let window = self.ctx.settings.echo_fallback();
        let handle = tokio::spawn(async move {
            tokio::time::sleep(window).await;
            if state.expire_pending(token) {
                tracing::debug!(session = %session_id, %token, "No echo received; cleared sync state");
            }
        });

        let previous = self
            .fallback
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .replace(handle);
        if let Some(previous) = previous {
            previous.abort();
        }
    }
}

/// Releases the pending pair of a write whose future was dropped mid-flight.
struct InFlightWrite<'a> {
    ctx: &'a SyncContext,
    token: OperationToken,
    settled: bool,
}

impl<'a> InFlightWrite<'a> {
    const fn new(ctx: &'a SyncContext, token: OperationToken) -> Self {
        Self {
            ctx,
            token,
            settled: false,
        }
    }

    fn settle(&mut self) {
        self.settled = true;
    }
}

impl Drop for InFlightWrite<'_> {
    fn drop(&mut self) {
        if self.settled {
            return;
        }
        tracing::warn!(session = %self.ctx.session_id, token = %self.token, "Timer change was cancelled before it was saved");
        self.ctx.state.record_write_failure(
            self.token,
            "Timer change was cancelled before it was saved".to_string(),
        );
    }
}

impl Drop for RemoteMutator {
    fn drop(&mut self) {
        let fallback = self
            .fallback
            .get_mut()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(handle) = fallback {
            handle.abort();
        }
    }
}

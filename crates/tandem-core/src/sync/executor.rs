//! Timer commands.

use serde::Serialize;

use super::{RemoteMutator, SyncContext};
use crate::error::Result;
use crate::models::{OperationToken, TimerFields, TimerPatch};
use crate::util::non_negative_ms;

/// Why a command was not applied.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RejectReason {
    /// An earlier command is still waiting for its echo
    SyncInProgress,
}

/// Result of a `toggle` or `reset`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CommandOutcome {
    /// Applied locally and accepted by the remote store
    Applied {
        token: OperationToken,
        fields: TimerFields,
    },
    /// Ignored; local state is unchanged
    Rejected(RejectReason),
}

impl CommandOutcome {
    pub const fn is_applied(&self) -> bool {
        matches!(self, Self::Applied { .. })
    }
}

/// Applies commands optimistically, then writes them through the mutator.
pub(crate) struct CommandExecutor {
    ctx: SyncContext,
    mutator: RemoteMutator,
}

impl CommandExecutor {
    pub(crate) fn new(ctx: SyncContext) -> Self {
        let mutator = RemoteMutator::new(ctx.clone());
        Self { ctx, mutator }
    }

    /// Pause a running timer or start a paused one.
    pub(crate) async fn toggle(&self) -> Result<CommandOutcome> {
        let now = self.ctx.clock.now_ms();
        self.execute("toggle", move |fields| toggle_patch(fields, now))
            .await
    }

    /// Stop the timer and zero it.
    pub(crate) async fn reset(&self) -> Result<CommandOutcome> {
        self.execute("reset", |_| TimerPatch::reset()).await
    }

    async fn execute(
        &self,
        command: &'static str,
        plan: impl FnOnce(TimerFields) -> TimerPatch,
    ) -> Result<CommandOutcome> {
        let Some((token, patch)) = self.mutator.stage(plan) else {
            tracing::debug!(session = %self.ctx.session_id, command, "Ignoring command while a sync is in progress");
            return Ok(CommandOutcome::Rejected(RejectReason::SyncInProgress));
        };
        let fields = self.ctx.state.fields();
        tracing::debug!(session = %self.ctx.session_id, command, %token, "Applied command locally");

        self.mutator.mutate(token, patch).await?;
        Ok(CommandOutcome::Applied { token, fields })
    }
}

/// Patch that flips the running state at `now_ms`.
fn toggle_patch(fields: TimerFields, now_ms: i64) -> TimerPatch {
    match (fields.is_running, fields.start_time) {
        (true, Some(start)) => TimerPatch::pause(
            fields
                .accumulated_time
                .saturating_add(non_negative_ms(now_ms.saturating_sub(start))),
        ),
        _ => TimerPatch::start(now_ms),
    }
}

#[cfg(test)]
mod tests {
    use super::super::test_support::context;
    use super::*;
    use crate::clock::ManualClock;
    use crate::error::Error;
    use crate::remote::MemoryRemote;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_toggle_patch_from_paused_starts_now() {
        let paused = TimerFields {
            is_running: false,
            start_time: None,
            accumulated_time: 3_000,
        };
        assert_eq!(toggle_patch(paused, 42), TimerPatch::start(42));
    }

    #[test]
    fn test_toggle_patch_from_running_folds_elapsed() {
        let running = TimerFields {
            is_running: true,
            start_time: Some(1_000),
            accumulated_time: 500,
        };
        assert_eq!(toggle_patch(running, 2_250), TimerPatch::pause(1_750));
    }

    #[test]
    fn test_toggle_patch_with_future_start_adds_nothing() {
        let running = TimerFields {
            is_running: true,
            start_time: Some(5_000),
            accumulated_time: 100,
        };
        assert_eq!(toggle_patch(running, 4_000), TimerPatch::pause(100));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_toggle_applies_before_write_completes() {
        let remote = MemoryRemote::new();
        let clock = ManualClock::new(1_000);
        let ctx = context(&remote, &clock);
        let executor = CommandExecutor::new(ctx.clone());

        let outcome = executor.toggle().await.unwrap();
        let CommandOutcome::Applied { fields, .. } = outcome else {
            panic!("toggle rejected: {outcome:?}");
        };
        assert!(fields.is_running);
        assert_eq!(fields.start_time, Some(1_000));
        assert_eq!(
            remote.record(&ctx.session_id).unwrap().start_time,
            Some(1_000)
        );
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_second_command_rejected_while_pending() {
        let remote = MemoryRemote::new();
        let clock = ManualClock::new(1_000);
        let ctx = context(&remote, &clock);
        let executor = CommandExecutor::new(ctx.clone());

        assert!(executor.toggle().await.unwrap().is_applied());
        clock.advance(100);
        assert_eq!(
            executor.reset().await.unwrap(),
            CommandOutcome::Rejected(RejectReason::SyncInProgress)
        );
        assert!(ctx.state.fields().is_running);
        assert!(remote.record(&ctx.session_id).unwrap().is_running);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_reset_write_failure_surfaces_error() {
        let remote = MemoryRemote::new();
        let clock = ManualClock::new(1_000);
        let ctx = context(&remote, &clock);
        let executor = CommandExecutor::new(ctx.clone());
        remote.set_writes_fail(true);

        let result = executor.reset().await;
        assert!(matches!(result, Err(Error::Remote(_))));
        assert!(!ctx.state.snapshot().sync_in_progress);
    }
}

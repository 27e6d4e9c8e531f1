//! Push channel consumer.
//!
//! Runs the `disconnected -> connecting -> connected` state machine: each
//! successful subscribe is followed by a catch-up fetch, then events are
//! consumed until the channel fails or closes, after which the listener
//! waits out the reconnect backoff (or an explicit resubscribe request) and
//! tries again.

use std::sync::Arc;

use tokio::sync::{watch, Notify};
use tokio::task::JoinHandle;
use tokio::time::{sleep, timeout};

use super::{refresh_from_remote, SyncContext};
use crate::models::ChangeEvent;
use crate::remote::Subscription;
use crate::state::{ConnectionState, NotificationOutcome};

/// Handle used by other tasks to poke a running listener.
#[derive(Clone, Debug, Default)]
pub(crate) struct ListenerHandle {
    resubscribe: Arc<Notify>,
}

impl ListenerHandle {
    /// Skip the rest of the current backoff and try to subscribe now.
    pub(crate) fn request_resubscribe(&self) {
        self.resubscribe.notify_one();
    }

    /// Wait for the next resubscribe request.
    pub(crate) async fn resubscribe_requested(&self) {
        self.resubscribe.notified().await;
    }
}

enum StreamEnd {
    Shutdown,
    Lost,
}

pub(crate) struct ChangeListener {
    ctx: SyncContext,
    handle: ListenerHandle,
}

impl ChangeListener {
    pub(crate) fn new(ctx: SyncContext) -> Self {
        Self {
            ctx,
            handle: ListenerHandle::default(),
        }
    }

    pub(crate) fn handle(&self) -> ListenerHandle {
        self.handle.clone()
    }

    pub(crate) fn spawn(self, shutdown: watch::Receiver<bool>) -> JoinHandle<()> {
        tokio::spawn(self.run(shutdown))
    }

    async fn run(self, mut shutdown: watch::Receiver<bool>) {
        let ctx = &self.ctx;
        let mut subscribed_before = false;

        while !*shutdown.borrow() {
            ctx.state.set_connection(ConnectionState::Connecting);

            match timeout(
                ctx.settings.connect_timeout(),
                ctx.channel.subscribe(&ctx.session_id),
            )
            .await
            {
                Ok(Ok(subscription)) => {
                    if subscribed_before {
                        ctx.state.record_reconnect();
                        tracing::info!(session = %ctx.session_id, "Resubscribed to timer changes");
                    } else {
                        tracing::info!(session = %ctx.session_id, "Subscribed to timer changes");
                    }
                    subscribed_before = true;

                    // Recover anything missed while disconnected before
                    // reporting the channel as healthy.
                    refresh_from_remote(ctx).await;
                    ctx.state.set_connection(ConnectionState::Connected);

                    match self.consume(subscription, &mut shutdown).await {
                        StreamEnd::Shutdown => break,
                        StreamEnd::Lost => {}
                    }
                }
                Ok(Err(e)) => {
                    tracing::warn!(session = %ctx.session_id, "Failed to subscribe to timer changes: {e}");
                    ctx.state
                        .record_warning(format!("Failed to subscribe to timer changes: {e}"));
                }
                Err(_) => {
                    tracing::warn!(session = %ctx.session_id, "Timed out subscribing to timer changes");
                    ctx.state
                        .record_warning("Timed out subscribing to timer changes");
                }
            }

            ctx.state.set_connection(ConnectionState::Disconnected);

            tokio::select! {
                _ = shutdown.changed() => break,
                () = sleep(ctx.settings.reconnect_backoff()) => {}
                () = self.handle.resubscribe_requested() => {
                    tracing::debug!(session = %ctx.session_id, "Resubscribe requested");
                }
            }
        }

        ctx.state.set_connection(ConnectionState::Disconnected);
    }

    async fn consume(
        &self,
        mut subscription: Subscription,
        shutdown: &mut watch::Receiver<bool>,
    ) -> StreamEnd {
        let ctx = &self.ctx;
        loop {
            tokio::select! {
                _ = shutdown.changed() => return StreamEnd::Shutdown,
                item = subscription.next() => match item {
                    Some(Ok(event)) => self.handle_event(&event).await,
                    Some(Err(e)) => {
                        tracing::warn!(session = %ctx.session_id, "Timer change channel failed: {e}");
                        ctx.state.record_warning(format!("Timer change channel failed: {e}"));
                        return StreamEnd::Lost;
                    }
                    None => {
                        tracing::info!(session = %ctx.session_id, "Timer change channel closed");
                        return StreamEnd::Lost;
                    }
                },
            }
        }
    }

    async fn handle_event(&self, event: &ChangeEvent) {
        let ctx = &self.ctx;
        if event.record.session_id != ctx.session_id {
            tracing::debug!(session = %ctx.session_id, other = %event.record.session_id, "Ignoring change for another session");
            return;
        }
        if !event.record.fields().is_consistent() {
            tracing::warn!(session = %ctx.session_id, "Repairing inconsistent timer change");
        }

        match ctx.state.handle_notification(&event.record, ctx.clock.now_ms()) {
            NotificationOutcome::EchoSuppressed(token) => {
                tracing::debug!(session = %ctx.session_id, %token, "Suppressed echo of local change");
            }
            NotificationOutcome::EchoDiverged(token) => {
                tracing::info!(session = %ctx.session_id, %token, "Echo did not match local change; re-fetching");
                refresh_from_remote(ctx).await;
            }
            NotificationOutcome::Applied => {
                tracing::debug!(session = %ctx.session_id, kind = ?event.kind, "Applied remote timer change");
            }
        }
    }
}

//! Typing Debouncer
//!
//! Coalesces bursts of local keystroke signals into one trailing-edge typing
//! notice per idle window.

use std::future::Future;
use std::time::Duration;

use chat_protocol::{Event, Identity};
use tokio_util::sync::CancellationToken;
use tracing::debug;

use super::error::ClientError;

/// Where a debouncer delivers its typing events.
pub trait EventSink: Clone + Send + Sync + 'static {
    /// Identity typing notices are sent as, if one is set.
    fn local_identity(&self) -> impl Future<Output = Option<Identity>> + Send;

    /// Deliver immediately; no reconnect or retry.
    fn send_now(&self, event: Event) -> impl Future<Output = Result<(), ClientError>> + Send;
}

pub struct TypingDebouncer<S: EventSink> {
    sink: S,
    idle: Duration,
    receiver: Option<Identity>,
    /// The single outstanding timer. Each notify cancels and replaces it.
    pending: Option<CancellationToken>,
}

impl<S: EventSink> TypingDebouncer<S> {
    pub fn new(sink: S, idle: Duration) -> Self {
        Self {
            sink,
            idle,
            receiver: None,
            pending: None,
        }
    }

    pub fn set_receiver(&mut self, receiver: Option<Identity>) {
        self.receiver = receiver;
    }

    pub fn receiver(&self) -> Option<&Identity> {
        self.receiver.as_ref()
    }

    /// Record a keystroke. Restarts the idle timer; the typing event goes out
    /// only once `idle` passes with no further calls.
    ///
    /// No-op unless both a local identity and a receiver are set.
    pub async fn notify_typing(&mut self) {
        let Some(receiver) = self.receiver.clone() else {
            return;
        };
        let Some(sender) = self.sink.local_identity().await else {
            return;
        };

        if let Some(previous) = self.pending.take() {
            previous.cancel();
        }
        let cancel = CancellationToken::new();
        self.pending = Some(cancel.clone());

        let sink = self.sink.clone();
        let idle = self.idle;
        tokio::spawn(async move {
            tokio::select! {
                _ = cancel.cancelled() => {}
                _ = tokio::time::sleep(idle) => {
                    // The channel may have closed while we waited.
                    if let Err(e) = sink.send_now(Event::typing(sender, receiver)).await {
                        debug!(error = %e, "Typing notice not sent");
                    }
                }
            }
        });
    }
}

impl<S: EventSink> Drop for TypingDebouncer<S> {
    fn drop(&mut self) {
        if let Some(pending) = self.pending.take() {
            pending.cancel();
        }
    }
}

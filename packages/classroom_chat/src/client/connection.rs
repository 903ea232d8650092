//! Connection Manager
//!
//! Owns the single chat channel for the local identity: opens it, replaces it
//! when the identity changes, and renders everything that arrives on it into
//! [`LogEntry`] values for the UI.
//!
//! Reconnection is caller-driven. A closed channel stays closed until
//! [`ConnectionManager::set_identity`] is called again, except for the one
//! bounded re-establish-and-retry that [`ConnectionManager::send`] performs.

use std::sync::{Arc, Weak};
use std::sync::atomic::{AtomicU64, Ordering};

use chat_protocol::{Event, EventKind, Identity, channel_url};
use futures::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::sync::{Mutex, mpsc};
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, tungstenite};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::ClientConfig;

use super::error::ClientError;
use super::log::{LogEntry, render_inbound};
use super::typing::EventSink;

type ChannelStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Outbound frames buffered per channel
const OUTBOUND_CAPACITY: usize = 100;

/// Lifecycle of the local channel. There is no reconnecting state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Closed,
    Opening,
    Open,
}

/// Client handle for one chat channel. Cheap to clone; clones share the channel.
#[derive(Clone)]
pub struct ConnectionManager {
    shared: Arc<Shared>,
}

struct Shared {
    config: ClientConfig,
    log_tx: mpsc::UnboundedSender<LogEntry>,
    inner: Mutex<Inner>,
    next_generation: AtomicU64,
}

struct Inner {
    identity: Option<Identity>,
    state: ConnectionState,
    /// Generation of the most recent open attempt. A channel task or a
    /// connect that finishes under an older generation must not touch state.
    generation: u64,
    channel: Option<ActiveChannel>,
}

struct ActiveChannel {
    outbound: mpsc::Sender<String>,
    cancel: CancellationToken,
}

impl Drop for ActiveChannel {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

impl Shared {
    fn emit(&self, entry: LogEntry) {
        // The UI may have gone away; the log is best-effort.
        let _ = self.log_tx.send(entry);
    }
}

impl ConnectionManager {
    /// Create a manager and the receiving end of its log.
    pub fn new(config: ClientConfig) -> (Self, mpsc::UnboundedReceiver<LogEntry>) {
        let (log_tx, log_rx) = mpsc::unbounded_channel();
        let manager = Self {
            shared: Arc::new(Shared {
                config,
                log_tx,
                inner: Mutex::new(Inner {
                    identity: None,
                    state: ConnectionState::Closed,
                    generation: 0,
                    channel: None,
                }),
                next_generation: AtomicU64::new(1),
            }),
        };
        (manager, log_rx)
    }

    /// Point the channel at `id`.
    ///
    /// Empty ids are ignored. Re-selecting the identity whose channel is
    /// already open (or opening) is a no-op. Anything else closes the current
    /// channel and opens a new one addressed by `id`.
    pub async fn set_identity(&self, id: &str) -> Result<(), ClientError> {
        if id.is_empty() {
            debug!("Ignoring empty identity");
            return Ok(());
        }
        let identity = Identity::new(id)?;

        let generation = {
            let mut inner = self.shared.inner.lock().await;
            if inner.identity.as_ref() == Some(&identity)
                && inner.state != ConnectionState::Closed
            {
                debug!(identity = %identity, "Channel already open for identity");
                return Ok(());
            }
            // Dropping the old channel cancels it
            inner.channel = None;
            let generation = self.shared.next_generation.fetch_add(1, Ordering::SeqCst);
            inner.identity = Some(identity.clone());
            inner.state = ConnectionState::Opening;
            inner.generation = generation;
            generation
        };

        let url = channel_url(&self.shared.config.server_url, &identity);
        debug!(identity = %identity, url = %url, "Opening chat channel");
        let connected = tokio_tungstenite::connect_async(&url).await;

        let mut inner = self.shared.inner.lock().await;
        if inner.generation != generation {
            // A newer set_identity or close() won; dropping the stream closes it.
            debug!(identity = %identity, "Channel open superseded before it completed");
            return Ok(());
        }

        let stream = match connected {
            Ok((stream, _)) => stream,
            Err(e) => {
                inner.state = ConnectionState::Closed;
                warn!(identity = %identity, error = %e, "Failed to open chat channel");
                return Err(ClientError::from_tungstenite(e));
            }
        };

        let (outbound_tx, outbound_rx) = mpsc::channel(OUTBOUND_CAPACITY);
        let cancel = CancellationToken::new();
        inner.channel = Some(ActiveChannel {
            outbound: outbound_tx,
            cancel: cancel.clone(),
        });
        inner.state = ConnectionState::Open;
        drop(inner);

        info!(identity = %identity, "Chat channel open");
        self.shared.emit(LogEntry::connected());
        tokio::spawn(run_channel(
            Arc::downgrade(&self.shared),
            self.shared.log_tx.clone(),
            generation,
            identity,
            stream,
            outbound_rx,
            cancel,
        ));
        Ok(())
    }

    /// The identity the channel is (or was last) addressed by.
    pub async fn identity(&self) -> Option<Identity> {
        self.shared.inner.lock().await.identity.clone()
    }

    #[allow(dead_code)]
    pub async fn state(&self) -> ConnectionState {
        self.shared.inner.lock().await.state
    }

    /// Send on the open channel without any recovery.
    pub async fn try_send(&self, event: &Event) -> Result<(), ClientError> {
        let outbound = {
            let inner = self.shared.inner.lock().await;
            match (&inner.state, &inner.channel) {
                (ConnectionState::Open, Some(channel)) => channel.outbound.clone(),
                _ => return Err(ClientError::NotConnected),
            }
        };
        let frame = event.encode()?;
        outbound
            .send(frame)
            .await
            .map_err(|_| ClientError::NotConnected)
    }

    /// Send `event`, re-establishing the channel once if it is not open.
    ///
    /// On `NotConnected` the channel is reopened for the current identity
    /// (or the event's sender when none has been set) and the send is retried
    /// a single time after the configured delay. A second failure drops the
    /// event and is returned to the caller.
    pub async fn send(&self, event: Event) -> Result<(), ClientError> {
        match self.try_send(&event).await {
            Err(ClientError::NotConnected) => {
                let reconnect_as = self
                    .identity()
                    .await
                    .unwrap_or_else(|| event.sender_id.clone());
                debug!(identity = %reconnect_as, "Channel not open, reconnecting before retry");
                if let Err(e) = self.set_identity(reconnect_as.as_str()).await {
                    debug!(error = %e, "Reconnect before retry failed");
                }
                tokio::time::sleep(self.shared.config.retry_delay).await;
                if let Err(e) = self.try_send(&event).await {
                    warn!(sender = %event.sender_id, error = %e, "Dropping event after retry");
                    return Err(e);
                }
            }
            Err(e) => return Err(e),
            Ok(()) => {}
        }

        if self.shared.config.local_echo {
            if let EventKind::Message(text) = event.kind() {
                self.shared
                    .emit(LogEntry::sent(event.sender_id.clone(), text));
            }
        }
        Ok(())
    }

    /// Close the channel. The identity is kept; `set_identity` reopens it.
    pub async fn close(&self) {
        let mut inner = self.shared.inner.lock().await;
        inner.channel = None;
        inner.generation = self.shared.next_generation.fetch_add(1, Ordering::SeqCst);
        inner.state = ConnectionState::Closed;
    }
}

impl EventSink for ConnectionManager {
    async fn local_identity(&self) -> Option<Identity> {
        self.identity().await
    }

    async fn send_now(&self, event: Event) -> Result<(), ClientError> {
        self.try_send(&event).await
    }
}

/// Pump one channel until it closes, is cancelled, or fails.
///
/// Holds only a weak handle on the manager, so dropping the last
/// `ConnectionManager` closes the channel.
async fn run_channel(
    shared: Weak<Shared>,
    log_tx: mpsc::UnboundedSender<LogEntry>,
    generation: u64,
    identity: Identity,
    stream: ChannelStream,
    mut outbound: mpsc::Receiver<String>,
    cancel: CancellationToken,
) {
    let (mut ws_write, mut ws_read) = stream.split();

    loop {
        tokio::select! {
            _ = cancel.cancelled() => {
                let _ = ws_write.send(tungstenite::Message::Close(None)).await;
                break;
            }
            frame = outbound.recv() => match frame {
                Some(frame) => {
                    if let Err(e) = ws_write.send(tungstenite::Message::Text(frame.into())).await {
                        warn!(identity = %identity, error = %e, "Failed to write to chat channel");
                        break;
                    }
                }
                None => {
                    let _ = ws_write.send(tungstenite::Message::Close(None)).await;
                    break;
                }
            },
            inbound = ws_read.next() => match inbound {
                Some(Ok(tungstenite::Message::Text(text))) => {
                    let _ = log_tx.send(render_inbound(text.as_str(), Some(&identity)));
                }
                Some(Ok(tungstenite::Message::Close(_))) | None => break,
                Some(Ok(_)) => {}
                Some(Err(e)) => {
                    debug!(identity = %identity, error = %e, "Chat channel read failed");
                    break;
                }
            },
        }
    }

    if let Some(shared) = shared.upgrade() {
        let mut inner = shared.inner.lock().await;
        if inner.generation == generation {
            inner.state = ConnectionState::Closed;
            inner.channel = None;
        }
    }
    info!(identity = %identity, "Chat channel closed");
    let _ = log_tx.send(LogEntry::closed());
}

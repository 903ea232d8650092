//! Identity → channel registry
//!
//! The only shared mutable state on the router. Each registration gets a
//! fresh [`ChannelId`]; removal compares that id rather than the identity, so
//! a slow-closing superseded channel can never evict its replacement.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};

use chat_protocol::Identity;
use tokio::sync::{RwLock, mpsc};
use tokio_util::sync::CancellationToken;
use tracing::info;

/// Unique id of one registered channel
#[derive(Clone, Copy, Debug, Hash, Eq, PartialEq)]
pub struct ChannelId(pub u64);

impl std::fmt::Display for ChannelId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "ch-{}", self.0)
    }
}

struct RegisteredChannel {
    id: ChannelId,
    outbound: mpsc::Sender<String>,
    cancel: CancellationToken,
}

/// Result of registering a channel
#[derive(Debug)]
pub struct Registration {
    pub channel_id: ChannelId,
    /// Fires when a newer channel for the same identity replaces this one.
    pub cancel: CancellationToken,
    /// The channel this registration replaced, already told to close.
    pub superseded: Option<ChannelId>,
}

pub struct ChannelRegistry {
    channels: RwLock<HashMap<Identity, RegisteredChannel>>,
    next_id: AtomicU64,
}

impl Default for ChannelRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl ChannelRegistry {
    pub fn new() -> Self {
        Self {
            channels: RwLock::new(HashMap::new()),
            next_id: AtomicU64::new(1),
        }
    }

    /// Register `outbound` as the channel for `identity`, last writer wins.
    pub async fn register(
        &self,
        identity: Identity,
        outbound: mpsc::Sender<String>,
    ) -> Registration {
        let channel_id = ChannelId(self.next_id.fetch_add(1, Ordering::SeqCst));
        let cancel = CancellationToken::new();

        let previous = self.channels.write().await.insert(
            identity.clone(),
            RegisteredChannel {
                id: channel_id,
                outbound,
                cancel: cancel.clone(),
            },
        );

        let superseded = previous.map(|old| {
            old.cancel.cancel();
            info!(
                identity = %identity,
                old = %old.id,
                new = %channel_id,
                "Channel superseded by reconnect"
            );
            old.id
        });

        Registration {
            channel_id,
            cancel,
            superseded,
        }
    }

    /// Remove the entry for `identity` only if it is still `channel_id`.
    /// Returns whether anything was removed.
    pub async fn unregister(&self, identity: &Identity, channel_id: ChannelId) -> bool {
        let mut channels = self.channels.write().await;
        match channels.get(identity) {
            Some(entry) if entry.id == channel_id => {
                channels.remove(identity);
                true
            }
            _ => false,
        }
    }

    /// Outbound queue of the channel currently open for `identity`.
    pub async fn lookup(&self, identity: &Identity) -> Option<mpsc::Sender<String>> {
        self.channels
            .read()
            .await
            .get(identity)
            .map(|entry| entry.outbound.clone())
    }

    #[allow(dead_code)]
    pub async fn current(&self, identity: &Identity) -> Option<ChannelId> {
        self.channels.read().await.get(identity).map(|entry| entry.id)
    }

    /// Identities with an open channel, sorted.
    pub async fn online(&self) -> Vec<Identity> {
        let mut online: Vec<Identity> = self.channels.read().await.keys().cloned().collect();
        online.sort();
        online
    }

    pub async fn len(&self) -> usize {
        self.channels.read().await.len()
    }
}

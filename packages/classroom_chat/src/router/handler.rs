//! Per-channel connection handler and event routing.

use std::sync::Arc;

use axum::extract::ws::{CloseFrame, Message, Utf8Bytes, WebSocket, close_code};
use chat_protocol::{Event, EventKind, Identity, peek_receiver};
use futures::{sink::SinkExt, stream::StreamExt};
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tracing::{debug, info, warn};

use crate::config::ServerConfig;
use crate::metrics::ServerMetrics;

use super::registry::ChannelRegistry;

/// Sent back to a client whose frame could not be read as an event.
const INVALID_EVENT_NOTICE: &str = r#"{"error":"invalid event"}"#;

/// What happened to one inbound frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RouteOutcome {
    /// Queued on the recipient's channel.
    Delivered { to: Identity },
    /// No open channel for the recipient (or no recipient named).
    NoRoute { to: Option<Identity> },
    /// Recipient is connected but its outbound buffer is full.
    Dropped { to: Identity },
    /// Not a JSON object.
    Invalid(String),
}

/// Forward `raw` untouched to the channel of its `receiver_id`.
pub async fn route_frame(registry: &ChannelRegistry, raw: &str) -> RouteOutcome {
    let to = match peek_receiver(raw) {
        Ok(Some(to)) => to,
        Ok(None) => return RouteOutcome::NoRoute { to: None },
        Err(e) => return RouteOutcome::Invalid(e.to_string()),
    };

    let Some(outbound) = registry.lookup(&to).await else {
        return RouteOutcome::NoRoute { to: Some(to) };
    };

    match outbound.try_send(raw.to_string()) {
        Ok(()) => RouteOutcome::Delivered { to },
        Err(TrySendError::Full(_)) => RouteOutcome::Dropped { to },
        // Recipient is mid-close; same as not connected
        Err(TrySendError::Closed(_)) => RouteOutcome::NoRoute { to: Some(to) },
    }
}

fn is_message_event(raw: &str) -> bool {
    Event::decode(raw)
        .map(|event| matches!(event.kind(), EventKind::Message(_)))
        .unwrap_or(false)
}

/// Serve one chat channel for `identity` until it closes, errors, or is
/// superseded by a reconnect under the same identity.
pub async fn handle_channel(
    socket: WebSocket,
    identity: Identity,
    registry: Arc<ChannelRegistry>,
    metrics: Arc<ServerMetrics>,
    config: Arc<ServerConfig>,
) {
    let (mut ws_sender, mut ws_receiver) = socket.split();

    // Channel for sending frames to the WebSocket
    let (tx, mut rx) = mpsc::channel::<String>(config.send_channel_capacity);

    let registration = registry.register(identity.clone(), tx.clone()).await;
    let channel_id = registration.channel_id;
    metrics.connection_opened();
    if registration.superseded.is_some() {
        metrics.connection_superseded();
    }
    info!(identity = %identity, channel = %channel_id, "Chat channel opened");

    // Task to send frames to the WebSocket
    let cancel = registration.cancel.clone();
    let sender_task = async move {
        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    let _ = ws_sender
                        .send(Message::Close(Some(CloseFrame {
                            code: close_code::NORMAL,
                            reason: Utf8Bytes::from_static("superseded"),
                        })))
                        .await;
                    break;
                }
                frame = rx.recv() => match frame {
                    Some(text) => {
                        if ws_sender.send(Message::Text(text.into())).await.is_err() {
                            break;
                        }
                    }
                    None => break,
                },
            }
        }
    };

    // Task to route incoming frames, one at a time in arrival order
    let input_task = async {
        while let Some(msg) = ws_receiver.next().await {
            match msg {
                Ok(Message::Text(text)) => {
                    metrics.event_received();
                    let raw = text.as_str();
                    match route_frame(&registry, raw).await {
                        RouteOutcome::Delivered { to } => {
                            metrics.event_routed();
                            debug!(from = %identity, to = %to, "Event routed");
                        }
                        RouteOutcome::NoRoute { to } => {
                            metrics.event_unroutable();
                            debug!(
                                from = %identity,
                                to = to.as_ref().map(Identity::as_str).unwrap_or("<none>"),
                                "Recipient not connected, event discarded"
                            );
                        }
                        RouteOutcome::Dropped { to } => {
                            metrics.event_dropped();
                            warn!(from = %identity, to = %to, "Recipient backlogged, event dropped");
                        }
                        RouteOutcome::Invalid(reason) => {
                            metrics.event_malformed();
                            warn!(from = %identity, reason = %reason, "Malformed frame");
                            let _ = tx.try_send(INVALID_EVENT_NOTICE.to_string());
                            continue;
                        }
                    }
                    if config.echo_to_sender && is_message_event(raw) {
                        let _ = tx.try_send(raw.to_string());
                    }
                }
                Ok(Message::Binary(_)) => {
                    debug!(identity = %identity, "Binary frames not supported");
                }
                Ok(Message::Close(_)) => break,
                Ok(_) => {}
                Err(e) => {
                    debug!(identity = %identity, error = %e, "Chat channel read failed");
                    break;
                }
            }
        }
    };

    tokio::select! {
        _ = sender_task => {
            debug!(identity = %identity, channel = %channel_id, "Sender side ended");
        }
        _ = input_task => {
            debug!(identity = %identity, channel = %channel_id, "Receiver side ended");
        }
    }

    metrics.connection_closed();
    if registry.unregister(&identity, channel_id).await {
        info!(identity = %identity, channel = %channel_id, "Chat channel closed");
    } else {
        info!(
            identity = %identity,
            channel = %channel_id,
            "Superseded chat channel closed, newer registration kept"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn id(s: &str) -> Identity {
        Identity::new(s).unwrap()
    }

    #[tokio::test]
    async fn delivers_frame_verbatim() {
        let registry = ChannelRegistry::new();
        let (tx, mut rx) = mpsc::channel(4);
        registry.register(id("u2"), tx).await;

        let raw = r#"{"sender_id":"u1","receiver_id":"u2","msg":"hi","typing":false}"#;
        assert_eq!(
            route_frame(&registry, raw).await,
            RouteOutcome::Delivered { to: id("u2") }
        );
        assert_eq!(rx.recv().await.unwrap(), raw);
    }

    #[tokio::test]
    async fn forwards_regardless_of_payload_shape() {
        let registry = ChannelRegistry::new();
        let (tx, mut rx) = mpsc::channel(4);
        registry.register(id("u2"), tx).await;

        let raw = r#"{"receiver_id":"u2","note":[1,2,3]}"#;
        assert_eq!(
            route_frame(&registry, raw).await,
            RouteOutcome::Delivered { to: id("u2") }
        );
        assert_eq!(rx.recv().await.unwrap(), raw);
    }

    #[tokio::test]
    async fn unknown_recipient_is_no_route() {
        let registry = ChannelRegistry::new();
        let raw = r#"{"sender_id":"u1","receiver_id":"ghost","msg":"hi"}"#;
        assert_eq!(
            route_frame(&registry, raw).await,
            RouteOutcome::NoRoute {
                to: Some(id("ghost"))
            }
        );
    }

    #[tokio::test]
    async fn missing_recipient_is_no_route() {
        let registry = ChannelRegistry::new();
        assert_eq!(
            route_frame(&registry, r#"{"sender_id":"u1","msg":"hi"}"#).await,
            RouteOutcome::NoRoute { to: None }
        );
    }

    #[tokio::test]
    async fn full_outbound_drops() {
        let registry = ChannelRegistry::new();
        let (tx, _rx) = mpsc::channel(1);
        registry.register(id("u2"), tx).await;

        let raw = r#"{"sender_id":"u1","receiver_id":"u2","msg":"hi"}"#;
        assert!(matches!(
            route_frame(&registry, raw).await,
            RouteOutcome::Delivered { .. }
        ));
        assert_eq!(
            route_frame(&registry, raw).await,
            RouteOutcome::Dropped { to: id("u2") }
        );
    }

    #[tokio::test]
    async fn closed_outbound_is_no_route() {
        let registry = ChannelRegistry::new();
        let (tx, rx) = mpsc::channel(1);
        registry.register(id("u2"), tx).await;
        drop(rx);

        let raw = r#"{"sender_id":"u1","receiver_id":"u2","msg":"hi"}"#;
        assert!(matches!(
            route_frame(&registry, raw).await,
            RouteOutcome::NoRoute { to: Some(_) }
        ));
    }

    #[tokio::test]
    async fn non_object_is_invalid() {
        let registry = ChannelRegistry::new();
        assert!(matches!(
            route_frame(&registry, "hello?").await,
            RouteOutcome::Invalid(_)
        ));
    }

    #[test]
    fn message_detection_for_echo() {
        assert!(is_message_event(
            r#"{"sender_id":"u1","receiver_id":"u2","msg":"hi"}"#
        ));
        assert!(!is_message_event(
            r#"{"sender_id":"u1","receiver_id":"u2","typing":true}"#
        ));
        assert!(!is_message_event("nope"));
    }
}

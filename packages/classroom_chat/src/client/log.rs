//! Rendered chat log entries handed to the UI.

use std::fmt;

use chat_protocol::{Event, EventKind, Identity};
use tracing::debug;

const NOTICE_CONNECTED: &str = "Connected";
const NOTICE_CLOSED: &str = "Closed";

/// One item of the append-only chat log.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LogEntry {
    /// Local lifecycle notice (channel opened/closed).
    System(String),
    /// Transient "is typing" notice.
    Typing { sender: Identity },
    /// A chat message. `from_self` renders the sender as "You".
    Message {
        sender: Identity,
        from_self: bool,
        text: String,
    },
    /// A frame that could not be read as an event, shown verbatim.
    Raw(String),
}

impl LogEntry {
    pub fn connected() -> Self {
        Self::System(NOTICE_CONNECTED.to_string())
    }

    pub fn closed() -> Self {
        Self::System(NOTICE_CLOSED.to_string())
    }

    pub fn sent(sender: Identity, text: impl Into<String>) -> Self {
        Self::Message {
            sender,
            from_self: true,
            text: text.into(),
        }
    }
}

impl fmt::Display for LogEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::System(notice) => write!(f, "System: {notice}"),
            Self::Typing { sender } => write!(f, "{sender} is typing..."),
            Self::Message {
                from_self: true,
                text,
                ..
            } => write!(f, "You: {text}"),
            Self::Message { sender, text, .. } => write!(f, "{sender}: {text}"),
            Self::Raw(raw) => f.write_str(raw),
        }
    }
}

/// Turn one inbound frame into a log entry. Never fails: anything that is
/// not a readable event comes back as [`LogEntry::Raw`].
pub fn render_inbound(raw: &str, local: Option<&Identity>) -> LogEntry {
    let event = match Event::decode(raw) {
        Ok(event) => event,
        Err(e) => {
            debug!(error = %e, "Inbound frame is not an event, showing it verbatim");
            return LogEntry::Raw(raw.to_string());
        }
    };

    match event.kind() {
        EventKind::Typing => LogEntry::Typing {
            sender: event.sender_id,
        },
        EventKind::Message(text) => {
            let text = text.to_string();
            LogEntry::Message {
                from_self: local == Some(&event.sender_id),
                sender: event.sender_id,
                text,
            }
        }
        EventKind::Empty => LogEntry::Raw(raw.to_string()),
    }
}

//! Message Router
//!
//! Accepts one chat channel per identity and forwards each inbound event,
//! byte-for-byte, to the channel of its `receiver_id`. Events for recipients
//! without an open channel are discarded.

mod handler;
mod registry;

pub use handler::handle_channel;
pub use registry::ChannelRegistry;

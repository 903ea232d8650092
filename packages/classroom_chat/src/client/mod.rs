//! Chat client
//!
//! - [`ConnectionManager`]: one channel per local identity, with a single
//!   bounded reconnect-and-retry on send
//! - [`TypingDebouncer`]: trailing-edge coalescing of typing notices
//! - `LogEntry`: what the UI renders for each inbound frame and local notice

mod connection;
mod error;
mod log;
mod typing;

pub use connection::ConnectionManager;
#[cfg(test)]
pub use connection::ConnectionState;
#[cfg(test)]
pub use log::LogEntry;
pub use typing::TypingDebouncer;

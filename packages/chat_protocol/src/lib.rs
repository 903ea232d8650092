//! Wire format and participant identities for the classroom chat channel.
//!
//! Every frame on a chat channel is one flat JSON object:
//!
//! ```json
//! {"sender_id": "u1", "receiver_id": "u2", "msg": "hi"}
//! {"sender_id": "u1", "receiver_id": "u2", "typing": true}
//! ```
//!
//! Clients connect to `<base>/<identity>`; the server reads the identity back
//! from the final path segment.

pub mod error;
pub mod event;
pub mod identity;

pub use error::ProtocolError;
pub use event::{Event, EventKind, peek_receiver};
pub use identity::{Identity, channel_url};

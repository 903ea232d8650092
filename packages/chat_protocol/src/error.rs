//! Protocol errors.

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ProtocolError {
    #[error("identity is empty")]
    EmptyIdentity,

    #[error("invalid identity {identity:?}: {reason}")]
    InvalidIdentity { identity: String, reason: String },

    #[error("malformed event: {0}")]
    Malformed(String),
}

impl From<serde_json::Error> for ProtocolError {
    fn from(err: serde_json::Error) -> Self {
        Self::Malformed(err.to_string())
    }
}

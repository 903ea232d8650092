use chat_protocol::ProtocolError;
use tokio_tungstenite::tungstenite;

/// Failures surfaced by the client side of a chat channel. None of these are
/// fatal; callers log them and carry on.
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error("channel is not open")]
    NotConnected,

    #[error("chat server is unavailable")]
    Unavailable,

    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl ClientError {
    pub fn from_tungstenite(err: tungstenite::Error) -> Self {
        let is_connect = match &err {
            tungstenite::Error::Io(io_err) => matches!(
                io_err.kind(),
                std::io::ErrorKind::ConnectionRefused
                    | std::io::ErrorKind::ConnectionReset
                    | std::io::ErrorKind::ConnectionAborted
            ),
            _ => false,
        };
        if is_connect {
            Self::Unavailable
        } else {
            Self::Other(err.into())
        }
    }
}

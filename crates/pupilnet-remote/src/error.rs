use pupilnet_codec::{DecodeError, EncodeError};
use pupilnet_transport::TransportError;

/// Errors that can occur on the control and streaming channels.
#[derive(Debug, thiserror::Error)]
pub enum RemoteError {
    /// The operation needs a connected channel.
    #[error("{0} is not connected")]
    NotConnected(&'static str),

    /// The lock-step request/reply order would be broken.
    #[error("protocol violation: {0}")]
    ProtocolViolation(String),

    /// A control reply could not be interpreted.
    #[error("unexpected reply to {command}: {reply:?}")]
    Parse { command: String, reply: String },

    /// A telemetry payload is not valid MessagePack.
    #[error("decode error: {0}")]
    Decode(#[from] DecodeError),

    /// A notification record could not be encoded.
    #[error("encode error: {0}")]
    Encode(#[from] EncodeError),

    /// Transport-level error.
    #[error("transport error: {0}")]
    Transport(#[from] TransportError),

    /// Client configuration could not be loaded.
    #[error("invalid configuration: {0}")]
    Config(String),

    /// JSON serialization/deserialization error.
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

impl RemoteError {
    /// Whether this error is a request timeout on the control channel.
    pub fn is_timeout(&self) -> bool {
        matches!(self, RemoteError::Transport(TransportError::Timeout(_)))
    }
}

pub type Result<T> = std::result::Result<T, RemoteError>;

use std::time::Duration;

/// Errors that can occur in socket transport operations.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// Failed to open or connect a socket to the endpoint.
    #[error("failed to connect to {endpoint}: {source}")]
    Connect {
        endpoint: String,
        source: std::io::Error,
    },

    /// Failed to apply a socket option.
    #[error("failed to set socket option {option}: {source}")]
    Configure {
        option: &'static str,
        source: std::io::Error,
    },

    /// An I/O error occurred while sending or receiving.
    #[error("transport I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// No reply arrived within the configured receive timeout.
    #[error("no reply within {0:?}")]
    Timeout(Duration),

    /// The transport was shut down while an operation was pending.
    #[error("transport shut down")]
    Shutdown,

    /// The shared context has already been terminated.
    #[error("transport context terminated")]
    ContextTerminated,
}

pub type Result<T> = std::result::Result<T, TransportError>;

use std::fmt;
use std::io;

use pupilnet_remote::RemoteError;
use pupilnet_transport::TransportError;

// Exit codes follow the sysexits-style convention used across our CLIs.
pub const SUCCESS: i32 = 0;
pub const FAILURE: i32 = 1;
pub const TRANSPORT_ERROR: i32 = 3;
pub const DATA_INVALID: i32 = 60;
pub const USAGE: i32 = 64;
pub const TIMEOUT: i32 = 124;
pub const INTERNAL: i32 = 125;

pub type CliResult<T> = Result<T, CliError>;

#[derive(Debug)]
pub struct CliError {
    pub code: i32,
    pub message: String,
}

impl CliError {
    pub fn new(code: i32, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for CliError {}

pub fn io_error(context: &str, err: io::Error) -> CliError {
    let code = match err.kind() {
        io::ErrorKind::TimedOut | io::ErrorKind::WouldBlock => TIMEOUT,
        io::ErrorKind::ConnectionRefused | io::ErrorKind::PermissionDenied => FAILURE,
        _ => TRANSPORT_ERROR,
    };
    CliError::new(code, format!("{context}: {err}"))
}

pub fn transport_error(context: &str, err: TransportError) -> CliError {
    match err {
        TransportError::Connect { source, .. } | TransportError::Io(source) => {
            io_error(context, source)
        }
        TransportError::Timeout(_) => CliError::new(TIMEOUT, format!("{context}: {err}")),
        other => CliError::new(TRANSPORT_ERROR, format!("{context}: {other}")),
    }
}

pub fn remote_error(context: &str, err: RemoteError) -> CliError {
    match err {
        RemoteError::Transport(err) => transport_error(context, err),
        RemoteError::Parse { .. } | RemoteError::Decode(_) | RemoteError::Encode(_) => {
            CliError::new(DATA_INVALID, format!("{context}: {err}"))
        }
        RemoteError::Config(_) | RemoteError::Json(_) => {
            CliError::new(USAGE, format!("{context}: {err}"))
        }
        RemoteError::NotConnected(_) => CliError::new(FAILURE, format!("{context}: {err}")),
        other => CliError::new(INTERNAL, format!("{context}: {other}")),
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use pupilnet_codec::DecodeError;

    use super::*;

    #[test]
    fn timeouts_map_to_124() {
        let err = remote_error(
            "request failed",
            RemoteError::Transport(TransportError::Timeout(Duration::from_secs(1))),
        );
        assert_eq!(err.code, TIMEOUT);
        assert!(err.message.starts_with("request failed: "));
    }

    #[test]
    fn bad_replies_and_payloads_are_data_invalid() {
        let parse = RemoteError::Parse {
            command: "SUB_PORT".to_string(),
            reply: "abc".to_string(),
        };
        assert_eq!(remote_error("x", parse).code, DATA_INVALID);

        let decode = RemoteError::Decode(DecodeError::ReservedMarker { offset: 0 });
        assert_eq!(remote_error("x", decode).code, DATA_INVALID);
    }

    #[test]
    fn transport_failures_map_to_3() {
        assert_eq!(
            transport_error("x", TransportError::ContextTerminated).code,
            TRANSPORT_ERROR
        );
        assert_eq!(
            transport_error("x", TransportError::Shutdown).code,
            TRANSPORT_ERROR
        );
    }

    #[test]
    fn config_errors_are_usage() {
        let err = remote_error("x", RemoteError::Config("host must not be empty".into()));
        assert_eq!(err.code, USAGE);
    }

    #[test]
    fn lock_step_violation_is_internal() {
        let err = remote_error("x", RemoteError::ProtocolViolation("busy".into()));
        assert_eq!(err.code, INTERNAL);
    }
}

//! Error types for peripheral operations.

use sense_protocol::{CommandKind, DeviceErrorCode, ProtocolError, WifiConnectUpdate};
use thiserror::Error;
use tracing::warn;

use crate::transport::TransportError;

/// Result type for peripheral operations.
pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Reasons a Wi-Fi credential is rejected before anything is sent.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    /// A secured network was given no credential.
    #[error("a password is required for secured networks")]
    EmptyCredential,

    /// A legacy WEP key is not valid hex.
    #[error("WEP key is not valid hex: {0}")]
    MalformedCredential(String),

    /// A legacy WEP key contains a zero byte, which the firmware treats as a terminator.
    #[error("WEP key contains a zero byte")]
    CredentialContainsTerminator,
}

/// Every failure an operation can resolve with.
#[derive(Error, Debug)]
pub enum Error {
    /// Another command is pending.
    #[error("peripheral is busy with another command")]
    Busy,

    /// The link dropped while a command was pending.
    #[error("connection to peripheral lost")]
    ConnectionLost,

    /// The operation hit its deadline (locally or as reported by the device).
    #[error("operation timed out")]
    OperationTimedOut,

    /// The device answered with an error code.
    #[error("device reported error: {0}")]
    DeviceReportedError(DeviceErrorCode),

    /// The device answered with a different kind than expected.
    #[error("unexpected response: expected {expected}, got {actual}")]
    UnexpectedResponse {
        /// Kind of the command sent.
        expected: CommandKind,
        /// Kind of the response received.
        actual: CommandKind,
    },

    /// A response could not be reassembled or decoded.
    #[error("protocol framing error: {0}")]
    ProtocolFraming(#[from] ProtocolError),

    /// A Wi-Fi credential was rejected before sending.
    #[error("invalid credential: {0}")]
    Validation(#[from] ValidationError),

    /// The device reported a Wi-Fi connection state that will not recover.
    #[error("Wi-Fi connection failed: {status}")]
    WifiConnect {
        /// Status the device reported.
        status: WifiConnectUpdate,
        /// Teardown failure that followed, if any.
        #[source]
        cause: Option<Box<Error>>,
    },

    /// A transport operation failed for a reason other than connection loss or timeout.
    #[error("{operation} failed: {source}")]
    Transport {
        /// Transport operation that failed.
        operation: &'static str,
        /// Underlying failure.
        #[source]
        source: TransportError,
    },
}

/// The closed set of error kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// See [`Error::Busy`].
    Busy,
    /// See [`Error::ConnectionLost`].
    ConnectionLost,
    /// See [`Error::OperationTimedOut`].
    OperationTimedOut,
    /// See [`Error::DeviceReportedError`].
    DeviceReportedError,
    /// See [`Error::UnexpectedResponse`].
    UnexpectedResponse,
    /// See [`Error::ProtocolFraming`].
    ProtocolFraming,
    /// See [`Error::Validation`].
    Validation,
    /// See [`Error::WifiConnect`].
    WifiConnect,
    /// See [`Error::Transport`].
    Transport,
}

impl ErrorKind {
    /// Short snake_case name, used as a metric label.
    pub const fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::Busy => "busy",
            ErrorKind::ConnectionLost => "connection_lost",
            ErrorKind::OperationTimedOut => "operation_timed_out",
            ErrorKind::DeviceReportedError => "device_reported_error",
            ErrorKind::UnexpectedResponse => "unexpected_response",
            ErrorKind::ProtocolFraming => "protocol_framing",
            ErrorKind::Validation => "validation",
            ErrorKind::WifiConnect => "wifi_connect",
            ErrorKind::Transport => "transport",
        }
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Error {
    /// Get the kind of this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::Busy => ErrorKind::Busy,
            Error::ConnectionLost => ErrorKind::ConnectionLost,
            Error::OperationTimedOut => ErrorKind::OperationTimedOut,
            Error::DeviceReportedError(_) => ErrorKind::DeviceReportedError,
            Error::UnexpectedResponse { .. } => ErrorKind::UnexpectedResponse,
            Error::ProtocolFraming(_) => ErrorKind::ProtocolFraming,
            Error::Validation(_) => ErrorKind::Validation,
            Error::WifiConnect { .. } => ErrorKind::WifiConnect,
            Error::Transport { .. } => ErrorKind::Transport,
        }
    }

    /// Attach a teardown failure that followed this error.
    ///
    /// Only Wi-Fi connect errors carry a nested cause; for every other kind
    /// the teardown failure is logged and dropped.
    pub fn with_cause(self, teardown: Error) -> Self {
        match self {
            Error::WifiConnect {
                status,
                cause: None,
            } => Error::WifiConnect {
                status,
                cause: Some(Box::new(teardown)),
            },
            other => {
                warn!("dropping teardown failure after {}: {}", other.kind(), teardown);
                other
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sense_protocol::WifiConnectionState;

    #[test]
    fn test_error_kinds() {
        assert_eq!(Error::Busy.kind(), ErrorKind::Busy);
        assert_eq!(
            Error::from(ValidationError::EmptyCredential).kind(),
            ErrorKind::Validation
        );
        assert_eq!(
            Error::from(ProtocolError::InvalidUtf8).kind(),
            ErrorKind::ProtocolFraming
        );
    }

    #[test]
    fn test_wifi_error_keeps_cause() {
        let status = WifiConnectUpdate::new(WifiConnectionState::SslFail);
        let err = Error::WifiConnect {
            status,
            cause: None,
        }
        .with_cause(Error::ConnectionLost);
        match err {
            Error::WifiConnect { cause: Some(cause), .. } => {
                assert_eq!(cause.kind(), ErrorKind::ConnectionLost)
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_other_errors_drop_cause() {
        let err = Error::OperationTimedOut.with_cause(Error::ConnectionLost);
        assert_eq!(err.kind(), ErrorKind::OperationTimedOut);
    }
}

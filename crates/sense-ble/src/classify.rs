//! Mapping of device codes and transport failures into [`Error`].

use sense_protocol::{CommandKind, DeviceErrorCode, Response};

use crate::error::Error;
use crate::transport::TransportError;

/// Map a device error code.
pub fn device_error(code: DeviceErrorCode) -> Error {
    match code {
        DeviceErrorCode::TimedOut => Error::OperationTimedOut,
        code => Error::DeviceReportedError(code),
    }
}

/// Map a transport failure from the named operation.
pub fn transport_error(operation: &'static str, error: TransportError) -> Error {
    match error {
        TransportError::ConnectionLost => Error::ConnectionLost,
        TransportError::TimedOut => Error::OperationTimedOut,
        source => Error::Transport { operation, source },
    }
}

/// Map a response that does not answer the command that was sent.
///
/// An `Error` response without a code is treated as an internal failure.
pub fn response_error(expected: CommandKind, response: &Response) -> Error {
    if response.is_error() {
        device_error(
            response
                .error
                .unwrap_or(DeviceErrorCode::InternalOperationFailed),
        )
    } else {
        Error::UnexpectedResponse {
            expected,
            actual: response.kind,
        }
    }
}

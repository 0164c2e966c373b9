//! Protocol error types.

use thiserror::Error;

/// Errors that can occur when framing or decoding protocol messages.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProtocolError {
    /// A fragment was missing, repeated, or arrived out of sequence.
    #[error("data lost or out of order: expected fragment {expected}, got {actual}")]
    DataLostOrOutOfOrder {
        /// Sequence number the codec was waiting for.
        expected: u8,
        /// Sequence number that arrived.
        actual: u8,
    },

    /// A fragment or message could not be parsed.
    #[error("invalid encoding: {0}")]
    InvalidEncoding(String),

    /// Message does not fit in the maximum number of fragments.
    #[error("message too large: maximum {max} bytes, got {actual}")]
    MessageTooLarge {
        /// Largest message the fragment format can carry.
        max: usize,
        /// Actual message length.
        actual: usize,
    },

    /// Message ended before a field was complete.
    #[error("message truncated: expected at least {expected} bytes, got {actual}")]
    Truncated {
        /// Bytes required.
        expected: usize,
        /// Bytes available.
        actual: usize,
    },

    /// UTF-8 decoding error.
    #[error("invalid UTF-8 in string field")]
    InvalidUtf8,
}

/// Error codes reported by the device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub enum DeviceErrorCode {
    /// The device timed out (also used for local timeouts).
    TimedOut,
    /// Network failure.
    NetworkError,
    /// Already paired to another account.
    DeviceAlreadyPaired,
    /// Internal data error.
    InternalDataError,
    /// Pairing database is full.
    DeviceDatabaseFull,
    /// Out of memory.
    DeviceNoMemory,
    /// Internal operation failed.
    InternalOperationFailed,
    /// No access point in range.
    NoEndpointInRange,
    /// WLAN connection failed.
    WlanConnectionError,
    /// Could not obtain an IP address.
    FailToObtainIp,
    /// Could not delete stored WLAN endpoints.
    WlanEndpointDeleteFailed,
    /// Account id rejected.
    InvalidAccountId,
    /// Forced data push failed.
    ForceDataPushFailed,
    /// Device failed to encode a message.
    EncodeFailed,
    /// Device failed to decode a message.
    DecodeFailed,
    /// Upstream server connection timed out.
    ServerConnectionTimeout,
    /// Unknown error code.
    Unknown(u8),
}

impl std::fmt::Display for DeviceErrorCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DeviceErrorCode::TimedOut => write!(f, "timed out"),
            DeviceErrorCode::NetworkError => write!(f, "network error"),
            DeviceErrorCode::DeviceAlreadyPaired => write!(f, "device already paired"),
            DeviceErrorCode::InternalDataError => write!(f, "internal data error"),
            DeviceErrorCode::DeviceDatabaseFull => write!(f, "device database full"),
            DeviceErrorCode::DeviceNoMemory => write!(f, "device out of memory"),
            DeviceErrorCode::InternalOperationFailed => write!(f, "internal operation failed"),
            DeviceErrorCode::NoEndpointInRange => write!(f, "no endpoint in range"),
            DeviceErrorCode::WlanConnectionError => write!(f, "WLAN connection error"),
            DeviceErrorCode::FailToObtainIp => write!(f, "failed to obtain IP"),
            DeviceErrorCode::WlanEndpointDeleteFailed => write!(f, "WLAN endpoint delete failed"),
            DeviceErrorCode::InvalidAccountId => write!(f, "invalid account id"),
            DeviceErrorCode::ForceDataPushFailed => write!(f, "forced data push failed"),
            DeviceErrorCode::EncodeFailed => write!(f, "device encode failed"),
            DeviceErrorCode::DecodeFailed => write!(f, "device decode failed"),
            DeviceErrorCode::ServerConnectionTimeout => write!(f, "server connection timeout"),
            DeviceErrorCode::Unknown(code) => write!(f, "unknown error ({})", code),
        }
    }
}

impl From<u8> for DeviceErrorCode {
    fn from(code: u8) -> Self {
        use crate::constants::*;
        match code {
            ERR_TIME_OUT => DeviceErrorCode::TimedOut,
            ERR_NETWORK_ERROR => DeviceErrorCode::NetworkError,
            ERR_DEVICE_ALREADY_PAIRED => DeviceErrorCode::DeviceAlreadyPaired,
            ERR_INTERNAL_DATA_ERROR => DeviceErrorCode::InternalDataError,
            ERR_DEVICE_DATABASE_FULL => DeviceErrorCode::DeviceDatabaseFull,
            ERR_DEVICE_NO_MEMORY => DeviceErrorCode::DeviceNoMemory,
            ERR_INTERNAL_OPERATION_FAILED => DeviceErrorCode::InternalOperationFailed,
            ERR_NO_ENDPOINT_IN_RANGE => DeviceErrorCode::NoEndpointInRange,
            ERR_WLAN_CONNECTION_ERROR => DeviceErrorCode::WlanConnectionError,
            ERR_FAIL_TO_OBTAIN_IP => DeviceErrorCode::FailToObtainIp,
            ERR_WLAN_ENDPOINT_DELETE_FAILED => DeviceErrorCode::WlanEndpointDeleteFailed,
            ERR_INVALID_ACCOUNT_ID => DeviceErrorCode::InvalidAccountId,
            ERR_FORCE_DATA_PUSH_FAILED => DeviceErrorCode::ForceDataPushFailed,
            ERR_ENCODE_FAILED => DeviceErrorCode::EncodeFailed,
            ERR_DECODE_FAILED => DeviceErrorCode::DecodeFailed,
            ERR_SERVER_CONNECTION_TIMEOUT => DeviceErrorCode::ServerConnectionTimeout,
            _ => DeviceErrorCode::Unknown(code),
        }
    }
}

impl From<DeviceErrorCode> for u8 {
    fn from(code: DeviceErrorCode) -> Self {
        use crate::constants::*;
        match code {
            DeviceErrorCode::TimedOut => ERR_TIME_OUT,
            DeviceErrorCode::NetworkError => ERR_NETWORK_ERROR,
            DeviceErrorCode::DeviceAlreadyPaired => ERR_DEVICE_ALREADY_PAIRED,
            DeviceErrorCode::InternalDataError => ERR_INTERNAL_DATA_ERROR,
            DeviceErrorCode::DeviceDatabaseFull => ERR_DEVICE_DATABASE_FULL,
            DeviceErrorCode::DeviceNoMemory => ERR_DEVICE_NO_MEMORY,
            DeviceErrorCode::InternalOperationFailed => ERR_INTERNAL_OPERATION_FAILED,
            DeviceErrorCode::NoEndpointInRange => ERR_NO_ENDPOINT_IN_RANGE,
            DeviceErrorCode::WlanConnectionError => ERR_WLAN_CONNECTION_ERROR,
            DeviceErrorCode::FailToObtainIp => ERR_FAIL_TO_OBTAIN_IP,
            DeviceErrorCode::WlanEndpointDeleteFailed => ERR_WLAN_ENDPOINT_DELETE_FAILED,
            DeviceErrorCode::InvalidAccountId => ERR_INVALID_ACCOUNT_ID,
            DeviceErrorCode::ForceDataPushFailed => ERR_FORCE_DATA_PUSH_FAILED,
            DeviceErrorCode::EncodeFailed => ERR_ENCODE_FAILED,
            DeviceErrorCode::DecodeFailed => ERR_DECODE_FAILED,
            DeviceErrorCode::ServerConnectionTimeout => ERR_SERVER_CONNECTION_TIMEOUT,
            DeviceErrorCode::Unknown(code) => code,
        }
    }
}

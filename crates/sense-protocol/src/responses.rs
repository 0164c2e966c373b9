//! Responses from the device.

use crate::constants::ERR_TIME_OUT;
use crate::error::*;
use crate::payload::{decode_message, encode_message, Payload};
use crate::types::*;
use crate::Command;

/// A response received from the device.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct Response {
    /// Response kind. Matches the command kind on success.
    pub kind: CommandKind,
    /// Command version spoken by the firmware.
    pub version: u32,
    /// Device error code, set on `Error` responses.
    pub error: Option<DeviceErrorCode>,
    /// Response fields.
    pub payload: Payload,
}

impl Response {
    /// Create a response with an empty payload.
    pub fn new(kind: CommandKind, version: u32) -> Self {
        Response {
            kind,
            version,
            error: None,
            payload: Payload::default(),
        }
    }

    /// Create an error response.
    pub fn error(code: DeviceErrorCode, version: u32) -> Self {
        Response {
            error: Some(code),
            ..Self::new(CommandKind::Error, version)
        }
    }

    /// The response synthesized locally when an exchange times out.
    ///
    /// Indistinguishable from the device reporting a timeout itself.
    pub fn timed_out(version: u32) -> Self {
        Self::error(DeviceErrorCode::from(ERR_TIME_OUT), version)
    }

    /// The response implied when the device drops the link after
    /// accepting a command that ends the session.
    pub fn acknowledging(command: &Command) -> Self {
        Self::new(command.kind, command.version)
    }

    /// Create a Wi-Fi connection state update.
    pub fn connection_state(update: &WifiConnectUpdate, version: u32) -> Self {
        let mut response = Self::new(CommandKind::ConnectionState, version);
        response.payload.wifi_connection_state = Some(update.state);
        response.payload.http_response_code = update.http_response_code.clone();
        response.payload.socket_error_code = update.socket_error_code;
        response
    }

    /// Whether this is an error response.
    pub fn is_error(&self) -> bool {
        self.kind == CommandKind::Error
    }

    /// The Wi-Fi connection update carried by this response, if any.
    pub fn wifi_update(&self) -> Option<WifiConnectUpdate> {
        self.payload
            .wifi_connection_state
            .map(|state| WifiConnectUpdate {
                state,
                http_response_code: self.payload.http_response_code.clone(),
                socket_error_code: self.payload.socket_error_code,
            })
    }

    /// The network status carried by a `GetWifiEndpoint` response.
    pub fn network_status(&self) -> NetworkStatus {
        NetworkStatus {
            ssid: self.payload.wifi_ssid.clone().filter(|s| !s.is_empty()),
            state: self.payload.wifi_connection_state,
        }
    }

    /// Encode the response as one message, as the device would.
    pub fn encode(&self) -> Result<Vec<u8>, ProtocolError> {
        encode_message(self.kind, self.version, self.error, &self.payload)
    }

    /// Decode a response from one reassembled message.
    pub fn decode(data: &[u8]) -> Result<Self, ProtocolError> {
        let (kind, version, error, payload) = decode_message(data)?;
        Ok(Response {
            kind,
            version,
            error,
            payload,
        })
    }
}

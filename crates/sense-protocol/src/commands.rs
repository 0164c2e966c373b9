//! Commands that can be sent to the device.

use crate::constants::APP_VERSION;
use crate::error::ProtocolError;
use crate::payload::{decode_message, encode_message, Payload};
use crate::types::*;

/// A command sent to the device.
///
/// Built once per operation and never mutated afterwards. `version` is the
/// command version last reported by the device.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Command {
    /// Command kind.
    pub kind: CommandKind,
    /// Command version the firmware is expected to speak.
    pub version: u32,
    /// Command fields.
    pub payload: Payload,
}

impl Command {
    /// Create a command with an empty payload.
    pub fn new(kind: CommandKind, version: u32) -> Self {
        Command {
            kind,
            version,
            payload: Payload {
                app_version: Some(APP_VERSION),
                ..Default::default()
            },
        }
    }

    /// Create a Wi-Fi scan command, optionally restricted to a country.
    pub fn wifi_scan(version: u32, country: Option<CountryCode>) -> Self {
        let mut command = Self::new(CommandKind::StartWifiScan, version);
        command.payload.country_code = country.map(|c| c.as_str().to_string());
        command
    }

    /// Create a Wi-Fi provisioning command carrying a text credential.
    pub fn set_wifi_endpoint(
        version: u32,
        ssid: &str,
        security: WifiSecurityType,
        password: Option<&str>,
    ) -> Self {
        let mut command = Self::new(CommandKind::SetWifiEndpoint, version);
        command.payload.wifi_ssid = Some(ssid.to_string());
        command.payload.security_type = Some(security);
        command.payload.wifi_password = password.map(str::to_string);
        command
    }

    /// Create a Wi-Fi provisioning command carrying raw key bytes.
    pub fn set_wifi_endpoint_raw(
        version: u32,
        ssid: &str,
        security: WifiSecurityType,
        key: Vec<u8>,
    ) -> Self {
        let mut command = Self::new(CommandKind::SetWifiEndpoint, version);
        command.payload.wifi_ssid = Some(ssid.to_string());
        command.payload.security_type = Some(security);
        command.payload.wifi_password_bytes = Some(key);
        command
    }

    /// Create a command carrying an account token.
    pub fn with_account(kind: CommandKind, version: u32, account_id: &str) -> Self {
        let mut command = Self::new(kind, version);
        command.payload.account_id = Some(account_id.to_string());
        command
    }

    /// Get the command code.
    pub fn code(&self) -> u8 {
        self.kind.code()
    }

    /// Encode the command as one message.
    pub fn encode(&self) -> Result<Vec<u8>, ProtocolError> {
        encode_message(self.kind, self.version, None, &self.payload)
    }

    /// Decode a command from one message, as the device would.
    pub fn decode(data: &[u8]) -> Result<Self, ProtocolError> {
        let (kind, version, _, payload) = decode_message(data)?;
        Ok(Command {
            kind,
            version,
            payload,
        })
    }
}

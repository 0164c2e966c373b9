//! Message envelope and field encoding.
//!
//! Commands and responses share one envelope:
//!
//! ```text
//! +------+-------------+--------------------------+
//! | kind | version u32 | field, field, ...        |
//! +------+-------------+--------------------------+
//! ```
//!
//! Each field is tag-length-value:
//!
//! ```text
//! +-----+-------------+------------------+
//! | tag | len u16 LE  | value[0..len]    |
//! +-----+-------------+------------------+
//! ```
//!
//! Unknown tags are skipped so newer firmware can add fields. Scan results
//! nest the same field layout inside their value.

use bytes::{Buf, BufMut};

use crate::error::{DeviceErrorCode, ProtocolError};
use crate::types::*;

/// Envelope header length (kind + version).
pub const ENVELOPE_HEADER_LEN: usize = 5;

const FIELD_HEADER_LEN: usize = 3;

// ============================================================================
// Field Tags
// ============================================================================

const TAG_ERROR: u8 = 1;
const TAG_APP_VERSION: u8 = 2;
const TAG_WIFI_SSID: u8 = 3;
const TAG_WIFI_PASSWORD: u8 = 4;
const TAG_SECURITY_TYPE: u8 = 5;
const TAG_ACCOUNT_ID: u8 = 6;
const TAG_DEVICE_ID: u8 = 7;
const TAG_COUNTRY_CODE: u8 = 8;
const TAG_WIFI_CONNECTION_STATE: u8 = 9;
const TAG_WIFI_SCAN_RESULT: u8 = 10;
const TAG_HTTP_RESPONSE_CODE: u8 = 11;
const TAG_SOCKET_ERROR_CODE: u8 = 12;
const TAG_WIFI_PASSWORD_BYTES: u8 = 13;

const TAG_ENDPOINT_SSID: u8 = 1;
const TAG_ENDPOINT_BSSID: u8 = 2;
const TAG_ENDPOINT_RSSI: u8 = 3;
const TAG_ENDPOINT_SECURITY: u8 = 4;

/// Optional fields carried by a command or response.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct Payload {
    /// Application version of the host.
    pub app_version: Option<u32>,
    /// Wi-Fi network name.
    pub wifi_ssid: Option<String>,
    /// Wi-Fi credential as text.
    pub wifi_password: Option<String>,
    /// Wi-Fi credential as raw key bytes (legacy WEP firmware).
    pub wifi_password_bytes: Option<Vec<u8>>,
    /// Wi-Fi security type.
    pub security_type: Option<WifiSecurityType>,
    /// Account token used for pairing.
    pub account_id: Option<String>,
    /// Device or accessory identifier.
    pub device_id: Option<String>,
    /// Regulatory domain for scans.
    pub country_code: Option<String>,
    /// Wi-Fi connection state.
    pub wifi_connection_state: Option<WifiConnectionState>,
    /// Wi-Fi scan results.
    pub wifi_scan_results: Vec<WifiEndpoint>,
    /// HTTP status seen by the device.
    pub http_response_code: Option<String>,
    /// Socket error seen by the device.
    pub socket_error_code: Option<i32>,
}

/// Encode a full message: envelope header followed by fields.
///
/// Fails if a field value is longer than its 16-bit length can express.
pub fn encode_message(
    kind: CommandKind,
    version: u32,
    error: Option<DeviceErrorCode>,
    payload: &Payload,
) -> Result<Vec<u8>, ProtocolError> {
    let mut buf = Vec::with_capacity(32);
    buf.put_u8(kind.code());
    buf.put_u32_le(version);
    if let Some(error) = error {
        put_field(&mut buf, TAG_ERROR, &[u8::from(error)])?;
    }
    payload.encode_fields(&mut buf)?;
    Ok(buf)
}

/// Decode a full message into its header and fields.
pub fn decode_message(
    data: &[u8],
) -> Result<(CommandKind, u32, Option<DeviceErrorCode>, Payload), ProtocolError> {
    if data.len() < ENVELOPE_HEADER_LEN {
        return Err(ProtocolError::Truncated {
            expected: ENVELOPE_HEADER_LEN,
            actual: data.len(),
        });
    }

    let mut buf = data;
    let kind = CommandKind::from(buf.get_u8());
    let version = buf.get_u32_le();

    let mut error = None;
    let mut payload = Payload::default();
    while buf.has_remaining() {
        let (tag, value) = next_field(&mut buf)?;
        match tag {
            TAG_ERROR => error = Some(DeviceErrorCode::from(read_u8(value)?)),
            _ => payload.decode_field(tag, value)?,
        }
    }

    Ok((kind, version, error, payload))
}

impl Payload {
    fn encode_fields(&self, buf: &mut Vec<u8>) -> Result<(), ProtocolError> {
        if let Some(v) = self.app_version {
            put_field(buf, TAG_APP_VERSION, &v.to_le_bytes())?;
        }
        if let Some(v) = &self.wifi_ssid {
            put_field(buf, TAG_WIFI_SSID, v.as_bytes())?;
        }
        if let Some(v) = &self.wifi_password {
            put_field(buf, TAG_WIFI_PASSWORD, v.as_bytes())?;
        }
        if let Some(v) = &self.wifi_password_bytes {
            put_field(buf, TAG_WIFI_PASSWORD_BYTES, v)?;
        }
        if let Some(v) = self.security_type {
            put_field(buf, TAG_SECURITY_TYPE, &[u8::from(v)])?;
        }
        if let Some(v) = &self.account_id {
            put_field(buf, TAG_ACCOUNT_ID, v.as_bytes())?;
        }
        if let Some(v) = &self.device_id {
            put_field(buf, TAG_DEVICE_ID, v.as_bytes())?;
        }
        if let Some(v) = &self.country_code {
            put_field(buf, TAG_COUNTRY_CODE, v.as_bytes())?;
        }
        if let Some(v) = self.wifi_connection_state {
            put_field(buf, TAG_WIFI_CONNECTION_STATE, &[u8::from(v)])?;
        }
        for endpoint in &self.wifi_scan_results {
            let mut nested = Vec::with_capacity(16 + endpoint.ssid.len());
            put_field(&mut nested, TAG_ENDPOINT_SSID, endpoint.ssid.as_bytes())?;
            put_field(&mut nested, TAG_ENDPOINT_BSSID, &endpoint.bssid)?;
            put_field(&mut nested, TAG_ENDPOINT_RSSI, &endpoint.rssi.to_le_bytes())?;
            put_field(&mut nested, TAG_ENDPOINT_SECURITY, &[u8::from(endpoint.security)])?;
            put_field(buf, TAG_WIFI_SCAN_RESULT, &nested)?;
        }
        if let Some(v) = &self.http_response_code {
            put_field(buf, TAG_HTTP_RESPONSE_CODE, v.as_bytes())?;
        }
        if let Some(v) = self.socket_error_code {
            put_field(buf, TAG_SOCKET_ERROR_CODE, &v.to_le_bytes())?;
        }
        Ok(())
    }

    fn decode_field(&mut self, tag: u8, value: &[u8]) -> Result<(), ProtocolError> {
        match tag {
            TAG_APP_VERSION => self.app_version = Some(read_u32(value)?),
            TAG_WIFI_SSID => self.wifi_ssid = Some(read_string(value)?),
            TAG_WIFI_PASSWORD => self.wifi_password = Some(read_string(value)?),
            TAG_WIFI_PASSWORD_BYTES => self.wifi_password_bytes = Some(value.to_vec()),
            TAG_SECURITY_TYPE => self.security_type = Some(WifiSecurityType::from(read_u8(value)?)),
            TAG_ACCOUNT_ID => self.account_id = Some(read_string(value)?),
            TAG_DEVICE_ID => self.device_id = Some(read_string(value)?),
            TAG_COUNTRY_CODE => self.country_code = Some(read_string(value)?),
            TAG_WIFI_CONNECTION_STATE => {
                self.wifi_connection_state = Some(WifiConnectionState::from(read_u8(value)?))
            }
            TAG_WIFI_SCAN_RESULT => self.wifi_scan_results.push(decode_endpoint(value)?),
            TAG_HTTP_RESPONSE_CODE => self.http_response_code = Some(read_string(value)?),
            TAG_SOCKET_ERROR_CODE => self.socket_error_code = Some(read_u32(value)? as i32),
            _ => log::trace!("skipping unknown field tag {}", tag),
        }
        Ok(())
    }
}

fn decode_endpoint(data: &[u8]) -> Result<WifiEndpoint, ProtocolError> {
    let mut buf = data;
    let mut endpoint = WifiEndpoint::default();
    while buf.has_remaining() {
        let (tag, value) = next_field(&mut buf)?;
        match tag {
            TAG_ENDPOINT_SSID => endpoint.ssid = read_string(value)?,
            TAG_ENDPOINT_BSSID => endpoint.bssid = value.to_vec(),
            TAG_ENDPOINT_RSSI => endpoint.rssi = read_u32(value)? as i32,
            TAG_ENDPOINT_SECURITY => endpoint.security = WifiSecurityType::from(read_u8(value)?),
            _ => {}
        }
    }
    Ok(endpoint)
}

// ============================================================================
// Field Helpers
// ============================================================================

fn put_field(buf: &mut Vec<u8>, tag: u8, value: &[u8]) -> Result<(), ProtocolError> {
    let len = u16::try_from(value.len()).map_err(|_| ProtocolError::MessageTooLarge {
        max: u16::MAX as usize,
        actual: value.len(),
    })?;
    buf.put_u8(tag);
    buf.put_u16_le(len);
    buf.put_slice(value);
    Ok(())
}

fn next_field<'a>(buf: &mut &'a [u8]) -> Result<(u8, &'a [u8]), ProtocolError> {
    if buf.remaining() < FIELD_HEADER_LEN {
        return Err(ProtocolError::Truncated {
            expected: FIELD_HEADER_LEN,
            actual: buf.remaining(),
        });
    }
    let tag = buf.get_u8();
    let len = buf.get_u16_le() as usize;
    if buf.remaining() < len {
        return Err(ProtocolError::Truncated {
            expected: len,
            actual: buf.remaining(),
        });
    }
    let data: &'a [u8] = *buf;
    let (value, rest) = data.split_at(len);
    *buf = rest;
    Ok((tag, value))
}

fn read_u8(value: &[u8]) -> Result<u8, ProtocolError> {
    value.first().copied().ok_or(ProtocolError::Truncated {
        expected: 1,
        actual: 0,
    })
}

fn read_u32(value: &[u8]) -> Result<u32, ProtocolError> {
    if value.len() < 4 {
        return Err(ProtocolError::Truncated {
            expected: 4,
            actual: value.len(),
        });
    }
    Ok(u32::from_le_bytes([value[0], value[1], value[2], value[3]]))
}

fn read_string(value: &[u8]) -> Result<String, ProtocolError> {
    String::from_utf8(value.to_vec()).map_err(|_| ProtocolError::InvalidUtf8)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_header_layout() {
        let bytes = encode_message(CommandKind::GetDeviceId, 1, None, &Payload::default()).unwrap();
        assert_eq!(bytes, vec![10, 1, 0, 0, 0]);
    }

    #[test]
    fn test_error_field_decodes() {
        let bytes = encode_message(
            CommandKind::Error,
            0,
            Some(DeviceErrorCode::DeviceAlreadyPaired),
            &Payload::default(),
        ).unwrap();
        let (kind, _, error, _) = decode_message(&bytes).unwrap();
        assert_eq!(kind, CommandKind::Error);
        assert_eq!(error, Some(DeviceErrorCode::DeviceAlreadyPaired));
    }

    #[test]
    fn test_scan_results_nest() {
        let payload = Payload {
            wifi_scan_results: vec![WifiEndpoint {
                ssid: "Hello".into(),
                bssid: vec![1, 2, 3, 4, 5, 6],
                rssi: -52,
                security: WifiSecurityType::Wpa2,
            }],
            ..Default::default()
        };
        let bytes = encode_message(CommandKind::StartWifiScan, 0, None, &payload).unwrap();
        let (_, _, _, decoded) = decode_message(&bytes).unwrap();
        assert_eq!(decoded, payload);
    }

    #[test]
    fn test_unknown_tag_skipped() {
        let mut bytes = encode_message(CommandKind::GetTime, 0, None, &Payload::default()).unwrap();
        bytes.extend_from_slice(&[200, 2, 0, 0xAA, 0xBB]);
        put_field(&mut bytes, TAG_DEVICE_ID, b"ABC").unwrap();
        let (_, _, _, payload) = decode_message(&bytes).unwrap();
        assert_eq!(payload.device_id.as_deref(), Some("ABC"));
    }

    #[test]
    fn test_truncated_field() {
        let mut bytes = encode_message(CommandKind::GetTime, 0, None, &Payload::default()).unwrap();
        bytes.extend_from_slice(&[TAG_DEVICE_ID, 10, 0, b'A']);
        assert!(matches!(
            decode_message(&bytes),
            Err(ProtocolError::Truncated { expected: 10, actual: 1 })
        ));
    }

    #[test]
    fn test_oversized_field_rejected() {
        let payload = Payload {
            account_id: Some("x".repeat(u16::MAX as usize + 1)),
            ..Default::default()
        };
        assert!(matches!(
            encode_message(CommandKind::PairSense, 0, None, &payload),
            Err(ProtocolError::MessageTooLarge { max: 65535, actual: 65536 })
        ));

        let mut buf = Vec::new();
        assert!(put_field(&mut buf, TAG_DEVICE_ID, &[0u8; 70_000]).is_err());
        assert!(buf.is_empty());
    }

    #[test]
    fn test_short_envelope() {
        assert!(matches!(
            decode_message(&[1, 2]),
            Err(ProtocolError::Truncated { expected: 5, actual: 2 })
        ));
    }
}

//! Common types used in the protocol.

use crate::constants::*;

/// Kind of a command or response message.
///
/// Commands and responses share one kind space: a successful reply carries
/// the same kind as the command it answers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub enum CommandKind {
    /// Set the device clock.
    SetTime,
    /// Read the device clock.
    GetTime,
    /// Provision Wi-Fi credentials (also the legacy acknowledgment).
    SetWifiEndpoint,
    /// Query the current Wi-Fi network.
    GetWifiEndpoint,
    /// Switch into pairing mode.
    SwitchToPairingMode,
    /// Switch into normal mode.
    SwitchToNormalMode,
    /// Start a Wi-Fi scan / one scan result.
    StartWifiScan,
    /// End of a Wi-Fi scan.
    StopWifiScan,
    /// Read the device id.
    GetDeviceId,
    /// Forget the paired phone.
    ErasePairedPhone,
    /// Pair an accessory.
    PairPill,
    /// Error response.
    Error,
    /// Link the device to an account.
    PairSense,
    /// Unpair an accessory.
    UnpairPill,
    /// Factory reset.
    FactoryReset,
    /// Spinning LED animation.
    LedBusy,
    /// Pulsing LED animation.
    LedTrippy,
    /// LEDs off.
    LedOperationFailed,
    /// Flash-and-fade LED animation.
    LedOperationSuccess,
    /// Push data upstream.
    PushDataAfterSetTimezone,
    /// Wi-Fi connection state update.
    ConnectionState,
    /// A kind this library does not know.
    Other(u8),
}

impl CommandKind {
    /// Get the wire code for this kind.
    pub fn code(&self) -> u8 {
        match self {
            CommandKind::SetTime => CMD_SET_TIME,
            CommandKind::GetTime => CMD_GET_TIME,
            CommandKind::SetWifiEndpoint => CMD_SET_WIFI_ENDPOINT,
            CommandKind::GetWifiEndpoint => CMD_GET_WIFI_ENDPOINT,
            CommandKind::SwitchToPairingMode => CMD_SWITCH_TO_PAIRING_MODE,
            CommandKind::SwitchToNormalMode => CMD_SWITCH_TO_NORMAL_MODE,
            CommandKind::StartWifiScan => CMD_START_WIFISCAN,
            CommandKind::StopWifiScan => CMD_STOP_WIFISCAN,
            CommandKind::GetDeviceId => CMD_GET_DEVICE_ID,
            CommandKind::ErasePairedPhone => CMD_ERASE_PAIRED_PHONE,
            CommandKind::PairPill => CMD_PAIR_PILL,
            CommandKind::Error => CMD_ERROR,
            CommandKind::PairSense => CMD_PAIR_SENSE,
            CommandKind::UnpairPill => CMD_UNPAIR_PILL,
            CommandKind::FactoryReset => CMD_FACTORY_RESET,
            CommandKind::LedBusy => CMD_LED_BUSY,
            CommandKind::LedTrippy => CMD_LED_TRIPPY,
            CommandKind::LedOperationFailed => CMD_LED_OPERATION_FAILED,
            CommandKind::LedOperationSuccess => CMD_LED_OPERATION_SUCCESS,
            CommandKind::PushDataAfterSetTimezone => CMD_PUSH_DATA_AFTER_SET_TIMEZONE,
            CommandKind::ConnectionState => CMD_CONNECTION_STATE,
            CommandKind::Other(code) => *code,
        }
    }

    /// Short snake_case name, used in logs and metric labels.
    pub fn name(&self) -> &'static str {
        match self {
            CommandKind::SetTime => "set_time",
            CommandKind::GetTime => "get_time",
            CommandKind::SetWifiEndpoint => "set_wifi_endpoint",
            CommandKind::GetWifiEndpoint => "get_wifi_endpoint",
            CommandKind::SwitchToPairingMode => "switch_to_pairing_mode",
            CommandKind::SwitchToNormalMode => "switch_to_normal_mode",
            CommandKind::StartWifiScan => "start_wifi_scan",
            CommandKind::StopWifiScan => "stop_wifi_scan",
            CommandKind::GetDeviceId => "get_device_id",
            CommandKind::ErasePairedPhone => "erase_paired_phone",
            CommandKind::PairPill => "pair_pill",
            CommandKind::Error => "error",
            CommandKind::PairSense => "pair_sense",
            CommandKind::UnpairPill => "unpair_pill",
            CommandKind::FactoryReset => "factory_reset",
            CommandKind::LedBusy => "led_busy",
            CommandKind::LedTrippy => "led_trippy",
            CommandKind::LedOperationFailed => "led_operation_failed",
            CommandKind::LedOperationSuccess => "led_operation_success",
            CommandKind::PushDataAfterSetTimezone => "push_data_after_set_timezone",
            CommandKind::ConnectionState => "connection_state",
            CommandKind::Other(_) => "other",
        }
    }
}

impl From<u8> for CommandKind {
    fn from(code: u8) -> Self {
        match code {
            CMD_SET_TIME => CommandKind::SetTime,
            CMD_GET_TIME => CommandKind::GetTime,
            CMD_SET_WIFI_ENDPOINT => CommandKind::SetWifiEndpoint,
            CMD_GET_WIFI_ENDPOINT => CommandKind::GetWifiEndpoint,
            CMD_SWITCH_TO_PAIRING_MODE => CommandKind::SwitchToPairingMode,
            CMD_SWITCH_TO_NORMAL_MODE => CommandKind::SwitchToNormalMode,
            CMD_START_WIFISCAN => CommandKind::StartWifiScan,
            CMD_STOP_WIFISCAN => CommandKind::StopWifiScan,
            CMD_GET_DEVICE_ID => CommandKind::GetDeviceId,
            CMD_ERASE_PAIRED_PHONE => CommandKind::ErasePairedPhone,
            CMD_PAIR_PILL => CommandKind::PairPill,
            CMD_ERROR => CommandKind::Error,
            CMD_PAIR_SENSE => CommandKind::PairSense,
            CMD_UNPAIR_PILL => CommandKind::UnpairPill,
            CMD_FACTORY_RESET => CommandKind::FactoryReset,
            CMD_LED_BUSY => CommandKind::LedBusy,
            CMD_LED_TRIPPY => CommandKind::LedTrippy,
            CMD_LED_OPERATION_FAILED => CommandKind::LedOperationFailed,
            CMD_LED_OPERATION_SUCCESS => CommandKind::LedOperationSuccess,
            CMD_PUSH_DATA_AFTER_SET_TIMEZONE => CommandKind::PushDataAfterSetTimezone,
            CMD_CONNECTION_STATE => CommandKind::ConnectionState,
            _ => CommandKind::Other(code),
        }
    }
}

impl std::str::FromStr for CommandKind {
    type Err = String;

    /// Parse a kind from its name (`pair_pill`) or numeric code (`11`).
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if let Ok(code) = s.parse::<u8>() {
            return Ok(CommandKind::from(code));
        }
        (0..=u8::MAX)
            .map(CommandKind::from)
            .find(|kind| !matches!(kind, CommandKind::Other(_)) && kind.name().eq_ignore_ascii_case(s))
            .ok_or_else(|| format!("unknown command kind: {}", s))
    }
}

impl std::fmt::Display for CommandKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CommandKind::Other(code) => write!(f, "other({})", code),
            kind => f.write_str(kind.name()),
        }
    }
}

/// Wi-Fi security type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub enum WifiSecurityType {
    /// Open network, no credential.
    #[default]
    Open,
    /// WEP.
    Wep,
    /// WPA.
    Wpa,
    /// WPA2.
    Wpa2,
    /// Unknown security type.
    Unknown(u8),
}

impl From<u8> for WifiSecurityType {
    fn from(code: u8) -> Self {
        match code {
            SEC_TYPE_OPEN => WifiSecurityType::Open,
            SEC_TYPE_WEP => WifiSecurityType::Wep,
            SEC_TYPE_WPA => WifiSecurityType::Wpa,
            SEC_TYPE_WPA2 => WifiSecurityType::Wpa2,
            _ => WifiSecurityType::Unknown(code),
        }
    }
}

impl From<WifiSecurityType> for u8 {
    fn from(security: WifiSecurityType) -> Self {
        match security {
            WifiSecurityType::Open => SEC_TYPE_OPEN,
            WifiSecurityType::Wep => SEC_TYPE_WEP,
            WifiSecurityType::Wpa => SEC_TYPE_WPA,
            WifiSecurityType::Wpa2 => SEC_TYPE_WPA2,
            WifiSecurityType::Unknown(code) => code,
        }
    }
}

impl std::str::FromStr for WifiSecurityType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "open" => Ok(WifiSecurityType::Open),
            "wep" => Ok(WifiSecurityType::Wep),
            "wpa" => Ok(WifiSecurityType::Wpa),
            "wpa2" => Ok(WifiSecurityType::Wpa2),
            other => Err(format!("unknown security type: {}", other)),
        }
    }
}

/// Wi-Fi connection state reported by the device while provisioning.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub enum WifiConnectionState {
    /// No WLAN connection.
    NoWlanConnected,
    /// Associating.
    WlanConnecting,
    /// Associated.
    WlanConnected,
    /// DHCP address obtained.
    IpRetrieved,
    /// Hostname resolved.
    DnsResolved,
    /// Socket open.
    SocketConnected,
    /// Request sent.
    RequestSent,
    /// Fully connected.
    Connected,
    /// TLS failure.
    SslFail,
    /// Device key rejected.
    HelloKeyFail,
    /// Hostname resolution failed.
    DnsFailed,
    /// Socket connect failed.
    ConnectFailed,
    /// Unknown state.
    Unknown(u8),
}

impl WifiConnectionState {
    /// Whether this state is known never to resolve on its own.
    ///
    /// Provisioning stops at the first such update instead of waiting for
    /// the device to retry.
    pub fn is_immediate_error(&self) -> bool {
        matches!(self, WifiConnectionState::SslFail | WifiConnectionState::HelloKeyFail)
    }
}

impl From<u8> for WifiConnectionState {
    fn from(code: u8) -> Self {
        match code {
            WIFI_STATE_NO_WLAN_CONNECTED => WifiConnectionState::NoWlanConnected,
            WIFI_STATE_WLAN_CONNECTING => WifiConnectionState::WlanConnecting,
            WIFI_STATE_WLAN_CONNECTED => WifiConnectionState::WlanConnected,
            WIFI_STATE_IP_RETRIEVED => WifiConnectionState::IpRetrieved,
            WIFI_STATE_DNS_RESOLVED => WifiConnectionState::DnsResolved,
            WIFI_STATE_SOCKET_CONNECTED => WifiConnectionState::SocketConnected,
            WIFI_STATE_REQUEST_SENT => WifiConnectionState::RequestSent,
            WIFI_STATE_CONNECTED => WifiConnectionState::Connected,
            WIFI_STATE_SSL_FAIL => WifiConnectionState::SslFail,
            WIFI_STATE_HELLO_KEY_FAIL => WifiConnectionState::HelloKeyFail,
            WIFI_STATE_DNS_FAILED => WifiConnectionState::DnsFailed,
            WIFI_STATE_CONNECT_FAILED => WifiConnectionState::ConnectFailed,
            _ => WifiConnectionState::Unknown(code),
        }
    }
}

impl From<WifiConnectionState> for u8 {
    fn from(state: WifiConnectionState) -> Self {
        match state {
            WifiConnectionState::NoWlanConnected => WIFI_STATE_NO_WLAN_CONNECTED,
            WifiConnectionState::WlanConnecting => WIFI_STATE_WLAN_CONNECTING,
            WifiConnectionState::WlanConnected => WIFI_STATE_WLAN_CONNECTED,
            WifiConnectionState::IpRetrieved => WIFI_STATE_IP_RETRIEVED,
            WifiConnectionState::DnsResolved => WIFI_STATE_DNS_RESOLVED,
            WifiConnectionState::SocketConnected => WIFI_STATE_SOCKET_CONNECTED,
            WifiConnectionState::RequestSent => WIFI_STATE_REQUEST_SENT,
            WifiConnectionState::Connected => WIFI_STATE_CONNECTED,
            WifiConnectionState::SslFail => WIFI_STATE_SSL_FAIL,
            WifiConnectionState::HelloKeyFail => WIFI_STATE_HELLO_KEY_FAIL,
            WifiConnectionState::DnsFailed => WIFI_STATE_DNS_FAILED,
            WifiConnectionState::ConnectFailed => WIFI_STATE_CONNECT_FAILED,
            WifiConnectionState::Unknown(code) => code,
        }
    }
}

impl std::fmt::Display for WifiConnectionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            WifiConnectionState::NoWlanConnected => write!(f, "no WLAN connected"),
            WifiConnectionState::WlanConnecting => write!(f, "WLAN connecting"),
            WifiConnectionState::WlanConnected => write!(f, "WLAN connected"),
            WifiConnectionState::IpRetrieved => write!(f, "IP retrieved"),
            WifiConnectionState::DnsResolved => write!(f, "DNS resolved"),
            WifiConnectionState::SocketConnected => write!(f, "socket connected"),
            WifiConnectionState::RequestSent => write!(f, "request sent"),
            WifiConnectionState::Connected => write!(f, "connected"),
            WifiConnectionState::SslFail => write!(f, "SSL failure"),
            WifiConnectionState::HelloKeyFail => write!(f, "device key rejected"),
            WifiConnectionState::DnsFailed => write!(f, "DNS failed"),
            WifiConnectionState::ConnectFailed => write!(f, "connect failed"),
            WifiConnectionState::Unknown(code) => write!(f, "unknown state ({})", code),
        }
    }
}

/// One access point found by a Wi-Fi scan.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct WifiEndpoint {
    /// Network name.
    pub ssid: String,
    /// Access point hardware address.
    pub bssid: Vec<u8>,
    /// Received signal strength in dBm.
    pub rssi: i32,
    /// Security type.
    pub security: WifiSecurityType,
}

/// A status update streamed while the device joins a Wi-Fi network.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct WifiConnectUpdate {
    /// Connection state.
    pub state: WifiConnectionState,
    /// HTTP status returned by the server, if the device got that far.
    pub http_response_code: Option<String>,
    /// Socket error reported by the device, if any.
    pub socket_error_code: Option<i32>,
}

impl WifiConnectUpdate {
    /// Create an update carrying only a state.
    pub fn new(state: WifiConnectionState) -> Self {
        WifiConnectUpdate {
            state,
            http_response_code: None,
            socket_error_code: None,
        }
    }

    /// The status reported to callers when legacy firmware acknowledges
    /// provisioning without streaming any state.
    pub fn connected() -> Self {
        Self::new(WifiConnectionState::Connected)
    }
}

impl std::fmt::Display for WifiConnectUpdate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.state)?;
        if let Some(code) = &self.http_response_code {
            write!(f, " (http {})", code)?;
        } else if let Some(code) = self.socket_error_code {
            write!(f, " (socket error {})", code)?;
        }
        Ok(())
    }
}

/// Wi-Fi network the device is currently joined to.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct NetworkStatus {
    /// SSID, `None` when not connected.
    pub ssid: Option<String>,
    /// Last known connection state.
    pub state: Option<WifiConnectionState>,
}

/// LED animations the device can run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LedAnimation {
    /// Spinning purple glow.
    Busy,
    /// Pulsing purple glow.
    Trippy,
    /// Solid flash with a fade-out. Some production firmware ignores it;
    /// prefer [`LedAnimation::Stop`].
    FadeOut,
    /// LEDs off without a fade.
    Stop,
}

impl LedAnimation {
    /// The command kind that runs this animation.
    pub fn command_kind(&self) -> CommandKind {
        match self {
            LedAnimation::Busy => CommandKind::LedBusy,
            LedAnimation::Trippy => CommandKind::LedTrippy,
            LedAnimation::FadeOut => CommandKind::LedOperationSuccess,
            LedAnimation::Stop => CommandKind::LedOperationFailed,
        }
    }
}

/// Regulatory domains supported by Wi-Fi scans.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CountryCode {
    /// Europe.
    Eu,
    /// Japan.
    Jp,
    /// United States.
    Us,
}

impl CountryCode {
    /// The string the firmware expects.
    pub fn as_str(&self) -> &'static str {
        match self {
            CountryCode::Eu => "EU",
            CountryCode::Jp => "JP",
            CountryCode::Us => "US",
        }
    }
}

impl std::str::FromStr for CountryCode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "EU" => Ok(CountryCode::Eu),
            "JP" => Ok(CountryCode::Jp),
            "US" => Ok(CountryCode::Us),
            other => Err(format!("unknown country code: {}", other)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_command_kind_from_str() {
        assert_eq!("pair_pill".parse::<CommandKind>(), Ok(CommandKind::PairPill));
        assert_eq!("FACTORY_RESET".parse::<CommandKind>(), Ok(CommandKind::FactoryReset));
        assert_eq!("200".parse::<CommandKind>(), Ok(CommandKind::Other(200)));
        assert!("other".parse::<CommandKind>().is_err());
    }

    #[test]
    fn test_command_kind_codes_round_trip() {
        for code in 0..=40u8 {
            assert_eq!(CommandKind::from(code).code(), code);
        }
    }

    #[test]
    fn test_immediate_error_states() {
        assert!(WifiConnectionState::SslFail.is_immediate_error());
        assert!(WifiConnectionState::HelloKeyFail.is_immediate_error());
        assert!(!WifiConnectionState::ConnectFailed.is_immediate_error());
        assert!(!WifiConnectionState::WlanConnecting.is_immediate_error());
    }

    #[test]
    fn test_led_animation_kinds() {
        assert_eq!(LedAnimation::FadeOut.command_kind(), CommandKind::LedOperationSuccess);
        assert_eq!(LedAnimation::Stop.command_kind(), CommandKind::LedOperationFailed);
    }
}

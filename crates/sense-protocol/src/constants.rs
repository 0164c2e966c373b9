//! Protocol constants
//!
//! These constants define the command codes, error codes, Wi-Fi state codes
//! and link-level limits used by the Sense BLE command protocol.

// ============================================================================
// Versions
// ============================================================================

/// Application version sent with every command.
pub const APP_VERSION: u32 = 0;
/// Command version spoken by the firmware on the original PVT units.
pub const COMMAND_VERSION_PVT: u32 = 0;
/// First command version whose firmware parses WEP keys from ASCII text.
pub const COMMAND_VERSION_WEP_FIX: u32 = 1;

// ============================================================================
// Command Codes (both directions)
// ============================================================================

/// Set the device clock.
pub const CMD_SET_TIME: u8 = 0;
/// Read the device clock.
pub const CMD_GET_TIME: u8 = 1;
/// Provision Wi-Fi credentials.
pub const CMD_SET_WIFI_ENDPOINT: u8 = 2;
/// Query the current Wi-Fi network.
pub const CMD_GET_WIFI_ENDPOINT: u8 = 3;
/// Switch the device into pairing mode.
pub const CMD_SWITCH_TO_PAIRING_MODE: u8 = 6;
/// Switch the device back into normal mode.
pub const CMD_SWITCH_TO_NORMAL_MODE: u8 = 7;
/// Start a Wi-Fi scan; also carries each scan result.
pub const CMD_START_WIFISCAN: u8 = 8;
/// Terminates a Wi-Fi scan.
pub const CMD_STOP_WIFISCAN: u8 = 9;
/// Read the device identifier.
pub const CMD_GET_DEVICE_ID: u8 = 10;
/// Forget the paired phone.
pub const CMD_ERASE_PAIRED_PHONE: u8 = 11;
/// Pair an accessory (pill) with the account.
pub const CMD_PAIR_PILL: u8 = 12;
/// Generic error response.
pub const CMD_ERROR: u8 = 13;
/// Link the device to an account.
pub const CMD_PAIR_SENSE: u8 = 14;
/// Unpair an accessory.
pub const CMD_UNPAIR_PILL: u8 = 15;
/// Factory reset.
pub const CMD_FACTORY_RESET: u8 = 20;
/// Spinning LED animation.
pub const CMD_LED_BUSY: u8 = 25;
/// Pulsing LED animation.
pub const CMD_LED_TRIPPY: u8 = 26;
/// LEDs off without fade.
pub const CMD_LED_OPERATION_FAILED: u8 = 27;
/// Flash-and-fade LED animation.
pub const CMD_LED_OPERATION_SUCCESS: u8 = 30;
/// Push sensor data upstream after a timezone change.
pub const CMD_PUSH_DATA_AFTER_SET_TIMEZONE: u8 = 31;
/// Wi-Fi connection state update, streamed during provisioning.
pub const CMD_CONNECTION_STATE: u8 = 34;

// ============================================================================
// Device Error Codes
// ============================================================================

/// The device gave up waiting (also synthesized locally on timeout).
pub const ERR_TIME_OUT: u8 = 0;
/// Generic network failure.
pub const ERR_NETWORK_ERROR: u8 = 1;
/// Device already paired to another account.
pub const ERR_DEVICE_ALREADY_PAIRED: u8 = 2;
/// Internal data error.
pub const ERR_INTERNAL_DATA_ERROR: u8 = 3;
/// Pairing database full.
pub const ERR_DEVICE_DATABASE_FULL: u8 = 4;
/// Device ran out of memory.
pub const ERR_DEVICE_NO_MEMORY: u8 = 5;
/// Internal operation failed.
pub const ERR_INTERNAL_OPERATION_FAILED: u8 = 6;
/// No access point in range.
pub const ERR_NO_ENDPOINT_IN_RANGE: u8 = 7;
/// WLAN connection failed.
pub const ERR_WLAN_CONNECTION_ERROR: u8 = 8;
/// DHCP did not yield an address.
pub const ERR_FAIL_TO_OBTAIN_IP: u8 = 9;
/// Could not delete stored WLAN endpoints.
pub const ERR_WLAN_ENDPOINT_DELETE_FAILED: u8 = 10;
/// Account id rejected.
pub const ERR_INVALID_ACCOUNT_ID: u8 = 11;
/// Forced data push failed.
pub const ERR_FORCE_DATA_PUSH_FAILED: u8 = 12;
/// Device could not encode its message.
pub const ERR_ENCODE_FAILED: u8 = 13;
/// Device could not decode our message.
pub const ERR_DECODE_FAILED: u8 = 14;
/// Upstream server did not answer in time.
pub const ERR_SERVER_CONNECTION_TIMEOUT: u8 = 15;

// ============================================================================
// Wi-Fi Connection States
// ============================================================================

/// No WLAN connection.
pub const WIFI_STATE_NO_WLAN_CONNECTED: u8 = 0;
/// Associating with the access point.
pub const WIFI_STATE_WLAN_CONNECTING: u8 = 1;
/// Associated with the access point.
pub const WIFI_STATE_WLAN_CONNECTED: u8 = 2;
/// DHCP address obtained.
pub const WIFI_STATE_IP_RETRIEVED: u8 = 3;
/// Server hostname resolved.
pub const WIFI_STATE_DNS_RESOLVED: u8 = 4;
/// Server socket opened.
pub const WIFI_STATE_SOCKET_CONNECTED: u8 = 5;
/// Check-in request sent.
pub const WIFI_STATE_REQUEST_SENT: u8 = 6;
/// Fully connected to the service.
pub const WIFI_STATE_CONNECTED: u8 = 7;
/// TLS handshake failed.
pub const WIFI_STATE_SSL_FAIL: u8 = 8;
/// Device key rejected by the server.
pub const WIFI_STATE_HELLO_KEY_FAIL: u8 = 9;
/// Hostname resolution failed.
pub const WIFI_STATE_DNS_FAILED: u8 = 10;
/// Socket connect failed.
pub const WIFI_STATE_CONNECT_FAILED: u8 = 11;

// ============================================================================
// Wi-Fi Security Types
// ============================================================================

/// Open network.
pub const SEC_TYPE_OPEN: u8 = 0;
/// WEP.
pub const SEC_TYPE_WEP: u8 = 1;
/// WPA.
pub const SEC_TYPE_WPA: u8 = 2;
/// WPA2.
pub const SEC_TYPE_WPA2: u8 = 3;

// ============================================================================
// Link Limits
// ============================================================================

/// Maximum bytes carried by one BLE transmission unit.
pub const MAX_FRAGMENT_SIZE: usize = 20;
/// Header bytes on the first fragment (sequence + total).
pub const FIRST_FRAGMENT_HEADER: usize = 2;
/// Header bytes on every following fragment (sequence).
pub const FRAGMENT_HEADER: usize = 1;
/// Maximum number of fragments in one message (sequence is a single byte).
pub const MAX_FRAGMENTS: usize = 255;

// ============================================================================
// GATT Identifiers
// ============================================================================

/// Primary service exposing the command characteristics.
pub const SERVICE_UUID: &str = "0000fee1-1212-efde-1523-785feabcd123";
/// Characteristic the host writes command fragments to.
pub const CHARACTERISTIC_COMMAND_UUID: &str = "0000beeb-0000-1000-8000-00805f9b34fb";
/// Characteristic the device notifies response fragments on.
pub const CHARACTERISTIC_RESPONSE_UUID: &str = "0000b00b-0000-1000-8000-00805f9b34fb";
/// 16-bit service id prefixing the device id in advertisement service data.
pub const ADVERTISEMENT_SERVICE_16_BIT: &str = "E1FE";

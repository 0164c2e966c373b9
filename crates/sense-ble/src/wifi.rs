//! Wi-Fi provisioning.
//!
//! Joining a network is a multi-turn exchange: after the provisioning
//! command the device streams connection state updates until it is
//! connected or hits a failure it will not retry. Firmware predating the
//! updates answers with a plain acknowledgment instead.

use sense_protocol::{
    Command, CommandKind, Response, WifiConnectUpdate, WifiConnectionState, WifiSecurityType,
    COMMAND_VERSION_PVT,
};

use crate::classify;
use crate::error::{Error, ValidationError};
use crate::policy::{ResponsePolicy, Verdict};

/// Build the provisioning command, rejecting credentials the device would
/// misinterpret.
///
/// Legacy firmware expects WEP keys as raw bytes, so for that version the
/// key text is parsed as hex.
pub fn prepare_wifi_command(
    version: u32,
    ssid: &str,
    security: WifiSecurityType,
    password: Option<&str>,
) -> Result<Command, ValidationError> {
    let password = password.filter(|p| !p.is_empty());
    if security != WifiSecurityType::Open && password.is_none() {
        return Err(ValidationError::EmptyCredential);
    }

    match password {
        Some(key) if version == COMMAND_VERSION_PVT && security == WifiSecurityType::Wep => {
            let bytes =
                hex::decode(key).map_err(|e| ValidationError::MalformedCredential(e.to_string()))?;
            if bytes.contains(&0) {
                return Err(ValidationError::CredentialContainsTerminator);
            }
            Ok(Command::set_wifi_endpoint_raw(version, ssid, security, bytes))
        }
        _ => Ok(Command::set_wifi_endpoint(version, ssid, security, password)),
    }
}

/// Policy for the Wi-Fi connect exchange.
///
/// Intermediate states go to `on_progress` and re-arm the deadline.
pub struct WifiPolicy<F> {
    on_progress: F,
}

impl<F> WifiPolicy<F>
where
    F: FnMut(&WifiConnectUpdate) + Send,
{
    pub fn new(on_progress: F) -> Self {
        Self { on_progress }
    }
}

impl<F> ResponsePolicy for WifiPolicy<F>
where
    F: FnMut(&WifiConnectUpdate) + Send,
{
    type Output = WifiConnectUpdate;

    fn on_response(&mut self, command: &Command, response: Response) -> Verdict<Self::Output> {
        match response.kind {
            CommandKind::ConnectionState => {
                // An update without a state field carries the default state
                let update = response
                    .wifi_update()
                    .unwrap_or_else(|| WifiConnectUpdate::new(WifiConnectionState::NoWlanConnected));
                if update.state == WifiConnectionState::Connected {
                    Verdict::Resolve(Ok(update))
                } else if update.state.is_immediate_error() {
                    Verdict::Resolve(Err(Error::WifiConnect {
                        status: update,
                        cause: None,
                    }))
                } else {
                    (self.on_progress)(&update);
                    Verdict::Continue
                }
            }
            // Legacy firmware acknowledges without streaming states
            CommandKind::SetWifiEndpoint => Verdict::Resolve(Ok(WifiConnectUpdate::connected())),
            _ => Verdict::Resolve(Err(classify::response_error(command.kind, &response))),
        }
    }
}

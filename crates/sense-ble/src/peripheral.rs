//! The Sense peripheral.
//!
//! One method per device command, each run as a single exchange on the
//! [`CommandEngine`] under its configured timeout.

use std::sync::Arc;

use sense_protocol::{
    Command, CommandKind, CountryCode, LedAnimation, NetworkStatus, Response, WifiConnectUpdate,
    WifiEndpoint, WifiSecurityType,
};
use tracing::{debug, info};

use crate::config::PeripheralConfig;
use crate::engine::CommandEngine;
use crate::error::{Error, Result};
use crate::policy::{DisconnectingPolicy, ScanPolicy, SimplePolicy};
use crate::sequencer::{ConnectProgress, ConnectionSequencer, ConnectionState};
use crate::transport::{with_stack_timeout, EventStream, Transport};
use crate::wifi::{prepare_wifi_command, WifiPolicy};

/// A Sense reached through a [`Transport`].
pub struct Peripheral<T: Transport + ?Sized> {
    engine: CommandEngine<T>,
    sequencer: ConnectionSequencer,
    config: PeripheralConfig,
}

impl<T: Transport + ?Sized> Peripheral<T> {
    /// Create a peripheral. `events` must be the stream paired with the
    /// transport's event sink.
    pub fn new(transport: Arc<T>, events: EventStream, config: PeripheralConfig) -> Self {
        let stack_timeout = config.timeouts.stack_operation();
        Self {
            engine: CommandEngine::new(transport, events, config.fragment_size, stack_timeout),
            sequencer: ConnectionSequencer::new(config.bond_order, stack_timeout),
            config,
        }
    }

    pub fn address(&self) -> &str {
        self.transport().address()
    }

    pub fn config(&self) -> &PeripheralConfig {
        &self.config
    }

    fn transport(&self) -> &T {
        self.engine.transport().as_ref()
    }

    /// Whether the link is up and the command service discovered.
    pub fn is_connected(&self) -> bool {
        self.transport().is_connected() && self.engine.has_capabilities()
    }

    pub fn connection_state(&self) -> ConnectionState {
        match self.sequencer.state() {
            ConnectionState::Connected if !self.transport().is_connected() => {
                ConnectionState::Disconnected
            }
            state => state,
        }
    }

    /// Command version learned from the most recent response.
    pub fn command_version(&self) -> u32 {
        self.engine.command_version()
    }

    /// Whether a command is in flight.
    pub fn is_busy(&self) -> bool {
        self.engine.is_busy()
    }

    // ========================================================================
    // Connection
    // ========================================================================

    /// Bond, connect and discover the command service.
    pub async fn connect<F>(&self, progress: F) -> Result<()>
    where
        F: FnMut(ConnectProgress) + Send,
    {
        if self.is_connected() {
            debug!("{}: already connected", self.address());
            return Ok(());
        }
        self.sequencer.reset();
        let handles = self.sequencer.connect(self.transport(), progress).await?;
        self.engine.attach(handles).await;
        Ok(())
    }

    /// Drop the link. A pending command resolves with connection loss.
    pub async fn disconnect(&self) -> Result<()> {
        self.engine.detach();
        if self.transport().is_connected() {
            with_stack_timeout(
                "disconnect",
                self.config.timeouts.stack_operation(),
                self.transport().disconnect(),
            )
            .await?;
        }
        self.sequencer.mark_disconnected();
        info!("{}: disconnected", self.address());
        Ok(())
    }

    /// Forget the bond with the device.
    pub async fn remove_bond(&self) -> Result<()> {
        self.sequencer
            .remove_bond(self.transport(), self.config.timeouts.remove_bond())
            .await
    }

    // ========================================================================
    // Commands
    // ========================================================================

    fn command(&self, kind: CommandKind) -> Command {
        Command::new(kind, self.command_version())
    }

    /// Leave pairing mode.
    pub async fn put_into_normal_mode(&self) -> Result<()> {
        let command = self.command(CommandKind::SwitchToNormalMode);
        self.engine
            .execute(command, self.config.timeouts.simple_command(), SimplePolicy)
            .await?;
        Ok(())
    }

    /// Enter pairing mode. The device drops the link afterwards.
    pub async fn put_into_pairing_mode(&self) -> Result<()> {
        let command = self.command(CommandKind::SwitchToPairingMode);
        self.engine
            .execute(command, self.config.timeouts.simple_command(), DisconnectingPolicy)
            .await?;
        self.sequencer.mark_disconnected();
        Ok(())
    }

    /// Scan for networks visible to the device.
    pub async fn scan_for_wifi_networks(
        &self,
        country: Option<CountryCode>,
    ) -> Result<Vec<WifiEndpoint>> {
        let command = Command::wifi_scan(self.command_version(), country);
        self.engine
            .execute(command, self.config.timeouts.wifi_scan(), ScanPolicy::new())
            .await
    }

    /// The network the device is configured for.
    pub async fn get_wifi_network(&self) -> Result<NetworkStatus> {
        let command = self.command(CommandKind::GetWifiEndpoint);
        let response = self
            .engine
            .execute(command, self.config.timeouts.simple_command(), SimplePolicy)
            .await?;
        Ok(response.network_status())
    }

    /// Join a network.
    ///
    /// `on_progress` receives each intermediate connection state. Credentials
    /// are only validated once the peripheral is known to be idle.
    pub async fn connect_to_wifi_network<F>(
        &self,
        ssid: &str,
        security: WifiSecurityType,
        password: Option<&str>,
        on_progress: F,
    ) -> Result<WifiConnectUpdate>
    where
        F: FnMut(&WifiConnectUpdate) + Send,
    {
        if self.is_busy() {
            return Err(Error::Busy);
        }
        let command = prepare_wifi_command(self.command_version(), ssid, security, password)?;
        self.engine
            .execute(command, self.config.timeouts.set_wifi(), WifiPolicy::new(on_progress))
            .await
    }

    /// Pair a pill with the given account; returns the pill's device id.
    pub async fn pair_pill(&self, account_token: &str) -> Result<String> {
        let command = Command::with_account(CommandKind::PairPill, self.command_version(), account_token);
        let response = self
            .engine
            .execute(command, self.config.timeouts.pair_pill(), SimplePolicy)
            .await?;
        Ok(response.payload.device_id.unwrap_or_default())
    }

    /// Link the device to an account.
    pub async fn link_account(&self, account_token: &str) -> Result<()> {
        let command = Command::with_account(CommandKind::PairSense, self.command_version(), account_token);
        self.engine
            .execute(command, self.config.timeouts.simple_command(), SimplePolicy)
            .await?;
        Ok(())
    }

    pub async fn run_led_animation(&self, animation: LedAnimation) -> Result<()> {
        let command = self.command(animation.command_kind());
        self.engine
            .execute(command, self.config.timeouts.animation(), SimplePolicy)
            .await?;
        Ok(())
    }

    /// Ask the device to upload its data now.
    pub async fn push_data(&self) -> Result<()> {
        let command = self.command(CommandKind::PushDataAfterSetTimezone);
        self.engine
            .execute(command, self.config.timeouts.simple_command(), SimplePolicy)
            .await?;
        Ok(())
    }

    /// Wipe the device. The device drops the link afterwards.
    pub async fn factory_reset(&self) -> Result<Response> {
        let command = self.command(CommandKind::FactoryReset);
        let response = self
            .engine
            .execute(command, self.config.timeouts.simple_command(), DisconnectingPolicy)
            .await?;
        self.sequencer.mark_disconnected();
        Ok(response)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::{MockTransport, Op, Reply};
    use crate::ErrorKind;
    use sense_protocol::{DeviceErrorCode, WifiConnectionState, COMMAND_VERSION_WEP_FIX};
    use std::time::Duration;

    async fn connected() -> (Arc<MockTransport>, Peripheral<MockTransport>) {
        let (mock, events) = MockTransport::new();
        let mock = Arc::new(mock);
        let peripheral = Peripheral::new(mock.clone(), events, PeripheralConfig::default());
        peripheral.connect(|_| {}).await.unwrap();
        (mock, peripheral)
    }

    fn scan_result(ssid: &str) -> Response {
        let mut response = Response::new(CommandKind::StartWifiScan, 0);
        response.payload.wifi_scan_results.push(WifiEndpoint {
            ssid: ssid.into(),
            bssid: vec![0x10, 0x20, 0x30, 0x40, 0x50, 0x60],
            rssi: -48,
            security: WifiSecurityType::Wpa2,
        });
        response
    }

    #[tokio::test(start_paused = true)]
    async fn test_connect_then_command() {
        let (mock, peripheral) = connected().await;
        assert!(peripheral.is_connected());
        assert_eq!(peripheral.connection_state(), ConnectionState::Connected);

        mock.respond(Response::new(CommandKind::SwitchToNormalMode, 0));
        peripheral.put_into_normal_mode().await.unwrap();
        assert_eq!(mock.commands()[0].kind, CommandKind::SwitchToNormalMode);
    }

    #[tokio::test(start_paused = true)]
    async fn test_connect_when_connected_is_noop() {
        let (mock, peripheral) = connected().await;
        let before = mock.ops().len();
        peripheral.connect(|_| {}).await.unwrap();
        assert_eq!(mock.ops().len(), before);
    }

    #[tokio::test(start_paused = true)]
    async fn test_empty_credential_writes_nothing() {
        let (mock, peripheral) = connected().await;
        let err = peripheral
            .connect_to_wifi_network("home", WifiSecurityType::Wpa2, Some(""), |_| {})
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);
        assert_eq!(mock.count(Op::WriteFragment), 0);
        assert_eq!(mock.count(Op::EnableNotifications), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_busy_reported_before_validation() {
        let (_mock, peripheral) = connected().await;
        let second = async {
            tokio::time::sleep(Duration::from_secs(1)).await;
            peripheral
                .connect_to_wifi_network("home", WifiSecurityType::Wpa2, None, |_| {})
                .await
        };
        let (first, second) = tokio::join!(peripheral.pair_pill("token"), second);
        assert_eq!(first.unwrap_err().kind(), ErrorKind::OperationTimedOut);
        assert!(matches!(second, Err(Error::Busy)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_wifi_connect_reports_progress() {
        let (mock, peripheral) = connected().await;
        mock.script(vec![
            Reply::Respond(Response::connection_state(
                &WifiConnectUpdate::new(WifiConnectionState::WlanConnecting),
                0,
            )),
            Reply::Respond(Response::connection_state(&WifiConnectUpdate::connected(), 0)),
        ]);

        let mut progress = Vec::new();
        let update = peripheral
            .connect_to_wifi_network("home", WifiSecurityType::Wpa2, Some("hunter22"), |u| {
                progress.push(u.state)
            })
            .await
            .unwrap();
        assert_eq!(update.state, WifiConnectionState::Connected);
        assert_eq!(progress, vec![WifiConnectionState::WlanConnecting]);

        let sent = &mock.commands()[0];
        assert_eq!(sent.payload.wifi_ssid.as_deref(), Some("home"));
        assert_eq!(sent.payload.wifi_password.as_deref(), Some("hunter22"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_wifi_connect_ssl_failure() {
        let (mock, peripheral) = connected().await;
        mock.respond(Response::connection_state(
            &WifiConnectUpdate::new(WifiConnectionState::SslFail),
            0,
        ));
        let mut progress = 0;
        let err = peripheral
            .connect_to_wifi_network("home", WifiSecurityType::Wpa2, Some("hunter22"), |_| {
                progress += 1
            })
            .await
            .unwrap_err();
        match err {
            Error::WifiConnect { status, .. } => assert_eq!(status.state, WifiConnectionState::SslFail),
            other => panic!("unexpected {:?}", other),
        }
        assert_eq!(progress, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_scan_collects_networks() {
        let (mock, peripheral) = connected().await;
        mock.script(vec![
            Reply::Respond(scan_result("home")),
            Reply::Respond(scan_result("")),
            Reply::Respond(scan_result("office")),
            Reply::Respond(Response::new(CommandKind::StopWifiScan, 0)),
        ]);

        let networks = peripheral
            .scan_for_wifi_networks(Some(CountryCode::Us))
            .await
            .unwrap();
        let ssids: Vec<_> = networks.iter().map(|n| n.ssid.as_str()).collect();
        assert_eq!(ssids, vec!["home", "office"]);
        assert_eq!(mock.commands()[0].payload.country_code.as_deref(), Some("US"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_get_wifi_network() {
        let (mock, peripheral) = connected().await;
        let mut response = Response::new(CommandKind::GetWifiEndpoint, 0);
        response.payload.wifi_ssid = Some("home".into());
        response.payload.wifi_connection_state = Some(WifiConnectionState::IpRetrieved);
        mock.respond(response);

        let status = peripheral.get_wifi_network().await.unwrap();
        assert_eq!(status.ssid.as_deref(), Some("home"));
        assert_eq!(status.state, Some(WifiConnectionState::IpRetrieved));
    }

    #[tokio::test(start_paused = true)]
    async fn test_pair_pill_returns_device_id() {
        let (mock, peripheral) = connected().await;
        let mut response = Response::new(CommandKind::PairPill, 0);
        response.payload.device_id = Some("9ABC0123DEF45678".into());
        mock.respond(response);

        let device_id = peripheral.pair_pill("account-token").await.unwrap();
        assert_eq!(device_id, "9ABC0123DEF45678");
        assert_eq!(
            mock.commands()[0].payload.account_id.as_deref(),
            Some("account-token")
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_link_account_device_error() {
        let (mock, peripheral) = connected().await;
        mock.respond(Response::error(DeviceErrorCode::InvalidAccountId, 0));
        let err = peripheral.link_account("bad").await.unwrap_err();
        assert!(matches!(
            err,
            Error::DeviceReportedError(DeviceErrorCode::InvalidAccountId)
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn test_led_animation_kind() {
        let (mock, peripheral) = connected().await;
        mock.respond(Response::new(CommandKind::LedOperationFailed, 0));
        peripheral.run_led_animation(LedAnimation::Stop).await.unwrap();
        assert_eq!(mock.commands()[0].kind, CommandKind::LedOperationFailed);
    }

    #[tokio::test(start_paused = true)]
    async fn test_pairing_mode_disconnects() {
        let (mock, peripheral) = connected().await;
        mock.respond(Response::new(CommandKind::SwitchToPairingMode, 0));
        peripheral.put_into_pairing_mode().await.unwrap();
        assert!(!peripheral.is_connected());
        assert_eq!(peripheral.connection_state(), ConnectionState::Disconnected);
        assert_eq!(mock.count(Op::Disconnect), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_factory_reset_implicit_success() {
        let (mock, peripheral) = connected().await;
        mock.script(vec![Reply::Disconnect]);
        let response = peripheral.factory_reset().await.unwrap();
        assert_eq!(response.kind, CommandKind::FactoryReset);
        assert!(!peripheral.is_connected());
    }

    #[tokio::test(start_paused = true)]
    async fn test_version_used_for_next_command() {
        let (mock, peripheral) = connected().await;
        mock.respond(Response::new(CommandKind::PushDataAfterSetTimezone, COMMAND_VERSION_WEP_FIX));
        peripheral.push_data().await.unwrap();
        assert_eq!(peripheral.command_version(), COMMAND_VERSION_WEP_FIX);

        // Newer firmware takes WEP keys as text
        mock.respond(Response::new(CommandKind::SetWifiEndpoint, COMMAND_VERSION_WEP_FIX));
        peripheral
            .connect_to_wifi_network("home", WifiSecurityType::Wep, Some("plain-key"), |_| {})
            .await
            .unwrap();
        let sent = &mock.commands()[1];
        assert_eq!(sent.version, COMMAND_VERSION_WEP_FIX);
        assert_eq!(sent.payload.wifi_password.as_deref(), Some("plain-key"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_disconnect_and_reconnect() {
        let (mock, peripheral) = connected().await;
        peripheral.disconnect().await.unwrap();
        assert!(!peripheral.is_connected());

        let err = peripheral.push_data().await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Transport);

        // The disconnect notification from the first session is stale
        peripheral.connect(|_| {}).await.unwrap();
        mock.respond(Response::new(CommandKind::PushDataAfterSetTimezone, 0));
        peripheral.push_data().await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_remove_bond_timeout() {
        let (mock, peripheral) = connected().await;
        mock.stall(Op::RemoveBond);
        let err = peripheral.remove_bond().await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::OperationTimedOut);
    }
}

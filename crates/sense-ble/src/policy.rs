//! Response policies.
//!
//! A policy decides what each decoded response means for the pending
//! exchange: keep waiting, resolve, or resolve and drop the link. The engine
//! owns the mechanics (unsubscribe, disconnect, deadline); policies only
//! classify.

use sense_protocol::{Command, CommandKind, Response, WifiEndpoint};

use crate::classify;
use crate::error::Result;

/// What to do with the pending exchange after a response.
#[derive(Debug)]
pub enum Verdict<T> {
    /// Keep waiting; the deadline is re-armed.
    Continue,
    /// Unsubscribe, then resolve.
    Resolve(Result<T>),
    /// Resolve successfully after disconnecting. Teardown failures are
    /// logged, never returned.
    ResolveAndDisconnect(T),
}

/// Classifies responses for one exchange.
pub trait ResponsePolicy: Send {
    /// Value an exchange resolves with on success.
    type Output: Send;

    /// Classify one decoded response (real or synthesized on timeout).
    fn on_response(&mut self, command: &Command, response: Response) -> Verdict<Self::Output>;

    /// The link dropped while the exchange was pending.
    ///
    /// Returning `Some` resolves the exchange successfully; the default
    /// resolves with [`crate::Error::ConnectionLost`].
    fn on_connection_lost(&mut self, _command: &Command) -> Option<Self::Output> {
        None
    }
}

/// Success iff the response kind matches the command kind.
#[derive(Debug, Default, Clone, Copy)]
pub struct SimplePolicy;

impl ResponsePolicy for SimplePolicy {
    type Output = Response;

    fn on_response(&mut self, command: &Command, response: Response) -> Verdict<Response> {
        if response.kind == command.kind {
            Verdict::Resolve(Ok(response))
        } else {
            Verdict::Resolve(Err(classify::response_error(command.kind, &response)))
        }
    }
}

/// For commands after which the device leaves the session (pairing mode,
/// factory reset).
///
/// Success disconnects instead of unsubscribing, and the device dropping
/// the link while the command is pending counts as success.
#[derive(Debug, Default, Clone, Copy)]
pub struct DisconnectingPolicy;

impl ResponsePolicy for DisconnectingPolicy {
    type Output = Response;

    fn on_response(&mut self, command: &Command, response: Response) -> Verdict<Response> {
        if response.kind == command.kind {
            Verdict::ResolveAndDisconnect(response)
        } else {
            Verdict::Resolve(Err(classify::response_error(command.kind, &response)))
        }
    }

    fn on_connection_lost(&mut self, command: &Command) -> Option<Response> {
        Some(Response::acknowledging(command))
    }
}

/// Collects Wi-Fi scan results until the device sends the stop message.
#[derive(Debug, Default)]
pub struct ScanPolicy {
    endpoints: Vec<WifiEndpoint>,
}

impl ScanPolicy {
    pub fn new() -> Self {
        Self::default()
    }
}

impl ResponsePolicy for ScanPolicy {
    type Output = Vec<WifiEndpoint>;

    fn on_response(&mut self, command: &Command, response: Response) -> Verdict<Self::Output> {
        match response.kind {
            CommandKind::StartWifiScan => {
                let mut results = response.payload.wifi_scan_results;
                if results.len() == 1 && !results[0].ssid.is_empty() {
                    self.endpoints.extend(results.pop());
                }
                Verdict::Continue
            }
            CommandKind::StopWifiScan => Verdict::Resolve(Ok(std::mem::take(&mut self.endpoints))),
            _ => Verdict::Resolve(Err(classify::response_error(command.kind, &response))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Error, ErrorKind};
    use sense_protocol::{DeviceErrorCode, WifiSecurityType};

    fn scan_result(ssid: &str) -> Response {
        let mut response = Response::new(CommandKind::StartWifiScan, 1);
        response.payload.wifi_scan_results.push(WifiEndpoint {
            ssid: ssid.into(),
            bssid: vec![1, 2, 3, 4, 5, 6],
            rssi: -60,
            security: WifiSecurityType::Wpa2,
        });
        response
    }

    #[test]
    fn test_simple_policy() {
        let command = Command::new(CommandKind::GetWifiEndpoint, 0);
        let mut policy = SimplePolicy;
        assert!(matches!(
            policy.on_response(&command, Response::new(CommandKind::GetWifiEndpoint, 0)),
            Verdict::Resolve(Ok(_))
        ));
        assert!(matches!(
            policy.on_response(&command, Response::error(DeviceErrorCode::InvalidAccountId, 0)),
            Verdict::Resolve(Err(Error::DeviceReportedError(DeviceErrorCode::InvalidAccountId)))
        ));
        assert!(policy.on_connection_lost(&command).is_none());
    }

    #[test]
    fn test_disconnecting_policy() {
        let command = Command::new(CommandKind::FactoryReset, 1);
        let mut policy = DisconnectingPolicy;
        assert!(matches!(
            policy.on_response(&command, Response::new(CommandKind::FactoryReset, 1)),
            Verdict::ResolveAndDisconnect(_)
        ));
        let implied = policy.on_connection_lost(&command).unwrap();
        assert_eq!(implied.kind, CommandKind::FactoryReset);
    }

    #[test]
    fn test_scan_policy_collects_until_stop() {
        let command = Command::wifi_scan(1, None);
        let mut policy = ScanPolicy::new();
        assert!(matches!(policy.on_response(&command, scan_result("home")), Verdict::Continue));
        assert!(matches!(policy.on_response(&command, scan_result("")), Verdict::Continue));

        let mut two = scan_result("a");
        two.payload.wifi_scan_results.push(WifiEndpoint::default());
        assert!(matches!(policy.on_response(&command, two), Verdict::Continue));

        match policy.on_response(&command, Response::new(CommandKind::StopWifiScan, 1)) {
            Verdict::Resolve(Ok(endpoints)) => {
                assert_eq!(endpoints.len(), 1);
                assert_eq!(endpoints[0].ssid, "home");
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_scan_policy_timeout() {
        let command = Command::wifi_scan(1, None);
        let mut policy = ScanPolicy::new();
        match policy.on_response(&command, Response::timed_out(1)) {
            Verdict::Resolve(Err(e)) => assert_eq!(e.kind(), ErrorKind::OperationTimedOut),
            other => panic!("unexpected {:?}", other),
        }
    }
}

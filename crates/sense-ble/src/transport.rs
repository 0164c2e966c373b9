//! The radio transport seam.
//!
//! The engine never touches the radio directly. A [`Transport`] performs the
//! physical operations (connect, bond, discovery, notification control and
//! fragment writes) and reports what it hears through an [`EventSink`]:
//! response fragments and connection changes, in arrival order.

use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use thiserror::Error;
use tokio::sync::mpsc;

use crate::classify;
use crate::error::Result;

/// Failures reported by a transport.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransportError {
    /// The link dropped during the operation.
    #[error("connection lost")]
    ConnectionLost,

    /// The operation did not complete in time.
    #[error("timed out")]
    TimedOut,

    /// There is no connection to operate on.
    #[error("not connected")]
    NotConnected,

    /// The expected GATT service is missing.
    #[error("service {0} not found")]
    ServiceNotFound(String),

    /// The expected characteristic is missing from the service.
    #[error("characteristic {0} not found")]
    CharacteristicNotFound(String),

    /// Bonding was refused or failed.
    #[error("bonding failed: {0}")]
    BondFailed(String),

    /// Any other stack failure, with a status or message from the stack.
    #[error("stack error: {0}")]
    Stack(String),
}

/// An opaque reference to a discovered characteristic.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CapabilityHandle {
    /// Characteristic UUID.
    pub uuid: String,
    /// Transport-specific attribute handle.
    pub handle: u16,
}

impl CapabilityHandle {
    /// Create a handle.
    pub fn new(uuid: impl Into<String>, handle: u16) -> Self {
        Self {
            uuid: uuid.into(),
            handle,
        }
    }
}

/// The two characteristics a command exchange needs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CapabilityHandles {
    /// Characteristic commands are written to.
    pub command: CapabilityHandle,
    /// Characteristic responses are notified on.
    pub response: CapabilityHandle,
}

/// Something the transport heard.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportEvent {
    /// A fragment notified on the response characteristic.
    Notification(Bytes),
    /// The connection to a peripheral dropped.
    Disconnected {
        /// Address of the peripheral that disconnected.
        address: String,
    },
}

/// The physical operations the engine relies on.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Address of the peripheral this transport talks to.
    fn address(&self) -> &str;

    /// Whether the link is currently up.
    fn is_connected(&self) -> bool;

    /// Establish the link.
    async fn connect(&self) -> Result<(), TransportError>;

    /// Create a bond with the peripheral.
    async fn create_bond(&self) -> Result<(), TransportError>;

    /// Remove the bond with the peripheral.
    async fn remove_bond(&self) -> Result<(), TransportError>;

    /// Tear down the link.
    async fn disconnect(&self) -> Result<(), TransportError>;

    /// Discover the characteristics of a service.
    async fn discover_capabilities(
        &self,
        service: &str,
    ) -> Result<Vec<CapabilityHandle>, TransportError>;

    /// Enable notifications on a characteristic.
    async fn enable_notifications(&self, handle: &CapabilityHandle) -> Result<(), TransportError>;

    /// Disable notifications on a characteristic.
    async fn disable_notifications(&self, handle: &CapabilityHandle)
        -> Result<(), TransportError>;

    /// Write one fragment to a characteristic.
    async fn write_fragment(
        &self,
        handle: &CapabilityHandle,
        fragment: &[u8],
    ) -> Result<(), TransportError>;
}

/// Create a connected event sink and stream.
pub fn event_channel() -> (EventSink, EventStream) {
    let (tx, rx) = mpsc::unbounded_channel();
    (EventSink { tx: tx.clone() }, EventStream { tx, rx })
}

/// The transport's half of the event channel.
#[derive(Debug, Clone)]
pub struct EventSink {
    tx: mpsc::UnboundedSender<TransportEvent>,
}

impl EventSink {
    /// Report a fragment notified on the response characteristic.
    pub fn notify(&self, fragment: impl Into<Bytes>) {
        self.send(TransportEvent::Notification(fragment.into()));
    }

    /// Report that a peripheral disconnected.
    pub fn disconnected(&self, address: impl Into<String>) {
        self.send(TransportEvent::Disconnected {
            address: address.into(),
        });
    }

    /// Report an event.
    pub fn send(&self, event: TransportEvent) {
        // The stream keeps a sender alive, so the channel is open as long as
        // anyone could read from it.
        let _ = self.tx.send(event);
    }
}

/// The engine's half of the event channel.
#[derive(Debug)]
pub struct EventStream {
    tx: mpsc::UnboundedSender<TransportEvent>,
    rx: mpsc::UnboundedReceiver<TransportEvent>,
}

impl EventStream {
    /// Wait for the next event.
    pub async fn recv(&mut self) -> Option<TransportEvent> {
        self.rx.recv().await
    }

    /// Take every event already queued.
    pub fn drain(&mut self) -> Vec<TransportEvent> {
        let mut events = Vec::new();
        while let Ok(event) = self.rx.try_recv() {
            events.push(event);
        }
        events
    }

    /// A sink feeding this stream.
    pub fn sink(&self) -> EventSink {
        EventSink {
            tx: self.tx.clone(),
        }
    }
}

/// Run a transport operation under the stack operation timeout.
pub(crate) async fn with_stack_timeout<F, T>(
    operation: &'static str,
    timeout: Duration,
    fut: F,
) -> Result<T>
where
    F: Future<Output = Result<T, TransportError>>,
{
    match tokio::time::timeout(timeout, fut).await {
        Ok(Ok(value)) => Ok(value),
        Ok(Err(e)) => Err(classify::transport_error(operation, e)),
        Err(_) => Err(classify::transport_error(operation, TransportError::TimedOut)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_events_arrive_in_order() {
        let (sink, mut stream) = event_channel();
        sink.notify(vec![0u8, 1, 2]);
        sink.disconnected("AA:BB");
        assert_eq!(
            stream.recv().await,
            Some(TransportEvent::Notification(Bytes::from_static(&[0, 1, 2])))
        );
        assert_eq!(
            stream.recv().await,
            Some(TransportEvent::Disconnected {
                address: "AA:BB".into()
            })
        );
    }

    #[tokio::test]
    async fn test_drain_empties_queue() {
        let (sink, mut stream) = event_channel();
        sink.notify(vec![1u8]);
        stream.sink().notify(vec![2u8]);
        assert_eq!(stream.drain().len(), 2);
        assert!(stream.drain().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_stack_timeout_maps_to_timed_out() {
        let result: Result<()> = with_stack_timeout("connect", Duration::from_secs(30), async {
            tokio::time::sleep(Duration::from_secs(60)).await;
            Ok(())
        })
        .await;
        assert_eq!(
            result.unwrap_err().kind(),
            crate::ErrorKind::OperationTimedOut
        );
    }
}

//! Connection establishment.
//!
//! Bonding and connecting must happen in a host-dependent order, followed by
//! discovery of the command service. Each step runs under the stack
//! operation timeout; a failure tears down whatever link was established.

use std::time::Duration;

use parking_lot::Mutex;
use sense_protocol::{CHARACTERISTIC_COMMAND_UUID, CHARACTERISTIC_RESPONSE_UUID, SERVICE_UUID};
use tracing::{info, warn};

use crate::config::BondOrder;
use crate::error::{Error, Result};
use crate::transport::{with_stack_timeout, CapabilityHandle, CapabilityHandles, Transport, TransportError};

/// Milestones reported while connecting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConnectProgress {
    /// About to bond.
    Bonding,
    /// About to connect.
    Connecting,
    /// About to discover the command service.
    DiscoveringServices,
    /// Ready for commands.
    Connected,
}

impl std::fmt::Display for ConnectProgress {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConnectProgress::Bonding => write!(f, "bonding"),
            ConnectProgress::Connecting => write!(f, "connecting"),
            ConnectProgress::DiscoveringServices => write!(f, "discovering services"),
            ConnectProgress::Connected => write!(f, "connected"),
        }
    }
}

/// Connection lifecycle of one physical session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ConnectionState {
    #[default]
    Idle,
    Bonding,
    Connecting,
    DiscoveringCapabilities,
    Connected,
    Disconnected,
}

#[derive(Debug, Clone, Copy)]
enum Step {
    Bond,
    Connect,
}

/// Runs the bond/connect/discover sequence.
#[derive(Debug)]
pub struct ConnectionSequencer {
    bond_order: BondOrder,
    stack_timeout: Duration,
    state: Mutex<ConnectionState>,
}

impl ConnectionSequencer {
    pub fn new(bond_order: BondOrder, stack_timeout: Duration) -> Self {
        Self {
            bond_order,
            stack_timeout,
            state: Mutex::new(ConnectionState::Idle),
        }
    }

    pub fn bond_order(&self) -> BondOrder {
        self.bond_order
    }

    /// Current lifecycle state.
    pub fn state(&self) -> ConnectionState {
        *self.state.lock()
    }

    /// Record that the link dropped.
    pub fn mark_disconnected(&self) {
        self.set_state(ConnectionState::Disconnected);
    }

    /// Return to `Idle` so a new session can start.
    pub fn reset(&self) {
        self.set_state(ConnectionState::Idle);
    }

    fn set_state(&self, state: ConnectionState) {
        *self.state.lock() = state;
    }

    /// Establish the link and discover the command characteristics.
    ///
    /// `progress` receives a milestone before each step and `Connected` at
    /// the end.
    pub async fn connect<T, F>(&self, transport: &T, mut progress: F) -> Result<CapabilityHandles>
    where
        T: Transport + ?Sized,
        F: FnMut(ConnectProgress) + Send,
    {
        match self.run(transport, &mut progress).await {
            Ok(handles) => {
                self.set_state(ConnectionState::Connected);
                info!("{}: {}", transport.address(), ConnectProgress::Connected);
                progress(ConnectProgress::Connected);
                Ok(handles)
            }
            Err(e) => {
                if transport.is_connected() {
                    warn!("{}: disconnecting after failed connection attempt: {}", transport.address(), e);
                    if let Err(de) =
                        with_stack_timeout("disconnect", self.stack_timeout, transport.disconnect()).await
                    {
                        warn!("{}: disconnect after failed connection attempt failed, ignoring: {}", transport.address(), de);
                    }
                }
                self.set_state(ConnectionState::Disconnected);
                Err(e)
            }
        }
    }

    async fn run<T, F>(&self, transport: &T, progress: &mut F) -> Result<CapabilityHandles>
    where
        T: Transport + ?Sized,
        F: FnMut(ConnectProgress) + Send,
    {
        let steps = match self.bond_order {
            BondOrder::BondBeforeConnect => [Step::Bond, Step::Connect],
            BondOrder::ConnectBeforeBond => [Step::Connect, Step::Bond],
        };

        for step in steps {
            match step {
                Step::Bond => {
                    self.enter(transport, ConnectionState::Bonding, ConnectProgress::Bonding, progress);
                    with_stack_timeout("create_bond", self.stack_timeout, transport.create_bond()).await?;
                }
                Step::Connect => {
                    self.enter(transport, ConnectionState::Connecting, ConnectProgress::Connecting, progress);
                    with_stack_timeout("connect", self.stack_timeout, transport.connect()).await?;
                }
            }
        }

        self.enter(
            transport,
            ConnectionState::DiscoveringCapabilities,
            ConnectProgress::DiscoveringServices,
            progress,
        );
        let discovered = with_stack_timeout(
            "discover_capabilities",
            self.stack_timeout,
            transport.discover_capabilities(SERVICE_UUID),
        )
        .await?;

        Ok(CapabilityHandles {
            command: find_capability(&discovered, CHARACTERISTIC_COMMAND_UUID)?,
            response: find_capability(&discovered, CHARACTERISTIC_RESPONSE_UUID)?,
        })
    }

    fn enter<T, F>(&self, transport: &T, state: ConnectionState, milestone: ConnectProgress, progress: &mut F)
    where
        T: Transport + ?Sized,
        F: FnMut(ConnectProgress),
    {
        self.set_state(state);
        info!("{}: {}", transport.address(), milestone);
        progress(milestone);
    }

    /// Remove the bond, under its own timeout.
    pub async fn remove_bond<T>(&self, transport: &T, timeout: Duration) -> Result<()>
    where
        T: Transport + ?Sized,
    {
        with_stack_timeout("remove_bond", timeout, transport.remove_bond()).await
    }
}

fn find_capability(discovered: &[CapabilityHandle], uuid: &str) -> Result<CapabilityHandle> {
    discovered
        .iter()
        .find(|c| c.uuid.eq_ignore_ascii_case(uuid))
        .cloned()
        .ok_or_else(|| Error::Transport {
            operation: "discover_capabilities",
            source: TransportError::CharacteristicNotFound(uuid.to_string()),
        })
}

//! Sense BLE Command Engine
//!
//! This crate drives a Sense bedside unit over a BLE link using the command
//! protocol from [`sense_protocol`]. The device handles one command at a
//! time and does no queuing, so the engine admits a single exchange and
//! rejects the rest as busy.
//!
//! # Architecture
//!
//! - [`Transport`]: the BLE stack, supplied by the host. Fragments and
//!   connection changes arrive on one [`EventStream`].
//! - [`ConnectionSequencer`]: bond, connect and service discovery in the
//!   host's required order.
//! - [`CommandEngine`]: subscribe, write, wait for the response, unsubscribe.
//!   A [`ResponsePolicy`] decides what each response means.
//! - [`Peripheral`]: one method per device command.
//!
//! # Example
//!
//! ```rust,ignore
//! use sense_ble::{Peripheral, PeripheralConfig};
//!
//! let peripheral = Peripheral::new(transport, events, PeripheralConfig::default());
//! peripheral.connect(|progress| println!("{progress}")).await?;
//! let networks = peripheral.scan_for_wifi_networks(None).await?;
//! ```

mod classify;
mod config;
mod engine;
mod error;
mod peripheral;
mod policy;
mod sequencer;
mod transport;
mod wifi;

#[cfg(test)]
mod mock;

pub use config::*;
pub use engine::*;
pub use error::*;
pub use peripheral::*;
pub use policy::*;
pub use sequencer::*;
pub use transport::*;
pub use wifi::*;

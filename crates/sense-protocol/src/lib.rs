//! Sense BLE Command Protocol
//!
//! This crate provides types and utilities for talking to a Sense bedside unit
//! over its BLE command service. The service exposes two characteristics: the
//! host writes commands to one and the device notifies responses on the other.
//!
//! # Protocol Overview
//!
//! Commands and responses share one envelope: a kind byte, the command
//! version, then tag-length-value fields. A successful response carries the
//! same kind as the command it answers; failures carry the `Error` kind and a
//! device error code.
//!
//! The link bounds each transmission unit to 20 bytes, so every message is
//! split into ordered fragments by [`FragmentCodec`] and reassembled on the
//! other side.
//!
//! # Example
//!
//! ```rust,ignore
//! use sense_protocol::{Command, CommandKind, FragmentCodec, Response};
//!
//! // Build and fragment a command
//! let cmd = Command::new(CommandKind::GetWifiEndpoint, 0);
//! let fragments = FragmentCodec::new().split(&cmd.encode()?)?;
//!
//! // Reassemble and parse a response
//! let mut codec = FragmentCodec::new();
//! if let Some(message) = codec.feed(&received)? {
//!     let response = Response::decode(&message)?;
//! }
//! ```

mod advertising;
mod commands;
mod constants;
mod error;
mod fragment;
mod payload;
mod responses;
mod types;

pub use advertising::*;
pub use commands::*;
pub use constants::*;
pub use error::*;
pub use fragment::*;
pub use payload::*;
pub use responses::*;
pub use types::*;

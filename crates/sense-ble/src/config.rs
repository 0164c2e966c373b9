//! Peripheral configuration.
//!
//! All fields have defaults, so a YAML file only needs the values it changes:
//!
//! ```yaml
//! bond_order: connect_before_bond
//! timeouts:
//!   set_wifi_secs: 120
//! ```

use std::path::Path;
use std::time::Duration;

use sense_protocol::MAX_FRAGMENT_SIZE;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Host API level from which bonding must happen before connecting.
pub const BOND_FIRST_API_LEVEL: u32 = 21;

/// Errors that can occur when loading configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error reading {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("YAML parsing error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Order of the bond and connect steps.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BondOrder {
    /// Bond, then connect. For hosts that cannot bond on an open connection.
    #[default]
    BondBeforeConnect,
    /// Connect, then bond. For hosts that cannot bond without a connection.
    ConnectBeforeBond,
}

impl BondOrder {
    /// The order a host platform needs, by its API level.
    pub fn for_host_api_level(level: u32) -> Self {
        if level >= BOND_FIRST_API_LEVEL {
            BondOrder::BondBeforeConnect
        } else {
            BondOrder::ConnectBeforeBond
        }
    }
}

/// Per-operation timeouts, in seconds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Timeouts {
    /// Every individual transport operation.
    pub stack_operation_secs: u64,
    /// Removing the bond.
    pub remove_bond_secs: u64,
    /// Simple request/response commands.
    pub simple_command_secs: u64,
    /// LED animations.
    pub animation_secs: u64,
    /// Pairing an accessory.
    pub pair_pill_secs: u64,
    /// Joining a Wi-Fi network, re-armed on each progress update.
    pub set_wifi_secs: u64,
    /// Scanning for Wi-Fi networks, re-armed on each result.
    pub wifi_scan_secs: u64,
}

impl Default for Timeouts {
    fn default() -> Self {
        Self {
            stack_operation_secs: 30,
            remove_bond_secs: 15,
            simple_command_secs: 45,
            animation_secs: 45,
            pair_pill_secs: 90,
            set_wifi_secs: 90,
            wifi_scan_secs: 30,
        }
    }
}

impl Timeouts {
    pub fn stack_operation(&self) -> Duration {
        Duration::from_secs(self.stack_operation_secs)
    }

    pub fn remove_bond(&self) -> Duration {
        Duration::from_secs(self.remove_bond_secs)
    }

    pub fn simple_command(&self) -> Duration {
        Duration::from_secs(self.simple_command_secs)
    }

    pub fn animation(&self) -> Duration {
        Duration::from_secs(self.animation_secs)
    }

    pub fn pair_pill(&self) -> Duration {
        Duration::from_secs(self.pair_pill_secs)
    }

    pub fn set_wifi(&self) -> Duration {
        Duration::from_secs(self.set_wifi_secs)
    }

    pub fn wifi_scan(&self) -> Duration {
        Duration::from_secs(self.wifi_scan_secs)
    }

    fn all(&self) -> [(&'static str, u64); 7] {
        [
            ("stack_operation_secs", self.stack_operation_secs),
            ("remove_bond_secs", self.remove_bond_secs),
            ("simple_command_secs", self.simple_command_secs),
            ("animation_secs", self.animation_secs),
            ("pair_pill_secs", self.pair_pill_secs),
            ("set_wifi_secs", self.set_wifi_secs),
            ("wifi_scan_secs", self.wifi_scan_secs),
        ]
    }
}

/// Configuration for one peripheral.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PeripheralConfig {
    /// Operation timeouts.
    pub timeouts: Timeouts,
    /// Order of the bond and connect steps.
    pub bond_order: BondOrder,
    /// Negotiated transmission unit size in bytes.
    pub fragment_size: usize,
}

impl Default for PeripheralConfig {
    fn default() -> Self {
        Self {
            timeouts: Timeouts::default(),
            bond_order: BondOrder::default(),
            fragment_size: MAX_FRAGMENT_SIZE,
        }
    }
}

impl PeripheralConfig {
    /// Parse configuration from YAML text.
    pub fn from_yaml_str(yaml: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_yaml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a YAML file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let yaml = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_yaml_str(&yaml)
    }

    /// Serialize to YAML.
    pub fn to_yaml(&self) -> Result<String, ConfigError> {
        Ok(serde_yaml::to_string(self)?)
    }

    /// Check values the engine cannot work with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        // A unit must hold the first-fragment header plus one data byte
        if self.fragment_size < 3 {
            return Err(ConfigError::Invalid(format!(
                "fragment_size must be at least 3, got {}",
                self.fragment_size
            )));
        }
        for (name, secs) in self.timeouts.all() {
            if secs == 0 {
                return Err(ConfigError::Invalid(format!("{} must be non-zero", name)));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = PeripheralConfig::default();
        assert_eq!(config.timeouts.stack_operation(), Duration::from_secs(30));
        assert_eq!(config.timeouts.remove_bond(), Duration::from_secs(15));
        assert_eq!(config.timeouts.pair_pill(), Duration::from_secs(90));
        assert_eq!(config.timeouts.wifi_scan(), Duration::from_secs(30));
        assert_eq!(config.fragment_size, 20);
        assert_eq!(config.bond_order, BondOrder::BondBeforeConnect);
    }

    #[test]
    fn test_partial_yaml() {
        let config = PeripheralConfig::from_yaml_str(
            "bond_order: connect_before_bond\ntimeouts:\n  set_wifi_secs: 120\n",
        )
        .unwrap();
        assert_eq!(config.bond_order, BondOrder::ConnectBeforeBond);
        assert_eq!(config.timeouts.set_wifi(), Duration::from_secs(120));
        assert_eq!(config.timeouts.simple_command(), Duration::from_secs(45));
    }

    #[test]
    fn test_yaml_round_trip() {
        let config = PeripheralConfig::default();
        let yaml = config.to_yaml().unwrap();
        assert_eq!(PeripheralConfig::from_yaml_str(&yaml).unwrap(), config);
    }

    #[test]
    fn test_invalid_values() {
        assert!(matches!(
            PeripheralConfig::from_yaml_str("fragment_size: 2"),
            Err(ConfigError::Invalid(_))
        ));
        assert!(matches!(
            PeripheralConfig::from_yaml_str("timeouts:\n  wifi_scan_secs: 0"),
            Err(ConfigError::Invalid(_))
        ));
        assert!(matches!(
            PeripheralConfig::from_yaml_str("bond_order: sideways"),
            Err(ConfigError::Yaml(_))
        ));
    }

    #[test]
    fn test_bond_order_for_api_level() {
        assert_eq!(BondOrder::for_host_api_level(19), BondOrder::ConnectBeforeBond);
        assert_eq!(BondOrder::for_host_api_level(21), BondOrder::BondBeforeConnect);
        assert_eq!(BondOrder::for_host_api_level(30), BondOrder::BondBeforeConnect);
    }
}

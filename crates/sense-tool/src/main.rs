//! Command-line helpers for the Sense BLE command protocol.
//!
//! Encodes commands into the fragments a host would write, decodes captured
//! response fragments, and prints the effective peripheral configuration.

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use sense_ble::{prepare_wifi_command, ConfigError, PeripheralConfig, ValidationError};
use sense_protocol::{
    Command, CommandKind, CountryCode, FragmentCodec, ProtocolError, Response, WifiSecurityType,
    COMMAND_VERSION_PVT, MAX_FRAGMENT_SIZE,
};
use thiserror::Error;
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "sense-tool", version, about = "Sense BLE command protocol helpers")]
struct Cli {
    /// Enable debug logging (overridden by RUST_LOG)
    #[arg(short, long, global = true, default_value_t = false)]
    verbose: bool,

    #[command(subcommand)]
    command: ToolCommand,
}

#[derive(Subcommand, Debug)]
enum ToolCommand {
    /// Encode a command and print its fragments as hex, one per line.
    Fragment {
        /// Command kind, by name (`pair_pill`) or code.
        kind: CommandKind,

        /// Command version.
        #[arg(long, default_value_t = COMMAND_VERSION_PVT)]
        version: u32,

        /// Transmission unit size in bytes.
        #[arg(long, default_value_t = MAX_FRAGMENT_SIZE)]
        unit_size: usize,

        /// Account token for pairing commands.
        #[arg(long)]
        account: Option<String>,

        /// Network name for `set_wifi_endpoint`.
        #[arg(long)]
        ssid: Option<String>,

        /// Network password for `set_wifi_endpoint`.
        #[arg(long)]
        password: Option<String>,

        /// Network security: open, wep, wpa, wpa2.
        #[arg(long, default_value = "open")]
        security: WifiSecurityType,

        /// Regulatory domain for `start_wifi_scan`: EU, JP, US.
        #[arg(long)]
        country: Option<CountryCode>,
    },

    /// Reassemble hex fragments and print the decoded response as JSON.
    Reassemble {
        /// Fragments in arrival order, hex encoded.
        #[arg(required = true, num_args = 1..)]
        fragments: Vec<String>,

        /// Transmission unit size in bytes.
        #[arg(long, default_value_t = MAX_FRAGMENT_SIZE)]
        unit_size: usize,
    },

    /// Print the effective peripheral configuration as YAML.
    Config {
        /// Configuration file to load; defaults are used otherwise.
        #[arg(short, long)]
        file: Option<PathBuf>,
    },

    /// List the metrics recorded by the command engine.
    Metrics,
}

#[derive(Debug, Error)]
enum ToolError {
    #[error("invalid hex in fragment {index}: {source}")]
    Hex {
        index: usize,
        #[source]
        source: hex::FromHexError,
    },

    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("serialization failed: {0}")]
    Json(#[from] serde_json::Error),

    #[error("fragments ended before the message was complete")]
    Incomplete,
}

fn init_logging(verbose: bool) {
    let default = if verbose { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

#[allow(clippy::too_many_arguments)]
fn build_command(
    kind: CommandKind,
    version: u32,
    account: Option<String>,
    ssid: Option<String>,
    password: Option<String>,
    security: WifiSecurityType,
    country: Option<CountryCode>,
) -> Result<Command, ToolError> {
    let command = match kind {
        CommandKind::SetWifiEndpoint => prepare_wifi_command(
            version,
            ssid.as_deref().unwrap_or_default(),
            security,
            password.as_deref(),
        )?,
        CommandKind::StartWifiScan => Command::wifi_scan(version, country),
        CommandKind::PairPill | CommandKind::PairSense => {
            Command::with_account(kind, version, account.as_deref().unwrap_or_default())
        }
        kind => Command::new(kind, version),
    };
    Ok(command)
}

fn fragment(command: &Command, unit_size: usize) -> Result<Vec<String>, ToolError> {
    let encoded = command.encode()?;
    let fragments = FragmentCodec::with_unit_size(unit_size).split(&encoded)?;
    info!(
        "{} v{}: {} bytes in {} fragments",
        command.kind,
        command.version,
        encoded.len(),
        fragments.len()
    );
    Ok(fragments.iter().map(hex::encode).collect())
}

fn reassemble(fragments: &[String], unit_size: usize) -> Result<Response, ToolError> {
    let mut codec = FragmentCodec::with_unit_size(unit_size);
    for (index, text) in fragments.iter().enumerate() {
        let data = hex::decode(text.trim()).map_err(|source| ToolError::Hex { index, source })?;
        if let Some(message) = codec.feed(&data)? {
            if index + 1 < fragments.len() {
                debug!("ignoring {} fragments after complete message", fragments.len() - index - 1);
            }
            return Ok(Response::decode(&message)?);
        }
    }
    Err(ToolError::Incomplete)
}

fn load_config(file: Option<PathBuf>) -> Result<PeripheralConfig, ToolError> {
    let config = match file {
        Some(path) => PeripheralConfig::load(path)?,
        None => PeripheralConfig::default(),
    };
    config.validate()?;
    Ok(config)
}

fn run(cli: Cli) -> Result<(), ToolError> {
    match cli.command {
        ToolCommand::Fragment {
            kind,
            version,
            unit_size,
            account,
            ssid,
            password,
            security,
            country,
        } => {
            let command = build_command(kind, version, account, ssid, password, security, country)?;
            for line in fragment(&command, unit_size)? {
                println!("{}", line);
            }
        }
        ToolCommand::Reassemble {
            fragments,
            unit_size,
        } => {
            let response = reassemble(&fragments, unit_size)?;
            println!("{}", serde_json::to_string_pretty(&response)?);
        }
        ToolCommand::Config { file } => {
            print!("{}", load_config(file)?.to_yaml()?);
        }
        ToolCommand::Metrics => {
            for metric in sense_metrics::metric_defs::ALL {
                println!("{:<28} {:<10} {}", metric.name, metric.kind, metric.description);
            }
        }
    }
    Ok(())
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    if let Err(e) = run(cli) {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sense_protocol::{WifiConnectUpdate, WifiConnectionState};

    #[test]
    fn test_cli_parses() {
        let cli = Cli::try_parse_from([
            "sense-tool",
            "fragment",
            "set_wifi_endpoint",
            "--ssid",
            "home",
            "--password",
            "hunter22",
            "--security",
            "wpa2",
            "--version",
            "1",
        ])
        .unwrap();
        match cli.command {
            ToolCommand::Fragment {
                kind,
                version,
                security,
                ..
            } => {
                assert_eq!(kind, CommandKind::SetWifiEndpoint);
                assert_eq!(version, 1);
                assert_eq!(security, WifiSecurityType::Wpa2);
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_fragment_then_reassemble() {
        let update = WifiConnectUpdate::new(WifiConnectionState::DnsResolved);
        let mut response = Response::connection_state(&update, 1);
        response.payload.http_response_code = Some("200 OK".into());
        let fragments: Vec<String> = FragmentCodec::new()
            .split(&response.encode().unwrap())
            .unwrap()
            .iter()
            .map(hex::encode)
            .collect();

        let decoded = reassemble(&fragments, MAX_FRAGMENT_SIZE).unwrap();
        assert_eq!(decoded, response);
    }

    #[test]
    fn test_reassemble_incomplete() {
        let command = Command::with_account(CommandKind::PairSense, 0, "a long account token for two fragments");
        let lines = fragment(&command, MAX_FRAGMENT_SIZE).unwrap();
        assert!(lines.len() > 1);
        assert!(matches!(
            reassemble(&lines[..1], MAX_FRAGMENT_SIZE),
            Err(ToolError::Incomplete)
        ));
    }

    #[test]
    fn test_wifi_command_validated() {
        let err = build_command(
            CommandKind::SetWifiEndpoint,
            1,
            None,
            Some("home".into()),
            None,
            WifiSecurityType::Wpa2,
            None,
        )
        .unwrap_err();
        assert!(matches!(err, ToolError::Validation(ValidationError::EmptyCredential)));
    }
}

use clap::Parser;
use clap::builder::TypedValueParser;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Default serial device name (Windows style, matching the firmware docs).
pub const DEFAULT_SERIAL_PORT: &str = "COM3";

/// Default UART speed of the IMU firmware.
pub const DEFAULT_BAUD_RATE: u32 = 115200;

/// Default HTTP/WebSocket listen port.
pub const DEFAULT_WEB_PORT: u16 = 8080;

/// Delay between failed serial open attempts.
pub const DEFAULT_RETRY_SECS: u64 = 5;

/// Messages buffered per subscriber before it is considered too slow.
pub const DEFAULT_QUEUE_DEPTH: usize = 32;

/// Command line flags. Every flag can also be supplied through the
/// environment variable named in its `env` attribute.
#[derive(Parser, Debug, Clone)]
#[command(name = "quaternion-bridge")]
#[command(about = "Streams quaternion records from a serial port to WebSocket viewers")]
pub struct Cli {
    /// Serial port name (e.g., COM3 on Windows, /dev/ttyUSB0 on Linux)
    #[arg(long = "port", env = "SERIAL_PORT", default_value = DEFAULT_SERIAL_PORT)]
    pub serial_port: String,

    /// Baud rate for the serial port
    #[arg(long = "baud", env = "SERIAL_BAUD", default_value_t = DEFAULT_BAUD_RATE)]
    pub baud_rate: u32,

    /// HTTP server port
    #[arg(long = "web", env = "WEB_PORT", default_value_t = DEFAULT_WEB_PORT)]
    pub web_port: u16,

    /// Seconds to wait before retrying a failed serial open
    #[arg(
        long,
        env = "SERIAL_RETRY_SECS",
        default_value_t = DEFAULT_RETRY_SECS,
        value_parser = clap::value_parser!(u64).range(1..)
    )]
    pub retry_secs: u64,

    /// Per-subscriber message queue depth
    #[arg(
        long,
        env = "SUBSCRIBER_QUEUE_DEPTH",
        default_value_t = DEFAULT_QUEUE_DEPTH,
        value_parser = clap::value_parser!(u16).range(1..).map(|d| d as usize)
    )]
    pub queue_depth: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub serial: SerialConfig,
    pub web: WebConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SerialConfig {
    pub port_name: String,
    pub baud_rate: u32,
    pub retry_interval: Duration,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebConfig {
    pub port: u16,
    pub queue_depth: usize,
}

impl WebConfig {
    /// Address the listener binds to (all interfaces).
    pub fn bind_addr(&self) -> String {
        format!("0.0.0.0:{}", self.port)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            serial: SerialConfig {
                port_name: DEFAULT_SERIAL_PORT.to_string(),
                baud_rate: DEFAULT_BAUD_RATE,
                retry_interval: Duration::from_secs(DEFAULT_RETRY_SECS),
            },
            web: WebConfig {
                port: DEFAULT_WEB_PORT,
                queue_depth: DEFAULT_QUEUE_DEPTH,
            },
        }
    }
}

impl From<Cli> for Config {
    fn from(cli: Cli) -> Self {
        Self {
            serial: SerialConfig {
                port_name: cli.serial_port,
                baud_rate: cli.baud_rate,
                retry_interval: Duration::from_secs(cli.retry_secs),
            },
            web: WebConfig {
                port: cli.web_port,
                queue_depth: cli.queue_depth,
            },
        }
    }
}

impl Config {
    /// Parse the process arguments (and env fallbacks) into a config.
    pub fn from_args() -> Self {
        Cli::parse().into()
    }
}

//! Development tool that watches a running bridge.
//!
//! Usage:
//!   cargo run --bin ws-monitor
//!   cargo run --bin ws-monitor -- --url ws://10.0.0.5:8080/ws --count 10
//!
//! Connects to the bridge's WebSocket endpoint and logs every quaternion it
//! receives, along with its norm, so the IMU stream can be checked without a
//! browser.

use clap::Parser;
use futures_util::{SinkExt, StreamExt};
use log::{info, warn};
use quaternion_bridge::sensors::Quaternion;
use std::time::Duration;
use tokio_tungstenite::{connect_async, tungstenite::Message};

/// Default bridge WebSocket URL
const DEFAULT_BRIDGE_URL: &str = "ws://localhost:8080/ws";

#[derive(Parser)]
#[command(name = "ws-monitor")]
#[command(about = "Log quaternions streamed by a running quaternion bridge")]
struct Cli {
    /// Bridge WebSocket URL
    #[arg(long, env = "BRIDGE_URL", default_value = DEFAULT_BRIDGE_URL)]
    url: String,

    /// Stop after this many records (0 = run until Ctrl+C)
    #[arg(long, default_value_t = 0)]
    count: u64,

    /// Seconds between keep-alive pings
    #[arg(long, default_value_t = 15)]
    ping_secs: u64,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();
    info!("Connecting to {}", cli.url);

    let (ws_stream, _) = connect_async(cli.url.as_str()).await?;
    info!("Connected");

    let (mut write, mut read) = ws_stream.split();
    let mut ping = tokio::time::interval(Duration::from_secs(cli.ping_secs.max(1)));
    let mut received = 0u64;

    loop {
        tokio::select! {
            msg = read.next() => {
                match msg {
                    Some(Ok(Message::Text(text))) => {
                        match serde_json::from_str::<Quaternion>(text.as_str()) {
                            Ok(q) => {
                                received += 1;
                                let norm = (q.i * q.i + q.j * q.j + q.k * q.k + q.real * q.real).sqrt();
                                info!(
                                    "#{:<6} i={:+.4} j={:+.4} k={:+.4} real={:+.4} |q|={:.4}",
                                    received, q.i, q.j, q.k, q.real, norm
                                );
                                if cli.count > 0 && received >= cli.count {
                                    break;
                                }
                            }
                            Err(e) => warn!("Unexpected message {:?}: {}", text.as_str(), e),
                        }
                    }
                    Some(Ok(Message::Close(_))) | None => {
                        warn!("Bridge closed the connection");
                        break;
                    }
                    Some(Ok(_)) => {}
                    Some(Err(e)) => {
                        warn!("WebSocket error: {}", e);
                        break;
                    }
                }
            }
            _ = ping.tick() => {
                write.send(Message::Ping(Vec::new().into())).await?;
            }
            _ = tokio::signal::ctrl_c() => {
                info!("Shutting down...");
                break;
            }
        }
    }

    let _ = write.close().await;
    info!("Received {} record(s)", received);
    Ok(())
}

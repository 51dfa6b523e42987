use log::{error, info};
use quaternion_bridge::config::Config;
use quaternion_bridge::hub::BroadcastHub;
use quaternion_bridge::input::serial::{IngestLoop, SerialSource};
use quaternion_bridge::sensors::LatestValue;
use quaternion_bridge::server;
use std::sync::Arc;
use tokio::signal;

fn init_logger() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp_millis()
        .init();
}

#[tokio::main]
async fn main() {
    init_logger();
    info!("Starting Quaternion Bridge");

    let config = Config::from_args();

    // Shared state, owned here and handed to the ingest thread and web tasks
    let latest = Arc::new(LatestValue::new());
    let hub = Arc::new(BroadcastHub::new(latest.clone(), config.web.queue_depth));

    let bind_addr = config.web.bind_addr();
    let listener = match server::bind(&bind_addr).await {
        Ok(listener) => listener,
        Err(e) => {
            error!("{}", e);
            std::process::exit(1);
        }
    };

    let source = SerialSource::from_config(&config.serial);
    let ingest = IngestLoop::new(
        source,
        latest,
        hub.clone(),
        config.serial.retry_interval,
    );
    if let Err(e) = ingest.spawn() {
        error!("Failed to spawn serial ingest thread: {}", e);
        std::process::exit(1);
    }

    info!("Starting web server on http://localhost:{}", config.web.port);
    info!(
        "Listening to serial port: {} at {} baud",
        config.serial.port_name, config.serial.baud_rate
    );

    let web_task = server::start(listener, hub);

    match signal::ctrl_c().await {
        Ok(()) => {
            info!("Received shutdown signal");
        }
        Err(e) => {
            error!("Failed to listen for shutdown signal: {}", e);
        }
    }

    web_task.abort();
    info!("Quaternion Bridge stopped");
}

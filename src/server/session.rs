//! One WebSocket subscriber connection.

use crate::hub::BroadcastHub;
use axum::extract::ws::{Message, WebSocket};
use futures_util::{SinkExt, StreamExt};
use log::{debug, info};
use std::net::SocketAddr;
use std::sync::Arc;

/// Run a subscriber session on an upgraded connection.
///
/// A spawned writer task drains the subscription queue into the socket. This
/// task drains inbound traffic only to notice when the peer goes away. When
/// either side finishes the subscriber is unregistered.
pub async fn run_session(socket: WebSocket, hub: Arc<BroadcastHub>, peer: SocketAddr) {
    let (mut write, mut read) = socket.split();

    let subscription = hub.register();
    let id = subscription.id();
    let mut queue = subscription.into_receiver();

    let mut writer = tokio::spawn(async move {
        while let Some(frame) = queue.recv().await {
            if let Err(e) = write.send(Message::Text(frame)).await {
                debug!("[Web] Write to subscriber {} failed: {}", id, e);
                return;
            }
        }
        // Hub dropped us (evicted or unregistered)
        let _ = write.close().await;
    });

    let drain = async {
        while let Some(msg) = read.next().await {
            match msg {
                Ok(Message::Close(_)) => break,
                Ok(_) => {}
                Err(e) => {
                    debug!("[Web] Read from subscriber {} failed: {}", id, e);
                    break;
                }
            }
        }
    };

    tokio::select! {
        _ = drain => {}
        _ = &mut writer => {}
    }

    hub.unregister(id);
    writer.abort();
    info!("[Web] WebSocket client disconnected: {}", peer);
}

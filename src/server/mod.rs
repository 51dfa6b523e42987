//! HTTP/WebSocket front end.
//!
//! Serves the viewer page at `/` and upgrades `/ws` to a WebSocket whose
//! outbound messages come from a [`BroadcastHub`] subscription.

mod session;

pub use session::run_session;

use crate::error::{BridgeError, Result};
use crate::hub::BroadcastHub;
use axum::Router;
use axum::extract::ws::WebSocketUpgrade;
use axum::extract::{ConnectInfo, State};
use axum::response::{Html, Response};
use axum::routing::get;
use log::{error, info};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;

/// Path of the WebSocket endpoint.
pub const WS_PATH: &str = "/ws";

/// Viewer page served at `/`.
pub const VIEWER_HTML: &str = include_str!("../../static/index.html");

/// Routes of the web front end. Anything else gets axum's 404 fallback.
pub fn router(hub: Arc<BroadcastHub>) -> Router {
    Router::new()
        .route("/", get(viewer))
        .route(WS_PATH, get(ws_handler))
        .with_state(hub)
}

async fn viewer() -> Html<&'static str> {
    Html(VIEWER_HTML)
}

async fn ws_handler(
    ws: WebSocketUpgrade,
    State(hub): State<Arc<BroadcastHub>>,
    ConnectInfo(peer): ConnectInfo<SocketAddr>,
) -> Response {
    info!("[Web] New WebSocket client connected: {}", peer);
    ws.on_upgrade(move |socket| run_session(socket, hub, peer))
}

/// Bind the listener for the web front end.
pub async fn bind(addr: &str) -> Result<TcpListener> {
    TcpListener::bind(addr)
        .await
        .map_err(|source| BridgeError::BindFailed {
            addr: addr.to_string(),
            source,
        })
}

/// Serve the front end until the listener fails.
///
/// Failed accepts (for example descriptor exhaustion) are retried by
/// `axum::serve` after a one second pause.
pub async fn serve(listener: TcpListener, hub: Arc<BroadcastHub>) -> Result<()> {
    let app = router(hub).into_make_service_with_connect_info::<SocketAddr>();
    axum::serve(listener, app).await?;
    Ok(())
}

/// Spawn [`serve`] on the current runtime.
pub fn start(listener: TcpListener, hub: Arc<BroadcastHub>) -> JoinHandle<()> {
    tokio::spawn(async move {
        if let Err(e) = serve(listener, hub).await {
            error!("[Web] Server stopped: {}", e);
        }
    })
}

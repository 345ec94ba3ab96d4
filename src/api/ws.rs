//! WebSocket endpoint carrying the live location feed in and alert push
//! notifications out, one connection per authenticated customer.

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        Extension, Query,
    },
    http::StatusCode,
    response::{IntoResponse, Response},
};
use futures::{SinkExt, StreamExt};
use serde::Deserialize;
use std::sync::Arc;
use tracing::{info, warn};

use crate::api::middleware::JwtSecret;
use crate::auth;
use crate::geo::GeoPoint;
use crate::live::LiveHub;
use crate::tracking::LocationRegistry;

#[derive(Deserialize)]
pub struct WsQuery {
    token: Option<String>,
}

/// Inbound location ping frame.
#[derive(Deserialize)]
struct LocationPing {
    latitude: f64,
    longitude: f64,
}

// GET /ws?token=<jwt>
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    Query(params): Query<WsQuery>,
    Extension(secret): Extension<JwtSecret>,
    Extension(registry): Extension<Arc<LocationRegistry>>,
    Extension(hub): Extension<Arc<LiveHub>>,
) -> Response {
    let claims = match params.token.as_deref().map(|t| auth::verify_token(t, &secret.0)) {
        Some(Ok(claims)) => claims,
        _ => return (StatusCode::UNAUTHORIZED, "Unauthorized").into_response(),
    };

    let identity = claims.sub;
    ws.on_upgrade(move |socket| handle_socket(socket, identity, registry, hub))
}

async fn handle_socket(
    socket: WebSocket,
    identity: String,
    registry: Arc<LocationRegistry>,
    hub: Arc<LiveHub>,
) {
    info!("live connection opened for {}", identity);
    let (channel, mut pushes) = hub.subscribe(&identity);
    let (mut sender, mut receiver) = socket.split();

    loop {
        tokio::select! {
            frame = receiver.next() => match frame {
                Some(Ok(Message::Text(text))) => {
                    handle_ping(&identity, &text, &registry);
                }
                Some(Ok(Message::Close(_))) | None => break,
                Some(Ok(_)) => {}
                Some(Err(e)) => {
                    warn!("websocket error for {}: {}", identity, e);
                    break;
                }
            },
            pushed = pushes.recv() => match pushed {
                Some(alert) => {
                    let payload = match serde_json::to_string(&alert) {
                        Ok(p) => p,
                        Err(e) => {
                            warn!("failed to serialize alert {}: {}", alert.id, e);
                            continue;
                        }
                    };
                    if sender.send(Message::Text(payload)).await.is_err() {
                        break;
                    }
                }
                // Sender gone: a reconnect replaced our hub entry.
                None => break,
            },
        }
    }

    // Removes the entry only if it is still ours; a replacement from a
    // reconnect stays registered.
    hub.unsubscribe(&identity, &channel);
    info!("live connection closed for {}", identity);
}

fn handle_ping(identity: &str, text: &str, registry: &LocationRegistry) {
    let ping: LocationPing = match serde_json::from_str(text) {
        Ok(p) => p,
        Err(e) => {
            warn!("malformed location ping from {}: {}", identity, e);
            return;
        }
    };
    match GeoPoint::new(ping.latitude, ping.longitude) {
        Ok(point) => registry.update(identity, point),
        Err(e) => warn!("rejected location ping from {}: {}", identity, e),
    }
}

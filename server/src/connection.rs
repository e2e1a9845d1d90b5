//! One websocket client: handshake, reader and writer
//!
//! The upgrade request names the player (`/ws?id=...&name=...`). After the
//! handshake the socket is split: the writer drains the connection's bounded
//! queue, the reader feeds frames to the game loop. Whichever half stops
//! first tears down the other, and so does an eviction by the hub. The
//! connection is then removed from the hub and reported to the game as gone.

use crate::game::GameHandle;
use crate::hub::{ConnectionEntry, ConnectionId, ConnectionQueue, HubHandle};
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use log::{debug, error, info, warn};
use std::net::SocketAddr;
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::handshake::server::{ErrorResponse, Request, Response};
use tokio_tungstenite::tungstenite::http::StatusCode;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::WebSocketStream;

pub const WEBSOCKET_PATH: &str = "/ws";

/// Who is on the other end, fixed for the lifetime of the connection
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlayerIdentity {
    pub id: String,
    pub name: String,
}

/// Reads `id` and `name` from a query string. The id is required; the name
/// falls back to the id.
pub fn parse_identity(query: Option<&str>) -> Option<PlayerIdentity> {
    let mut id = None;
    let mut name = None;
    for (key, value) in url::form_urlencoded::parse(query?.as_bytes()) {
        match key.as_ref() {
            "id" => id = Some(value.trim().to_string()),
            "name" => name = Some(value.trim().to_string()),
            _ => {}
        }
    }

    let id = id.filter(|id| !id.is_empty())?;
    let name = name.filter(|name| !name.is_empty()).unwrap_or_else(|| id.clone());
    Some(PlayerIdentity { id, name })
}

fn reject(status: StatusCode, reason: &str) -> ErrorResponse {
    let mut response = ErrorResponse::new(Some(reason.to_string()));
    *response.status_mut() = status;
    response
}

/// Runs one connection to completion.
pub async fn handle_connection(
    stream: TcpStream,
    addr: SocketAddr,
    connection_id: ConnectionId,
    game: GameHandle,
    hub: HubHandle,
    queue_capacity: usize,
) {
    let mut identity = None;
    let handshake = tokio_tungstenite::accept_hdr_async(stream, |request: &Request, response: Response| {
        if request.uri().path() != WEBSOCKET_PATH {
            return Err(reject(StatusCode::NOT_FOUND, "not found"));
        }
        match parse_identity(request.uri().query()) {
            Some(player) => {
                identity = Some(player);
                Ok(response)
            }
            None => Err(reject(StatusCode::BAD_REQUEST, "missing player id")),
        }
    })
    .await;

    let ws_stream = match handshake {
        Ok(ws_stream) => ws_stream,
        Err(e) => {
            warn!("Rejected websocket handshake from {}: {}", addr, e);
            return;
        }
    };
    let Some(player) = identity else {
        return;
    };

    info!(
        "Connection {} from {} for player {} ({})",
        connection_id, addr, player.id, player.name
    );

    let (entry, queue) = ConnectionEntry::new(connection_id, &player.id, queue_capacity);
    let ConnectionQueue { frames, evicted } = queue;
    hub.register(entry);
    if !game.player_connected(&player.id).await {
        debug!("Game loop gone, connect of {} not recorded", player.id);
    }

    // Dropping the unfinished halves closes the socket.
    let (outgoing, incoming) = ws_stream.split();
    tokio::select! {
        _ = write_loop(outgoing, frames, connection_id) => {
            debug!("Writer for connection {} finished", connection_id);
        }
        _ = read_loop(incoming, &game, &player, connection_id) => {
            debug!("Reader for connection {} finished", connection_id);
        }
        _ = evicted => {
            warn!("Connection {} evicted by the hub", connection_id);
        }
    }

    hub.unregister(connection_id);
    if !game.player_disconnected(&player.id).await {
        debug!("Game loop gone, disconnect of {} not recorded", player.id);
    }
    info!("Connection {} for player {} closed", connection_id, player.id);
}

/// Writes queued frames in order. Says goodbye with a close frame if the
/// queue closes first.
async fn write_loop(
    mut outgoing: SplitSink<WebSocketStream<TcpStream>, Message>,
    mut queue: mpsc::Receiver<Message>,
    connection_id: ConnectionId,
) {
    while let Some(message) = queue.recv().await {
        if let Err(e) = outgoing.send(message).await {
            error!("Write to connection {} failed: {}", connection_id, e);
            return;
        }
    }

    if let Err(e) = outgoing.send(Message::Close(None)).await {
        debug!("Close frame to connection {} failed: {}", connection_id, e);
    }
}

async fn read_loop(
    mut incoming: SplitStream<WebSocketStream<TcpStream>>,
    game: &GameHandle,
    player: &PlayerIdentity,
    connection_id: ConnectionId,
) {
    while let Some(message) = incoming.next().await {
        match message {
            Ok(Message::Text(text)) => {
                if !game
                    .submit_frame(&player.id, &player.name, text.as_str().to_string())
                    .await
                {
                    error!("Game loop stopped, closing connection {}", connection_id);
                    return;
                }
            }
            Ok(Message::Binary(_)) => {
                warn!("Ignoring binary frame from connection {}", connection_id);
            }
            Ok(Message::Close(_)) => return,
            Ok(_) => {}
            Err(e) => {
                warn!("Read from connection {} failed: {}", connection_id, e);
                return;
            }
        }
    }
}

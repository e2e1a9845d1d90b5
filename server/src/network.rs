//! Server network layer: accepts TCP connections and wires up the game

use crate::config::GameConfig;
use crate::connection::handle_connection;
use crate::game::{GameHandle, GameLoop};
use crate::hub::{ConnectionId, Hub, HubHandle};
use crate::session::GameSession;
use log::{error, info};
use std::net::SocketAddr;
use tokio::net::{TcpListener, TcpStream};
use tokio::time::{self, Duration};

/// Longest pause between failed accepts before giving up
const MAX_ACCEPT_BACKOFF_SECS: u64 = 64;

/// Main server owning the listener, the hub task and the game loop task
pub struct Server {
    listener: TcpListener,
    hub: Hub,
    hub_handle: HubHandle,
    game_loop: GameLoop,
    game_handle: GameHandle,
    queue_capacity: usize,
    next_connection_id: ConnectionId,
}

impl Server {
    pub async fn bind(addr: &str, config: GameConfig) -> crate::Result<Self> {
        config.validate()?;

        let listener = TcpListener::bind(addr).await?;
        info!("Server listening on {}", listener.local_addr()?);

        let queue_capacity = config.send_queue_capacity;
        let (hub, hub_handle) = Hub::new();
        let (game_loop, game_handle) =
            GameLoop::new(GameSession::new(config), hub_handle.clone());

        Ok(Server {
            listener,
            hub,
            hub_handle,
            game_loop,
            game_handle,
            queue_capacity,
            next_connection_id: 1,
        })
    }

    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    pub fn game_handle(&self) -> GameHandle {
        self.game_handle.clone()
    }

    pub fn hub_handle(&self) -> HubHandle {
        self.hub_handle.clone()
    }

    /// Starts the hub and game loop, then accepts connections until the
    /// listener fails for good.
    pub async fn run(self) -> crate::Result<()> {
        let Server {
            listener,
            hub,
            hub_handle,
            game_loop,
            game_handle,
            queue_capacity,
            mut next_connection_id,
        } = self;

        tokio::spawn(hub.run());
        tokio::spawn(game_loop.run());
        info!("Server started successfully");

        loop {
            let (stream, addr) = accept(&listener).await?;
            let connection_id = next_connection_id;
            next_connection_id += 1;

            tokio::spawn(handle_connection(
                stream,
                addr,
                connection_id,
                game_handle.clone(),
                hub_handle.clone(),
                queue_capacity,
            ));
        }
    }
}

/// Accepts the next connection, backing off exponentially on errors.
async fn accept(listener: &TcpListener) -> crate::Result<(TcpStream, SocketAddr)> {
    let mut backoff = 1;
    loop {
        match listener.accept().await {
            Ok((stream, addr)) => return Ok((stream, addr)),
            Err(err) => {
                if backoff > MAX_ACCEPT_BACKOFF_SECS {
                    error!("Giving up accepting connections: {}", err);
                    return Err(err.into());
                }
                error!("Accept failed, retrying in {}s: {}", backoff, err);
            }
        }

        time::sleep(Duration::from_secs(backoff)).await;
        backoff *= 2;
    }
}

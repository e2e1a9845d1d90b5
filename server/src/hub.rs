//! Connection hub: the registry of live connections and broadcast delivery
//!
//! The registry is owned by a single task and only reached through
//! [`HubCommand`]s, so register, unregister and broadcast never interleave.
//! Delivery uses `try_send` on each connection's bounded queue. A connection
//! whose queue is full (or already closed) is dropped from the registry on
//! the spot and its eviction signal fires, which tears down both halves of
//! the socket without waiting for the backlog to flush.

use crate::session::Outbound;
use log::{debug, error, info, warn};
use shared::{Envelope, GameStateSnapshot};
use std::collections::HashMap;
use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{mpsc, oneshot};
use tokio_tungstenite::tungstenite::Message;

pub type ConnectionId = u64;

/// The hub's side of one connection
#[derive(Debug)]
pub struct ConnectionEntry {
    pub id: ConnectionId,
    pub player_id: String,
    pub sender: mpsc::Sender<Message>,
    pub evicted: oneshot::Sender<()>,
}

/// The connection's side: queued frames and the eviction signal.
/// `evicted` also resolves if the hub goes away.
#[derive(Debug)]
pub struct ConnectionQueue {
    pub frames: mpsc::Receiver<Message>,
    pub evicted: oneshot::Receiver<()>,
}

impl ConnectionEntry {
    pub fn new(id: ConnectionId, player_id: &str, capacity: usize) -> (Self, ConnectionQueue) {
        let (sender, frames) = mpsc::channel(capacity);
        let (evicted_tx, evicted) = oneshot::channel();
        let entry = Self {
            id,
            player_id: player_id.to_string(),
            sender,
            evicted: evicted_tx,
        };
        (entry, ConnectionQueue { frames, evicted })
    }
}

#[derive(Debug)]
pub enum HubCommand {
    Register(ConnectionEntry),
    Unregister(ConnectionId),
    Broadcast(Outbound),
    ConnectionCount(oneshot::Sender<usize>),
}

#[derive(Debug, Clone)]
pub struct HubHandle {
    tx: mpsc::UnboundedSender<HubCommand>,
}

impl HubHandle {
    pub fn register(&self, entry: ConnectionEntry) {
        self.send(HubCommand::Register(entry));
    }

    pub fn unregister(&self, id: ConnectionId) {
        self.send(HubCommand::Unregister(id));
    }

    pub fn broadcast(&self, outbound: Outbound) {
        self.send(HubCommand::Broadcast(outbound));
    }

    /// Number of registered connections once every earlier command is applied.
    pub async fn connection_count(&self) -> Option<usize> {
        let (reply, rx) = oneshot::channel();
        self.send(HubCommand::ConnectionCount(reply));
        rx.await.ok()
    }

    fn send(&self, command: HubCommand) {
        if let Err(e) = self.tx.send(command) {
            error!("Hub is gone, dropping {:?}", e.0);
        }
    }
}

pub struct Hub {
    connections: HashMap<ConnectionId, ConnectionEntry>,
    commands: mpsc::UnboundedReceiver<HubCommand>,
}

impl Hub {
    pub fn new() -> (Self, HubHandle) {
        let (tx, rx) = mpsc::unbounded_channel();
        let hub = Self {
            connections: HashMap::new(),
            commands: rx,
        };
        (hub, HubHandle { tx })
    }

    pub async fn run(mut self) {
        while let Some(command) = self.commands.recv().await {
            match command {
                HubCommand::Register(entry) => {
                    debug!("Registered connection {} ({})", entry.id, entry.player_id);
                    self.connections.insert(entry.id, entry);
                }
                HubCommand::Unregister(id) => {
                    if self.connections.remove(&id).is_some() {
                        debug!("Unregistered connection {}", id);
                    }
                }
                HubCommand::Broadcast(outbound) => self.broadcast(outbound),
                HubCommand::ConnectionCount(reply) => {
                    let _ = reply.send(self.connections.len());
                }
            }
        }
        info!("Hub stopped");
    }

    fn broadcast(&mut self, outbound: Outbound) {
        let mut frames = Frames::new(outbound);
        let mut dropped = Vec::new();

        for (id, entry) in &self.connections {
            let Some(message) = frames.for_player(&entry.player_id) else {
                continue;
            };
            match entry.sender.try_send(message) {
                Ok(()) => {}
                Err(TrySendError::Full(_)) => {
                    warn!(
                        "Connection {} ({}) is not keeping up, disconnecting",
                        id, entry.player_id
                    );
                    dropped.push(*id);
                }
                Err(TrySendError::Closed(_)) => {
                    debug!("Connection {} already closed", id);
                    dropped.push(*id);
                }
            }
        }

        for id in dropped {
            if let Some(entry) = self.connections.remove(&id) {
                let _ = entry.evicted.send(());
            }
        }
    }
}

/// Encodes each distinct view of an outbound message at most once.
/// A game state has two: the drawer's and everyone else's.
struct Frames {
    outbound: Outbound,
    drawer_frame: Option<Message>,
    guesser_frame: Option<Message>,
}

impl Frames {
    fn new(outbound: Outbound) -> Self {
        Self {
            outbound,
            drawer_frame: None,
            guesser_frame: None,
        }
    }

    fn for_player(&mut self, player_id: &str) -> Option<Message> {
        let state = match &self.outbound {
            Outbound::Relay(frame) => return Some(Message::text(frame.clone())),
            Outbound::State(state) => state,
        };

        let is_drawer = state.is_drawer(player_id);
        let slot = if is_drawer {
            &mut self.drawer_frame
        } else {
            &mut self.guesser_frame
        };
        if slot.is_none() {
            *slot = Some(render_state(&state.view_for(player_id))?);
        }
        slot.clone()
    }
}

fn render_state(view: &GameStateSnapshot) -> Option<Message> {
    match Envelope::game_state(view) {
        Ok(frame) => Some(Message::text(frame)),
        Err(e) => {
            error!("Failed to encode game state: {}", e);
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared::{EventKind, Phase, PlayerInfo};
    use std::collections::BTreeMap;
    use tokio_test::assert_ok;

    fn entry(
        id: ConnectionId,
        player_id: &str,
        capacity: usize,
    ) -> (ConnectionEntry, mpsc::Receiver<Message>) {
        let (entry, queue) = ConnectionEntry::new(id, player_id, capacity);
        (entry, queue.frames)
    }

    fn spawn_hub() -> HubHandle {
        let (hub, handle) = Hub::new();
        tokio::spawn(hub.run());
        handle
    }

    fn drawing_state() -> GameStateSnapshot {
        let players: BTreeMap<String, PlayerInfo> = ["a", "b", "c"]
            .iter()
            .map(|id| {
                (
                    id.to_string(),
                    PlayerInfo {
                        id: id.to_string(),
                        name: id.to_string(),
                        score: 0,
                        connected: true,
                    },
                )
            })
            .collect();
        GameStateSnapshot {
            current_word: Some("Raze".to_string()),
            current_drawer: Some("a".to_string()),
            players,
            round: 1,
            max_rounds: 3,
            state: Phase::Drawing,
            round_time_limit: 60,
            time_remaining: 60,
        }
    }

    fn decode(message: Message) -> Envelope {
        Envelope::decode(message.to_text().unwrap()).unwrap()
    }

    #[tokio::test]
    async fn test_register_and_unregister() {
        let hub = spawn_hub();
        let (first, _rx1) = entry(1, "a", 4);
        let (second, _rx2) = entry(2, "b", 4);
        hub.register(first);
        hub.register(second);
        assert_eq!(hub.connection_count().await, Some(2));

        hub.unregister(1);
        hub.unregister(1);
        assert_eq!(hub.connection_count().await, Some(1));
    }

    #[tokio::test]
    async fn test_relay_reaches_everyone() {
        let hub = spawn_hub();
        let (first, mut rx1) = entry(1, "a", 4);
        let (second, mut rx2) = entry(2, "b", 4);
        hub.register(first);
        hub.register(second);

        let frame = r#"{"type":"clearCanvas"}"#.to_string();
        hub.broadcast(Outbound::Relay(frame.clone()));

        assert_eq!(rx1.recv().await.unwrap().to_text().unwrap(), frame);
        assert_eq!(rx2.recv().await.unwrap().to_text().unwrap(), frame);
    }

    #[tokio::test]
    async fn test_state_is_rendered_per_recipient() {
        let hub = spawn_hub();
        let (drawer, mut drawer_rx) = entry(1, "a", 4);
        let (guesser, mut guesser_rx) = entry(2, "b", 4);
        hub.register(drawer);
        hub.register(guesser);

        hub.broadcast(Outbound::State(drawing_state()));

        let to_drawer = decode(drawer_rx.recv().await.unwrap());
        assert_eq!(to_drawer.kind, EventKind::GameState);
        assert_eq!(
            to_drawer.snapshot().unwrap().current_word.as_deref(),
            Some("Raze")
        );

        let to_guesser = decode(guesser_rx.recv().await.unwrap()).snapshot().unwrap();
        assert_eq!(to_guesser.current_word.as_deref(), Some("____"));
        assert_eq!(to_guesser.current_drawer.as_deref(), Some("a"));
    }

    #[tokio::test]
    async fn test_saturated_connection_is_dropped() {
        let hub = spawn_hub();
        let (slow, mut slow_rx) = entry(1, "a", 1);
        let (fast, mut fast_rx) = entry(2, "b", 8);
        let (other, mut other_rx) = entry(3, "c", 8);
        slow.sender.try_send(Message::text("backlog")).unwrap();
        hub.register(slow);
        hub.register(fast);
        hub.register(other);

        hub.broadcast(Outbound::Relay("one".to_string()));
        assert_eq!(hub.connection_count().await, Some(2));

        assert_eq!(fast_rx.recv().await.unwrap().to_text().unwrap(), "one");
        assert_eq!(other_rx.recv().await.unwrap().to_text().unwrap(), "one");

        // The backlog drains, then the queue reports closed
        assert_eq!(slow_rx.recv().await.unwrap().to_text().unwrap(), "backlog");
        assert!(slow_rx.recv().await.is_none());

        hub.broadcast(Outbound::Relay("two".to_string()));
        assert_eq!(fast_rx.recv().await.unwrap().to_text().unwrap(), "two");
    }

    #[tokio::test]
    async fn test_saturated_connection_is_signalled() {
        let hub = spawn_hub();
        let (slow, mut slow_queue) = ConnectionEntry::new(1, "a", 1);
        let (steady, mut steady_queue) = ConnectionEntry::new(2, "b", 8);
        hub.register(slow);
        hub.register(steady);

        hub.broadcast(Outbound::Relay("one".to_string()));
        hub.broadcast(Outbound::Relay("two".to_string()));
        assert_eq!(hub.connection_count().await, Some(1));

        assert_ok!(slow_queue.evicted.try_recv());
        assert!(steady_queue.evicted.try_recv().is_err());
        assert_eq!(steady_queue.frames.recv().await.unwrap().to_text().unwrap(), "one");
        assert_eq!(steady_queue.frames.recv().await.unwrap().to_text().unwrap(), "two");
        assert_eq!(slow_queue.frames.recv().await.unwrap().to_text().unwrap(), "one");
    }

    #[tokio::test]
    async fn test_closed_connection_is_dropped() {
        let hub = spawn_hub();
        let (gone, gone_rx) = entry(1, "a", 4);
        let (alive, mut alive_rx) = entry(2, "b", 4);
        drop(gone_rx);
        hub.register(gone);
        hub.register(alive);

        hub.broadcast(Outbound::Relay("hello".to_string()));
        assert_eq!(hub.connection_count().await, Some(1));
        assert_eq!(alive_rx.recv().await.unwrap().to_text().unwrap(), "hello");
    }

    #[tokio::test]
    async fn test_broadcast_interleaved_with_registration() {
        let hub = spawn_hub();
        let mut receivers = Vec::new();
        for id in 0..50u64 {
            let (conn, rx) = entry(id, &format!("p{}", id), 64);
            receivers.push(rx);
            hub.register(conn);
            hub.broadcast(Outbound::Relay(format!("after {}", id)));
            if id % 2 == 1 {
                hub.unregister(id - 1);
            }
        }
        assert_eq!(hub.connection_count().await, Some(25));

        // Connection n saw every broadcast issued after it registered
        let mut last = receivers.pop().unwrap();
        assert_eq!(last.recv().await.unwrap().to_text().unwrap(), "after 49");
    }
}

//! Game loop: the single task that owns the [`GameSession`]
//!
//! Connection readers, round timers and tests all reach the session by
//! sending a [`GameCommand`] to this task, so every mutation is applied one
//! at a time in arrival order. Whatever the session wants broadcast goes to
//! the hub, and whatever it wants done later is handed to [`timer`].

use crate::hub::HubHandle;
use crate::session::{GameSession, Outbound};
use crate::timer;
use log::{debug, info, warn};
use shared::GameStateSnapshot;
use tokio::sync::{mpsc, oneshot};

const COMMAND_QUEUE_CAPACITY: usize = 1000;

#[derive(Debug)]
pub enum GameCommand {
    Frame {
        player_id: String,
        player_name: String,
        frame: String,
    },
    PlayerConnected {
        player_id: String,
    },
    PlayerDisconnected {
        player_id: String,
    },
    RoundTimeout {
        generation: u64,
    },
    RoundAdvance {
        generation: u64,
    },
    Snapshot {
        reply: oneshot::Sender<GameStateSnapshot>,
    },
}

/// Cloneable entry point into the game loop
#[derive(Debug, Clone)]
pub struct GameHandle {
    tx: mpsc::Sender<GameCommand>,
}

impl GameHandle {
    /// Queues an inbound frame. Returns false once the game loop has stopped.
    pub async fn submit_frame(&self, player_id: &str, player_name: &str, frame: String) -> bool {
        self.send(GameCommand::Frame {
            player_id: player_id.to_string(),
            player_name: player_name.to_string(),
            frame,
        })
        .await
    }

    pub async fn player_connected(&self, player_id: &str) -> bool {
        self.send(GameCommand::PlayerConnected {
            player_id: player_id.to_string(),
        })
        .await
    }

    pub async fn player_disconnected(&self, player_id: &str) -> bool {
        self.send(GameCommand::PlayerDisconnected {
            player_id: player_id.to_string(),
        })
        .await
    }

    /// Full unmasked state, as seen by the game loop after every command
    /// queued before this call.
    pub async fn snapshot(&self) -> Option<GameStateSnapshot> {
        let (reply, rx) = oneshot::channel();
        if !self.send(GameCommand::Snapshot { reply }).await {
            return None;
        }
        rx.await.ok()
    }

    async fn send(&self, command: GameCommand) -> bool {
        self.tx.send(command).await.is_ok()
    }
}

pub struct GameLoop {
    session: GameSession,
    hub: HubHandle,
    commands: mpsc::Receiver<GameCommand>,
    // Weak so that the loop stops once every handle and pending timer is gone
    timer_tx: mpsc::WeakSender<GameCommand>,
}

impl GameLoop {
    pub fn new(session: GameSession, hub: HubHandle) -> (Self, GameHandle) {
        let (tx, rx) = mpsc::channel(COMMAND_QUEUE_CAPACITY);
        let game_loop = Self {
            session,
            hub,
            commands: rx,
            timer_tx: tx.downgrade(),
        };
        (game_loop, GameHandle { tx })
    }

    pub async fn run(mut self) {
        info!("Game loop started");
        // Arm anything the session queued before it was handed over
        self.arm_timers();

        while let Some(command) = self.commands.recv().await {
            if let Some(outbound) = self.handle_command(command) {
                self.hub.broadcast(outbound);
            }
            self.arm_timers();
        }
        info!("Game loop stopped");
    }

    fn handle_command(&mut self, command: GameCommand) -> Option<Outbound> {
        match command {
            GameCommand::Frame {
                player_id,
                player_name,
                frame,
            } => self
                .session
                .process_frame(&frame, &player_id, &player_name),

            GameCommand::PlayerConnected { player_id } => {
                self.session.player_connected(&player_id);
                self.registered_state(&player_id)
            }

            GameCommand::PlayerDisconnected { player_id } => {
                if self.session.player_disconnected(&player_id) {
                    return Some(Outbound::State(self.session.snapshot()));
                }
                self.registered_state(&player_id)
            }

            GameCommand::RoundTimeout { generation } => self
                .session
                .round_timeout(generation)
                .then(|| Outbound::State(self.session.snapshot())),

            GameCommand::RoundAdvance { generation } => self
                .session
                .advance_round(generation)
                .then(|| Outbound::State(self.session.snapshot())),

            GameCommand::Snapshot { reply } => {
                if reply.send(self.session.snapshot()).is_err() {
                    debug!("Snapshot requester went away");
                }
                None
            }
        }
    }

    /// Connection changes are only worth a broadcast for players already in
    /// the session, whose `connected` flag just flipped.
    fn registered_state(&self, player_id: &str) -> Option<Outbound> {
        self.session
            .player(player_id)
            .map(|_| Outbound::State(self.session.snapshot()))
    }

    fn arm_timers(&mut self) {
        for item in self.session.drain_scheduled() {
            match self.timer_tx.upgrade() {
                Some(tx) => {
                    timer::spawn(item, tx);
                }
                None => warn!("Dropping {:?}, game loop is shutting down", item),
            }
        }
    }
}

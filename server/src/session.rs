//! The game session: players, scores and the round state machine
//!
//! `waiting -> drawing -> roundEnd -> drawing -> ... -> roundEnd -> gameEnd`
//!
//! The session is plain data plus transition logic. It never sleeps and never
//! touches the network; anything that has to happen later is queued as a
//! [`Scheduled`] item which the owning task turns into timers. Every round
//! start bumps a generation number, and delayed triggers carry the generation
//! they were scheduled for so that a stale trigger is a no-op.

use crate::config::GameConfig;
use log::{debug, info, warn};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use shared::{
    Envelope, EventKind, GameStateSnapshot, Phase, PlayerInfo, DRAWER_POINTS, GUESSER_POINTS,
    MIN_PLAYERS_TO_START,
};
use std::collections::{BTreeMap, HashMap};
use std::time::Duration;
use tokio::time::Instant;

#[derive(Debug, Clone)]
pub struct Player {
    pub id: String,
    pub name: String,
    pub score: u32,
}

/// Work the session wants done after a delay
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Scheduled {
    /// End the round at `deadline` unless it already ended
    RoundTimer { generation: u64, deadline: Instant },
    /// Leave `roundEnd` after the display pause
    RoundAdvance { generation: u64, after: Duration },
}

/// How the session reacted to one event
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reaction {
    /// Dropped without a response
    Ignored,
    /// Forward the inbound frame to everyone as-is
    Relay,
    /// Broadcast the current game state
    State,
}

/// Something to hand to the hub for broadcast
#[derive(Debug, Clone, PartialEq)]
pub enum Outbound {
    Relay(String),
    State(GameStateSnapshot),
}

pub struct GameSession {
    config: GameConfig,
    players: BTreeMap<String, Player>,
    connections: HashMap<String, usize>,
    round: u32,
    phase: Phase,
    current_word: Option<String>,
    current_drawer: Option<String>,
    deadline: Option<Instant>,
    generation: u64,
    rng: StdRng,
    scheduled: Vec<Scheduled>,
}

impl GameSession {
    /// Creates a session whose random source is seeded once from the OS.
    pub fn new(config: GameConfig) -> Self {
        Self::with_rng(config, StdRng::from_entropy())
    }

    pub fn with_rng(config: GameConfig, rng: StdRng) -> Self {
        Self {
            config,
            players: BTreeMap::new(),
            connections: HashMap::new(),
            round: 0,
            phase: Phase::Waiting,
            current_word: None,
            current_drawer: None,
            deadline: None,
            generation: 0,
            rng,
            scheduled: Vec::new(),
        }
    }

    /// Decodes one inbound frame and applies it on behalf of the connection's
    /// player. Undecodable frames are logged and produce nothing.
    pub fn process_frame(
        &mut self,
        frame: &str,
        player_id: &str,
        player_name: &str,
    ) -> Option<Outbound> {
        let event = match Envelope::decode(frame) {
            Ok(event) => event,
            Err(e) => {
                warn!("Dropping malformed frame from {}: {}", player_id, e);
                return None;
            }
        };

        match self.process_event(&event, player_id, player_name) {
            Reaction::Ignored => None,
            Reaction::Relay => Some(Outbound::Relay(frame.to_string())),
            Reaction::State => Some(Outbound::State(self.snapshot())),
        }
    }

    /// Applies one decoded event. The identity always comes from the
    /// connection, never from the envelope.
    pub fn process_event(
        &mut self,
        event: &Envelope,
        player_id: &str,
        player_name: &str,
    ) -> Reaction {
        debug!("{} from {}", event.kind, player_id);
        match &event.kind {
            EventKind::Join => self.join(player_id, player_name),
            EventKind::Start => self.start(),
            EventKind::Draw | EventKind::ClearCanvas => {
                return if self.is_drawer(player_id) {
                    Reaction::Relay
                } else {
                    Reaction::Ignored
                };
            }
            EventKind::Guess => match event.content.as_str() {
                Some(guess) => self.guess(player_id, guess),
                None => warn!("Dropping guess from {} with non-string content", player_id),
            },
            EventKind::GameState | EventKind::Other(_) => {}
        }
        Reaction::State
    }

    fn join(&mut self, player_id: &str, player_name: &str) {
        if self.players.contains_key(player_id) {
            debug!("Player {} re-joined", player_id);
            return;
        }
        info!("Player {} ({}) joined", player_id, player_name);
        self.players.insert(
            player_id.to_string(),
            Player {
                id: player_id.to_string(),
                name: player_name.to_string(),
                score: 0,
            },
        );
    }

    fn start(&mut self) {
        if self.phase != Phase::Waiting || self.players.len() < MIN_PLAYERS_TO_START {
            debug!(
                "Ignoring start in {:?} with {} players",
                self.phase,
                self.players.len()
            );
            return;
        }
        info!("Game started with {} players", self.players.len());
        self.round = 1;
        self.begin_round();
    }

    fn guess(&mut self, player_id: &str, guess: &str) {
        if self.phase != Phase::Drawing || self.is_drawer(player_id) {
            return;
        }
        if !self.players.contains_key(player_id) {
            debug!("Ignoring guess from unregistered player {}", player_id);
            return;
        }
        if self.current_word.as_deref() != Some(guess) {
            return;
        }

        if let Some(guesser) = self.players.get_mut(player_id) {
            guesser.score += GUESSER_POINTS;
        }
        if let Some(drawer) = self
            .current_drawer
            .as_ref()
            .and_then(|id| self.players.get_mut(id))
        {
            drawer.score += DRAWER_POINTS;
        }
        info!("Player {} guessed the word in round {}", player_id, self.round);
        self.end_round();
    }

    /// Round timer fired. Returns true if the round actually ended.
    pub fn round_timeout(&mut self, generation: u64) -> bool {
        if self.phase != Phase::Drawing || generation != self.generation {
            debug!("Stale round timer for generation {}", generation);
            return false;
        }
        info!("Round {} timed out", self.round);
        self.end_round();
        true
    }

    /// Display pause elapsed. Starts the next round or ends the game.
    /// Returns true if the session moved on.
    pub fn advance_round(&mut self, generation: u64) -> bool {
        if self.phase != Phase::RoundEnd || generation != self.generation {
            debug!("Stale round advance for generation {}", generation);
            return false;
        }
        if self.round >= self.config.max_rounds {
            info!("Game over after {} rounds", self.round);
            self.phase = Phase::GameEnd;
            return true;
        }
        self.round += 1;
        self.begin_round();
        true
    }

    pub fn player_connected(&mut self, player_id: &str) {
        *self.connections.entry(player_id.to_string()).or_insert(0) += 1;
    }

    /// Drops one live connection for the player. When the drawer loses their
    /// last connection mid-round the round ends without scoring. Returns true
    /// if the round ended.
    pub fn player_disconnected(&mut self, player_id: &str) -> bool {
        if let Some(count) = self.connections.get_mut(player_id) {
            *count = count.saturating_sub(1);
            if *count == 0 {
                self.connections.remove(player_id);
            }
        }

        // Policy exit from drawing alongside a correct guess and the timer:
        // nobody is left to draw, so the round is over.
        let drawer_gone = self.is_drawer(player_id) && !self.is_connected(player_id);
        if self.phase == Phase::Drawing && drawer_gone {
            info!("Drawer {} left, ending round {}", player_id, self.round);
            self.end_round();
            return true;
        }
        false
    }

    fn begin_round(&mut self) {
        self.generation += 1;
        self.phase = Phase::Drawing;
        self.select_drawer();
        self.select_word();
        let deadline = Instant::now() + self.config.round_duration;
        self.deadline = Some(deadline);
        self.scheduled.push(Scheduled::RoundTimer {
            generation: self.generation,
            deadline,
        });
        info!(
            "Round {}/{} started, drawer {}",
            self.round,
            self.config.max_rounds,
            self.current_drawer.as_deref().unwrap_or("-")
        );
    }

    fn end_round(&mut self) {
        self.phase = Phase::RoundEnd;
        self.deadline = None;
        self.scheduled.push(Scheduled::RoundAdvance {
            generation: self.generation,
            after: self.config.round_end_pause,
        });
    }

    fn select_drawer(&mut self) {
        let connected: Vec<&String> = self
            .players
            .keys()
            .filter(|id| self.is_connected(id))
            .collect();
        let candidates: Vec<&String> = if connected.is_empty() {
            self.players.keys().collect()
        } else {
            connected
        };
        self.current_drawer = candidates.choose(&mut self.rng).map(|id| id.to_string());
    }

    fn select_word(&mut self) {
        self.current_word = self.config.word_list.choose(&mut self.rng).cloned();
    }

    fn is_drawer(&self, player_id: &str) -> bool {
        self.current_drawer.as_deref() == Some(player_id)
    }

    fn is_connected(&self, player_id: &str) -> bool {
        self.connections.get(player_id).copied().unwrap_or(0) > 0
    }

    /// Hands over everything queued since the last call.
    pub fn drain_scheduled(&mut self) -> Vec<Scheduled> {
        std::mem::take(&mut self.scheduled)
    }

    /// Full state including the secret word. Use
    /// [`GameStateSnapshot::view_for`] before sending it to a player.
    pub fn snapshot(&self) -> GameStateSnapshot {
        let players = self
            .players
            .values()
            .map(|player| {
                (
                    player.id.clone(),
                    PlayerInfo {
                        id: player.id.clone(),
                        name: player.name.clone(),
                        score: player.score,
                        connected: self.is_connected(&player.id),
                    },
                )
            })
            .collect();

        let time_remaining = match (self.phase, self.deadline) {
            (Phase::Drawing, Some(deadline)) => {
                let left = deadline.saturating_duration_since(Instant::now());
                (left.as_millis() as u64 + 999) / 1000
            }
            _ => 0,
        };

        GameStateSnapshot {
            current_word: self.current_word.clone(),
            current_drawer: self.current_drawer.clone(),
            players,
            round: self.round,
            max_rounds: self.config.max_rounds,
            state: self.phase,
            round_time_limit: self.config.round_duration.as_secs(),
            time_remaining,
        }
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn round(&self) -> u32 {
        self.round
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn current_word(&self) -> Option<&str> {
        self.current_word.as_deref()
    }

    pub fn current_drawer(&self) -> Option<&str> {
        self.current_drawer.as_deref()
    }

    pub fn player(&self, player_id: &str) -> Option<&Player> {
        self.players.get(player_id)
    }

    pub fn player_count(&self) -> usize {
        self.players.len()
    }
}

//! # Pictionary Server Library
//!
//! Authoritative server for a real-time drawing-and-guessing game. Clients
//! connect over websockets, one player per connection, and all of them take
//! part in a single shared game session.
//!
//! ## Core Responsibilities
//!
//! ### Game Session
//! Keeps the players, their scores and the round state machine
//! (`waiting -> drawing -> roundEnd -> ... -> gameEnd`). Picks the drawer and
//! the secret word for every round and awards points for correct guesses.
//!
//! ### State Broadcasting
//! After every processed event the current game state goes out to every
//! connected client. Each recipient gets their own view: only the drawer can
//! read the word while a round is running. Drawing strokes and canvas clears
//! from the drawer are relayed verbatim.
//!
//! ### Client Management
//! Handles the lifecycle of websocket connections: the upgrade handshake
//! carrying the player's id and name, buffered outbound delivery, and teardown
//! on read/write errors or when a client cannot keep up.
//!
//! ## Architecture Design
//!
//! ### Single Owner per Piece of State
//! The session is owned by the game loop task and the connection registry by
//! the hub task. Everything else talks to them through channels, so there are
//! no locks and no two triggers can mutate the same state at once. A correct
//! guess racing the round timer is resolved by arrival order plus a round
//! generation number carried by every timer.
//!
//! ### Non-Blocking Fan-Out
//! Each connection has a bounded outbound queue. The hub never waits on a
//! client: a full queue gets that client disconnected instead of stalling the
//! broadcast for everyone else.
//!
//! ## Module Organization
//!
//! - `session`: game state and transition logic, no I/O
//! - `timer`: round deadline and round-end pause timers
//! - `game`: the task owning the session
//! - `hub`: the task owning the connection registry
//! - `connection`: per-client handshake, reader and writer
//! - `network`: TCP listener and task wiring
//! - `config`: game tunables
//!
//! ## Usage Example
//!
//! ```rust,no_run
//! use server::config::GameConfig;
//! use server::network::Server;
//!
//! #[tokio::main]
//! async fn main() -> server::Result<()> {
//!     let server = Server::bind("0.0.0.0:8080", GameConfig::default()).await?;
//!     server.run().await
//! }
//! ```

pub mod config;
pub mod connection;
pub mod game;
pub mod hub;
pub mod network;
pub mod session;
pub mod timer;

pub type Error = Box<dyn std::error::Error + Send + Sync>;
pub type Result<T> = std::result::Result<T, Error>;

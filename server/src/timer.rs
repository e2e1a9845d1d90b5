//! Round timers: delayed triggers fed back into the game loop
//!
//! A timer never touches the session itself. It sleeps without holding
//! anything, then posts a command tagged with the round generation it was
//! armed for; the game loop decides whether that generation is still current.

use crate::game::GameCommand;
use crate::session::Scheduled;
use log::debug;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{sleep, sleep_until};

/// Spawns the task for one scheduled item.
pub fn spawn(item: Scheduled, commands: mpsc::Sender<GameCommand>) -> JoinHandle<()> {
    tokio::spawn(async move {
        let command = match item {
            Scheduled::RoundTimer {
                generation,
                deadline,
            } => {
                sleep_until(deadline).await;
                GameCommand::RoundTimeout { generation }
            }
            Scheduled::RoundAdvance { generation, after } => {
                sleep(after).await;
                GameCommand::RoundAdvance { generation }
            }
        };

        if commands.send(command).await.is_err() {
            debug!("Game loop gone before timer fired");
        }
    })
}

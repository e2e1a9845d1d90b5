//! Scripted websocket player for poking at a running server.
//!
//! Joins with the given id and name, optionally starts the game, scribbles a
//! few strokes when it is the drawer and fires its guesses when it is not.

use clap::Parser;
use futures_util::{SinkExt, StreamExt};
use log::{info, warn};
use serde_json::json;
use shared::{Envelope, EventKind, Phase, StrokeData};
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Websocket endpoint of the server
    #[arg(short, long, default_value = "ws://127.0.0.1:8080/ws")]
    server: String,

    /// Player id sent in the handshake
    #[arg(short, long)]
    id: String,

    /// Display name, defaults to the id
    #[arg(short, long)]
    name: Option<String>,

    /// Send `start` right after joining
    #[arg(long)]
    start: bool,

    /// Words to guess each round, in order, when not drawing
    #[arg(short, long, value_delimiter = ',')]
    guess: Vec<String>,

    /// Draw a short zig-zag when it is our turn
    #[arg(long)]
    scribble: bool,
}

fn zig_zag() -> Vec<StrokeData> {
    let points = [(10.0, 10.0), (60.0, 80.0), (110.0, 10.0), (160.0, 80.0)];
    points
        .windows(2)
        .map(|pair| StrokeData::segment(pair[0], pair[1], "#ff4655", 4.0))
        .collect()
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    if std::env::var("RUST_LOG").is_err() {
        eprintln!("Set RUST_LOG=info for detailed logging");
    }

    let args = Args::parse();
    let name = args.name.clone().unwrap_or_else(|| args.id.clone());
    let query = url::form_urlencoded::Serializer::new(String::new())
        .append_pair("id", &args.id)
        .append_pair("name", &name)
        .finish();
    let url = format!("{}?{}", args.server, query);

    let (ws_stream, _) = connect_async(url.as_str()).await?;
    info!("Connected to {} as {} ({})", args.server, args.id, name);
    let (mut outgoing, mut incoming) = ws_stream.split();

    outgoing
        .send(Message::text(Envelope::new(EventKind::Join).encode()?))
        .await?;
    if args.start {
        outgoing
            .send(Message::text(Envelope::new(EventKind::Start).encode()?))
            .await?;
    }

    let mut acted_in_round = 0;
    while let Some(message) = incoming.next().await {
        let text = match message? {
            Message::Text(text) => text,
            Message::Close(_) => break,
            _ => continue,
        };
        println!("<- {}", text.as_str());

        let envelope = match Envelope::decode(text.as_str()) {
            Ok(envelope) => envelope,
            Err(e) => {
                warn!("Undecodable frame: {}", e);
                continue;
            }
        };
        if envelope.kind != EventKind::GameState {
            continue;
        }
        let Some(state) = envelope.snapshot() else {
            continue;
        };
        if state.state == Phase::GameEnd {
            info!("Game over");
            break;
        }
        if state.state != Phase::Drawing || state.round == acted_in_round {
            continue;
        }
        acted_in_round = state.round;

        if state.is_drawer(&args.id) {
            info!(
                "Round {}: drawing {}",
                state.round,
                state.current_word.as_deref().unwrap_or("?")
            );
            if args.scribble {
                for stroke in zig_zag() {
                    let content = serde_json::to_value(&stroke)?;
                    let frame = Envelope::with_content(EventKind::Draw, content);
                    outgoing.send(Message::text(frame.encode()?)).await?;
                }
            }
        } else {
            for word in &args.guess {
                info!("Round {}: guessing {}", state.round, word);
                let frame = Envelope::with_content(EventKind::Guess, json!(word));
                outgoing.send(Message::text(frame.encode()?)).await?;
            }
        }
    }

    Ok(())
}

use clap::Parser;
use log::info;
use server::config::GameConfig;
use server::network::Server;
use std::time::Duration;

/// Command line arguments
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Server IP address to bind to
    #[arg(short = 'H', long, default_value = "0.0.0.0")]
    host: String,

    /// Server port to listen on
    #[arg(short, long, default_value = "8080")]
    port: u16,

    /// Rounds per game
    #[arg(short, long, default_value_t = shared::DEFAULT_MAX_ROUNDS)]
    max_rounds: u32,

    /// Seconds the drawer has per round
    #[arg(short, long, default_value_t = shared::DEFAULT_ROUND_SECONDS)]
    round_seconds: u64,

    /// Seconds the round result is shown before the next round
    #[arg(long, default_value_t = shared::DEFAULT_ROUND_END_PAUSE_SECONDS)]
    pause_seconds: u64,

    /// Comma separated word list, replaces the built-in one
    #[arg(short, long)]
    words: Option<String>,

    /// Outbound frames buffered per client before it is disconnected
    #[arg(long, default_value_t = shared::DEFAULT_SEND_QUEUE_CAPACITY)]
    queue_capacity: usize,
}

impl Args {
    fn game_config(&self) -> GameConfig {
        let mut config = GameConfig {
            max_rounds: self.max_rounds,
            round_duration: Duration::from_secs(self.round_seconds),
            round_end_pause: Duration::from_secs(self.pause_seconds),
            send_queue_capacity: self.queue_capacity,
            ..GameConfig::default()
        };
        if let Some(words) = &self.words {
            config.word_list = GameConfig::parse_word_list(words);
        }
        config
    }
}

#[tokio::main]
async fn main() -> server::Result<()> {
    env_logger::init();

    if std::env::var("RUST_LOG").is_err() {
        eprintln!("Set RUST_LOG=info for detailed logging");
    }

    let args = Args::parse();
    let config = args.game_config();
    info!(
        "{} rounds of {}s, {} words",
        config.max_rounds,
        config.round_duration.as_secs(),
        config.word_list.len()
    );

    let address = format!("{}:{}", args.host, args.port);
    let server = Server::bind(&address, config).await?;

    tokio::select! {
        result = server.run() => result?,
        _ = tokio::signal::ctrl_c() => {
            info!("Received Ctrl+C, shutting down");
        }
    }

    Ok(())
}

use clap::Parser;
use log::{error, info};
use server::config::MatchConfig;
use server::lifecycle::MatchLifecycleController;
use server::network::{Server, ServerSettings};
use shared::content::GameContent;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Server IP address to bind to
    #[arg(short = 'H', long, default_value = "127.0.0.1")]
    host: String,

    /// Server port to listen on
    #[arg(short, long, default_value = "8080")]
    port: u16,

    /// Tick rate (updates per second)
    #[arg(short, long, default_value = "30")]
    tick_rate: u32,

    /// Maximum number of connected participants
    #[arg(short = 'm', long, default_value = "10")]
    max_clients: usize,

    /// Participants needed before hero selection opens
    #[arg(long, default_value = "2")]
    min_participants: usize,

    /// Ticks between full state snapshots
    #[arg(long, default_value = "30")]
    snapshot_interval: u32,

    /// Hero/ability/team content file; the built-in content is used if omitted
    #[arg(short, long)]
    content: Option<PathBuf>,

    /// Hero selection length in seconds
    #[arg(long, default_value = "60")]
    selection_duration: f32,

    /// Maximum players per team unless the team sets its own
    #[arg(long, default_value = "5")]
    max_team_size: usize,

    /// Allow several participants to pick the same hero
    #[arg(long)]
    allow_duplicate_picks: bool,

    /// Leave participants without a hero instead of picking one at random
    #[arg(long)]
    no_random_picks: bool,

    /// Fill teams in order instead of balancing them
    #[arg(long)]
    no_auto_balance: bool,

    /// Seed for random hero picks
    #[arg(long)]
    seed: Option<u64>,
}

impl Args {
    fn match_config(&self) -> MatchConfig {
        MatchConfig {
            selection_duration: self.selection_duration,
            unique_picks: !self.allow_duplicate_picks,
            randomize_if_unselected: !self.no_random_picks,
            max_team_size: self.max_team_size,
            auto_balance_teams: !self.no_auto_balance,
            rng_seed: self.seed,
            ..MatchConfig::default()
        }
    }

    fn server_settings(&self) -> ServerSettings {
        ServerSettings {
            tick_duration: Duration::from_secs_f32(1.0 / self.tick_rate.max(1) as f32),
            max_clients: self.max_clients,
            snapshot_interval: self.snapshot_interval,
            min_participants: self.min_participants,
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    if std::env::var("RUST_LOG").is_err() {
        eprintln!("Set RUST_LOG=info for detailed logging");
    }

    let args = Args::parse();

    let content = match &args.content {
        Some(path) => {
            info!("Loading content from {}", path.display());
            GameContent::load(path)
        }
        None => GameContent::builtin(),
    };
    let content = match content {
        Ok(content) => Arc::new(content),
        Err(e) => {
            error!("Invalid content: {}", e);
            return Err(e.into());
        }
    };
    info!(
        "{} heroes across {} teams",
        content.heroes().len(),
        content.teams().len()
    );

    let controller = MatchLifecycleController::new(args.match_config(), content)?;

    let address = format!("{}:{}", args.host, args.port);
    info!("Starting server on {} at {}Hz", address, args.tick_rate);
    let mut server = Server::new(&address, controller, args.server_settings()).await?;

    tokio::select! {
        result = server.run() => result?,
        _ = tokio::signal::ctrl_c() => {
            info!("Received Ctrl+C, shutting down gracefully...");
        }
    }

    Ok(())
}

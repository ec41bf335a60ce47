use clap::Parser;
use client::catalog::describe_heroes;
use client::network::{BotSettings, Client};
use log::{info, warn};
use shared::content::GameContent;
use shared::HeroId;
use std::time::Duration;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Server address to connect to
    #[arg(short = 's', long, default_value = "127.0.0.1:8080")]
    server: String,

    /// Name shown to other participants
    #[arg(short = 'n', long, default_value = "bot")]
    name: String,

    /// Hero to pick; random if omitted
    #[arg(short = 'p', long)]
    hero: Option<String>,

    /// Do not ready up automatically after picking
    #[arg(long)]
    no_ready: bool,

    /// Only watch, never cast abilities
    #[arg(long)]
    passive: bool,

    /// Seconds between cast attempts
    #[arg(long, default_value = "1.0")]
    cast_interval: f32,

    /// Leave after this many seconds
    #[arg(short = 'd', long)]
    duration: Option<u64>,

    /// Print the built-in heroes and their abilities at this level, then exit
    #[arg(long, value_name = "LEVEL")]
    list_heroes: Option<u32>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    if std::env::var("RUST_LOG").is_err() {
        eprintln!("Set RUST_LOG=info for detailed logging");
    }

    let args = Args::parse();

    if let Some(level) = args.list_heroes {
        let content = GameContent::builtin()?;
        for line in describe_heroes(&content, level) {
            println!("{}", line);
        }
        return Ok(());
    }

    let hero_pool = match GameContent::builtin() {
        Ok(content) => content.hero_ids(),
        Err(e) => {
            warn!("Built-in content unavailable, random picks disabled: {}", e);
            Vec::new()
        }
    };

    let settings = BotSettings {
        display_name: args.name.clone(),
        preferred_hero: args.hero.as_deref().map(HeroId::from),
        hero_pool,
        auto_ready: !args.no_ready,
        fight: !args.passive,
        cast_interval: args.cast_interval,
    };

    info!("Starting client...");
    info!("Connecting to: {}", args.server);

    let mut client = Client::new(&args.server, settings).await?;

    tokio::select! {
        result = client.run(args.duration.map(Duration::from_secs)) => result?,
        _ = tokio::signal::ctrl_c() => {
            info!("Received Ctrl+C, leaving match");
        }
    }
    client.disconnect().await?;

    Ok(())
}

//! flowbot - Budget-constrained randomized order-taking bot
//!
//! Samples a market, a side and a quantity, walks the book, and takes
//! liquidity with IOC orders under hard spend caps.

use anyhow::Result;
use clap::Parser;
use tracing::info;

/// Budget-constrained randomized order-taking bot
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    /// Configuration file path (can also be set via FLOWBOT_CONFIG env var)
    #[arg(short, long)]
    config: Option<String>,

    /// Comma-separated token ids (can also be set via FLOWBOT_TOKEN_IDS env var)
    #[arg(long)]
    token_ids: Option<String>,

    /// Stop after this many iterations
    #[arg(short = 'n', long)]
    iterations: Option<u64>,

    /// Record intents without sending them
    #[arg(long)]
    dry_run: bool,

    /// Never sell
    #[arg(long)]
    buy_only: bool,

    /// Ask before every order
    #[arg(long)]
    manual_approval: bool,

    /// RNG seed for a reproducible session
    #[arg(long)]
    seed: Option<u64>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    flowbot_telemetry::init_logging()?;

    info!("Starting flowbot v{}", env!("CARGO_PKG_VERSION"));

    // Config path: CLI arg > FLOWBOT_CONFIG env var > default
    let config_path = args
        .config
        .clone()
        .or_else(|| std::env::var("FLOWBOT_CONFIG").ok())
        .unwrap_or_else(|| "config/default.toml".to_string());

    info!(config_path = %config_path, "Loading configuration");

    let mut config = flowbot_bot::AppConfig::from_file(&config_path)?;
    config.apply(&flowbot_bot::Overrides {
        iterations: args.iterations,
        dry_run: args.dry_run,
        buy_only: args.buy_only,
        manual_approval: args.manual_approval,
        seed: args.seed,
    });
    info!(
        dry_run = config.dry_run,
        buy_only = config.planner.buy_only,
        strategy = ?config.planner.strategy,
        iterations = ?config.iterations,
        "Configuration loaded"
    );

    let token_ids = args
        .token_ids
        .or_else(|| std::env::var("FLOWBOT_TOKEN_IDS").ok());

    let mut app = flowbot_bot::Application::new(config)?;
    app.load_pool(token_ids.as_deref()).await?;
    app.run().await?;

    Ok(())
}

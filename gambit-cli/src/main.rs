mod commands;

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "gambit")]
#[command(about = "Commit-reveal staked board games (Snakes & Ladders / Ludo)")]
#[command(version)]
struct Cli {
    /// Data directory for game and account storage
    #[arg(short, long, global = true)]
    data_dir: Option<PathBuf>,

    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Register a local player account with starting funds
    Register {
        /// Player name
        name: String,
        /// Starting balance, e.g. 0.1
        #[arg(default_value = "0.1")]
        funds: String,
    },
    /// Create a new staked game
    Create {
        /// Player name
        player: String,
        /// Game variant: snakes or ludo
        #[arg(default_value = "snakes")]
        game_type: String,
    },
    /// Join a waiting game
    Join {
        /// Player name
        player: String,
        /// Game ID
        game_id: u64,
    },
    /// Commit to a move without revealing it
    Commit {
        /// Player name
        player: String,
        /// Game ID
        game_id: u64,
        /// Move value (interpreted as a die roll)
        value: u64,
    },
    /// Reveal the previously committed move
    Reveal {
        /// Player name
        player: String,
        /// Game ID
        game_id: u64,
    },
    /// Force-expire a game past its deadline
    Expire {
        /// Game ID
        game_id: u64,
        /// Skip the confirmation prompt
        #[arg(long)]
        yes: bool,
    },
    /// Show game status
    Status {
        /// Game ID
        game_id: u64,
    },
    /// List active games
    List,
    /// Show account balances
    Balances,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let log_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(format!(
            "gambit={},gambit_protocol={},gambit_core={}",
            log_level, log_level, log_level
        )))
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Get data directory
    let data_dir = cli.data_dir.unwrap_or_else(|| {
        dirs::data_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("gambit")
    });

    // Ensure data directory exists
    tokio::fs::create_dir_all(&data_dir).await?;

    let result = match cli.command {
        Commands::Register { name, funds } => commands::register(&data_dir, &name, &funds).await,
        Commands::Create { player, game_type } => {
            commands::create_game(&data_dir, &player, &game_type).await
        }
        Commands::Join { player, game_id } => commands::join_game(&data_dir, &player, game_id).await,
        Commands::Commit {
            player,
            game_id,
            value,
        } => commands::commit_move(&data_dir, &player, game_id, value).await,
        Commands::Reveal { player, game_id } => {
            commands::reveal_move(&data_dir, &player, game_id).await
        }
        Commands::Expire { game_id, yes } => commands::expire_game(&data_dir, game_id, yes).await,
        Commands::Status { game_id } => commands::show_game_status(&data_dir, game_id).await,
        Commands::List => commands::list_games(&data_dir).await,
        Commands::Balances => commands::show_balances(&data_dir).await,
    };

    if let Err(e) = result {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }

    Ok(())
}

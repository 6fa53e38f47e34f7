mod commands;
mod config;
mod prompt;

use clap::{Parser, Subcommand};
use config::CliConfig;
use prompt::DialoguerPrompter;
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "rps")]
#[command(about = "Rock-Paper-Scissors commit-reveal matches on an EVM contract")]
#[command(version)]
struct Cli {
    /// Data directory for config and retained moves
    #[arg(short, long, global = true)]
    data_dir: Option<PathBuf>,

    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// JSON-RPC endpoint, overriding the config file
    #[arg(long, global = true)]
    rpc_url: Option<String>,

    /// Contract address, overriding the config file
    #[arg(long, global = true)]
    contract: Option<String>,

    /// Hex private key of the signing account
    #[arg(long, global = true, env = "RPS_PRIVATE_KEY", hide_env_values = true)]
    private_key: Option<String>,

    /// Authorize signing without asking
    #[arg(short, long, global = true)]
    yes: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show the game and your place in it
    Status,
    /// Join the game (player 2 always matches player 1's stake)
    Join {
        /// Stake in ETH when joining as player 1
        #[arg(short, long)]
        amount: Option<String>,
    },
    /// Commit a hidden move
    Commit {
        /// rock, paper, scissors or 1-3
        #[arg(short = 'm', long = "move")]
        choice: Option<String>,
        /// Secret hiding the move (random when omitted and left empty)
        #[arg(short, long)]
        secret: Option<String>,
    },
    /// Reveal the committed move
    Reveal {
        /// Type the move and secret instead of using the stored ones
        #[arg(short, long)]
        manual: bool,
    },
    /// Follow the game until interrupted
    Watch,
    /// Configuration commands
    #[command(subcommand)]
    Config(commands::ConfigCommands),
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let cli_config = CliConfig::new(cli.data_dir, cli.verbose);

    // Initialize logging
    let log_level = if cli_config.verbose { "debug" } else { "info" };
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(format!(
            "rps={},rps_core={},rps_game={}",
            log_level, log_level, log_level
        )))
        .with(tracing_subscriber::fmt::layer())
        .init();

    tokio::fs::create_dir_all(&cli_config.data_dir).await?;

    let result = run(
        cli.command,
        &cli_config,
        cli.rpc_url,
        cli.contract,
        cli.private_key,
        cli.yes,
    )
    .await;

    if let Err(e) = result {
        eprintln!("Error: {:#}", e);
        std::process::exit(1);
    }

    Ok(())
}

async fn run(
    command: Commands,
    cli_config: &CliConfig,
    rpc_url: Option<String>,
    contract: Option<String>,
    private_key: Option<String>,
    assume_yes: bool,
) -> anyhow::Result<()> {
    let config = cli_config.client_config(rpc_url.as_deref(), contract.as_deref())?;
    let prompter = DialoguerPrompter::new(assume_yes);
    let key = private_key.as_deref();

    match command {
        Commands::Config(cmd) => commands::handle_config_command(cmd, cli_config, config).await,
        Commands::Status => {
            let session = commands::open_session(cli_config, config, key, prompter).await?;
            commands::show_status(&session).await
        }
        Commands::Join { amount } => {
            let prompter = prompter.with_bet_amount(amount);
            let session = commands::open_session(cli_config, config, key, prompter).await?;
            commands::join(&session).await
        }
        Commands::Commit { choice, secret } => {
            let prompter = prompter
                .with_move(choice)
                .with_secret(secret)
                .generating_secrets();
            let session = commands::open_session(cli_config, config, key, prompter).await?;
            commands::commit(&session).await
        }
        Commands::Reveal { manual } => {
            let session = commands::open_session(cli_config, config, key, prompter).await?;
            commands::reveal(&session, manual).await
        }
        Commands::Watch => {
            let session = commands::open_session(cli_config, config, key, prompter).await?;
            commands::watch(session).await
        }
    }
}

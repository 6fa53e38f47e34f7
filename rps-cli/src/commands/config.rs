use crate::config::CliConfig;
use anyhow::{bail, Result};
use clap::Subcommand;
use rps_core::ClientConfig;

#[derive(Subcommand)]
pub enum ConfigCommands {
    /// Show the effective configuration
    Show,
    /// Write a config file with defaults and any overrides given
    Init {
        /// Overwrite an existing config file
        #[arg(short, long)]
        force: bool,
    },
}

pub async fn handle_config_command(
    cmd: ConfigCommands,
    cli_config: &CliConfig,
    config: ClientConfig,
) -> Result<()> {
    match cmd {
        ConfigCommands::Show => {
            println!("Config file: {}", cli_config.config_path().display());
            println!("Database: {}", cli_config.db_path().display());
            println!("{}", serde_json::to_string_pretty(&config)?);
        }

        ConfigCommands::Init { force } => {
            let path = cli_config.config_path();
            if path.exists() && !force {
                bail!(
                    "{} already exists; use --force to overwrite",
                    path.display()
                );
            }

            tokio::fs::create_dir_all(&cli_config.data_dir).await?;
            config.save(&path)?;
            println!("Wrote {}", path.display());
        }
    }

    Ok(())
}

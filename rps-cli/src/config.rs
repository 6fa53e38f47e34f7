use anyhow::{Context, Result};
use rps_core::config::parse_address;
use rps_core::ClientConfig;
use std::path::PathBuf;

const CONFIG_FILE: &str = "config.json";
const DATABASE_FILE: &str = "rps.db";

#[derive(Debug, Clone)]
pub struct CliConfig {
    pub data_dir: PathBuf,
    pub verbose: bool,
}

impl Default for CliConfig {
    fn default() -> Self {
        Self {
            data_dir: dirs::data_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join("rps"),
            verbose: false,
        }
    }
}

impl CliConfig {
    pub fn new(data_dir: Option<PathBuf>, verbose: bool) -> Self {
        let defaults = Self::default();
        Self {
            data_dir: data_dir.unwrap_or(defaults.data_dir),
            verbose,
        }
    }

    pub fn config_path(&self) -> PathBuf {
        self.data_dir.join(CONFIG_FILE)
    }

    pub fn db_path(&self) -> PathBuf {
        self.data_dir.join(DATABASE_FILE)
    }

    /// Client config from the data dir, with command-line overrides applied.
    pub fn client_config(
        &self,
        rpc_url: Option<&str>,
        contract: Option<&str>,
    ) -> Result<ClientConfig> {
        let path = self.config_path();
        let mut config = ClientConfig::load_or_default(&path)
            .with_context(|| format!("Failed to load {}", path.display()))?;

        if let Some(url) = rpc_url {
            config.rpc_url = url.to_string();
        }
        if let Some(contract) = contract {
            config.contract_address = parse_address(contract)?;
        }

        config.validate()?;
        Ok(config)
    }
}

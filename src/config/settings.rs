use crate::core::DIFFICULTY;
use crate::error::{BlockchainError, Result};
use crate::wallet::{validate_address, Wallets};
use log::{debug, error};
use once_cell::sync::Lazy;
use serde::Deserialize;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

/// Settings for the command-line binary. The library never reads this; it
/// takes an explicit [`Config`] or path everywhere.
pub static GLOBAL_CONFIG: Lazy<Config> = Lazy::new(|| {
    Config::load().unwrap_or_else(|e| {
        error!("{e}, using default configuration");
        Config::default()
    })
});

const CONFIG_FILE: &str = "minichain.toml";
const DEFAULT_DATA_DIR: &str = "data";
const DEFAULT_NODE_ID: &str = "3000";

const CONFIG_PATH_KEY: &str = "MINICHAIN_CONFIG";
const DATA_DIR_KEY: &str = "MINICHAIN_DATA_DIR";
const DIFFICULTY_KEY: &str = "MINICHAIN_DIFFICULTY";
const NODE_ID_KEY: &str = "NODE_ID";
const MINING_ADDRESS_KEY: &str = "MINING_ADDRESS";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// Directory holding the chain store and the wallet file
    pub data_dir: PathBuf,
    /// Keeps several nodes on one machine apart
    pub node_id: String,
    /// Leading zero bits required of every block hash on this chain
    pub difficulty: u32,
    /// Receives the coinbase of locally mined blocks
    pub mining_address: Option<String>,
}

// Everything optional: a file only overrides what it names
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct FileConfig {
    data_dir: Option<PathBuf>,
    node_id: Option<String>,
    difficulty: Option<u32>,
    mining_address: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            data_dir: PathBuf::from(DEFAULT_DATA_DIR),
            node_id: DEFAULT_NODE_ID.to_string(),
            difficulty: DIFFICULTY,
            mining_address: None,
        }
    }
}

impl Config {
    /// Defaults, then the TOML file, then environment variables.
    pub fn load() -> Result<Config> {
        let mut config = Config::default();

        match env::var(CONFIG_PATH_KEY) {
            Ok(path) => config.apply_file(Path::new(&path))?,
            Err(_) => {
                let path = Path::new(CONFIG_FILE);
                if path.exists() {
                    config.apply_file(path)?;
                }
            }
        }

        config.apply_env(|key| env::var(key).ok())?;
        config.validate()?;
        Ok(config)
    }

    /// Defaults overridden by a TOML document.
    pub fn from_toml_str(contents: &str) -> Result<Config> {
        let mut config = Config::default();
        config.apply_toml(contents)?;
        config.validate()?;
        Ok(config)
    }

    fn apply_file(&mut self, path: &Path) -> Result<()> {
        debug!("Reading configuration from {}", path.display());
        let contents = fs::read_to_string(path).map_err(|e| {
            BlockchainError::Config(format!("Failed to read {}: {e}", path.display()))
        })?;
        self.apply_toml(&contents)
    }

    fn apply_toml(&mut self, contents: &str) -> Result<()> {
        let file: FileConfig = toml::from_str(contents)?;
        if let Some(data_dir) = file.data_dir {
            self.data_dir = data_dir;
        }
        if let Some(node_id) = file.node_id {
            self.node_id = node_id;
        }
        if let Some(difficulty) = file.difficulty {
            self.difficulty = difficulty;
        }
        if file.mining_address.is_some() {
            self.mining_address = file.mining_address;
        }
        Ok(())
    }

    fn apply_env<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(data_dir) = lookup(DATA_DIR_KEY) {
            self.data_dir = PathBuf::from(data_dir);
        }
        if let Some(node_id) = lookup(NODE_ID_KEY) {
            self.node_id = node_id;
        }
        if let Some(difficulty) = lookup(DIFFICULTY_KEY) {
            self.difficulty = difficulty.trim().parse().map_err(|e| {
                BlockchainError::Config(format!("{DIFFICULTY_KEY}={difficulty}: {e}"))
            })?;
        }
        if let Some(address) = lookup(MINING_ADDRESS_KEY) {
            self.mining_address = Some(address);
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        if self.difficulty == 0 || self.difficulty > 255 {
            return Err(BlockchainError::Config(format!(
                "Difficulty must be within 1..=255, got {}",
                self.difficulty
            )));
        }
        if self.node_id.is_empty() {
            return Err(BlockchainError::Config("Node id must not be empty".to_string()));
        }
        if let Some(address) = &self.mining_address {
            if !validate_address(address) {
                return Err(BlockchainError::Config(format!(
                    "Invalid mining address: {address}"
                )));
            }
        }
        Ok(())
    }

    pub fn with_data_dir(mut self, data_dir: impl Into<PathBuf>) -> Config {
        self.data_dir = data_dir.into();
        self
    }

    pub fn with_difficulty(mut self, difficulty: u32) -> Config {
        self.difficulty = difficulty;
        self
    }

    pub fn is_miner(&self) -> bool {
        self.mining_address.is_some()
    }

    /// `<data_dir>/blocks_<node_id>`
    pub fn chain_path(&self) -> PathBuf {
        self.data_dir.join(format!("blocks_{}", self.node_id))
    }

    /// `<data_dir>/wallets_<node_id>.dat`
    pub fn wallet_path(&self) -> PathBuf {
        Wallets::wallet_file(&self.data_dir, &self.node_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::wallet::Wallet;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| vars.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.difficulty, DIFFICULTY);
        assert!(!config.is_miner());
        assert_eq!(config.chain_path(), PathBuf::from("data").join("blocks_3000"));
        assert_eq!(
            config.wallet_path(),
            PathBuf::from("data").join("wallets_3000.dat")
        );
    }

    #[test]
    fn test_toml_overrides_defaults() {
        let config = Config::from_toml_str("node_id = \"3001\"\ndifficulty = 12\n").unwrap();
        assert_eq!(config.node_id, "3001");
        assert_eq!(config.difficulty, 12);
        assert_eq!(config.data_dir, PathBuf::from("data"));
    }

    #[test]
    fn test_unknown_toml_key_rejected() {
        assert!(matches!(
            Config::from_toml_str("port = 2001\n"),
            Err(BlockchainError::Config(_))
        ));
    }

    #[test]
    fn test_env_overrides_file() {
        let mut config = Config::from_toml_str("node_id = \"3001\"\n").unwrap();
        config
            .apply_env(lookup(&[("NODE_ID", "3002"), ("MINICHAIN_DIFFICULTY", "10")]))
            .unwrap();
        assert_eq!(config.node_id, "3002");
        assert_eq!(config.difficulty, 10);

        assert!(config
            .apply_env(lookup(&[("MINICHAIN_DIFFICULTY", "hard")]))
            .is_err());
    }

    #[test]
    fn test_validation() {
        assert!(Config::default().with_difficulty(0).validate().is_err());
        assert!(Config::default().with_difficulty(256).validate().is_err());
        assert!(Config::default().with_difficulty(255).validate().is_ok());

        let mut config = Config::default();
        config.mining_address = Some("not-an-address".to_string());
        assert!(config.validate().is_err());

        config.mining_address = Some(Wallet::new().unwrap().get_address());
        assert!(config.validate().is_ok());
        assert!(config.is_miner());
    }
}

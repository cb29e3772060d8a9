use crate::error::{BlockchainError, Result};
use crate::utils::{deserialize, serialize};
use crate::wallet::Wallet;
use log::info;
use std::collections::HashMap;
use std::fs::{self, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

/// Address → key pair collection persisted per node.
pub struct Wallets {
    wallets: HashMap<String, Wallet>,
    path: PathBuf,
}

impl Wallets {
    /// Loads `wallets_<node_id>.dat` from `data_dir`, starting empty when the
    /// file does not exist yet.
    pub fn load(data_dir: &Path, node_id: &str) -> Result<Wallets> {
        let path = Self::wallet_file(data_dir, node_id);
        let mut wallets = Wallets {
            wallets: HashMap::new(),
            path,
        };
        wallets.load_from_file()?;
        Ok(wallets)
    }

    pub fn wallet_file(data_dir: &Path, node_id: &str) -> PathBuf {
        data_dir.join(format!("wallets_{node_id}.dat"))
    }

    /// Generates a key pair, stores it and returns its address.
    pub fn create_wallet(&mut self) -> Result<String> {
        let wallet = Wallet::new()?;
        let address = wallet.get_address();
        self.wallets.insert(address.clone(), wallet);
        self.save_to_file()?;
        info!("Created wallet {address}");
        Ok(address)
    }

    pub fn get_addresses(&self) -> Vec<String> {
        let mut addresses: Vec<String> = self.wallets.keys().cloned().collect();
        addresses.sort();
        addresses
    }

    pub fn get_wallet(&self, address: &str) -> Option<&Wallet> {
        self.wallets.get(address)
    }

    /// Like [`Wallets::get_wallet`] but as a caller-visible error.
    pub fn require_wallet(&self, address: &str) -> Result<&Wallet> {
        self.get_wallet(address)
            .ok_or_else(|| BlockchainError::AddressNotFound(address.to_string()))
    }

    fn load_from_file(&mut self) -> Result<()> {
        if !self.path.exists() {
            return Ok(());
        }

        let buf = fs::read(&self.path)?;
        self.wallets = deserialize(&buf).map_err(|e| {
            BlockchainError::Wallet(format!(
                "Could not load wallets from {}: {e}",
                self.path.display()
            ))
        })?;
        Ok(())
    }

    pub fn save_to_file(&self) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        let file = OpenOptions::new()
            .create(true)
            .truncate(true)
            .write(true)
            .open(&self.path)?;
        let mut writer = BufWriter::new(file);
        let wallets_bytes = serialize(&self.wallets)?;
        writer.write_all(wallets_bytes.as_slice())?;
        writer.flush()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_wallets_persist_per_node() {
        let dir = tempdir().unwrap();

        let address = {
            let mut wallets = Wallets::load(dir.path(), "3000").unwrap();
            wallets.create_wallet().unwrap()
        };

        let reloaded = Wallets::load(dir.path(), "3000").unwrap();
        assert_eq!(reloaded.get_addresses(), vec![address.clone()]);
        assert_eq!(reloaded.get_wallet(&address).unwrap().get_address(), address);

        let other_node = Wallets::load(dir.path(), "3001").unwrap();
        assert!(other_node.get_addresses().is_empty());
        assert!(matches!(
            other_node.require_wallet(&address),
            Err(BlockchainError::AddressNotFound(_))
        ));
    }

    #[test]
    fn test_corrupt_wallet_file_is_an_error() {
        let dir = tempdir().unwrap();
        fs::write(Wallets::wallet_file(dir.path(), "1"), [0xFF, 0xFF]).unwrap();
        assert!(matches!(
            Wallets::load(dir.path(), "1"),
            Err(BlockchainError::Wallet(_))
        ));
    }
}

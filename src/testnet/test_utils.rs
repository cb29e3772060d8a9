//! Test utilities for ledger testing

use crate::core::{Block, Blockchain, Transaction};
use crate::error::{BlockchainError, Result};
use crate::wallet::{Wallet, Wallets};
use tempfile::TempDir;

/// Low enough that a block takes a few hundred hashes
pub const TEST_DIFFICULTY: u32 = 8;

/// Create a temporary directory for testing
pub fn create_temp_dir() -> Result<TempDir> {
    tempfile::tempdir().map_err(|e| BlockchainError::Io(e.to_string()))
}

/// A chain in a temporary directory whose genesis reward went to the returned wallet
pub fn create_test_blockchain() -> Result<(Blockchain, Wallet, TempDir)> {
    let temp_dir = create_temp_dir()?;
    let wallet = Wallet::new()?;
    let blockchain = Blockchain::create_blockchain_with_path(
        &wallet.get_address(),
        &temp_dir.path().join("test_blockchain"),
        TEST_DIFFICULTY,
    )?;
    Ok((blockchain, wallet, temp_dir))
}

/// Independent chains, one per simulated node
pub fn create_test_network(node_count: usize) -> Result<Vec<(Blockchain, TempDir)>> {
    let mut nodes = Vec::new();
    for _ in 0..node_count {
        let (blockchain, _, temp_dir) = create_test_blockchain()?;
        nodes.push((blockchain, temp_dir));
    }
    Ok(nodes)
}

/// Create test wallets for testing
pub fn create_test_wallets(data_dir: &TempDir, count: usize) -> Result<(Wallets, Vec<String>)> {
    let mut wallets = Wallets::load(data_dir.path(), "test")?;
    let mut addresses = Vec::new();
    for _ in 0..count {
        addresses.push(wallets.create_wallet()?);
    }
    Ok((wallets, addresses))
}

/// Mines `count` coinbase-only blocks paying `address`.
pub fn mine_reward_blocks(
    blockchain: &Blockchain,
    address: &str,
    count: usize,
) -> Result<Vec<Block>> {
    (0..count)
        .map(|_| {
            let coinbase = Transaction::new_coinbase_tx(address, "")?;
            blockchain.mine_block(&[coinbase])
        })
        .collect()
}

/// Blocks branching off the main chain at `fork_point`, mined outside the
/// ledger so they can be fed back through `add_block`.
pub fn create_fork_scenario(
    blockchain: &Blockchain,
    fork_point: usize,
    fork_length: usize,
    miner_address: &str,
) -> Result<Vec<Block>> {
    let fork_base = blockchain
        .iterator()
        .find(|block| matches!(block, Ok(b) if b.get_height() == fork_point))
        .transpose()?
        .ok_or_else(|| {
            BlockchainError::InvalidBlock(format!("No block at height {fork_point}"))
        })?;

    let mut fork_blocks = Vec::new();
    let mut prev_hash = fork_base.get_hash().to_vec();
    for i in 0..fork_length {
        let coinbase_tx = Transaction::new_coinbase_tx(miner_address, "")?;
        let block = Block::new_block(
            &prev_hash,
            &[coinbase_tx],
            fork_point + i + 1,
            blockchain.difficulty(),
        )?;
        prev_hash = block.get_hash().to_vec();
        fork_blocks.push(block);
    }
    Ok(fork_blocks)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_test_blockchain() {
        let (blockchain, _wallet, _temp_dir) = create_test_blockchain().unwrap();
        assert_eq!(blockchain.get_best_height().unwrap(), 0);
        assert_eq!(blockchain.difficulty(), TEST_DIFFICULTY);
    }

    #[test]
    fn test_create_test_network() {
        let nodes = create_test_network(3).unwrap();
        assert_eq!(nodes.len(), 3);

        for (blockchain, _) in &nodes {
            assert_eq!(blockchain.get_best_height().unwrap(), 0);
        }
        assert_ne!(nodes[0].0.get_tip_hash(), nodes[1].0.get_tip_hash());
    }

    #[test]
    fn test_create_test_wallets() {
        let dir = create_temp_dir().unwrap();
        let (wallets, addresses) = create_test_wallets(&dir, 5).unwrap();
        assert_eq!(addresses.len(), 5);
        assert_eq!(wallets.get_addresses().len(), 5);

        // All addresses should be unique
        for i in 0..addresses.len() {
            for j in i + 1..addresses.len() {
                assert_ne!(addresses[i], addresses[j]);
            }
        }
    }

    #[test]
    fn test_longer_fork_takes_over_tip() {
        let (blockchain, wallet, _temp_dir) = create_test_blockchain().unwrap();
        mine_reward_blocks(&blockchain, &wallet.get_address(), 2).unwrap();
        let main_tip = blockchain.get_tip_hash();

        let fork = create_fork_scenario(&blockchain, 1, 2, &wallet.get_address()).unwrap();
        // Height 2 ties with the main tip and is stored without moving it
        assert!(!blockchain.add_block(&fork[0]).unwrap());
        assert_eq!(blockchain.get_tip_hash(), main_tip);

        assert!(blockchain.add_block(&fork[1]).unwrap());
        assert_eq!(blockchain.get_tip_hash(), fork[1].get_hash());
        assert_eq!(blockchain.get_best_height().unwrap(), 3);
        assert!(blockchain.validate_chain().unwrap());
    }
}

use crate::core::{Block, Blockchain, TXOutput, UnspentOutput, UtxoMap};
use crate::error::{BlockchainError, Result};
use crate::utils::{deserialize, serialize};
use data_encoding::HEXLOWER;
use log::{debug, info, warn};
use sled::{Batch, Tree};
use std::collections::HashMap;

const UTXO_TREE: &str = "chainstate";
// Tip hash the cached index was computed for. Never collides with a
// transaction id, those are always 32 bytes.
const INDEXED_TIP_KEY: &[u8] = b"indexed_tip";

/// Cached UTXO index over a [`Blockchain`], persisted in the `chainstate` tree.
///
/// The cache remembers which tip it reflects. Every query compares that with
/// the ledger tip first and rebuilds from a full rescan when they differ, so
/// answers always match a fresh scan of the chain.
pub struct UTXOSet {
    blockchain: Blockchain,
    utxo_tree: Tree,
}

impl UTXOSet {
    pub fn new(blockchain: Blockchain) -> Result<UTXOSet> {
        let utxo_tree = blockchain
            .get_db()
            .open_tree(UTXO_TREE)
            .map_err(|e| BlockchainError::Database(format!("Failed to open UTXO tree: {e}")))?;
        Ok(UTXOSet {
            blockchain,
            utxo_tree,
        })
    }

    pub fn get_blockchain(&self) -> &Blockchain {
        &self.blockchain
    }

    pub fn indexed_tip(&self) -> Result<Option<Vec<u8>>> {
        Ok(self
            .utxo_tree
            .get(INDEXED_TIP_KEY)?
            .map(|tip| tip.to_vec()))
    }

    pub fn is_stale(&self) -> Result<bool> {
        Ok(self.indexed_tip()?.as_deref() != Some(self.blockchain.get_tip_hash().as_slice()))
    }

    fn ensure_fresh(&self) -> Result<()> {
        if self.is_stale()? {
            debug!("UTXO cache is behind the chain tip");
            self.reindex()?;
        }
        Ok(())
    }

    fn load_entry(&self, txid: &[u8]) -> Result<Option<Vec<UnspentOutput>>> {
        match self.utxo_tree.get(txid)? {
            Some(bytes) => Ok(Some(deserialize::<Vec<UnspentOutput>>(bytes.as_ref())?)),
            None => Ok(None),
        }
    }

    // Every cached entry, marker excluded
    fn entries(&self) -> impl Iterator<Item = Result<(Vec<u8>, Vec<UnspentOutput>)>> + '_ {
        self.utxo_tree.iter().filter_map(|item| match item {
            Ok((key, _)) if key.as_ref() == INDEXED_TIP_KEY => None,
            Ok((key, value)) => Some(
                deserialize::<Vec<UnspentOutput>>(value.as_ref()).map(|outs| (key.to_vec(), outs)),
            ),
            Err(e) => Some(Err(e.into())),
        })
    }

    /// Rebuilds the cache from a full rescan of the chain.
    ///
    /// The old entries, the new entries and the marker go in one batch, so a
    /// reader sees either the previous index or the new one.
    pub fn reindex(&self) -> Result<()> {
        let tip_hash = self.blockchain.get_tip_hash();
        let utxo_map = self.blockchain.find_utxo_at(tip_hash.clone())?;

        let mut batch = Batch::default();
        for key in self.utxo_tree.iter().keys() {
            batch.remove(key?);
        }
        for (txid, outs) in &utxo_map {
            batch.insert(txid.as_slice(), serialize(outs)?);
        }
        batch.insert(INDEXED_TIP_KEY, tip_hash.as_slice());

        self.utxo_tree
            .apply_batch(batch)
            .map_err(|e| BlockchainError::Database(format!("Failed to write UTXO index: {e}")))?;
        self.blockchain.get_db().flush()?;

        info!(
            "Reindexed UTXO set at tip {}: {} transactions with unspent outputs",
            HEXLOWER.encode(&tip_hash),
            utxo_map.len()
        );
        Ok(())
    }

    /// Applies a block that was just committed on top of the indexed tip.
    ///
    /// Anything else (a block that did not become the tip, or a cache that
    /// was already behind) is handled by a full reindex.
    pub fn update(&self, block: &Block) -> Result<()> {
        let extends_index = self.indexed_tip()?.as_deref() == Some(block.get_prev_hash());
        if !extends_index || self.blockchain.get_tip_hash() != block.get_hash() {
            debug!(
                "Block {} does not extend the UTXO index, reindexing",
                block.hash_hex()
            );
            return self.reindex();
        }

        // Staged entries, so transactions later in the block see the effect
        // of earlier ones
        let mut staged: HashMap<Vec<u8>, Vec<UnspentOutput>> = HashMap::new();
        for tx in block.get_transactions() {
            if !tx.is_coinbase() {
                for vin in tx.get_vin() {
                    let index = vin.output_index()?;
                    let mut outs = match staged.remove(vin.get_txid()) {
                        Some(outs) => outs,
                        None => match self.load_entry(vin.get_txid())? {
                            Some(outs) => outs,
                            None => {
                                warn!(
                                    "UTXO entry {} missing during update, reindexing",
                                    HEXLOWER.encode(vin.get_txid())
                                );
                                return self.reindex();
                            }
                        },
                    };
                    outs.retain(|out| out.vout != index);
                    staged.insert(vin.get_txid().to_vec(), outs);
                }
            }

            let new_outputs = tx
                .get_vout()
                .iter()
                .enumerate()
                .map(|(vout, output)| UnspentOutput {
                    vout,
                    output: output.clone(),
                })
                .collect();
            staged.insert(tx.get_id().to_vec(), new_outputs);
        }

        let mut batch = Batch::default();
        for (txid, outs) in &staged {
            if outs.is_empty() {
                batch.remove(txid.as_slice());
            } else {
                batch.insert(txid.as_slice(), serialize(outs)?);
            }
        }
        batch.insert(INDEXED_TIP_KEY, block.get_hash());

        self.utxo_tree
            .apply_batch(batch)
            .map_err(|e| BlockchainError::Database(format!("Failed to update UTXO index: {e}")))?;
        self.blockchain.get_db().flush()?;
        debug!("UTXO index moved to block {}", block.hash_hex());
        Ok(())
    }

    /// Unspent outputs locked to `pub_key_hash`.
    pub fn find_utxo(&self, pub_key_hash: &[u8]) -> Result<Vec<TXOutput>> {
        self.ensure_fresh()?;
        let mut utxos = vec![];
        for entry in self.entries() {
            let (_, outs) = entry?;
            utxos.extend(
                outs.into_iter()
                    .filter(|out| out.output.is_locked_with_key(pub_key_hash))
                    .map(|out| out.output),
            );
        }
        Ok(utxos)
    }

    /// Remaining unspent outputs of every transaction.
    pub fn full_index(&self) -> Result<UtxoMap> {
        self.ensure_fresh()?;
        self.entries().collect()
    }

    pub fn balance(&self, pub_key_hash: &[u8]) -> Result<u64> {
        self.find_utxo(pub_key_hash)?
            .iter()
            .try_fold(0u64, |total, out| total.checked_add(out.get_value()))
            .ok_or_else(|| BlockchainError::InvalidTransaction("Balance overflow".to_string()))
    }

    /// Picks outputs locked to `pub_key_hash` until `amount` is covered.
    ///
    /// Outputs are taken in chain order, newest block first, and selection
    /// stops as soon as the accumulated value reaches `amount`. The caller
    /// decides what a short result means.
    pub fn find_spendable_outputs(
        &self,
        pub_key_hash: &[u8],
        amount: u64,
    ) -> Result<(u64, HashMap<Vec<u8>, Vec<usize>>)> {
        self.ensure_fresh()?;
        let mut unspent_outputs: HashMap<Vec<u8>, Vec<usize>> = HashMap::new();
        let mut accumulated = 0u64;

        'blocks: for block in self.blockchain.iterator() {
            let block = block?;
            for tx in block.get_transactions() {
                let Some(outs) = self.load_entry(tx.get_id())? else {
                    continue;
                };
                for out in outs {
                    if !out.output.is_locked_with_key(pub_key_hash) {
                        continue;
                    }
                    accumulated = accumulated.saturating_add(out.output.get_value());
                    unspent_outputs
                        .entry(tx.get_id().to_vec())
                        .or_default()
                        .push(out.vout);
                    if accumulated >= amount {
                        break 'blocks;
                    }
                }
            }
        }
        Ok((accumulated, unspent_outputs))
    }

    pub fn count_transactions(&self) -> Result<u64> {
        self.ensure_fresh()?;
        let mut counter = 0;
        for entry in self.entries() {
            entry?;
            counter += 1;
        }
        Ok(counter)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{Transaction, SUBSIDY};
    use crate::wallet::{hash_pub_key, Wallet};
    use tempfile::TempDir;

    const TEST_DIFFICULTY: u32 = 8;

    fn setup() -> (TempDir, Wallet, UTXOSet) {
        let dir = TempDir::new().unwrap();
        let wallet = Wallet::new().unwrap();
        let chain = Blockchain::create_blockchain_with_path(
            &wallet.get_address(),
            &dir.path().join("chain"),
            TEST_DIFFICULTY,
        )
        .unwrap();
        let utxo_set = UTXOSet::new(chain).unwrap();
        (dir, wallet, utxo_set)
    }

    fn pkh(wallet: &Wallet) -> Vec<u8> {
        hash_pub_key(wallet.get_public_key())
    }

    #[test]
    fn test_fresh_set_reindexes_on_first_query() {
        let (_dir, wallet, utxo_set) = setup();
        assert!(utxo_set.is_stale().unwrap());
        assert_eq!(utxo_set.balance(&pkh(&wallet)).unwrap(), SUBSIDY);
        assert!(!utxo_set.is_stale().unwrap());
        assert_eq!(utxo_set.count_transactions().unwrap(), 1);
    }

    #[test]
    fn test_full_index_matches_rescan() {
        let (_dir, wallet, utxo_set) = setup();
        let receiver = Wallet::new().unwrap();
        let tx =
            Transaction::new_utxo_transaction(&wallet, &receiver.get_address(), 30, &utxo_set)
                .unwrap();
        let block = utxo_set.get_blockchain().mine_block(&[tx]).unwrap();
        utxo_set.update(&block).unwrap();

        let mut cached: Vec<_> = utxo_set.full_index().unwrap().into_iter().collect();
        let mut rescanned: Vec<_> = utxo_set
            .get_blockchain()
            .find_utxo()
            .unwrap()
            .into_iter()
            .collect();
        cached.sort_by(|a, b| a.0.cmp(&b.0));
        rescanned.sort_by(|a, b| a.0.cmp(&b.0));
        assert_eq!(cached, rescanned);
    }

    #[test]
    fn test_update_keeps_original_output_indices() {
        let (_dir, wallet, utxo_set) = setup();
        let receiver = Wallet::new().unwrap();
        utxo_set.reindex().unwrap();

        let tx =
            Transaction::new_utxo_transaction(&wallet, &receiver.get_address(), 30, &utxo_set)
                .unwrap();
        let block = utxo_set.get_blockchain().mine_block(&[tx.clone()]).unwrap();
        utxo_set.update(&block).unwrap();
        assert_eq!(utxo_set.indexed_tip().unwrap().unwrap(), block.get_hash());

        // Spend the recipient's output 0; the sender's change at index 1 must
        // still be addressed as index 1
        let onward =
            Transaction::new_utxo_transaction(&receiver, &wallet.get_address(), 30, &utxo_set)
                .unwrap();
        let block = utxo_set.get_blockchain().mine_block(&[onward]).unwrap();
        utxo_set.update(&block).unwrap();

        let index = utxo_set.full_index().unwrap();
        let remaining = &index[tx.get_id()];
        assert_eq!(remaining.len(), 1);
        assert_eq!(remaining[0].vout, 1);
        assert_eq!(remaining[0].output.get_value(), 70);
    }

    #[test]
    fn test_stale_cache_is_rebuilt() {
        let (_dir, wallet, utxo_set) = setup();
        utxo_set.reindex().unwrap();

        // A block the cache never hears about
        let coinbase = Transaction::new_coinbase_tx(&wallet.get_address(), "").unwrap();
        utxo_set.get_blockchain().mine_block(&[coinbase]).unwrap();
        assert!(utxo_set.is_stale().unwrap());

        assert_eq!(utxo_set.balance(&pkh(&wallet)).unwrap(), 2 * SUBSIDY);
        assert!(!utxo_set.is_stale().unwrap());
    }

    #[test]
    fn test_spendable_outputs_stop_once_covered() {
        let (_dir, wallet, utxo_set) = setup();
        for _ in 0..3 {
            let coinbase = Transaction::new_coinbase_tx(&wallet.get_address(), "").unwrap();
            let block = utxo_set.get_blockchain().mine_block(&[coinbase]).unwrap();
            utxo_set.update(&block).unwrap();
        }

        let (accumulated, outputs) = utxo_set
            .find_spendable_outputs(&pkh(&wallet), 150)
            .unwrap();
        assert_eq!(accumulated, 200);
        assert_eq!(outputs.values().map(Vec::len).sum::<usize>(), 2);

        let (accumulated, _) = utxo_set
            .find_spendable_outputs(&pkh(&wallet), 1_000)
            .unwrap();
        assert_eq!(accumulated, 4 * SUBSIDY);
    }

    #[test]
    fn test_unknown_key_has_nothing() {
        let (_dir, _wallet, utxo_set) = setup();
        let stranger = Wallet::new().unwrap();
        assert!(utxo_set.find_utxo(&pkh(&stranger)).unwrap().is_empty());
        let (accumulated, outputs) = utxo_set
            .find_spendable_outputs(&pkh(&stranger), 1)
            .unwrap();
        assert_eq!(accumulated, 0);
        assert!(outputs.is_empty());
    }
}

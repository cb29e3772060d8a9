use crate::core::proof_of_work::MiningOutcome;
use crate::core::{MerkleTree, ProofOfWork, Transaction};
use crate::error::{BlockchainError, Result};
use crate::utils::{current_timestamp, deserialize, serialize};
use data_encoding::HEXLOWER;
use log::info;
use serde::{Deserialize, Serialize};

/// A batch of transactions sealed by proof-of-work.
///
/// `hash` is the proof-of-work digest and is only ever written by sealing.
/// The genesis block has an empty `prev_hash` and height 0.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, bincode::Encode, bincode::Decode)]
pub struct Block {
    timestamp: i64,
    hash: Vec<u8>,
    prev_hash: Vec<u8>,
    transactions: Vec<Transaction>,
    nonce: i64,
    height: usize,
}

impl Block {
    /// An unsealed block: no nonce, no hash yet.
    pub fn assemble(prev_hash: &[u8], transactions: &[Transaction], height: usize) -> Result<Block> {
        if transactions.is_empty() {
            return Err(BlockchainError::InvalidBlock(
                "Block must contain at least one transaction".to_string(),
            ));
        }

        Ok(Block {
            timestamp: current_timestamp()?,
            hash: vec![],
            prev_hash: prev_hash.to_vec(),
            transactions: transactions.to_vec(),
            nonce: 0,
            height,
        })
    }

    /// Assembles and mines a block inline on the calling thread.
    pub fn new_block(
        prev_hash: &[u8],
        transactions: &[Transaction],
        height: usize,
        difficulty: u32,
    ) -> Result<Block> {
        let mut block = Self::assemble(prev_hash, transactions, height)?;

        info!("Starting proof-of-work for block at height {height} with difficulty {difficulty}");
        let pow = ProofOfWork::for_block(&block, difficulty)?;
        match pow.run(|| false)? {
            MiningOutcome::Found { nonce, hash } => block.seal(nonce, hash),
            MiningOutcome::Interrupted => return Err(BlockchainError::MiningCancelled),
        }
        info!("Proof-of-work completed for block {}", block.hash_hex());

        Ok(block)
    }

    /// Unsealed genesis: a single coinbase transaction, empty previous hash, height 0.
    pub fn genesis(coinbase: &Transaction) -> Result<Block> {
        if !coinbase.is_coinbase() {
            return Err(BlockchainError::InvalidBlock(
                "Genesis block must hold a coinbase transaction".to_string(),
            ));
        }
        Self::assemble(&[], std::slice::from_ref(coinbase), 0)
    }

    pub(crate) fn seal(&mut self, nonce: i64, hash: Vec<u8>) {
        self.nonce = nonce;
        self.hash = hash;
    }

    pub fn deserialize(bytes: &[u8]) -> Result<Block> {
        deserialize::<Block>(bytes)
    }

    pub fn serialize(&self) -> Result<Vec<u8>> {
        serialize(self)
    }

    pub fn get_transactions(&self) -> &[Transaction] {
        self.transactions.as_slice()
    }

    pub fn get_prev_hash(&self) -> &[u8] {
        self.prev_hash.as_slice()
    }

    pub fn get_hash(&self) -> &[u8] {
        self.hash.as_slice()
    }

    pub fn hash_hex(&self) -> String {
        HEXLOWER.encode(&self.hash)
    }

    pub fn get_timestamp(&self) -> i64 {
        self.timestamp
    }

    pub fn get_height(&self) -> usize {
        self.height
    }

    pub fn get_nonce(&self) -> i64 {
        self.nonce
    }

    pub fn is_genesis(&self) -> bool {
        self.prev_hash.is_empty()
    }

    /// Merkle root over the canonical encodings of the transactions.
    pub fn merkle_root(&self) -> Result<Vec<u8>> {
        Ok(MerkleTree::from_transactions(&self.transactions)?.root_hash())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::wallet::Wallet;

    const TEST_DIFFICULTY: u32 = 8;

    fn coinbase() -> Transaction {
        let wallet = Wallet::new().unwrap();
        Transaction::new_coinbase_tx(&wallet.get_address(), "").unwrap()
    }

    #[test]
    fn test_genesis_shape() {
        let genesis = Block::genesis(&coinbase()).unwrap();
        assert!(genesis.is_genesis());
        assert!(genesis.get_prev_hash().is_empty());
        assert!(genesis.get_hash().is_empty());
        assert_eq!(genesis.get_height(), 0);
        assert_eq!(genesis.get_transactions().len(), 1);
        assert!(genesis.get_transactions()[0].is_coinbase());
    }

    #[test]
    fn test_genesis_requires_coinbase() {
        let wallet = Wallet::new().unwrap();
        let cb = coinbase();
        let spend = Transaction::from_parts(
            vec![crate::core::TXInput::new(cb.get_id(), 0, wallet.get_public_key()).unwrap()],
            cb.get_vout().to_vec(),
        )
        .unwrap();
        assert!(matches!(
            Block::genesis(&spend),
            Err(BlockchainError::InvalidBlock(_))
        ));
    }

    #[test]
    fn test_mined_hash_is_pow_digest() {
        let block = Block::new_block(b"parent", &[coinbase()], 3, TEST_DIFFICULTY).unwrap();
        let pow = ProofOfWork::for_block(&block, TEST_DIFFICULTY).unwrap();
        assert_eq!(block.get_hash(), pow.hash_for(block.get_nonce()).as_slice());
        assert!(pow.meets_target(block.get_hash()));
    }

    #[test]
    fn test_empty_block_rejected() {
        assert!(Block::assemble(b"parent", &[], 1).is_err());
    }

    #[test]
    fn test_tampered_block_fails_validation() {
        let block = Block::new_block(b"parent", &[coinbase()], 1, TEST_DIFFICULTY).unwrap();

        let mut other_nonce = block.clone();
        other_nonce.nonce += 1;
        assert!(!ProofOfWork::validate(&other_nonce, TEST_DIFFICULTY).unwrap());

        let mut other_txs = block.clone();
        other_txs.transactions = vec![coinbase()];
        assert!(!ProofOfWork::validate(&other_txs, TEST_DIFFICULTY).unwrap());
    }

    #[test]
    fn test_serialization_round_trip() {
        let block = Block::new_block(b"parent", &[coinbase(), coinbase()], 1, TEST_DIFFICULTY)
            .unwrap();
        let decoded = Block::deserialize(&block.serialize().unwrap()).unwrap();
        assert_eq!(decoded, block);
        assert_eq!(decoded.get_timestamp(), block.get_timestamp());
        assert_eq!(decoded.get_nonce(), block.get_nonce());
    }
}

//! Core ledger functionality
//!
//! Blocks, transactions, the Merkle commitment, proof-of-work and the
//! persisted chain that ties them together.

pub mod block;
pub mod blockchain;
pub mod merkle;
pub mod miner;
pub mod proof_of_work;
pub mod transaction;

pub use block::Block;
pub use blockchain::{Blockchain, BlockchainIterator, UtxoMap, GENESIS_COINBASE_DATA};
pub use merkle::{merkle_root, MerkleTree};
pub use miner::MiningTask;
pub use proof_of_work::{MiningOutcome, ProofOfWork, DIFFICULTY};
pub use transaction::{
    PrevTransactions, TXInput, TXOutput, Transaction, UnspentOutput, COINBASE_VOUT, SUBSIDY,
};

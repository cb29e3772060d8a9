//! # minichain - a minimal proof-of-work ledger
//!
//! An append-only chain of blocks, each anchoring a batch of value-transfer
//! transactions, secured by a fixed-difficulty proof-of-work puzzle and a
//! Merkle commitment. Value lives in unspent transaction outputs locked to
//! public-key hashes and is moved by ECDSA P-256 signatures.
//!
//! ## How the code is organized
//! - `core/`: blocks, transactions, Merkle tree, proof-of-work and the
//!   persisted chain (`Blockchain`) that ties them together
//! - `storage/`: the cached UTXO index kept next to the chain
//! - `wallet/`: key pairs, addresses and the per-node wallet file
//! - `config/`: node settings from defaults, TOML and the environment
//! - `utils/`: hashing, signatures and the canonical byte encoding
//! - `cli/`: argument parsing for the `minichain` binary
//!
//! ## Things to keep in mind
//! - Blocks and the `"lh"` tip pointer are written in one Sled transaction,
//!   so readers never see one without the other.
//! - The UTXO index is derived state. It can always be rebuilt from the
//!   chain and rebuilds itself whenever it is behind the tip.
//! - Mining runs on a worker thread and can be cancelled; a cancelled
//!   attempt never writes anything.
//!
//! ## Example
//! ```no_run
//! use minichain::{Blockchain, Config, Transaction, UTXOSet, Wallet};
//!
//! # fn main() -> minichain::Result<()> {
//! let config = Config::default().with_data_dir("/tmp/minichain").with_difficulty(12);
//! let alice = Wallet::new()?;
//! let bob = Wallet::new()?;
//!
//! let chain = Blockchain::create_blockchain(&alice.get_address(), &config)?;
//! let utxo_set = UTXOSet::new(chain.clone())?;
//!
//! let tx = Transaction::new_utxo_transaction(&alice, &bob.get_address(), 40, &utxo_set)?;
//! let block = chain.mine_block(&[tx])?;
//! utxo_set.update(&block)?;
//! # Ok(())
//! # }
//! ```

pub mod cli;
pub mod config;
pub mod core;
pub mod error;
pub mod storage;
pub mod utils;
pub mod wallet;

#[cfg(test)]
pub mod testnet;

// Re-export commonly used types for convenience
pub use cli::{Command, Opt};
pub use config::{Config, GLOBAL_CONFIG};
pub use crate::core::{
    merkle_root, Block, Blockchain, BlockchainIterator, MerkleTree, MiningOutcome,
    MiningTask, PrevTransactions, ProofOfWork, TXInput, TXOutput, Transaction, UnspentOutput,
    UtxoMap, COINBASE_VOUT, DIFFICULTY, SUBSIDY,
};
pub use error::{BlockchainError, Result};
pub use storage::UTXOSet;
pub use utils::{
    base58_decode, base58_encode, current_timestamp, ecdsa_p256_sha256_sign_digest,
    ecdsa_p256_sha256_sign_verify, new_key_pair, ripemd160_digest, sha256_digest,
};
pub use wallet::{
    address_to_pub_key_hash, convert_address, hash_pub_key, validate_address, Wallet, Wallets,
    ADDRESS_CHECK_SUM_LEN,
};

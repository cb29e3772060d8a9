//! Derived state kept next to the chain
//!
//! The cached UTXO index lives in its own Sled tree beside the blocks.

pub mod utxo_set;

pub use utxo_set::UTXOSet;

//! Wallet key pairs and addresses
//!
//! Produces the key pairs and public-key hashes the ledger signs and locks
//! outputs with. Key storage is a flat per-node file.

#[allow(clippy::module_inception)]
pub mod wallet;
pub mod wallets;

pub use wallet::{
    address_to_pub_key_hash, convert_address, hash_pub_key, validate_address, Wallet,
    ADDRESS_CHECK_SUM_LEN,
};
pub use wallets::Wallets;

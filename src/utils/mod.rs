//! Utility functions and helpers
//!
//! Hashing, encoding, signature primitives and the bincode layer used
//! throughout the ledger.

pub mod crypto;
pub mod serialization;

pub use crypto::{
    base58_decode, base58_encode, current_timestamp, ecdsa_p256_sha256_sign_digest,
    ecdsa_p256_sha256_sign_verify, new_key_pair, public_key_from_pkcs8, ripemd160_digest,
    sha256_digest, PUBLIC_KEY_LEN, SIGNATURE_LEN,
};

pub use serialization::{deserialize, int_to_be_bytes, serialize};

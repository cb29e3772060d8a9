//! Error handling for the ledger
//!
//! One error type for every operation. Variants are split between fatal
//! conditions (corruption, cryptographic violations, programmer error) and
//! ordinary control-flow results such as a missing transaction or a wallet
//! that cannot cover an amount. See [`BlockchainError::is_recoverable`].

use std::fmt;

/// Result type alias for ledger operations
pub type Result<T> = std::result::Result<T, BlockchainError>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BlockchainError {
    /// Store open/read/write failures
    Database(String),
    /// Persisted bytes that do not decode, or values that do not encode
    Serialization(String),
    /// Key handling, signing, hashing
    Crypto(String),
    /// A block that fails proof-of-work, linkage or structure checks
    InvalidBlock(String),
    /// A transaction that fails signature, ownership, balance or UTXO checks
    InvalidTransaction(String),
    /// An input references a transaction that is not in the prior-transaction set
    DanglingReference(String),
    /// `initialize` called on a path that already holds a chain
    ChainAlreadyExists(String),
    /// `open` called on a path without a chain
    ChainNotFound(String),
    /// Nonce search failures
    Mining(String),
    /// Mining was cancelled before anything was persisted
    MiningCancelled,
    /// Wallet file problems
    Wallet(String),
    /// Configuration errors
    Config(String),
    /// File I/O errors
    Io(String),
    /// Lookup of a transaction id that is not on the chain
    TransactionNotFound(String),
    /// Spend selection could not reach the requested amount
    InsufficientFunds { required: u64, available: u64 },
    /// No wallet or unspent outputs known for the given key
    AddressNotFound(String),
    /// Malformed or checksum-failing address
    InvalidAddress(String),
}

impl BlockchainError {
    /// Lookup and funds failures are ordinary results the caller is expected
    /// to handle; everything else means the operation must not proceed.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            BlockchainError::TransactionNotFound(_)
                | BlockchainError::InsufficientFunds { .. }
                | BlockchainError::AddressNotFound(_)
                | BlockchainError::InvalidAddress(_)
        )
    }
}

impl fmt::Display for BlockchainError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BlockchainError::Database(msg) => write!(f, "Database error: {msg}"),
            BlockchainError::Serialization(msg) => write!(f, "Serialization error: {msg}"),
            BlockchainError::Crypto(msg) => write!(f, "Cryptographic error: {msg}"),
            BlockchainError::InvalidBlock(msg) => write!(f, "Invalid block: {msg}"),
            BlockchainError::InvalidTransaction(msg) => write!(f, "Invalid transaction: {msg}"),
            BlockchainError::DanglingReference(txid) => {
                write!(f, "Previous transaction does not exist: {txid}")
            }
            BlockchainError::ChainAlreadyExists(path) => {
                write!(f, "Blockchain already exists at {path}")
            }
            BlockchainError::ChainNotFound(path) => {
                write!(f, "No existing blockchain found at {path}, create one first")
            }
            BlockchainError::Mining(msg) => write!(f, "Mining error: {msg}"),
            BlockchainError::MiningCancelled => write!(f, "Mining cancelled"),
            BlockchainError::Wallet(msg) => write!(f, "Wallet error: {msg}"),
            BlockchainError::Config(msg) => write!(f, "Configuration error: {msg}"),
            BlockchainError::Io(msg) => write!(f, "I/O error: {msg}"),
            BlockchainError::TransactionNotFound(txid) => {
                write!(f, "Transaction not found: {txid}")
            }
            BlockchainError::InsufficientFunds {
                required,
                available,
            } => {
                write!(
                    f,
                    "Insufficient funds: required {required}, available {available}"
                )
            }
            BlockchainError::AddressNotFound(addr) => write!(f, "Address not found: {addr}"),
            BlockchainError::InvalidAddress(addr) => write!(f, "Invalid address: {addr}"),
        }
    }
}

impl std::error::Error for BlockchainError {}

impl From<std::io::Error> for BlockchainError {
    fn from(err: std::io::Error) -> Self {
        BlockchainError::Io(err.to_string())
    }
}

impl From<sled::Error> for BlockchainError {
    fn from(err: sled::Error) -> Self {
        BlockchainError::Database(err.to_string())
    }
}

impl From<sled::transaction::TransactionError<BlockchainError>> for BlockchainError {
    fn from(err: sled::transaction::TransactionError<BlockchainError>) -> Self {
        match err {
            sled::transaction::TransactionError::Abort(e) => e,
            sled::transaction::TransactionError::Storage(e) => {
                BlockchainError::Database(e.to_string())
            }
        }
    }
}

impl From<bincode::error::EncodeError> for BlockchainError {
    fn from(err: bincode::error::EncodeError) -> Self {
        BlockchainError::Serialization(err.to_string())
    }
}

impl From<bincode::error::DecodeError> for BlockchainError {
    fn from(err: bincode::error::DecodeError) -> Self {
        BlockchainError::Serialization(err.to_string())
    }
}

impl From<toml::de::Error> for BlockchainError {
    fn from(err: toml::de::Error) -> Self {
        BlockchainError::Config(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_recoverable_classification() {
        assert!(BlockchainError::TransactionNotFound("ab".to_string()).is_recoverable());
        assert!(BlockchainError::InsufficientFunds {
            required: 10,
            available: 5
        }
        .is_recoverable());
        assert!(!BlockchainError::DanglingReference("ab".to_string()).is_recoverable());
        assert!(!BlockchainError::ChainAlreadyExists("/tmp".to_string()).is_recoverable());
        assert!(!BlockchainError::MiningCancelled.is_recoverable());
    }

    #[test]
    fn test_transaction_abort_unwraps_inner_error() {
        let err: BlockchainError = sled::transaction::TransactionError::Abort(
            BlockchainError::InvalidBlock("stale tip".to_string()),
        )
        .into();
        assert_eq!(err, BlockchainError::InvalidBlock("stale tip".to_string()));
    }

    #[test]
    fn test_display_insufficient_funds() {
        let err = BlockchainError::InsufficientFunds {
            required: 40,
            available: 0,
        };
        assert_eq!(
            err.to_string(),
            "Insufficient funds: required 40, available 0"
        );
    }
}

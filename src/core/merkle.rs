use crate::core::Transaction;
use crate::error::{BlockchainError, Result};
use crate::utils::sha256_digest;

/// Binary hash tree over an ordered batch of transaction encodings.
///
/// Leaves are `SHA256(encoding)`, internal nodes are `SHA256(left || right)`.
/// A level of odd width duplicates its last node before pairing. A single
/// leaf is its own root. Order is part of the commitment: nothing is sorted.
#[derive(Debug, Clone)]
pub struct MerkleTree {
    // levels[0] holds the leaf digests, the last level holds the root
    levels: Vec<Vec<Vec<u8>>>,
}

impl MerkleTree {
    /// Builds the tree from raw byte strings (one per transaction).
    pub fn new(data: &[Vec<u8>]) -> Result<Self> {
        if data.is_empty() {
            return Err(BlockchainError::InvalidBlock(
                "Cannot create Merkle tree from empty transaction list".to_string(),
            ));
        }

        let leaves: Vec<Vec<u8>> = data.iter().map(|d| sha256_digest(d)).collect();
        let mut levels = vec![leaves];

        while let Some(current) = levels.last() {
            if current.len() == 1 {
                break;
            }
            let next: Vec<Vec<u8>> = current
                .chunks(2)
                .map(|pair| match pair {
                    [left, right] => Self::hash_pair(left, right),
                    [single] => Self::hash_pair(single, single),
                    _ => unreachable!("chunks(2) yields one or two items"),
                })
                .collect();
            levels.push(next);
        }

        Ok(MerkleTree { levels })
    }

    /// Builds the tree over the canonical encodings of `transactions`.
    pub fn from_transactions(transactions: &[Transaction]) -> Result<Self> {
        let encodings = transactions
            .iter()
            .map(Transaction::serialize)
            .collect::<Result<Vec<_>>>()?;
        Self::new(&encodings)
    }

    pub fn root_hash(&self) -> Vec<u8> {
        self.levels
            .last()
            .and_then(|level| level.first())
            .cloned()
            .unwrap_or_default()
    }

    pub fn leaf_count(&self) -> usize {
        self.levels.first().map_or(0, Vec::len)
    }

    fn hash_pair(left: &[u8], right: &[u8]) -> Vec<u8> {
        let mut combined = Vec::with_capacity(left.len() + right.len());
        combined.extend_from_slice(left);
        combined.extend_from_slice(right);
        sha256_digest(&combined)
    }
}

/// Root digest over an ordered sequence of byte strings.
pub fn merkle_root(data: &[Vec<u8>]) -> Result<Vec<u8>> {
    Ok(MerkleTree::new(data)?.root_hash())
}

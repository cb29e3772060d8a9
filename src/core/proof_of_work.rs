use crate::core::Block;
use crate::error::{BlockchainError, Result};
use crate::utils::{int_to_be_bytes, sha256_digest};
use data_encoding::HEXLOWER;
use log::{debug, info};
use num_bigint::{BigInt, Sign};
use std::ops::ShlAssign;

/// Required number of leading zero bits in a block hash
pub const DIFFICULTY: u32 = 18;

const MAX_NONCE: i64 = i64::MAX;

// How many nonces are tried between two looks at the stop predicate
const STOP_CHECK_INTERVAL: i64 = 4096;

/// Result of a nonce search
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MiningOutcome {
    Found { nonce: i64, hash: Vec<u8> },
    Interrupted,
}

/// Hash puzzle over `prev_hash ‖ merkle_root ‖ be64(nonce) ‖ be64(difficulty)`.
///
/// The engine owns copies of its inputs so it can be moved onto a worker
/// thread while the ledger keeps serving reads.
#[derive(Debug, Clone)]
pub struct ProofOfWork {
    prev_hash: Vec<u8>,
    merkle_root: Vec<u8>,
    target: BigInt,
    difficulty: u32,
}

impl ProofOfWork {
    pub fn new(prev_hash: &[u8], merkle_root: &[u8], difficulty: u32) -> Result<ProofOfWork> {
        if difficulty == 0 || difficulty > 255 {
            return Err(BlockchainError::Mining(format!(
                "Difficulty must be within 1..=255, got {difficulty}"
            )));
        }
        Ok(ProofOfWork {
            prev_hash: prev_hash.to_vec(),
            merkle_root: merkle_root.to_vec(),
            target: Self::target_for(difficulty),
            difficulty,
        })
    }

    /// Engine for an already assembled block.
    pub fn for_block(block: &Block, difficulty: u32) -> Result<ProofOfWork> {
        let merkle_root = block.merkle_root()?;
        Self::new(block.get_prev_hash(), &merkle_root, difficulty)
    }

    /// `2^(256 - difficulty)`
    pub fn target_for(difficulty: u32) -> BigInt {
        let mut target = BigInt::from(1);
        target.shl_assign(256 - difficulty);
        target
    }

    pub fn target(&self) -> &BigInt {
        &self.target
    }

    pub fn difficulty(&self) -> u32 {
        self.difficulty
    }

    /// Recomputes the digest for the block's stored nonce and checks it both
    /// matches the stored hash and lies below the target.
    pub fn validate(block: &Block, difficulty: u32) -> Result<bool> {
        let pow = Self::for_block(block, difficulty)?;
        let hash = pow.hash_for(block.get_nonce());
        Ok(hash.as_slice() == block.get_hash() && pow.meets_target(&hash))
    }

    pub fn prepare_data(&self, nonce: i64) -> Vec<u8> {
        let mut data_bytes = Vec::with_capacity(self.prev_hash.len() + self.merkle_root.len() + 16);
        data_bytes.extend_from_slice(&self.prev_hash);
        data_bytes.extend_from_slice(&self.merkle_root);
        data_bytes.extend_from_slice(&int_to_be_bytes(nonce));
        data_bytes.extend_from_slice(&int_to_be_bytes(i64::from(self.difficulty)));
        data_bytes
    }

    pub fn hash_for(&self, nonce: i64) -> Vec<u8> {
        sha256_digest(&self.prepare_data(nonce))
    }

    pub fn meets_target(&self, hash: &[u8]) -> bool {
        BigInt::from_bytes_be(Sign::Plus, hash) < self.target
    }

    /// Searches nonces upwards from zero until a digest below the target is
    /// found or `should_stop` returns true. Running out of nonces is an error.
    pub fn run<F>(&self, should_stop: F) -> Result<MiningOutcome>
    where
        F: Fn() -> bool,
    {
        debug!(
            "Searching nonce for prev {} at difficulty {}",
            HEXLOWER.encode(&self.prev_hash),
            self.difficulty
        );
        let mut nonce = 0;
        while nonce < MAX_NONCE {
            if nonce % STOP_CHECK_INTERVAL == 0 && should_stop() {
                info!("Nonce search interrupted at nonce {nonce}");
                return Ok(MiningOutcome::Interrupted);
            }
            let hash = self.hash_for(nonce);
            if self.meets_target(&hash) {
                info!("Found nonce {nonce}: {}", HEXLOWER.encode(&hash));
                return Ok(MiningOutcome::Found { nonce, hash });
            }
            nonce += 1;
        }
        Err(BlockchainError::Mining(
            "Nonce space exhausted without meeting the target".to_string(),
        ))
    }
}

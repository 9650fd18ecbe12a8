use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::sync::atomic::{AtomicBool, Ordering};

use crate::error::SimError;
use crate::transaction::{Transaction, unix_now};

/// A single block in the blockchain holding a list of transactions.
/// When not genesis, the last transaction is the miner's reward.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Block {
    pub index: u64,
    pub timestamp: f64, // Unix seconds (UTC), sub-second precision
    pub transactions: Vec<Transaction>,
    pub previous_hash: String,
    pub nonce: u64,        // Proof-of-Work nonce
    pub block_size: usize, // bytes of selected txs, reward excluded
    pub difficulty: u32,   // target this block was sealed at
    pub hash: String,      // Cached hash of the block
}

impl Block {
    /// Create the genesis block (first block in the chain).
    pub fn genesis() -> Self {
        Self::with_timestamp(0, String::from("0"), Vec::new(), 0, 0, unix_now())
    }

    /// Create a new block (not mined yet). Call `mine()` to perform PoW.
    pub fn new(
        index: u64,
        previous_hash: String,
        transactions: Vec<Transaction>,
        block_size: usize,
        difficulty: u32,
    ) -> Self {
        Self::with_timestamp(
            index,
            previous_hash,
            transactions,
            block_size,
            difficulty,
            unix_now(),
        )
    }

    pub fn with_timestamp(
        index: u64,
        previous_hash: String,
        transactions: Vec<Transaction>,
        block_size: usize,
        difficulty: u32,
        timestamp: f64,
    ) -> Self {
        let mut block = Self {
            index,
            timestamp,
            transactions,
            previous_hash,
            nonce: 0,
            block_size,
            difficulty,
            hash: String::new(),
        };
        block.hash = block.compute_hash();
        block
    }

    /// Every hashed field except the nonce, serialized once so the nonce
    /// search does not re-encode transactions per attempt.
    pub fn hash_prefix(&self) -> String {
        let txs_json = serde_json::to_string(&self.transactions).expect("serialize txs");
        format!(
            "{}:{}:{}:{}:{}:{}:",
            self.index,
            self.timestamp,
            self.previous_hash,
            self.block_size,
            self.difficulty,
            txs_json
        )
    }

    /// SHA-256 of `prefix` followed by `nonce`, hex encoded.
    pub fn hash_with_nonce(prefix: &str, nonce: u64) -> String {
        let mut hasher = Sha256::new();
        hasher.update(prefix.as_bytes());
        hasher.update(nonce.to_string().as_bytes());
        hex::encode(hasher.finalize())
    }

    /// Compute the SHA-256 hash of this block using its fields
    /// (excluding the `hash` field itself).
    pub fn compute_hash(&self) -> String {
        Self::hash_with_nonce(&self.hash_prefix(), self.nonce)
    }

    /// Sequential Proof-of-Work: walk nonces from 0 until the hash has
    /// `difficulty` leading zeros, giving up after `max_nonce`.
    /// Returns the number of hashes computed.
    pub fn mine(&mut self, difficulty: u32, max_nonce: u64) -> Result<u64, SimError> {
        self.mine_until(difficulty, max_nonce, &AtomicBool::new(false))
    }

    /// `mine` that gives up as soon as `cancel` is raised.
    pub fn mine_until(
        &mut self,
        difficulty: u32,
        max_nonce: u64,
        cancel: &AtomicBool,
    ) -> Result<u64, SimError> {
        let prefix = self.hash_prefix();
        for nonce in 0..=max_nonce {
            if cancel.load(Ordering::Relaxed) {
                return Err(SimError::Cancelled);
            }
            let hash = Self::hash_with_nonce(&prefix, nonce);
            if meets_difficulty(&hash, difficulty) {
                self.nonce = nonce;
                self.hash = hash;
                return Ok(nonce + 1);
            }
        }
        Err(SimError::DifficultyUnreachable)
    }

    /// Validate that the block's cached `hash` matches its content and
    /// satisfies the PoW difficulty. (Does NOT validate chain linkage.)
    pub fn is_valid(&self, difficulty: u32) -> bool {
        self.hash == self.compute_hash() && meets_difficulty(&self.hash, difficulty)
    }

    /// Transactions other than the trailing reward.
    pub fn payload(&self) -> &[Transaction] {
        match self.transactions.last() {
            Some(last) if last.is_reward() => &self.transactions[..self.transactions.len() - 1],
            _ => &self.transactions,
        }
    }
}

/// True when `hash` starts with `difficulty` hex zeros.
pub fn meets_difficulty(hash: &str, difficulty: u32) -> bool {
    let n = difficulty as usize;
    hash.len() >= n && hash.bytes().take(n).all(|b| b == b'0')
}

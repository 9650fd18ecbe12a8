//! Proof-of-Work engine.
//!
//! The nonce search reads an immutable hash prefix, so it can be spread over
//! a worker pool. `find_first` keeps the result identical to a sequential
//! scan: the lowest satisfying nonce wins no matter how many threads run.

use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use log::debug;
use rayon::prelude::*;
use rayon::{ThreadPool, ThreadPoolBuildError, ThreadPoolBuilder};

use super::block::{Block, meets_difficulty};
use crate::error::SimError;

/// Outcome of a successful seal.
#[derive(Debug, Clone, Copy)]
pub struct SealReport {
    pub hashes: u64,
    pub elapsed: Duration,
}

pub struct Miner {
    pool: ThreadPool,
    threads: usize,
    max_nonce: u64,
}

impl Miner {
    /// `threads == 0` uses one worker per core.
    pub fn new(threads: usize, max_nonce: u64) -> Result<Self, ThreadPoolBuildError> {
        let pool = ThreadPoolBuilder::new()
            .num_threads(threads)
            .thread_name(|i| format!("pow-{i}"))
            .build()?;
        let threads = pool.current_num_threads();
        Ok(Self {
            pool,
            threads,
            max_nonce,
        })
    }

    /// Search nonces `0..=max_nonce` for a hash with `difficulty` leading
    /// zeros. On success the block carries the winning nonce and hash; on
    /// failure it is left untouched. Raising `cancel` stops all workers.
    pub fn seal(
        &self,
        block: &mut Block,
        difficulty: u32,
        cancel: &AtomicBool,
    ) -> Result<SealReport, SimError> {
        let started = Instant::now();

        if self.threads == 1 {
            let hashes = block.mine_until(difficulty, self.max_nonce, cancel)?;
            return Ok(SealReport {
                hashes,
                elapsed: started.elapsed(),
            });
        }

        let prefix = block.hash_prefix();
        let found = self.pool.install(|| {
            (0..=self.max_nonce).into_par_iter().find_first(|&nonce| {
                cancel.load(Ordering::Relaxed)
                    || meets_difficulty(&Block::hash_with_nonce(&prefix, nonce), difficulty)
            })
        });

        if cancel.load(Ordering::Relaxed) {
            return Err(SimError::Cancelled);
        }
        let nonce = found.ok_or(SimError::DifficultyUnreachable)?;

        block.nonce = nonce;
        block.hash = Block::hash_with_nonce(&prefix, nonce);
        debug!(
            "POW - block #{} sealed at nonce {} on {} threads",
            block.index, nonce, self.threads
        );

        Ok(SealReport {
            hashes: nonce + 1,
            elapsed: started.elapsed(),
        })
    }
}

//! Mining statistics and decentralization metrics.
//!
//! Metrics are pure functions of the per-miner reward distribution and are
//! recomputed from scratch after every block.

use std::collections::BTreeMap;

use serde::Serialize;

use super::NetworkParameters;

/// How many of the largest miners count toward concentration.
pub const TOP_MINERS: usize = 3;

/// Per-miner aggregate.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct MinerStats {
    pub blocks_mined: u64,
    pub total_rewards: f64,
    /// Hashes per second over the time this miner spent sealing.
    pub hashrate: f64,
    #[serde(skip)]
    hashes: u64,
    #[serde(skip)]
    seal_secs: f64,
}

impl MinerStats {
    pub fn record_block(&mut self, reward: f64, hashes: u64, seal_secs: f64) {
        self.blocks_mined += 1;
        self.total_rewards += reward;
        self.hashes += hashes;
        self.seal_secs += seal_secs;
        if self.seal_secs > 0.0 {
            self.hashrate = self.hashes as f64 / self.seal_secs;
        }
    }
}

/// Network-wide counters.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct MiningStats {
    pub total_blocks_mined: u64,
    pub total_transactions_processed: u64,
    pub average_block_time: f64,
    pub difficulty_adjustments: u64,
    /// Sealed blocks discarded because the tip moved first.
    pub orphaned_blocks: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct DecentralizationMetrics {
    pub gini_coefficient: f64,
    pub herfindahl_index: f64,
    /// Percentage of rewards held by the top miners.
    pub top_miners_concentration: f64,
    /// Each miner's share of blocks mined.
    pub node_distribution: BTreeMap<String, f64>,
}

impl DecentralizationMetrics {
    pub fn from_stats(stats: &BTreeMap<String, MinerStats>) -> Self {
        let rewards: Vec<f64> = stats.values().map(|s| s.total_rewards).collect();
        let total_blocks: u64 = stats.values().map(|s| s.blocks_mined).sum();

        let node_distribution = if total_blocks == 0 {
            BTreeMap::new()
        } else {
            stats
                .iter()
                .map(|(miner, s)| (miner.clone(), s.blocks_mined as f64 / total_blocks as f64))
                .collect()
        };

        Self {
            gini_coefficient: gini(&rewards),
            herfindahl_index: herfindahl(&rewards),
            top_miners_concentration: top_concentration(&rewards, TOP_MINERS),
            node_distribution,
        }
    }
}

/// Full snapshot served to readers.
#[derive(Debug, Clone, Serialize)]
pub struct NetworkAnalytics {
    pub network_params: NetworkParameters,
    pub mining_stats: MiningStats,
    pub decentralization_metrics: DecentralizationMetrics,
    pub mempool_size: usize,
    pub total_blocks: usize,
    pub total_transactions: u64,
    pub average_block_size: f64,
    pub miner_distribution: BTreeMap<String, MinerStats>,
}

/// Discrete Gini over ascending rewards:
/// `sum((2i - n - 1) * r_i) / (n * sum(r))`, 1-indexed.
/// Zero for fewer than two miners or a zero denominator.
pub fn gini(rewards: &[f64]) -> f64 {
    let n = rewards.len();
    if n < 2 {
        return 0.0;
    }
    let mut sorted = rewards.to_vec();
    sorted.sort_by(|a, b| a.total_cmp(b));

    let sum: f64 = sorted.iter().sum();
    let denominator = n as f64 * sum;
    if denominator <= 0.0 {
        return 0.0;
    }
    let numerator: f64 = sorted
        .iter()
        .enumerate()
        .map(|(i, r)| (2.0 * (i + 1) as f64 - n as f64 - 1.0) * r)
        .sum();
    numerator / denominator
}

/// Sum of squared reward shares; zero when nothing has been paid.
pub fn herfindahl(rewards: &[f64]) -> f64 {
    let total: f64 = rewards.iter().sum();
    if total <= 0.0 {
        return 0.0;
    }
    rewards.iter().map(|r| (r / total).powi(2)).sum()
}

/// Percentage of all rewards earned by the `top` largest miners.
pub fn top_concentration(rewards: &[f64], top: usize) -> f64 {
    let total: f64 = rewards.iter().sum();
    if total <= 0.0 {
        return 0.0;
    }
    let mut sorted = rewards.to_vec();
    sorted.sort_by(|a, b| b.total_cmp(a));
    let top_sum: f64 = sorted.iter().take(top).sum();
    top_sum / total * 100.0
}

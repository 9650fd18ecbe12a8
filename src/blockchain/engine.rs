use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use log::{debug, info, warn};
use serde::Serialize;
use serde_json::{Map, Value};

use super::analytics::{DecentralizationMetrics, MinerStats, MiningStats, NetworkAnalytics};
use super::difficulty::{Retarget, retarget};
use super::mempool::Mempool;
use super::model::HistoryEntry;
use super::pow::{Miner, SealReport};
use super::{BASE_REWARD, Block, Blockchain, NetworkParameters};
use crate::error::{ParamError, SimError};
use crate::transaction::{Ledger, REWARD_SENDER, Transaction};

/// A draft block plus what committing it will consume.
/// Built under the state lock, sealed outside it.
#[derive(Debug, Clone)]
pub struct BlockTemplate {
    pub miner: String,
    pub block: Block,
    pub selected: Vec<u64>,
    pub reward: f64,
    /// Raised once any block lands on top of `block.previous_hash`.
    pub cancel: Arc<AtomicBool>,
}

impl BlockTemplate {
    pub fn difficulty(&self) -> u32 {
        self.block.difficulty
    }
}

/// A committed block and the caller-facing summary.
#[derive(Debug, Clone, Serialize)]
pub struct MinedBlock {
    pub block: Block,
    pub message: String,
    pub retarget: Option<Retarget>,
}

/// The whole simulated network: chain, mempool, balances and statistics.
/// One owner, one writer; callers wrap it in a lock.
#[derive(Debug)]
pub struct Simulator {
    params: NetworkParameters,
    chain: Blockchain,
    ledger: Ledger,
    mempool: Mempool,
    miners: BTreeMap<String, MinerStats>,
    mining_stats: MiningStats,
    metrics: DecentralizationMetrics,
    retarget_interval: usize,
    tip_cancel: Arc<AtomicBool>,
}

impl Simulator {
    /// `retarget_interval == 0` disables automatic retargeting.
    pub fn new(params: NetworkParameters, retarget_interval: usize) -> Self {
        Self {
            params,
            chain: Blockchain::new(),
            ledger: Ledger::new(),
            mempool: Mempool::new(),
            miners: BTreeMap::new(),
            mining_stats: MiningStats::default(),
            metrics: DecentralizationMetrics::default(),
            retarget_interval,
            tip_cancel: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn with_balances<I>(mut self, balances: I) -> Self
    where
        I: IntoIterator<Item = (String, f64)>,
    {
        self.ledger = Ledger::from_balances(balances);
        self
    }

    pub fn params(&self) -> &NetworkParameters {
        &self.params
    }

    pub fn chain(&self) -> &Blockchain {
        &self.chain
    }

    pub fn ledger(&self) -> &Ledger {
        &self.ledger
    }

    pub fn mempool(&self) -> &Mempool {
        &self.mempool
    }

    pub fn miner_stats(&self) -> &BTreeMap<String, MinerStats> {
        &self.miners
    }

    pub fn mining_stats(&self) -> &MiningStats {
        &self.mining_stats
    }

    /// Validate and queue a transfer. Balances move immediately: the
    /// sender is debited and the recipient credited while the transaction
    /// is still pending.
    pub fn submit_transaction(
        &mut self,
        sender: &str,
        recipient: &str,
        amount: f64,
        fee: Option<f64>,
    ) -> Result<String, SimError> {
        if sender.is_empty() {
            return Err(SimError::MissingField("sender"));
        }
        if recipient.is_empty() {
            return Err(SimError::MissingField("recipient"));
        }
        let fee = fee.unwrap_or(self.params.transaction_fee);
        if !amount.is_finite() || amount < 0.0 || !fee.is_finite() || fee < 0.0 {
            return Err(SimError::InvalidAmount);
        }

        if sender != REWARD_SENDER && self.ledger.balance(sender) < amount + fee {
            warn!("TX - rejected {sender} -> {recipient}: insufficient balance");
            return Err(SimError::InsufficientBalance);
        }

        let tx = Transaction::new(sender, recipient, amount, fee);
        if tx.size > self.params.block_size_limit {
            warn!(
                "TX - rejected txid={}: {} bytes exceeds block limit",
                tx.txid, tx.size
            );
            return Err(SimError::TransactionTooLarge);
        }

        self.ledger.apply(&tx)?;
        let txid = tx.txid.clone();
        let seq = self.mempool.push(tx);
        info!(
            "TX - txid={} accepted (seq={}, mempool={})",
            txid,
            seq,
            self.mempool.len()
        );
        Ok(txid)
    }

    /// Select transactions and build an unsealed block on top of the
    /// current tip. Pure read: nothing changes until `commit_block`.
    pub fn prepare_block(&self, miner: &str) -> Result<BlockTemplate, SimError> {
        if miner.is_empty() {
            return Err(SimError::MissingField("miner"));
        }
        if self.mempool.is_empty() {
            return Err(SimError::EmptyMempool);
        }

        let selection = self.mempool.select(&self.params);
        if selection.is_empty() {
            return Err(SimError::NoValidTransactions);
        }

        let reward = BASE_REWARD + selection.total_fees();
        let selected = selection.entries.iter().map(|e| e.seq).collect();
        let mut transactions: Vec<Transaction> =
            selection.entries.into_iter().map(|e| e.tx).collect();
        transactions.push(Transaction::reward(miner, reward));

        let tip = self.chain.last_block();
        let block = Block::new(
            tip.index + 1,
            tip.hash.clone(),
            transactions,
            selection.total_size,
            self.params.mining_difficulty,
        );

        Ok(BlockTemplate {
            miner: miner.to_string(),
            block,
            selected,
            reward,
            cancel: Arc::clone(&self.tip_cancel),
        })
    }

    /// Accept a sealed template. Exactly one commit succeeds per height:
    /// if the tip moved or any selected transaction is gone, the block is
    /// stale and discarded.
    pub fn commit_block(
        &mut self,
        template: BlockTemplate,
        report: SealReport,
    ) -> Result<MinedBlock, SimError> {
        let tip_hash = &self.chain.last_block().hash;
        if template.block.previous_hash != *tip_hash
            || !template.selected.iter().all(|&seq| self.mempool.contains(seq))
        {
            self.mining_stats.orphaned_blocks += 1;
            warn!(
                "MINER - discarding stale block #{} from {} (tip moved)",
                template.block.index, template.miner
            );
            return Err(SimError::StaleTip);
        }
        if !template.block.is_valid(template.difficulty()) {
            return Err(SimError::InvalidProof);
        }

        let BlockTemplate {
            miner,
            block,
            selected,
            reward,
            ..
        } = template;
        let tx_count = block.payload().len();

        for seq in &selected {
            self.mempool.remove(*seq);
        }
        self.ledger.credit(&miner, reward);

        let block = self.chain.append(block).clone();

        // Every search still running on the old tip is now wasted work.
        self.tip_cancel.store(true, Ordering::Relaxed);
        self.tip_cancel = Arc::new(AtomicBool::new(false));

        self.mining_stats.total_blocks_mined += 1;
        self.mining_stats.total_transactions_processed += tx_count as u64;
        self.mining_stats.average_block_time = self.chain.average_block_time();
        self.miners
            .entry(miner.clone())
            .or_default()
            .record_block(reward, report.hashes, report.elapsed.as_secs_f64());
        self.metrics = DecentralizationMetrics::from_stats(&self.miners);

        info!(
            "MINER - sealed block #{} (hash={}, nonce={}, txs={}, reward={})",
            block.index, block.hash, block.nonce, tx_count, reward
        );

        let retarget = if self.retarget_interval > 0 && self.chain.len() % self.retarget_interval == 0
        {
            self.adjust_difficulty()
        } else {
            None
        };

        Ok(MinedBlock {
            block,
            message: format!("Block mined successfully with {tx_count} transactions"),
            retarget,
        })
    }

    /// Prepare, seal and commit in one call.
    pub fn mine(&mut self, miner_account: &str, miner: &Miner) -> Result<MinedBlock, SimError> {
        let mut template = self.prepare_block(miner_account)?;
        let difficulty = template.difficulty();
        let report = miner.seal(&mut template.block, difficulty, &template.cancel)?;
        self.commit_block(template, report)
    }

    /// Re-evaluate difficulty over the recent window. Counts an adjustment
    /// whenever the window is full, even if the difficulty stays put.
    pub fn adjust_difficulty(&mut self) -> Option<Retarget> {
        let r = retarget(
            &self.chain.chain,
            self.params.mining_difficulty,
            self.params.block_time_target,
        )?;
        self.params.mining_difficulty = r.next;
        self.mining_stats.difficulty_adjustments += 1;
        if r.changed() {
            info!(
                "DIFFICULTY - {} -> {} (window {:.1}s vs target {:.1}s)",
                r.previous, r.next, r.actual_secs, r.target_secs
            );
        } else {
            debug!("DIFFICULTY - unchanged at {}", r.next);
        }
        Some(r)
    }

    pub fn update_params(
        &mut self,
        update: &Map<String, Value>,
    ) -> (Vec<&'static str>, Vec<ParamError>) {
        let (applied, rejected) = self.params.apply_update(update);
        if !applied.is_empty() {
            info!("PARAMS - updated {:?}", applied);
        }
        for e in &rejected {
            warn!("PARAMS - rejected {e}");
        }
        (applied, rejected)
    }

    /// Replace all balances from an external account store.
    pub fn resync_balances(&mut self, balances: HashMap<String, f64>) {
        self.ledger.overwrite(balances);
        debug!("LEDGER - resynchronised {} accounts", self.ledger.len());
    }

    pub fn transaction_history(&self) -> Vec<HistoryEntry> {
        self.chain.transaction_history()
    }

    pub fn analytics(&self) -> NetworkAnalytics {
        NetworkAnalytics {
            network_params: self.params.clone(),
            mining_stats: self.mining_stats.clone(),
            decentralization_metrics: self.metrics.clone(),
            mempool_size: self.mempool.len(),
            total_blocks: self.chain.len(),
            total_transactions: self.mining_stats.total_transactions_processed,
            average_block_size: self.chain.average_block_size(),
            miner_distribution: self.miners.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::blockchain::DIFF_ADJUST_WINDOW;

    const EPS: f64 = 1e-9;

    fn params() -> NetworkParameters {
        NetworkParameters {
            mining_difficulty: 1,
            ..NetworkParameters::default()
        }
    }

    fn sim() -> Simulator {
        Simulator::new(params(), 0).with_balances([
            ("alice".to_string(), 50.0),
            ("bob".to_string(), 30.0),
            ("carol".to_string(), 20.0),
        ])
    }

    fn miner() -> Miner {
        Miner::new(2, 10_000_000).unwrap()
    }

    fn seal(template: &mut BlockTemplate) -> SealReport {
        let difficulty = template.difficulty();
        miner()
            .seal(&mut template.block, difficulty, &template.cancel)
            .unwrap()
    }

    #[test]
    fn end_to_end_transfer_and_mine() {
        let mut s = sim();
        let txid = s.submit_transaction("alice", "bob", 10.0, Some(0.001)).unwrap();
        assert_eq!(s.mempool().len(), 1);

        let mined = s.mine("carol", &miner()).unwrap();
        assert_eq!(mined.block.transactions.len(), 2);
        assert_eq!(mined.block.transactions[0].txid, txid);
        assert!(mined.block.transactions[1].is_reward());
        assert_eq!(mined.message, "Block mined successfully with 1 transactions");
        assert!(s.mempool().is_empty());

        let carol = &s.miner_stats()["carol"];
        assert_eq!(carol.blocks_mined, 1);
        assert!((carol.total_rewards - 10.001).abs() < EPS);
        assert!((s.ledger().balance("carol") - 30.001).abs() < EPS);
        assert!(s.chain().is_valid_chain());
    }

    #[test]
    fn balances_move_at_submission() {
        let mut s = sim();
        s.submit_transaction("alice", "bob", 10.0, Some(0.5)).unwrap();
        assert_eq!(s.ledger().balance("alice"), 39.5);
        assert_eq!(s.ledger().balance("bob"), 40.0);
    }

    #[test]
    fn default_fee_comes_from_params() {
        let mut s = sim();
        s.submit_transaction("alice", "bob", 1.0, None).unwrap();
        let (_, tx) = s.mempool().iter().next().unwrap();
        assert_eq!(tx.fee, s.params().transaction_fee);
    }

    #[test]
    fn insufficient_balance_leaves_state_alone() {
        let mut s = sim();
        let err = s.submit_transaction("carol", "bob", 20.0, Some(0.001)).unwrap_err();
        assert_eq!(err, SimError::InsufficientBalance);
        assert_eq!(err.to_string(), "insufficient balance");
        assert!(s.mempool().is_empty());
        assert_eq!(s.ledger().balance("carol"), 20.0);
        assert_eq!(s.ledger().balance("bob"), 30.0);
    }

    #[test]
    fn oversized_transaction_is_rejected() {
        let mut s = Simulator::new(
            NetworkParameters {
                block_size_limit: 10,
                ..params()
            },
            0,
        )
        .with_balances([("alice".to_string(), 50.0)]);
        let err = s.submit_transaction("alice", "bob", 1.0, None).unwrap_err();
        assert_eq!(err, SimError::TransactionTooLarge);
        assert_eq!(s.ledger().balance("alice"), 50.0);
        assert!(s.mempool().is_empty());
    }

    #[test]
    fn reward_sender_is_never_debited() {
        let mut s = sim();
        s.submit_transaction(REWARD_SENDER, "dave", 5.0, Some(0.0)).unwrap();
        assert_eq!(s.ledger().balance("dave"), 5.0);
        assert_eq!(s.ledger().balance(REWARD_SENDER), 0.0);
    }

    #[test]
    fn invalid_amounts_are_rejected() {
        let mut s = sim();
        assert_eq!(
            s.submit_transaction("alice", "bob", -1.0, None),
            Err(SimError::InvalidAmount)
        );
        assert_eq!(
            s.submit_transaction("alice", "bob", 1.0, Some(f64::NAN)),
            Err(SimError::InvalidAmount)
        );
        assert_eq!(
            s.submit_transaction("", "bob", 1.0, None),
            Err(SimError::MissingField("sender"))
        );
    }

    #[test]
    fn mining_empty_mempool_fails() {
        let mut s = sim();
        let err = s.mine("carol", &miner()).unwrap_err();
        assert_eq!(err.to_string(), "no transactions to mine");
        assert_eq!(s.chain().len(), 1);
    }

    #[test]
    fn mining_with_nothing_selectable_fails() {
        let mut s = sim();
        s.submit_transaction("alice", "bob", 1.0, None).unwrap();
        s.update_params(serde_json::json!({ "block_size_limit": 1 }).as_object().unwrap());
        let err = s.mine("carol", &miner()).unwrap_err();
        assert_eq!(err, SimError::NoValidTransactions);
        assert_eq!(s.mempool().len(), 1);
    }

    #[test]
    fn block_respects_count_cap_and_keeps_leftovers() {
        let mut s = sim();
        s.update_params(
            serde_json::json!({ "max_transactions_per_block": 2 })
                .as_object()
                .unwrap(),
        );
        s.submit_transaction("alice", "bob", 1.0, Some(0.1)).unwrap();
        s.submit_transaction("alice", "bob", 1.0, Some(0.3)).unwrap();
        s.submit_transaction("alice", "bob", 1.0, Some(0.2)).unwrap();

        let mined = s.mine("carol", &miner()).unwrap();
        let fees: Vec<f64> = mined.block.payload().iter().map(|t| t.fee).collect();
        assert_eq!(fees, vec![0.3, 0.2]);
        assert_eq!(s.mempool().len(), 1);
        let reward = mined.block.transactions.last().unwrap().amount;
        assert!((reward - (BASE_REWARD + 0.5)).abs() < EPS);
        assert_eq!(
            mined.block.block_size,
            mined.block.payload().iter().map(|t| t.size).sum::<usize>()
        );
    }

    #[test]
    fn duplicate_lookalikes_are_removed_individually() {
        let mut s = sim();
        let a = Transaction::with_timestamp("alice", "bob", 1.0, 0.1, 5.0);
        let b = a.clone();
        s.mempool.push(a);
        s.mempool.push(b);
        s.update_params(
            serde_json::json!({ "max_transactions_per_block": 1 })
                .as_object()
                .unwrap(),
        );
        s.mine("carol", &miner()).unwrap();
        assert_eq!(s.mempool().len(), 1);
    }

    #[test]
    fn second_commit_at_same_height_is_stale() {
        let mut s = sim();
        s.submit_transaction("alice", "bob", 1.0, None).unwrap();

        let mut first = s.prepare_block("carol").unwrap();
        let mut second = s.prepare_block("bob").unwrap();
        let r1 = seal(&mut first);
        let r2 = seal(&mut second);

        s.commit_block(first, r1).unwrap();
        assert_eq!(s.commit_block(second, r2).unwrap_err(), SimError::StaleTip);
        assert_eq!(s.chain().len(), 2);
        assert_eq!(s.mining_stats().orphaned_blocks, 1);
        assert!(!s.miner_stats().contains_key("bob"));
    }

    #[test]
    fn commit_cancels_searches_on_the_old_tip() {
        let mut s = sim();
        s.submit_transaction("alice", "bob", 1.0, None).unwrap();

        let mut winner = s.prepare_block("carol").unwrap();
        let mut loser = s.prepare_block("bob").unwrap();
        let pow = Miner::new(2, u64::MAX).unwrap();

        let outcome = std::thread::scope(|scope| {
            // unreachable target: only the cancel flag can end this search
            let search = scope.spawn(|| pow.seal(&mut loser.block, 64, &loser.cancel));

            let report = seal(&mut winner);
            s.commit_block(winner, report).unwrap();
            search.join().unwrap()
        });

        assert_eq!(outcome.unwrap_err(), SimError::Cancelled);
        assert_eq!(s.chain().len(), 2);
    }

    #[test]
    fn templates_on_the_new_tip_are_not_cancelled() {
        let mut s = sim();
        s.submit_transaction("alice", "bob", 1.0, None).unwrap();
        let stale = s.prepare_block("carol").unwrap();
        s.mine("carol", &miner()).unwrap();
        assert!(stale.cancel.load(Ordering::Relaxed));

        s.submit_transaction("alice", "bob", 1.0, None).unwrap();
        let mut fresh = s.prepare_block("bob").unwrap();
        assert!(!fresh.cancel.load(Ordering::Relaxed));
        let report = seal(&mut fresh);
        s.commit_block(fresh, report).unwrap();
    }

    #[test]
    fn unsealed_template_is_refused() {
        let mut s = Simulator::new(
            NetworkParameters {
                mining_difficulty: 8,
                ..params()
            },
            0,
        )
        .with_balances([("alice".to_string(), 50.0)]);
        s.submit_transaction("alice", "bob", 1.0, None).unwrap();
        let template = s.prepare_block("carol").unwrap();
        let report = SealReport {
            hashes: 0,
            elapsed: std::time::Duration::ZERO,
        };
        // a nonce-0 hash with eight leading zeros is vanishingly unlikely
        assert_eq!(
            s.commit_block(template, report).unwrap_err(),
            SimError::InvalidProof
        );
        assert_eq!(s.mempool().len(), 1);
    }

    #[test]
    fn chain_links_and_meets_difficulty() {
        let mut s = sim();
        for i in 0..4 {
            s.submit_transaction("alice", "bob", 1.0, None).unwrap();
            if i == 2 {
                s.update_params(serde_json::json!({ "mining_difficulty": 2 }).as_object().unwrap());
            }
            s.mine("carol", &miner()).unwrap();
        }
        let chain = &s.chain().chain;
        for pair in chain.windows(2) {
            assert_eq!(pair[1].previous_hash, pair[0].hash);
            let zeros = "0".repeat(pair[1].difficulty as usize);
            assert!(pair[1].hash.starts_with(&zeros));
        }
        assert_eq!(chain[4].difficulty, 2);
        assert!(s.chain().is_valid_chain());
    }

    #[test]
    fn manual_retarget_counts_even_without_change() {
        let mut s = sim();
        assert!(s.adjust_difficulty().is_none());
        assert_eq!(s.mining_stats().difficulty_adjustments, 0);

        // Build a full window of far-apart blocks directly on the chain.
        let mut ts = s.chain().last_block().timestamp;
        while s.chain().len() < DIFF_ADJUST_WINDOW {
            ts += 1_000.0;
            let tip = s.chain().last_block();
            let mut b = Block::with_timestamp(tip.index + 1, tip.hash.clone(), vec![], 0, 1, ts);
            b.mine(1, u64::MAX).unwrap();
            s.chain.append(b);
        }
        let r = s.adjust_difficulty().unwrap();
        assert_eq!(r.next, 1); // already at the floor
        assert_eq!(s.mining_stats().difficulty_adjustments, 1);
    }

    #[test]
    fn automatic_retarget_every_interval() {
        let mut s = Simulator::new(params(), 10).with_balances([("alice".to_string(), 50.0)]);
        for _ in 0..9 {
            s.submit_transaction("alice", "bob", 0.1, None).unwrap();
            s.mine("carol", &miner()).unwrap();
        }
        // chain is genesis + 9 mined blocks, all seconds apart at most
        assert_eq!(s.chain().len(), 10);
        assert_eq!(s.mining_stats().difficulty_adjustments, 1);
        assert_eq!(s.params().mining_difficulty, 2);
    }

    #[test]
    fn analytics_snapshot_aggregates() {
        let mut s = sim();
        s.submit_transaction("alice", "bob", 1.0, None).unwrap();
        s.mine("carol", &miner()).unwrap();
        s.submit_transaction("bob", "alice", 1.0, None).unwrap();
        s.submit_transaction("bob", "alice", 2.0, None).unwrap();
        s.mine("alice", &miner()).unwrap();

        let a = s.analytics();
        assert_eq!(a.total_blocks, 3);
        assert_eq!(a.total_transactions, 3);
        assert_eq!(a.mempool_size, 0);
        assert_eq!(a.mining_stats.total_blocks_mined, 2);
        assert_eq!(a.miner_distribution.len(), 2);
        assert!(a.decentralization_metrics.gini_coefficient > 0.0);
        assert!((a.decentralization_metrics.top_miners_concentration - 100.0).abs() < EPS);
        assert_eq!(s.transaction_history().len(), 5);
        assert!(a.average_block_size > 0.0);
    }

    #[test]
    fn resync_overwrites_ledger() {
        let mut s = sim();
        s.resync_balances(HashMap::from([("zed".to_string(), 1.0)]));
        assert_eq!(s.ledger().balance("alice"), 0.0);
        assert_eq!(
            s.submit_transaction("alice", "bob", 1.0, None),
            Err(SimError::InsufficientBalance)
        );
    }
}

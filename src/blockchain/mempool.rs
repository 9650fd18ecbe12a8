use std::collections::BTreeMap;

use log::debug;
use serde::Serialize;

use super::params::NetworkParameters;
use crate::transaction::Transaction;

/// A pending transaction tagged with its arrival sequence number.
/// The sequence is the removal key, so look-alike transactions never alias.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MempoolEntry {
    pub seq: u64,
    pub tx: Transaction,
}

/// Transactions chosen for the next block, in priority order.
#[derive(Debug, Clone, Default)]
pub struct Selection {
    pub entries: Vec<MempoolEntry>,
    pub total_size: usize,
}

impl Selection {
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn total_fees(&self) -> f64 {
        self.entries.iter().map(|e| e.tx.fee).sum()
    }
}

/// Pending transactions in arrival order.
#[derive(Debug, Default)]
pub struct Mempool {
    entries: BTreeMap<u64, Transaction>,
    next_seq: u64,
}

impl Mempool {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue `tx`, returning its sequence number.
    pub fn push(&mut self, tx: Transaction) -> u64 {
        let seq = self.next_seq;
        self.next_seq += 1;
        self.entries.insert(seq, tx);
        seq
    }

    pub fn remove(&mut self, seq: u64) -> Option<Transaction> {
        self.entries.remove(&seq)
    }

    pub fn contains(&self, seq: u64) -> bool {
        self.entries.contains_key(&seq)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Arrival-ordered view.
    pub fn iter(&self) -> impl Iterator<Item = (u64, &Transaction)> {
        self.entries.iter().map(|(seq, tx)| (*seq, tx))
    }

    /// Pick transactions for the next block: fee rate descending (arrival
    /// order on ties), greedily packed under the byte and count caps.
    pub fn select(&self, params: &NetworkParameters) -> Selection {
        let mut cands: Vec<(u64, &Transaction)> = self.iter().collect();

        // sort_by is stable, so equal rates keep arrival order
        cands.sort_by(|(_, a), (_, b)| {
            b.fee_rate()
                .partial_cmp(&a.fee_rate())
                .unwrap_or(std::cmp::Ordering::Equal)
        });

        let mut selection = Selection::default();
        for (seq, tx) in cands {
            if selection.entries.len() >= params.max_transactions_per_block {
                break;
            }
            if selection.total_size + tx.size > params.block_size_limit {
                continue;
            }
            selection.total_size += tx.size;
            selection.entries.push(MempoolEntry {
                seq,
                tx: tx.clone(),
            });
        }

        debug!(
            "MEMPOOL - selected {} of {} txs ({} bytes)",
            selection.entries.len(),
            self.len(),
            selection.total_size
        );
        selection
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Transaction with a forced size so fee rates are exact.
    fn tx(fee: f64, size: usize, ts: f64) -> Transaction {
        let mut t = Transaction::with_timestamp("alice", "bob", 1.0, fee, ts);
        t.size = size;
        t
    }

    fn params(limit: usize, max_txs: usize) -> NetworkParameters {
        NetworkParameters {
            block_size_limit: limit,
            max_transactions_per_block: max_txs,
            ..NetworkParameters::default()
        }
    }

    fn fees(sel: &Selection) -> Vec<f64> {
        sel.entries.iter().map(|e| e.tx.fee).collect()
    }

    #[test]
    fn highest_fee_rate_first() {
        let mut pool = Mempool::new();
        pool.push(tx(1.0, 100, 1.0));
        pool.push(tx(0.5, 100, 2.0));
        pool.push(tx(2.0, 100, 3.0));

        let sel = pool.select(&params(1_000, 10));
        assert_eq!(fees(&sel), vec![2.0, 1.0, 0.5]);
        assert_eq!(sel.total_size, 300);
        assert_eq!(sel.total_fees(), 3.5);
    }

    #[test]
    fn ties_keep_arrival_order() {
        let mut pool = Mempool::new();
        let first = pool.push(tx(1.0, 100, 1.0));
        let second = pool.push(tx(2.0, 200, 2.0));
        let sel = pool.select(&params(1_000, 10));
        let seqs: Vec<u64> = sel.entries.iter().map(|e| e.seq).collect();
        assert_eq!(seqs, vec![first, second]);
    }

    #[test]
    fn size_cap_skips_but_keeps_scanning() {
        let mut pool = Mempool::new();
        pool.push(tx(9.0, 300, 1.0)); // rate 0.03
        pool.push(tx(5.0, 100, 2.0)); // rate 0.05
        pool.push(tx(1.0, 100, 3.0)); // rate 0.01

        // 100 + 300 = 400 > 350, so the big one is skipped and the last still fits
        let sel = pool.select(&params(350, 10));
        assert_eq!(fees(&sel), vec![5.0, 1.0]);
        assert_eq!(sel.total_size, 200);
    }

    #[test]
    fn count_cap_limits_selection() {
        let mut pool = Mempool::new();
        for i in 0..5 {
            pool.push(tx(i as f64, 100, i as f64));
        }
        let sel = pool.select(&params(1_000_000, 2));
        assert_eq!(fees(&sel), vec![4.0, 3.0]);
    }

    #[test]
    fn selection_does_not_mutate() {
        let mut pool = Mempool::new();
        pool.push(tx(1.0, 100, 1.0));
        let _ = pool.select(&params(1_000, 10));
        assert_eq!(pool.len(), 1);
    }

    #[test]
    fn removal_is_by_sequence() {
        let mut pool = Mempool::new();
        let a = pool.push(tx(1.0, 100, 1.0));
        let b = pool.push(tx(1.0, 100, 1.0)); // identical content, same txid
        assert!(pool.remove(a).is_some());
        assert!(!pool.contains(a));
        assert!(pool.contains(b));
        assert_eq!(pool.len(), 1);
    }
}

use serde::Serialize;

use super::Block;

/// One confirmed transaction together with the block that holds it.
#[derive(Debug, Clone, Serialize)]
pub struct HistoryEntry {
    pub txid: String,
    pub sender: String,
    pub recipient: String,
    pub amount: f64,
    pub fee: f64,
    pub timestamp: f64,
    pub block: u64,
}

/// Simple in-memory, append-only blockchain.
#[derive(Debug)]
pub struct Blockchain {
    pub chain: Vec<Block>,
}

impl Default for Blockchain {
    fn default() -> Self {
        Self::new()
    }
}

impl Blockchain {
    /// Initialize a new blockchain with a genesis block.
    pub fn new() -> Self {
        Self::with_genesis(Block::genesis())
    }

    pub fn with_genesis(genesis: Block) -> Self {
        Self {
            chain: vec![genesis],
        }
    }

    /// Return the last block in the chain.
    pub fn last_block(&self) -> &Block {
        self.chain
            .last()
            .expect("Blockchain should always have at least the genesis block")
    }

    /// Append a sealed block. Linkage is guaranteed by the single writer,
    /// so a mismatch here is a bug and panics.
    pub fn append(&mut self, block: Block) -> &Block {
        let tip = self.last_block();
        assert_eq!(
            block.previous_hash, tip.hash,
            "block #{} does not link to tip #{}",
            block.index, tip.index
        );
        assert_eq!(block.index, tip.index + 1, "block index gap");

        self.chain.push(block);
        self.last_block()
    }

    /// Validate the entire chain: linkage, hashes and PoW.
    pub fn is_valid_chain(&self) -> bool {
        let Some(genesis) = self.chain.first() else {
            return false;
        };

        // Validate genesis block immutability
        if genesis.index != 0
            || genesis.previous_hash != "0"
            || genesis.hash != genesis.compute_hash()
        {
            return false;
        }

        self.chain.windows(2).all(|pair| {
            let (prev, current) = (&pair[0], &pair[1]);
            current.previous_hash == prev.hash
                && current.index == prev.index + 1
                && current.is_valid(current.difficulty)
        })
    }

    pub fn len(&self) -> usize {
        self.chain.len()
    }

    /// Mean of `block_size` over every block, genesis included.
    pub fn average_block_size(&self) -> f64 {
        let total: usize = self.chain.iter().map(|b| b.block_size).sum();
        total as f64 / self.chain.len() as f64
    }

    /// Mean interval between consecutive blocks, 0 for a lone genesis.
    pub fn average_block_time(&self) -> f64 {
        if self.chain.len() < 2 {
            return 0.0;
        }
        let span = self.last_block().timestamp - self.chain[0].timestamp;
        span / (self.chain.len() - 1) as f64
    }

    /// Every confirmed transaction, oldest first, annotated with its block index.
    pub fn transaction_history(&self) -> Vec<HistoryEntry> {
        self.chain
            .iter()
            .flat_map(|block| {
                block.transactions.iter().map(move |tx| HistoryEntry {
                    txid: tx.txid.clone(),
                    sender: tx.sender.clone(),
                    recipient: tx.recipient.clone(),
                    amount: tx.amount,
                    fee: tx.fee,
                    timestamp: tx.timestamp,
                    block: block.index,
                })
            })
            .collect()
    }
}

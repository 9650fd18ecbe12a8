use chrono::Utc;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Reserved sender for reward issuance; never debited.
pub const REWARD_SENDER: &str = "MINER";

/// Current Unix time in seconds with microsecond granularity.
pub fn unix_now() -> f64 {
    Utc::now().timestamp_micros() as f64 / 1_000_000.0
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transaction {
    pub sender: String,
    pub recipient: String,
    pub amount: f64,
    pub fee: f64,
    pub timestamp: f64,
    /// A stable identifier computed from content.
    pub txid: String,
    /// Byte length of the canonical JSON serialization (txid included).
    pub size: usize,
}

impl Transaction {
    /// Build a transaction stamped with the current time.
    pub fn new(sender: &str, recipient: &str, amount: f64, fee: f64) -> Self {
        Self::with_timestamp(sender, recipient, amount, fee, unix_now())
    }

    /// Build a transaction and derive its txid and size once.
    pub fn with_timestamp(
        sender: &str,
        recipient: &str,
        amount: f64,
        fee: f64,
        timestamp: f64,
    ) -> Self {
        let txid = Self::compute_txid(sender, recipient, amount, fee, timestamp);
        // serde_json sorts object keys, so the preimage is canonical.
        let canonical = serde_json::json!({
            "sender": sender,
            "recipient": recipient,
            "amount": amount,
            "fee": fee,
            "timestamp": timestamp,
            "txid": txid,
        });
        let size = serde_json::to_vec(&canonical)
            .expect("json serialize")
            .len();

        Self {
            sender: sender.to_string(),
            recipient: recipient.to_string(),
            amount,
            fee,
            timestamp,
            txid,
            size,
        }
    }

    /// Reward issuance to `miner`: no real sender, zero fee.
    pub fn reward(miner: &str, amount: f64) -> Self {
        Self::new(REWARD_SENDER, miner, amount, 0.0)
    }

    pub fn is_reward(&self) -> bool {
        self.sender == REWARD_SENDER
    }

    /// Fee per serialized byte, the mempool priority key.
    pub fn fee_rate(&self) -> f64 {
        if self.size > 0 {
            self.fee / self.size as f64
        } else {
            0.0
        }
    }

    fn compute_txid(sender: &str, recipient: &str, amount: f64, fee: f64, timestamp: f64) -> String {
        let payload = serde_json::json!({
            "sender": sender,
            "recipient": recipient,
            "amount": amount,
            "fee": fee,
            "timestamp": timestamp,
        });
        let mut hasher = Sha256::new();
        hasher.update(serde_json::to_vec(&payload).expect("json serialize"));
        hex::encode(hasher.finalize())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn txid_is_deterministic_over_content() {
        let a = Transaction::with_timestamp("alice", "bob", 10.0, 0.001, 1_700_000_000.25);
        let b = Transaction::with_timestamp("alice", "bob", 10.0, 0.001, 1_700_000_000.25);
        assert_eq!(a.txid, b.txid);
        assert_eq!(a.size, b.size);
        assert_eq!(a.txid.len(), 64);
    }

    #[test]
    fn txid_changes_with_any_field() {
        let base = Transaction::with_timestamp("alice", "bob", 10.0, 0.001, 1.5);
        let others = [
            Transaction::with_timestamp("carol", "bob", 10.0, 0.001, 1.5),
            Transaction::with_timestamp("alice", "carol", 10.0, 0.001, 1.5),
            Transaction::with_timestamp("alice", "bob", 11.0, 0.001, 1.5),
            Transaction::with_timestamp("alice", "bob", 10.0, 0.002, 1.5),
            Transaction::with_timestamp("alice", "bob", 10.0, 0.001, 1.6),
        ];
        for other in others {
            assert_ne!(base.txid, other.txid);
        }
    }

    #[test]
    fn size_matches_canonical_serialization() {
        let tx = Transaction::with_timestamp("alice", "bob", 1.0, 0.5, 2.0);
        let expected = format!(
            r#"{{"amount":1.0,"fee":0.5,"recipient":"bob","sender":"alice","timestamp":2.0,"txid":"{}"}}"#,
            tx.txid
        );
        assert_eq!(tx.size, expected.len());
    }

    #[test]
    fn reward_has_sentinel_sender_and_no_fee() {
        let tx = Transaction::reward("carol", 10.5);
        assert!(tx.is_reward());
        assert_eq!(tx.recipient, "carol");
        assert_eq!(tx.fee, 0.0);
        assert_eq!(tx.fee_rate(), 0.0);
    }
}

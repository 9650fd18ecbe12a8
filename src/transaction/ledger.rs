use std::collections::{BTreeMap, HashMap};

use super::model::Transaction;
use crate::error::SimError;

/// Account balances keyed by account identifier.
/// Balances only move through `apply`, `credit` or a wholesale `overwrite`.
#[derive(Debug, Default)]
pub struct Ledger {
    map: HashMap<String, f64>,
}

impl Ledger {
    pub fn new() -> Self {
        Self {
            map: HashMap::new(),
        }
    }

    pub fn from_balances<I>(balances: I) -> Self
    where
        I: IntoIterator<Item = (String, f64)>,
    {
        Self {
            map: balances.into_iter().collect(),
        }
    }

    /// Balance of `account`; unknown accounts hold zero.
    pub fn balance(&self, account: &str) -> f64 {
        self.map.get(account).copied().unwrap_or(0.0)
    }

    /// Whether `tx` can be applied without driving its sender negative.
    pub fn can_cover(&self, tx: &Transaction) -> bool {
        tx.is_reward() || self.balance(&tx.sender) >= tx.amount + tx.fee
    }

    /// Debit sender `amount + fee` (skipped for rewards), credit recipient `amount`.
    pub fn apply(&mut self, tx: &Transaction) -> Result<(), SimError> {
        if !self.can_cover(tx) {
            return Err(SimError::InsufficientBalance);
        }
        if !tx.is_reward() {
            *self.map.entry(tx.sender.clone()).or_insert(0.0) -= tx.amount + tx.fee;
        }
        self.credit(&tx.recipient, tx.amount);
        Ok(())
    }

    pub fn credit(&mut self, account: &str, amount: f64) {
        *self.map.entry(account.to_string()).or_insert(0.0) += amount;
    }

    /// Replace every balance, e.g. after the account store changed underneath us.
    pub fn overwrite(&mut self, balances: HashMap<String, f64>) {
        self.map = balances;
    }

    /// Sorted copy for serialization.
    pub fn snapshot(&self) -> BTreeMap<String, f64> {
        self.map.iter().map(|(k, v)| (k.clone(), *v)).collect()
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }
}

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::{DEFAULT_DIFFICULTY, DIFF_MAX, DIFF_MIN};
use crate::error::ParamError;

/// Tunable network configuration. Components read it at the moment of use.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NetworkParameters {
    pub block_size_limit: usize,
    pub mining_difficulty: u32,
    pub transaction_fee: f64,
    pub block_time_target: u64,
    pub max_transactions_per_block: usize,
}

impl Default for NetworkParameters {
    fn default() -> Self {
        Self {
            block_size_limit: 1_000_000,
            mining_difficulty: DEFAULT_DIFFICULTY,
            transaction_fee: 0.001,
            block_time_target: 10,
            max_transactions_per_block: 1000,
        }
    }
}

impl NetworkParameters {
    /// Apply every recognised field of `update` that parses and passes its
    /// range check. Returns the names applied and the per-field rejections;
    /// one bad field never blocks the others.
    pub fn apply_update(
        &mut self,
        update: &Map<String, Value>,
    ) -> (Vec<&'static str>, Vec<ParamError>) {
        let mut applied = Vec::new();
        let mut rejected = Vec::new();

        macro_rules! field {
            ($name:literal, $parse:expr, $target:expr) => {
                if let Some(raw) = update.get($name) {
                    match $parse(raw) {
                        Ok(v) => {
                            $target = v;
                            applied.push($name);
                        }
                        Err(reason) => rejected.push(ParamError {
                            field: $name,
                            reason,
                        }),
                    }
                }
            };
        }

        field!(
            "block_size_limit",
            |v| positive_int(v).map(|n| n as usize),
            self.block_size_limit
        );
        field!(
            "mining_difficulty",
            |v| {
                positive_int(v).and_then(|n| {
                    if (DIFF_MIN as u64..=DIFF_MAX as u64).contains(&n) {
                        Ok(n as u32)
                    } else {
                        Err(format!("must be between {DIFF_MIN} and {DIFF_MAX}"))
                    }
                })
            },
            self.mining_difficulty
        );
        field!("transaction_fee", non_negative_real, self.transaction_fee);
        field!("block_time_target", positive_int, self.block_time_target);
        field!(
            "max_transactions_per_block",
            |v| positive_int(v).map(|n| n as usize),
            self.max_transactions_per_block
        );

        (applied, rejected)
    }
}

/// Numbers may arrive as JSON numbers or numeric strings (form posts).
pub fn as_f64(v: &Value) -> Option<f64> {
    match v {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn positive_int(v: &Value) -> Result<u64, String> {
    let n = as_f64(v).ok_or_else(|| "not a number".to_string())?;
    if n.fract() != 0.0 || n < 1.0 || n > u32::MAX as f64 {
        return Err("must be a positive integer".to_string());
    }
    Ok(n as u64)
}

fn non_negative_real(v: &Value) -> Result<f64, String> {
    let n = as_f64(v).ok_or_else(|| "not a number".to_string())?;
    if !n.is_finite() || n < 0.0 {
        return Err("must be a non-negative number".to_string());
    }
    Ok(n)
}

use std::env;
use std::str::FromStr;

use log::warn;
use serde_json::{Map, Value};

use crate::blockchain::{DEFAULT_MAX_NONCE, DEFAULT_RETARGET_INTERVAL, NetworkParameters};

const DEFAULT_GENESIS_BALANCES: &str = "alice:50,bob:30,carol:20";

/// Environment variable -> network parameter field.
const PARAM_VARS: [(&str, &str); 5] = [
    ("BLOCK_SIZE_LIMIT", "block_size_limit"),
    ("MINING_DIFFICULTY", "mining_difficulty"),
    ("TRANSACTION_FEE", "transaction_fee"),
    ("BLOCK_TIME_TARGET", "block_time_target"),
    ("MAX_TXS_PER_BLOCK", "max_transactions_per_block"),
];

/// Process configuration, read once at startup.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub host: String,
    pub port: u16,
    pub params: NetworkParameters,
    pub retarget_interval: usize,
    pub max_nonce: u64,
    pub pow_threads: usize,
    pub genesis_balances: Vec<(String, f64)>,
}

impl AppConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build from any key lookup; malformed or out-of-range values fall
    /// back to defaults. Network parameters pass the same checks as a
    /// runtime update.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str, default| parse_or(&lookup, key, default);

        let overrides: Map<String, Value> = PARAM_VARS
            .iter()
            .filter_map(|(var, field)| Some((field.to_string(), Value::String(lookup(var)?))))
            .collect();
        let mut params = NetworkParameters::default();
        let (_, rejected) = params.apply_update(&overrides);
        for e in rejected {
            warn!("CONFIG - ignoring {e}, keeping default");
        }

        let balances_raw =
            lookup("GENESIS_BALANCES").unwrap_or_else(|| DEFAULT_GENESIS_BALANCES.to_string());

        Self {
            host: lookup("HOST").unwrap_or_else(|| "127.0.0.1".to_string()),
            port: parse_or(&lookup, "PORT", 8080),
            params,
            retarget_interval: get("RETARGET_INTERVAL", DEFAULT_RETARGET_INTERVAL),
            max_nonce: parse_or(&lookup, "MAX_NONCE", DEFAULT_MAX_NONCE),
            pow_threads: get("POW_THREADS", 0),
            genesis_balances: parse_balances(&balances_raw),
        }
    }
}

fn parse_or<F, T>(lookup: &F, key: &str, default: T) -> T
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
{
    match lookup(key) {
        Some(raw) => raw.trim().parse().unwrap_or_else(|_| {
            warn!("CONFIG - ignoring malformed {key}={raw:?}");
            default
        }),
        None => default,
    }
}

/// `"alice:50,bob:30"` -> `[("alice", 50.0), ("bob", 30.0)]`.
fn parse_balances(raw: &str) -> Vec<(String, f64)> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .filter_map(|pair| {
            let parsed = pair
                .split_once(':')
                .and_then(|(name, amount)| Some((name.trim(), amount.trim().parse::<f64>().ok()?)))
                .filter(|(name, amount)| !name.is_empty() && *amount >= 0.0);
            if parsed.is_none() {
                warn!("CONFIG - ignoring genesis balance {pair:?}");
            }
            parsed.map(|(name, amount)| (name.to_string(), amount))
        })
        .collect()
}

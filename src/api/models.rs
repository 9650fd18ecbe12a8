use actix_web::HttpResponse;
use log::debug;
use rayon::ThreadPoolBuildError;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{BTreeMap, HashMap};
use std::sync::Mutex;
use std::time::{Duration, Instant};

use crate::blockchain::{
    Block, BlockTemplate, Miner, NetworkParameters, Simulator, difficulty::Retarget,
};
use crate::config::AppConfig;
use crate::error::{ParamError, SimError};

/// Unsubmitted templates are dropped after this long.
pub const TEMPLATE_TTL: Duration = Duration::from_secs(600);

type TemplateMap = HashMap<String, (BlockTemplate, Instant)>;

/// Shared application state. Every mutation of chain, mempool and ledger
/// goes through the single `sim` lock; only the nonce search runs outside it.
pub struct AppState {
    pub sim: Mutex<Simulator>,
    pub miner: Miner,
    pub mining_templates: Mutex<TemplateMap>,
    pub node_id: String,
}

impl AppState {
    pub fn new(config: &AppConfig) -> Result<Self, ThreadPoolBuildError> {
        let sim = Simulator::new(config.params.clone(), config.retarget_interval)
            .with_balances(config.genesis_balances.iter().cloned());
        Ok(Self {
            sim: Mutex::new(sim),
            miner: Miner::new(config.pow_threads, config.max_nonce)?,
            mining_templates: Mutex::new(HashMap::new()),
            node_id: uuid::Uuid::new_v4().simple().to_string(),
        })
    }

    /// Forget templates that no longer build on `tip_hash` or have
    /// outlived `TEMPLATE_TTL`.
    pub fn prune_templates(&self, tip_hash: &str) {
        let mut templates = self.mining_templates.lock().expect("mutex poisoned");
        retain_live(&mut templates, tip_hash, TEMPLATE_TTL);
    }
}

fn retain_live(templates: &mut TemplateMap, tip_hash: &str, ttl: Duration) {
    let before = templates.len();
    templates
        .retain(|_, (t, issued)| t.block.previous_hash == tip_hash && issued.elapsed() < ttl);
    if templates.len() < before {
        debug!("TEMPLATE - dropped {} stale templates", before - templates.len());
    }
}

/// Uniform failure body: `{ "ok": false, "error": "<reason>" }`.
#[derive(Serialize)]
pub struct ErrorResponse {
    pub ok: bool,
    pub error: String,
}

pub fn error_response(err: &SimError) -> HttpResponse {
    let body = ErrorResponse {
        ok: false,
        error: err.to_string(),
    };
    match err {
        SimError::StaleTip | SimError::Cancelled => HttpResponse::Conflict().json(body),
        SimError::UnknownTemplate => HttpResponse::NotFound().json(body),
        SimError::DifficultyUnreachable => HttpResponse::ServiceUnavailable().json(body),
        _ => HttpResponse::BadRequest().json(body),
    }
}

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub node_id: String,
}

/* ---------- Mining API Models ---------- */

#[derive(Deserialize)]
pub struct MineRequest {
    #[serde(alias = "miner_address")]
    pub miner: Option<String>,
}

#[derive(Serialize)]
pub struct MineResponse {
    pub ok: bool,
    pub block: Block,
    pub message: String,
    pub retarget: Option<Retarget>,
}

#[derive(Serialize)]
pub struct TemplateResponse {
    pub template_id: String,
    pub index: u64,
    pub previous_hash: String,
    pub difficulty: u32,
    /// Hash input minus the nonce: a valid solution satisfies
    /// `sha256(hash_prefix + decimal(nonce))` having `difficulty` leading zeros.
    pub hash_prefix: String,
    pub block: Block,
}

#[derive(Deserialize)]
pub struct SubmitRequest {
    pub template_id: String,
    pub nonce: u64,
    pub hash: Option<String>,
}

/* ---------- Chain API Models ---------- */

#[derive(Serialize)]
pub struct ChainResponse<'a> {
    pub length: usize,
    pub difficulty: u32,
    pub chain: &'a [Block],
}

#[derive(Serialize)]
pub struct ValidateResponse {
    pub valid: bool,
    pub length: usize,
    pub difficulty: u32,
}

#[derive(Serialize)]
pub struct DifficultyResponse {
    pub difficulty: u32,
    pub difficulty_adjustments: u64,
    pub retarget: Option<Retarget>,
}

/* ---------- TX API Models ---------- */

/// Amounts may be JSON numbers or numeric strings.
#[derive(Deserialize)]
pub struct NewTxRequest {
    pub sender: Option<String>,
    pub recipient: Option<String>,
    pub amount: Option<Value>,
    pub fee: Option<Value>,
}

#[derive(Serialize)]
pub struct NewTxResponse {
    pub ok: bool,
    pub txid: String,
}

#[derive(Serialize)]
pub struct MempoolTx {
    pub txid: String,
    pub sender: String,
    pub recipient: String,
    pub amount: f64,
    pub fee: f64,
    pub size: usize,
}

#[derive(Serialize)]
pub struct MempoolResponse {
    pub size: usize,
    pub transactions: Vec<MempoolTx>,
}

/* ---------- Balance / Params Models ---------- */

#[derive(Serialize)]
pub struct BalanceResponse {
    pub account: String,
    pub balance: f64,
}

#[derive(Serialize)]
pub struct BalancesResponse {
    pub accounts: usize,
    pub balances: BTreeMap<String, f64>,
}

#[derive(Serialize)]
pub struct ParamsResponse {
    pub applied: Vec<&'static str>,
    pub rejected: Vec<ParamError>,
    pub network_params: NetworkParameters,
}

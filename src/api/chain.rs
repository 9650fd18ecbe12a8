use actix_web::{HttpResponse, Responder, get, post, web};
use log::{debug, warn};
use std::sync::Arc;

use super::models::{
    AppState, ChainResponse, DifficultyResponse, MineRequest, MineResponse, ValidateResponse,
    error_response,
};
use crate::error::SimError;

/// Get the full blockchain.
#[get("/chain/")]
pub async fn get_chain(state: web::Data<AppState>) -> impl Responder {
    let sim = state.sim.lock().expect("mutex poisoned");
    let resp = ChainResponse {
        length: sim.chain().len(),
        difficulty: sim.params().mining_difficulty,
        chain: &sim.chain().chain,
    };
    HttpResponse::Ok().json(resp)
}

/// Validate the whole chain.
#[get("/validate/")]
pub async fn validate_chain(state: web::Data<AppState>) -> impl Responder {
    let sim = state.sim.lock().expect("mutex poisoned");
    let resp = ValidateResponse {
        valid: sim.chain().is_valid_chain(),
        length: sim.chain().len(),
        difficulty: sim.params().mining_difficulty,
    };
    HttpResponse::Ok().json(resp)
}

/// Mine a new block from the current mempool:
/// - Select txs by fee rate and build the draft (under the lock)
/// - Search for a nonce on the PoW pool (lock released)
/// - Commit if the tip has not moved meanwhile; a commit elsewhere
///   cancels the search
#[post("/mine/")]
pub async fn mine_block(state: web::Data<AppState>, req: web::Json<MineRequest>) -> impl Responder {
    let miner = req.miner.as_deref().unwrap_or_default().trim().to_string();
    if miner.is_empty() {
        return error_response(&SimError::MissingField("miner"));
    }

    let template = {
        let sim = state.sim.lock().expect("mutex poisoned");
        match sim.prepare_block(&miner) {
            Ok(t) => t,
            Err(e) => {
                warn!("MINER - {miner} cannot mine: {e}");
                return error_response(&e);
            }
        }
    };
    debug!(
        "MINER - {} searching block #{} at difficulty {}",
        miner,
        template.block.index,
        template.difficulty()
    );

    let pow_state = state.clone();
    let sealed = web::block(move || {
        let mut template = template;
        let difficulty = template.difficulty();
        let cancel = Arc::clone(&template.cancel);
        pow_state
            .miner
            .seal(&mut template.block, difficulty, &cancel)
            .map(|report| (template, report))
    })
    .await;

    let (template, report) = match sealed {
        Ok(Ok(sealed)) => sealed,
        Ok(Err(e)) => {
            warn!("MINER - search failed for {miner}: {e}");
            return error_response(&e);
        }
        Err(e) => {
            warn!("MINER - PoW worker failed: {e}");
            return HttpResponse::InternalServerError().body("proof-of-work worker failed");
        }
    };

    let committed = state
        .sim
        .lock()
        .expect("mutex poisoned")
        .commit_block(template, report);
    match committed {
        Ok(mined) => {
            state.prune_templates(&mined.block.hash);
            HttpResponse::Created().json(MineResponse {
                ok: true,
                block: mined.block,
                message: mined.message,
                retarget: mined.retarget,
            })
        }
        Err(e) => error_response(&e),
    }
}

/// Get current PoW difficulty.
#[get("/difficulty/")]
pub async fn get_difficulty(state: web::Data<AppState>) -> impl Responder {
    let sim = state.sim.lock().expect("mutex poisoned");
    HttpResponse::Ok().json(DifficultyResponse {
        difficulty: sim.params().mining_difficulty,
        difficulty_adjustments: sim.mining_stats().difficulty_adjustments,
        retarget: None,
    })
}

/// Retarget now from the recent block window (affects future blocks only).
#[post("/difficulty/adjust/")]
pub async fn adjust_difficulty(state: web::Data<AppState>) -> impl Responder {
    let mut sim = state.sim.lock().expect("mutex poisoned");
    let retarget = sim.adjust_difficulty();
    HttpResponse::Ok().json(DifficultyResponse {
        difficulty: sim.params().mining_difficulty,
        difficulty_adjustments: sim.mining_stats().difficulty_adjustments,
        retarget,
    })
}

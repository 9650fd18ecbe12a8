use actix_web::{HttpResponse, Responder, post, web};
use log::{debug, info, warn};
use std::time::Instant;
use uuid::Uuid;

use super::models::{
    AppState, MineRequest, MineResponse, SubmitRequest, TEMPLATE_TTL, TemplateResponse,
    error_response,
};
use crate::blockchain::SealReport;
use crate::error::SimError;

/// Hand out a draft block for an external miner to solve.
#[post("/mining/template/")]
pub async fn get_template(
    state: web::Data<AppState>,
    req: web::Json<MineRequest>,
) -> impl Responder {
    let miner = req.miner.as_deref().unwrap_or_default().trim();
    if miner.is_empty() {
        return error_response(&SimError::MissingField("miner"));
    }

    let template = {
        let sim = state.sim.lock().expect("mutex poisoned");
        match sim.prepare_block(miner) {
            Ok(t) => t,
            Err(e) => return error_response(&e),
        }
    };

    let template_id = Uuid::new_v4().to_string();
    let resp = TemplateResponse {
        template_id: template_id.clone(),
        index: template.block.index,
        previous_hash: template.block.previous_hash.clone(),
        difficulty: template.difficulty(),
        hash_prefix: template.block.hash_prefix(),
        block: template.block.clone(),
    };

    debug!(
        "TEMPLATE id={} height={} txs={} diff={}",
        template_id,
        resp.index,
        template.selected.len(),
        resp.difficulty
    );
    state.prune_templates(&template.block.previous_hash);
    state
        .mining_templates
        .lock()
        .expect("mutex poisoned")
        .insert(template_id, (template, Instant::now()));

    HttpResponse::Ok().json(resp)
}

/// Submit a PoW solution for a template. Single use: the template is
/// consumed whether or not the block is accepted. Templates left behind
/// by a new tip are forgotten, so late solutions get "unknown template".
#[post("/mining/submit/")]
pub async fn submit_solution(
    state: web::Data<AppState>,
    req: web::Json<SubmitRequest>,
) -> impl Responder {
    let Some((mut template, issued)) = state
        .mining_templates
        .lock()
        .expect("mutex poisoned")
        .remove(&req.template_id)
    else {
        return error_response(&SimError::UnknownTemplate);
    };

    if issued.elapsed() >= TEMPLATE_TTL {
        return error_response(&SimError::UnknownTemplate);
    }

    template.block.nonce = req.nonce;
    template.block.hash = template.block.compute_hash();
    if let Some(claimed) = &req.hash {
        if *claimed != template.block.hash {
            warn!("TEMPLATE {} - submitted hash mismatch", req.template_id);
            return error_response(&SimError::InvalidProof);
        }
    }
    if !template.block.is_valid(template.difficulty()) {
        return error_response(&SimError::InvalidProof);
    }

    let report = SealReport {
        hashes: req.nonce.saturating_add(1),
        elapsed: issued.elapsed(),
    };
    let committed = state
        .sim
        .lock()
        .expect("mutex poisoned")
        .commit_block(template, report);
    match committed {
        Ok(mined) => {
            info!(
                "ACCEPTED template {} -> block#{}",
                req.template_id, mined.block.index
            );
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

/// Solve a template locally; used by the HTTP tests to play external miner.
#[cfg(test)]
pub fn solve(prefix: &str, difficulty: u32) -> u64 {
    use crate::blockchain::{Block, block::meets_difficulty};

    (0..)
        .find(|&n| meets_difficulty(&Block::hash_with_nonce(prefix, n), difficulty))
        .expect("nonce space exhausted")
}

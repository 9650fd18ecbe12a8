use actix_web::{HttpResponse, Responder, get, post, web};
use log::debug;
use serde_json::Value;
use std::time::Instant;

use super::models::{
    AppState, MempoolResponse, MempoolTx, NewTxRequest, NewTxResponse, error_response,
};
use crate::blockchain::params::as_f64;
use crate::error::SimError;

fn number(v: Option<&Value>) -> Result<Option<f64>, SimError> {
    v.map(|v| as_f64(v).ok_or(SimError::InvalidAmount)).transpose()
}

/// Submit a new transaction into the mempool (with balance validation).
#[post("/tx/")]
pub async fn post_transaction(
    state: web::Data<AppState>,
    body: web::Json<NewTxRequest>,
) -> impl Responder {
    let t0 = Instant::now();
    let body = body.into_inner();

    let Some(sender) = body.sender else {
        return error_response(&SimError::MissingField("sender"));
    };
    let Some(recipient) = body.recipient else {
        return error_response(&SimError::MissingField("recipient"));
    };
    let amount = match number(body.amount.as_ref()) {
        Ok(Some(amount)) => amount,
        Ok(None) => return error_response(&SimError::MissingField("amount")),
        Err(e) => return error_response(&e),
    };
    let fee = match number(body.fee.as_ref()) {
        Ok(fee) => fee,
        Err(e) => return error_response(&e),
    };

    let result = {
        let mut sim = state.sim.lock().expect("mutex poisoned");
        sim.submit_transaction(sender.trim(), recipient.trim(), amount, fee)
    };

    match result {
        Ok(txid) => {
            debug!("POST /tx/ - txid={} OK ({} ms)", txid, t0.elapsed().as_millis());
            HttpResponse::Created().json(NewTxResponse { ok: true, txid })
        }
        Err(e) => error_response(&e),
    }
}

/// List current mempool in arrival order.
#[get("/mempool/")]
pub async fn get_mempool(state: web::Data<AppState>) -> impl Responder {
    let sim = state.sim.lock().expect("mutex poisoned");
    let transactions = sim
        .mempool()
        .iter()
        .map(|(_, tx)| MempoolTx {
            txid: tx.txid.clone(),
            sender: tx.sender.clone(),
            recipient: tx.recipient.clone(),
            amount: tx.amount,
            fee: tx.fee,
            size: tx.size,
        })
        .collect::<Vec<_>>();
    HttpResponse::Ok().json(MempoolResponse {
        size: transactions.len(),
        transactions,
    })
}

/// Every confirmed transaction with the index of its block.
#[get("/transactions/")]
pub async fn get_transactions(state: web::Data<AppState>) -> impl Responder {
    let sim = state.sim.lock().expect("mutex poisoned");
    HttpResponse::Ok().json(sim.transaction_history())
}

use actix_web::{HttpResponse, Responder, get, put, web};
use std::collections::HashMap;

use super::models::{AppState, BalanceResponse, BalancesResponse};

#[get("/balance/{account}/")]
pub async fn get_balance(state: web::Data<AppState>, path: web::Path<(String,)>) -> impl Responder {
    let account = path.into_inner().0;
    let balance = state
        .sim
        .lock()
        .expect("mutex poisoned")
        .ledger()
        .balance(&account);

    HttpResponse::Ok().json(BalanceResponse { account, balance })
}

#[get("/balances/")]
pub async fn get_balances(state: web::Data<AppState>) -> impl Responder {
    let balances = state.sim.lock().expect("mutex poisoned").ledger().snapshot();
    HttpResponse::Ok().json(BalancesResponse {
        accounts: balances.len(),
        balances,
    })
}

/// Overwrite the ledger wholesale from the account store.
#[put("/balances/")]
pub async fn put_balances(
    state: web::Data<AppState>,
    body: web::Json<HashMap<String, f64>>,
) -> impl Responder {
    let mut sim = state.sim.lock().expect("mutex poisoned");
    sim.resync_balances(body.into_inner());
    let balances = sim.ledger().snapshot();
    HttpResponse::Ok().json(BalancesResponse {
        accounts: balances.len(),
        balances,
    })
}

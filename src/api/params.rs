use actix_web::{HttpResponse, Responder, get, post, web};
use serde_json::{Map, Value};

use super::models::{AppState, ParamsResponse};

#[get("/params/")]
pub async fn get_params(state: web::Data<AppState>) -> impl Responder {
    let sim = state.sim.lock().expect("mutex poisoned");
    HttpResponse::Ok().json(sim.params())
}

/// Partial update: only the fields present are touched, and each is
/// validated on its own.
#[post("/params/")]
pub async fn update_params(
    state: web::Data<AppState>,
    body: web::Json<Map<String, Value>>,
) -> impl Responder {
    let mut sim = state.sim.lock().expect("mutex poisoned");
    let (applied, rejected) = sim.update_params(&body);
    HttpResponse::Ok().json(ParamsResponse {
        applied,
        rejected,
        network_params: sim.params().clone(),
    })
}

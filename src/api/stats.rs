use actix_web::{HttpResponse, Responder, get, web};

use super::models::AppState;

/// Network parameters, mining stats, decentralization metrics and counts.
#[get("/analytics/")]
pub async fn get_analytics(state: web::Data<AppState>) -> impl Responder {
    let analytics = state.sim.lock().expect("mutex poisoned").analytics();
    HttpResponse::Ok().json(analytics)
}

mod balance;
mod chain;
mod health;
mod mining;
pub mod models;
mod params;
mod stats;
mod tx;

use actix_web::web::{self, ServiceConfig};
use actix_web::{HttpResponse, error::InternalError};

pub use models::AppState;
use models::ErrorResponse;

pub fn init_routes(cfg: &mut ServiceConfig) {
    // undecodable bodies get the same failure record as handler errors
    cfg.app_data(web::JsonConfig::default().error_handler(|err, _req| {
        let body = HttpResponse::BadRequest().json(ErrorResponse {
            ok: false,
            error: err.to_string(),
        });
        InternalError::from_response(err, body).into()
    }));
    cfg.service(
        web::scope("/api/v1")
            .service(health::health_check)
            .service(chain::get_chain)
            .service(chain::validate_chain)
            .service(chain::mine_block)
            .service(chain::get_difficulty)
            .service(chain::adjust_difficulty)
            .service(mining::get_template)
            .service(mining::submit_solution)
            .service(tx::post_transaction)
            .service(tx::get_mempool)
            .service(tx::get_transactions)
            .service(balance::get_balance)
            .service(balance::get_balances)
            .service(balance::put_balances)
            .service(stats::get_analytics)
            .service(params::get_params)
            .service(params::update_params),
    );
}

mod api;
mod blockchain;
mod config;
mod error;
mod transaction;

use actix_web::{App, HttpServer, web};
use dotenvy::dotenv;
use log::info;

use api::AppState;
use config::AppConfig;

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    let _ = dotenv();
    env_logger::init();

    let config = AppConfig::from_env();
    let state = AppState::new(&config).map_err(std::io::Error::other)?;

    info!(
        "⛓️ Starting PoW simulator node {} at http://{}:{} (difficulty={}, accounts={})",
        state.node_id,
        config.host,
        config.port,
        config.params.mining_difficulty,
        config.genesis_balances.len()
    );

    let state = web::Data::new(state);

    HttpServer::new(move || {
        App::new()
            .app_data(state.clone())
            .configure(api::init_routes)
    })
    .bind((config.host.as_str(), config.port))?
    .run()
    .await
}

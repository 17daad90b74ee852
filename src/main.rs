use actix_web::{web, App, HttpServer};
use log::{error, info};

use csv_vault::api;
use csv_vault::app_state::AppState;
use csv_vault::config::AppConfig;
use csv_vault::logging;

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    let config = AppConfig::load().map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e.to_string()))?;
    let logger = logging::init(&config.logging).map_err(|e| std::io::Error::new(std::io::ErrorKind::Other, e.to_string()))?;
    info!("Logging initialised with {:?}", logger);

    let app_state = AppState::from_config(config.clone()).map_err(|e| {
        error!("Failed to initialise application state: {}", e);
        std::io::Error::new(std::io::ErrorKind::Other, e.to_string())
    })?;
    let state = web::Data::new(app_state);

    let (host, port) = (config.server.host.clone(), config.server.port);
    info!("Starting server on {}:{} with {} workers", host, port, config.server.workers);

    HttpServer::new(move || {
        App::new()
            .wrap(actix_web::middleware::Logger::default())
            .app_data(state.clone())
            .configure(api::configure)
    })
    .workers(config.server.workers)
    .bind((host.as_str(), port))?
    .run()
    .await
}

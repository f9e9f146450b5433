mod config;
mod database;
mod error;
mod handlers;
mod models;
mod pipeline;
mod scoring;
mod token;

use actix_cors::Cors;
use actix_web::{middleware::Logger, web, App, HttpServer};
use std::sync::Arc;

use crate::config::AppConfig;
use crate::database::{Database, MemoryStore, ScoreStore};
use crate::pipeline::ScoreService;
use crate::scoring::ScoreGenerator;

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    // Load environment variables
    dotenvy::dotenv().ok();
    env_logger::init_from_env(env_logger::Env::new().default_filter_or("info"));

    let config = AppConfig::from_env().map_err(|err| {
        log::error!("Invalid configuration: {err}");
        std::io::Error::new(std::io::ErrorKind::InvalidInput, err.to_string())
    })?;

    let store: Arc<dyn ScoreStore> = match config.database_url.as_deref() {
        Some(database_url) => {
            let db = Database::connect(database_url).await.map_err(|err| {
                log::error!("Failed to initialize database: {err:?}");
                std::io::Error::new(std::io::ErrorKind::Other, err.to_string())
            })?;
            Arc::new(db)
        }
        None => {
            log::warn!("DATABASE_URL not set; score requests are kept in memory only");
            Arc::new(MemoryStore::new())
        }
    };

    log::info!(
        "Scan latency windows: fast {:?}, full {:?}",
        config.scan_delays.fast,
        config.scan_delays.full
    );

    let scores = web::Data::new(ScoreService::new(
        store,
        ScoreGenerator::new(config.scan_delays.clone()),
    ));

    let bind_address = config.bind_address();
    log::info!("🚀 Starting Visibility Score Service on {}", bind_address);

    HttpServer::new(move || {
        let cors = Cors::default()
            .allow_any_origin()
            .allow_any_method()
            .allow_any_header()
            .max_age(3600);

        App::new()
            .app_data(scores.clone())
            .wrap(cors)
            .wrap(Logger::default())
            .service(web::scope("/api/v1").configure(handlers::configure))
    })
    .bind(&bind_address)?
    .run()
    .await
}

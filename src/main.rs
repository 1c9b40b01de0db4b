mod api;
mod models;
mod store;

use actix_cors::Cors;
use actix_web::{middleware, web, App, HttpServer};
use std::env;
use std::path::PathBuf;
use std::sync::Arc;

use api::AppState;
use store::Store;

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    // Initialize logger
    env_logger::init_from_env(env_logger::Env::default().default_filter_or("info"));

    // Load environment variables
    dotenvy::dotenv().ok();

    // Get configuration from environment
    let port: u16 = env::var("PORT")
        .unwrap_or_else(|_| "5000".to_string())
        .parse()
        .expect("PORT must be a number");

    let db_path = env::var("DATABASE_PATH").unwrap_or_else(|_| "noise-signal.db".to_string());

    let backgrounds_dir =
        PathBuf::from(env::var("BACKGROUNDS_DIR").unwrap_or_else(|_| "backgrounds".to_string()));

    // Comma-separated origin allow-list; unset means allow any (development)
    let allowed_origins: Option<Vec<String>> = env::var("ALLOWED_ORIGINS").ok().map(|value| {
        value
            .split(',')
            .map(|origin| origin.trim().to_string())
            .filter(|origin| !origin.is_empty())
            .collect()
    });

    // Initialize store
    let store = Arc::new(Store::new(&db_path).expect("Failed to initialize database"));

    log::info!("Database: {}", db_path);
    log::info!("Backgrounds directory: {}", backgrounds_dir.display());

    let server = HttpServer::new(move || {
        let cors = match &allowed_origins {
            Some(origins) => {
                let mut cors = Cors::default()
                    .allow_any_method()
                    .allow_any_header()
                    .max_age(3600);
                for origin in origins {
                    cors = cors.allowed_origin(origin);
                }
                cors
            }
            None => Cors::default()
                .allow_any_origin()
                .allow_any_method()
                .allow_any_header()
                .max_age(3600),
        };

        App::new()
            .wrap(middleware::Logger::default())
            .wrap(cors)
            .app_data(web::Data::new(AppState {
                store: store.clone(),
                backgrounds_dir: backgrounds_dir.clone(),
            }))
            // Backgrounds arrive as data URIs, so allow large bodies (50MB)
            .app_data(web::JsonConfig::default().limit(50 * 1024 * 1024))
            .app_data(web::PayloadConfig::new(50 * 1024 * 1024))
            .configure(api::configure_routes)
    });

    log::info!("Starting noise-signal server on port {}", port);

    server.bind(("0.0.0.0", port))?.run().await
}

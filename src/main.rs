mod config;
mod error;
mod retrieval;
mod routes;
mod services;

use actix_cors::Cors;
use actix_web::{
    http::header,
    middleware::{Compress, Logger},
    web, App, HttpServer,
};
use std::net::SocketAddr;
use std::sync::Arc;
use tracing::{error, info, warn, Level};
use tracing_subscriber::FmtSubscriber;

use crate::config::Config;
use crate::routes::{create_routes, json_config};
use crate::services::RagEngine;

/// Shared request-handler state. `engine` is `None` when the pipeline could
/// not be built at startup.
pub struct AppState {
    pub engine: Option<Arc<RagEngine>>,
}

fn build_cors(allow_origin: &str) -> Cors {
    let cors = if allow_origin == "*" {
        Cors::default().allow_any_origin()
    } else {
        allow_origin
            .split(',')
            .map(|s| s.trim())
            .filter(|s| !s.is_empty())
            .fold(Cors::default(), |cors, origin| cors.allowed_origin(origin))
    };

    cors.allowed_methods(vec!["GET", "POST", "OPTIONS"])
        .allowed_headers(vec![header::CONTENT_TYPE, header::ACCEPT])
        .max_age(3600)
}

#[actix_web::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    dotenvy::dotenv().ok();

    let log_level = std::env::var("RUST_LOG")
        .unwrap_or_else(|_| "info".to_string())
        .parse()
        .unwrap_or(Level::INFO);

    let subscriber = FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_target(false)
        .with_thread_ids(true)
        .with_file(true)
        .with_line_number(true)
        .finish();

    tracing::subscriber::set_global_default(subscriber)?;

    info!("Starting Portfolio RAG backend");

    let config = Config::from_env()?;
    info!("Configuration loaded from environment");

    // Missing credentials or an unreachable store leave the service up
    // but not ready.
    let engine = match RagEngine::from_config(&config).await {
        Ok(engine) => {
            match engine.initialize().await {
                Ok(outcome) => info!("Knowledge base initialization: {:?}", outcome),
                Err(e) => error!("Knowledge base initialization failed: {}", e),
            }
            Some(Arc::new(engine))
        }
        Err(e) => {
            warn!("RAG disabled: {}", e);
            None
        }
    };

    let state = web::Data::new(AppState { engine });

    let addr = SocketAddr::from((config.host.parse::<std::net::IpAddr>()?, config.port));
    let cors_allow_origin = config.cors_allow_origin.clone();

    info!("Server running at http://{}", addr);

    HttpServer::new(move || {
        App::new()
            .app_data(state.clone())
            .app_data(json_config())
            .wrap(build_cors(&cors_allow_origin))
            .wrap(Compress::default())
            .wrap(Logger::default())
            .configure(create_routes)
    })
    .bind(addr)?
    .run()
    .await?;

    Ok(())
}

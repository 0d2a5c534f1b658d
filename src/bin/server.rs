use log::{error, info, warn};
use std::net::SocketAddr;
use std::sync::Arc;

use chat_hub::config::ServerConfig;
use chat_hub::core::server::ChatServer;
use chat_hub::handlers::routes;

#[tokio::main]
async fn main() {
    // Initialize env
    match dotenvy::dotenv() {
        Ok(path) => info!("Environment variables loaded from {}", path.display()),
        Err(e) => warn!("Failed to load .env file: {}", e),
    };

    // Initialize logging
    env_logger::init();

    let config = match ServerConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            error!("Invalid configuration: {}", e);
            std::process::exit(1);
        }
    };

    info!(
        "Configuration: host={}, port={}, queue_capacity={}, presence_ttl={:?}",
        config.host, config.port, config.queue_capacity, config.presence_ttl
    );

    // Build the server address
    let addr: SocketAddr = match format!("{}:{}", config.host, config.port).parse() {
        Ok(addr) => addr,
        Err(e) => {
            error!("Failed to parse server address: {}", e);
            std::process::exit(1);
        }
    };

    let tls_paths = match (&config.tls_cert_path, &config.tls_key_path) {
        (Some(cert), Some(key)) if config.enable_tls => Some((cert.clone(), key.clone())),
        _ => None,
    };

    let server = match ChatServer::with_memory_presence(config) {
        Ok(server) => Arc::new(server),
        Err(e) => {
            error!("Failed to start chat hub: {}", e);
            std::process::exit(1);
        }
    };
    let routes = routes(server);

    match tls_paths {
        Some((cert, key)) => {
            info!("Starting chat hub with TLS on {}", addr);
            warp::serve(routes)
                .tls()
                .cert_path(cert)
                .key_path(key)
                .run(addr)
                .await;
        }
        None => {
            info!("Starting chat hub on {}", addr);
            warp::serve(routes).run(addr).await;
        }
    }
}

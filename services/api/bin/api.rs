//! Main Entrypoint for the Voice Bridge API Service
//!
//! This binary is responsible for:
//! 1. Loading configuration from the environment.
//! 2. Building the token issuer and the signed agent API client.
//! 3. Constructing the Axum router and applying middleware.
//! 4. Starting the web server and handling graceful shutdown.

use anyhow::Context;
use secrecy::ExposeSecret;
use std::{net::SocketAddr, sync::Arc};
use tower_http::cors::{Any, CorsLayer};
use tracing::{info, warn};
use voicebridge_api::{
    agent_api::{AgentRegistration, HttpAgentApi},
    config::Config,
    router::create_router,
    state::AppState,
};
use voicebridge_core::{credential::TokenIssuer, signature::RequestSigner};

/// Listens for the `Ctrl+C` signal to gracefully shut down the server.
async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "Failed to install Ctrl+C handler");
        std::future::pending::<()>().await;
    }
    info!("Received shutdown signal. Shutting down gracefully...");
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // --- 1. Load Configuration ---
    let config = Config::from_env().context("Failed to load configuration")?;

    // --- 2. Initialize Logging ---
    tracing_subscriber::fmt()
        .with_max_level(config.log_level)
        .with_timer(tracing_subscriber::fmt::time::ChronoLocal::rfc_3339())
        .init();
    info!("Configuration loaded. Initializing application state...");

    // --- 3. Initialize Shared Services ---
    let token_issuer = TokenIssuer::new(config.app_id, config.server_secret.expose_secret())
        .context("Failed to build token issuer")?;
    let signer = RequestSigner::new(config.app_id, config.server_secret.clone());
    let agent_api = HttpAgentApi::new(config.api_url.clone(), signer);
    let registration = AgentRegistration::from_config(&config);

    let app_state = Arc::new(AppState {
        token_issuer: Arc::new(token_issuer),
        agent_api: Arc::new(agent_api),
        registration: Arc::new(registration),
        config: Arc::new(config.clone()),
    });

    // --- 4. Create Router and Apply Middleware ---
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let app = create_router(app_state).layer(cors);

    // --- 5. Start Server ---
    info!(
        app_id = config.app_id,
        agent_id = %config.agent_id,
        api_url = %config.api_url,
        bind_address = %config.bind_address,
        "Service configured. Starting server..."
    );
    let listener = tokio::net::TcpListener::bind(config.bind_address).await?;

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    info!("Server has shut down.");
    Ok(())
}

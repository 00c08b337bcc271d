//! Compute gateway HTTP entrypoint.
//!
//! Launches an Axum-based HTTP server exposing the CCIP-Read lookup
//! interface backed by the local gateway pipeline.
//!
//! Endpoints:
//! - `POST /lookup` – Resolve call data to a signed envelope
//! - `POST /compute` – Direct dispatch of a registered function
//! - `GET /health` – Signer address and uptime
//! - `GET /metrics` – Prometheus text exposition
//! - `GET /api/metrics` – JSON metrics snapshot
//! - `GET /functions` – Registered compute function names
//!
//! Environment:
//! - `.env` values loaded at startup
//! - `HOST`, `PORT` control the binding address
//! - `GATEWAY_PRIVATE_KEY` selects the signing key

use axum::Router;
use axum::http::Method;
use dotenvy::dotenv;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tower_http::trace::TraceLayer;
use tower_http::cors;

use crate::config::Config;
use crate::functions;
use crate::gateway_local::GatewayLocal;
use crate::handlers;
use crate::signer::{DigestSigner, GatewayWallet};
use crate::telemetry;

/// Interval of the limiter/cache eviction sweep.
const SWEEP_INTERVAL: Duration = Duration::from_secs(300);

/// Initializes the compute gateway server.
///
/// - Loads `.env` variables and the tracing subscriber.
/// - Loads the signing key and the built-in compute registry.
/// - Starts an Axum HTTP server with the gateway handlers.
///
/// Binds to the address specified by the `HOST` and `PORT` env vars.
pub async fn run() -> Result<(), Box<dyn std::error::Error>> {
    dotenv().ok();
    telemetry::init();

    let config = Config::from_env()?;

    let wallet = GatewayWallet::new(config.private_key())?;
    tracing::info!(signer = %wallet.address(), "Gateway signer loaded");

    let registry = functions::default_registry()?;
    let gateway = Arc::new(GatewayLocal::new(Arc::new(wallet), registry));

    let sweeper = gateway.clone();
    tokio::spawn(async move {
        let mut tick = tokio::time::interval(SWEEP_INTERVAL);
        tick.tick().await;
        loop {
            tick.tick().await;
            sweeper.sweep_expired();
        }
    });

    let http_endpoints = Router::new()
        .merge(handlers::routes().with_state(gateway))
        .layer(TraceLayer::new_for_http())
        .layer(
            cors::CorsLayer::new()
                .allow_origin(cors::Any)
                .allow_methods([Method::GET, Method::POST])
                .allow_headers(cors::Any),
        );

    let addr = SocketAddr::new(config.host(), config.port());
    tracing::info!("Starting server at http://{}", addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .inspect_err(|e| tracing::error!("Failed to bind to {}: {}", addr, e))?;

    axum::serve(
        listener,
        http_endpoints.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    Ok(())
}

/// Resolves when SIGTERM or SIGINT arrives.
async fn shutdown_signal() {
    use tokio::signal::unix::{SignalKind, signal};

    let mut sigterm = match signal(SignalKind::terminate()) {
        Ok(stream) => stream,
        Err(e) => {
            tracing::error!("Failed to register SIGTERM handler: {e}");
            return std::future::pending::<()>().await;
        }
    };
    let mut sigint = match signal(SignalKind::interrupt()) {
        Ok(stream) => stream,
        Err(e) => {
            tracing::error!("Failed to register SIGINT handler: {e}");
            return std::future::pending::<()>().await;
        }
    };

    tokio::select! {
        _ = sigterm.recv() => tracing::info!("Received SIGTERM, shutting down"),
        _ = sigint.recv() => tracing::info!("Received SIGINT, shutting down"),
    }
}

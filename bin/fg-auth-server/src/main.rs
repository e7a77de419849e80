//! FlowGate Auth Server
//!
//! Serves the authentication and invitation APIs plus:
//! - GET /health - liveness
//! - GET /metrics - Prometheus exposition
//! - GET /q/openapi - OpenAPI document
//!
//! Configuration comes from an optional TOML file (`--config` / `FG_CONFIG`)
//! overlaid with `FG_*` environment variables. See `fg-config` for the keys.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use axum::{extract::State, response::Json, routing::get, Router};
use clap::Parser;
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use tokio::{net::TcpListener, signal};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::info;

use fg_common::logging::{self, LogFormat};
use fg_config::AppConfig;
use fg_platform::api::{self, ApiState};
use fg_platform::repository::{AuthStore, MemoryStore, SqliteStore};
use fg_platform::service::{AuthConfig, AuthenticationService, JwtFederatedVerifier};

/// FlowGate Auth Server
#[derive(Parser, Debug)]
#[command(name = "fg-auth-server")]
#[command(about = "FlowGate authentication and session service")]
struct Args {
    /// Path to a TOML config file
    #[arg(long, env = "FG_CONFIG")]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let config = AppConfig::load(args.config.as_deref())?;

    logging::init(
        &config.logging.level,
        LogFormat::from_json_flag(config.logging.json),
    )
    .map_err(anyhow::Error::msg)?;

    info!(edition = %config.edition, "Starting FlowGate Auth Server");

    let metrics = PrometheusBuilder::new().install_recorder()?;

    let auth = if config.database.is_memory() {
        info!("Using in-memory store; data is lost on shutdown");
        build_auth_service(Arc::new(MemoryStore::new()), &config)?
    } else {
        info!(url = %config.database.url, "Connecting to SQLite");
        let store = SqliteStore::connect(
            &config.database.url,
            config.database.max_connections,
            Duration::from_secs(config.database.acquire_timeout_secs),
        )
        .await?;
        store.init_schema().await?;
        build_auth_service(Arc::new(store), &config)?
    };
    info!("Auth services initialized");

    let monitoring = Router::new()
        .route("/health", get(health_handler))
        .route("/metrics", get(metrics_handler))
        .with_state(metrics);

    let app = api::router(ApiState::new(Arc::new(auth)))
        .merge(monitoring)
        .layer(TraceLayer::new_for_http())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        );

    let addr = config.bind_address();
    let listener = TcpListener::bind(&addr).await?;
    info!("API server listening on http://{}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("FlowGate Auth Server stopped");
    Ok(())
}

fn build_auth_service<S: AuthStore + 'static>(
    store: Arc<S>,
    config: &AppConfig,
) -> Result<AuthenticationService> {
    let auth_config = AuthConfig {
        secret: config.auth.jwt_secret.clone(),
        issuer: config.auth.issuer.clone(),
        audience: config.auth.audience.clone(),
        access_token_expiry_secs: config.auth.token_expiry_secs,
    };

    let mut builder = AuthenticationService::builder(store, config.edition, auth_config)
        .otp_ttl(chrono::Duration::seconds(config.auth.otp_expiry_secs));

    if config.federated.is_enabled() {
        info!(issuer = %config.federated.issuer, "Federated sign-in enabled");
        builder = builder.federated_verifier(Arc::new(JwtFederatedVerifier::new(
            &config.federated.issuer,
            &config.federated.audience,
            &config.federated.secret,
        )));
    }

    Ok(builder.build()?)
}

async fn health_handler() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "UP",
        "version": env!("CARGO_PKG_VERSION")
    }))
}

async fn metrics_handler(State(handle): State<PrometheusHandle>) -> String {
    handle.render()
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    info!("Shutdown signal received");
}

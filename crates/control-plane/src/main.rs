//! Launchpad Control Plane Server
//!
//! Accepts deployment requests, provisions the platform resources in the
//! background and serves the progress ledger to the front end.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::Router;
use tokio::net::TcpListener;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use launchpad_control_plane::{
    config::{AppConfig, DatabaseConfig, DnsConfig, LedgerBackend, ProviderConfig},
    db::create_pool,
    engine::{ProvisioningOrchestrator, StepContext},
    handlers,
    ledger::{MemoryLedger, PgLedger, ProgressLedger},
    provider::{blueprint::Blueprint, CloudflareDns, NorthflankClient},
    services::{BackupService, ProjectService},
    state::AppState,
};

/// Initialize tracing/logging.
fn init_tracing(json: bool) {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "info,launchpad_control_plane=debug,tower_http=debug".into()
            }),
        )
        .with(json.then(|| tracing_subscriber::fmt::layer().json()))
        .with((!json).then(tracing_subscriber::fmt::layer))
        .init();
}

fn build_router(state: AppState, projects: ProjectService, backups: BackupService) -> Router {
    // CORS configuration - the front end is served from another origin
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    handlers::routes(state, projects, backups)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
}

async fn open_ledger(config: &AppConfig) -> anyhow::Result<Arc<dyn ProgressLedger>> {
    match config.ledger {
        LedgerBackend::Postgres => {
            let db_config = DatabaseConfig::from_env().unwrap_or_else(|e| {
                tracing::warn!(error = %e, "Failed to load database config, using defaults");
                DatabaseConfig::default()
            });
            let pool = create_pool(&db_config).await?;
            Ok(Arc::new(PgLedger::new(pool)))
        }
        LedgerBackend::Memory => {
            tracing::warn!("Using the in-memory ledger, progress is lost on restart");
            Ok(Arc::new(MemoryLedger::new()))
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables from .env file if present
    dotenvy::dotenv().ok();

    let app_config = AppConfig::from_env();
    init_tracing(app_config.as_ref().map(|c| c.log_json).unwrap_or(false));

    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        "Starting Launchpad Control Plane"
    );

    let app_config = app_config.unwrap_or_else(|e| {
        tracing::warn!(error = %e, "Failed to load app config, using defaults");
        AppConfig::default()
    });
    let provider_config = ProviderConfig::from_env().unwrap_or_else(|e| {
        tracing::warn!(error = %e, "Failed to load provisioning API config, using defaults");
        ProviderConfig::default()
    });
    let dns_config = DnsConfig::from_env().unwrap_or_else(|e| {
        tracing::warn!(error = %e, "Failed to load DNS config, using defaults");
        DnsConfig::default()
    });

    tracing::info!(
        host = %app_config.host,
        port = app_config.port,
        ledger = ?app_config.ledger,
        domain = %app_config.domain_name,
        region = %provider_config.region,
        "Configuration loaded"
    );

    let ledger = open_ledger(&app_config).await?;

    let timeout = app_config.http_timeout();
    let ctx = StepContext {
        api: Arc::new(NorthflankClient::new(&provider_config, timeout)),
        dns: Arc::new(CloudflareDns::new(&dns_config, timeout)),
        ledger: ledger.clone(),
        retry: app_config.retry_policy(),
        assignment_retry: app_config.assignment_policy(),
        blueprint: Blueprint::new(&app_config.domain_name, &app_config.app_url)
            .with_region(&provider_config.region),
    };

    let backups = BackupService::new(ctx.api.clone());
    let orchestrator = ProvisioningOrchestrator::new(ctx, app_config.timing());
    let projects = ProjectService::new(orchestrator.clone(), app_config.start_delay());

    // Pick up workflows that were still settling when the last process stopped
    orchestrator.resume_all().await?;

    let state = AppState::new(ledger, app_config.clone());
    let app = build_router(state, projects, backups);

    let addr: SocketAddr = app_config.bind_address().parse()?;
    let listener = TcpListener::bind(addr).await?;

    tracing::info!(address = %addr, "Server listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    orchestrator.shutdown();
    tracing::info!("Server shutdown complete");

    Ok(())
}

/// Wait for shutdown signal (Ctrl+C or SIGTERM).
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received Ctrl+C, starting graceful shutdown");
        }
        _ = terminate => {
            tracing::info!("Received SIGTERM, starting graceful shutdown");
        }
    }
}

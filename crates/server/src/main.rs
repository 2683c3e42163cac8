use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use sha2::{Digest, Sha256};
use tokio::signal;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use spotlight_core::{
    create_audit_system, create_authenticator, load_config, validate_config, AuditEvent,
    AuditStore, Authenticator, CampaignEngine, PackageCatalog, PanelClient, SmmPanel,
    SqliteAuditStore, SqliteCampaignStore, SqliteOrderSetStore, SqliteOrderStore,
    SqlitePackageStore, SqlitePlaylistDirectory, SqlitePurchaseLogStore, SubmissionService,
};
use spotlight_server::api::create_router;
use spotlight_server::state::AppState;

/// Application version
const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Buffer size for audit event channel
const AUDIT_BUFFER_SIZE: usize = 1000;

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        error!("Fatal error: {:#}", e);
        std::process::exit(1);
    }
}

async fn run() -> Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config_path = std::env::var("SPOTLIGHT_CONFIG")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("config.toml"));

    info!("Loading configuration from {:?}", config_path);
    let config = load_config(&config_path)
        .with_context(|| format!("Failed to load config from {:?}", config_path))?;

    validate_config(&config).context("Configuration validation failed")?;

    info!("Configuration loaded successfully");
    info!("Auth method: {:?}", config.auth.method);
    info!("Database path: {:?}", config.database.path);

    // Compute config hash for audit
    let config_json = serde_json::to_string(&config).unwrap_or_default();
    let config_hash = format!("{:x}", Sha256::digest(config_json.as_bytes()));
    let config_hash_short = &config_hash[..16];

    let authenticator: Arc<dyn Authenticator> = Arc::from(
        create_authenticator(&config.auth).context("Failed to create authenticator")?,
    );
    info!("Using authenticator: {}", authenticator.method_name());

    let db_path = &config.database.path;
    let audit_store: Arc<dyn AuditStore> =
        Arc::new(SqliteAuditStore::new(db_path).context("Failed to create audit store")?);
    let campaigns = Arc::new(
        SqliteCampaignStore::new(db_path).context("Failed to create campaign store")?,
    );
    let orders =
        Arc::new(SqliteOrderStore::new(db_path).context("Failed to create order store")?);
    let playlists = Arc::new(
        SqlitePlaylistDirectory::new(db_path).context("Failed to create playlist directory")?,
    );
    let packages =
        Arc::new(SqlitePackageStore::new(db_path).context("Failed to create package store")?);
    let order_sets = Arc::new(
        SqliteOrderSetStore::new(db_path).context("Failed to create order set store")?,
    );
    let purchase_logs = Arc::new(
        SqlitePurchaseLogStore::new(db_path).context("Failed to create purchase log")?,
    );
    info!("Stores initialized");

    let (audit_handle, audit_writer) =
        create_audit_system(Arc::clone(&audit_store), AUDIT_BUFFER_SIZE);
    let writer_handle = tokio::spawn(audit_writer.run());

    audit_handle
        .emit(AuditEvent::ServiceStarted {
            version: VERSION.to_string(),
            config_hash: config_hash_short.to_string(),
        })
        .await;

    // A missing key is not fatal: panel operations report a configuration error.
    let panel: Option<Arc<dyn SmmPanel>> = match &config.smm_panel {
        Some(panel_config) => match PanelClient::new(panel_config.clone()) {
            Ok(client) => {
                info!("SMM panel client at {}", panel_config.url);
                Some(Arc::new(client) as Arc<dyn SmmPanel>)
            }
            Err(e) => {
                warn!("SMM panel unavailable: {}", e);
                None
            }
        },
        None => {
            info!("No SMM panel configured");
            None
        }
    };

    let submissions = SubmissionService::new(panel, order_sets, purchase_logs);
    let engine = CampaignEngine::new(
        config.engine.clone(),
        campaigns,
        orders,
        playlists,
        PackageCatalog::new(packages),
        submissions,
    )
    .with_audit(audit_handle.clone());

    let state = Arc::new(AppState::new(
        config.clone(),
        authenticator,
        audit_store,
        Arc::new(engine),
    ));

    let app = create_router(state);

    let addr = SocketAddr::new(config.server.host, config.server.port);
    info!("Starting server on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind to {}", addr))?;

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    info!("Server shutting down...");
    audit_handle
        .emit(AuditEvent::ServiceStopped {
            reason: "graceful_shutdown".to_string(),
        })
        .await;

    // The engine's handle went away with the router; dropping ours closes
    // the channel so the writer drains and exits.
    drop(audit_handle);
    let _ = writer_handle.await;
    info!("Audit writer stopped");

    Ok(())
}

/// Wait for shutdown signal (Ctrl+C or SIGTERM)
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                error!("Failed to install SIGTERM handler: {}", e);
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
}

//! Runbook Engine binary.
//!
//! Runs the execution worker and, in `serve` mode, the HTTP API beside it.

use anyhow::Context;
use clap::{Parser, Subcommand};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::Notify;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use runbook_engine::{
    config::{DatabaseConfig, EngineConfig, LogFormat},
    crypto::Encryptor,
    db::{create_pool, ensure_schema, PgStore},
    handlers,
    secrets::StoredSecretResolver,
    state::AppState,
    store::Stores,
    BlockDispatcher, ExecutionService, ExecutionWorker, JobRunner, ResultExt,
};
use runbook_tools::Executors;

#[derive(Parser)]
#[command(name = "runbook-engine")]
#[command(version, about = "Runbook execution engine", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the worker and the HTTP API (default)
    Serve,

    /// Run the worker only
    Worker,

    /// Print a fresh base64 encryption key
    Keygen,

    /// Print the stored form of a secret under RUNBOOK_ENCRYPTION_KEY
    Encrypt {
        /// Plaintext secret
        secret: String,
    },
}

/// Initialize tracing/logging.
fn init_tracing(format: LogFormat) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        "info,runbook_engine=debug,runbook_tools=debug,tower_http=debug".into()
    });
    let registry = tracing_subscriber::registry().with(filter);

    match format {
        LogFormat::Json => registry
            .with(tracing_subscriber::fmt::layer().json())
            .init(),
        LogFormat::Text => registry.with(tracing_subscriber::fmt::layer()).init(),
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables from .env file if present
    dotenvy::dotenv().ok();

    let cli = Cli::parse();

    let (config, config_error) = match EngineConfig::from_env() {
        Ok(config) => (config, None),
        Err(e) => (EngineConfig::default(), Some(e)),
    };
    init_tracing(config.log_format);
    if let Some(e) = config_error {
        tracing::warn!(error = %e, "Failed to load engine config, using defaults");
    }

    match cli.command.unwrap_or(Commands::Serve) {
        Commands::Keygen => {
            println!("{}", Encryptor::generate_key());
            Ok(())
        }
        Commands::Encrypt { secret } => {
            let key = config
                .encryption_key
                .as_deref()
                .context("RUNBOOK_ENCRYPTION_KEY must be set to encrypt secrets")?;
            println!("{}", Encryptor::from_base64(key)?.encrypt_secret(&secret)?);
            Ok(())
        }
        Commands::Worker => run(config, false).await,
        Commands::Serve => run(config, true).await,
    }
}

async fn run(config: EngineConfig, serve_http: bool) -> anyhow::Result<()> {
    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        worker_id = %config.worker_id,
        http = serve_http,
        "Starting runbook engine"
    );

    let db_config = DatabaseConfig::from_env().unwrap_or_else(|e| {
        tracing::warn!(error = %e, "Failed to load database config, using defaults");
        DatabaseConfig::default()
    });

    let db_pool = create_pool(&db_config)
        .await
        .log("connecting to PostgreSQL")?;
    ensure_schema(&db_pool).await.log("ensuring schema")?;

    let stores = Stores::shared(Arc::new(PgStore::new(db_pool.clone())));

    let encryptor = config
        .encryption_key
        .as_deref()
        .map(Encryptor::from_base64)
        .transpose()?;
    if encryptor.is_none() {
        tracing::warn!("RUNBOOK_ENCRYPTION_KEY not set, credential-backed blocks will fail");
    }

    let secrets = Arc::new(StoredSecretResolver::new(
        stores.credentials.clone(),
        encryptor,
    ));
    let executors = Arc::new(Executors::new(config.executor_settings(), secrets)?);
    let wake = Arc::new(Notify::new());

    let dispatcher = BlockDispatcher::new(stores.jobs.clone(), executors.clone());
    let worker = ExecutionWorker::new(
        config.worker_id.clone(),
        stores.jobs.clone(),
        JobRunner::new(stores.clone(), dispatcher),
        wake.clone(),
        config.poll_interval(),
    );

    if config.recover_orphans {
        worker
            .recover_orphaned_jobs()
            .await
            .log("recovering orphaned jobs")?;
    }

    let shutdown = CancellationToken::new();
    tokio::spawn({
        let shutdown = shutdown.clone();
        async move {
            shutdown_signal().await;
            shutdown.cancel();
        }
    });

    let worker_handle = tokio::spawn({
        let shutdown = shutdown.clone();
        async move { worker.run(shutdown).await }
    });

    if !serve_http {
        worker_handle.await?;
        tracing::info!("Worker stopped");
        return Ok(());
    }

    let service = ExecutionService::new(stores, executors, wake);
    let app = handlers::router(AppState::new(service, Some(db_pool)));

    let addr: SocketAddr = config.bind_address().parse()?;
    let listener = TcpListener::bind(addr).await?;
    tracing::info!(address = %addr, "Server listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown.clone().cancelled_owned())
        .await?;

    // the worker drains its in-flight job before returning
    shutdown.cancel();
    worker_handle.await?;
    tracing::info!("Server shutdown complete");

    Ok(())
}

/// Wait for shutdown signal (Ctrl+C or SIGTERM).
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to install Ctrl+C handler");
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

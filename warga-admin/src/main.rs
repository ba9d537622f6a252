//! warga-admin - RW resident administration service
//!
//! Serves the HTTP/SSE API by default. The `export`, `import` and `template`
//! subcommands run one spreadsheet operation against the database and exit.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::net::SocketAddr;
use std::path::PathBuf;
use tokio::signal;
use tracing::info;
use tracing_subscriber::EnvFilter;

use warga_common::config::{RootFolderInitializer, RootFolderResolver, TomlConfig};
use warga_common::db::{init_database, init_memory_database};
use warga_common::events::EventBus;
use warga_admin::workflow::{DirectorySink, FileSink};
use warga_admin::{build_router, AppState};

/// Command-line arguments for warga-admin
#[derive(Parser, Debug)]
#[command(name = "warga-admin")]
#[command(about = "RW resident administration service")]
#[command(version)]
struct Args {
    /// Root folder holding warga.db
    #[arg(short, long, global = true)]
    root_folder: Option<PathBuf>,

    /// Use a throwaway in-memory database
    #[arg(long, global = true)]
    ephemeral: bool,

    /// Port to listen on (overrides the config file)
    #[arg(short, long, env = "WARGA_PORT")]
    port: Option<u16>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the HTTP server (default)
    Serve,
    /// Write every member row to data-warga-YYYY-MM-DD.csv
    Export {
        #[arg(short, long, default_value = ".")]
        out: PathBuf,
    },
    /// Import families and members from a spreadsheet
    Import { file: PathBuf },
    /// Write the empty template-data-warga.csv
    Template {
        #[arg(short, long, default_value = ".")]
        out: PathBuf,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let config = TomlConfig::load_or_default();

    init_tracing(&config)?;

    info!(
        "Starting warga-admin v{} [{}] built {} ({})",
        env!("CARGO_PKG_VERSION"),
        env!("GIT_HASH"),
        env!("BUILD_TIMESTAMP"),
        env!("BUILD_PROFILE")
    );

    let pool = if args.ephemeral {
        info!("Using in-memory database (nothing is persisted)");
        init_memory_database().await?
    } else {
        let root_folder = RootFolderResolver::new("warga-admin")
            .with_cli_arg(args.root_folder.clone())
            .with_toml_config(&config)
            .resolve();

        let initializer = RootFolderInitializer::new(root_folder);
        initializer
            .ensure_directory_exists()
            .context("Failed to initialize root folder")?;

        let db_path = initializer.database_path();
        info!("Database: {}", db_path.display());
        init_database(&db_path).await?
    };

    let event_bus = EventBus::new(config.event_bus_capacity);
    let state = AppState::new(pool, event_bus, config.auth.allowed_federated_domains.clone());

    match args.command.unwrap_or(Command::Serve) {
        Command::Serve => {
            let port = args.port.unwrap_or(config.server.port);
            serve(state, &config.server.bind_address, port).await
        }
        Command::Export { out } => {
            let path = state.transfer.export_to(&DirectorySink::new(out)).await?;
            println!("{}", path.display());
            Ok(())
        }
        Command::Template { out } => {
            let file = state.transfer.download_template()?;
            let path = DirectorySink::new(out).deliver(&file).await?;
            println!("{}", path.display());
            Ok(())
        }
        Command::Import { file } => {
            let bytes = tokio::fs::read(&file)
                .await
                .with_context(|| format!("Failed to read {}", file.display()))?;
            let report = state.transfer.import_from(&bytes).await?;
            println!("{}", serde_json::to_string_pretty(&report)?);
            Ok(())
        }
    }
}

/// Log level from the config file; `RUST_LOG` takes precedence
fn init_tracing(config: &TomlConfig) -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.logging.level));

    match &config.logging.file {
        Some(path) => {
            let file = std::fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .with_context(|| format!("Failed to open log file {}", path.display()))?;
            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_ansi(false)
                .with_writer(std::sync::Mutex::new(file))
                .init();
        }
        None => {
            tracing_subscriber::fmt().with_env_filter(filter).init();
        }
    }
    Ok(())
}

async fn serve(state: AppState, bind_address: &str, port: u16) -> Result<()> {
    let app = build_router(state);

    let addr: SocketAddr = format!("{}:{}", bind_address, port)
        .parse()
        .with_context(|| format!("Invalid bind address {}:{}", bind_address, port))?;

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .context("Failed to bind to address")?;
    info!("warga-admin listening on http://{}", addr);
    info!("Health check: http://{}/health", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    info!("Server shutdown complete");
    Ok(())
}

/// Resolves on Ctrl+C or SIGTERM
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
        _ = ctrl_c => info!("Received Ctrl+C, shutting down"),
        _ = terminate => info!("Received terminate signal, shutting down"),
    }
}

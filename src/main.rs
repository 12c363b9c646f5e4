//! First-run setup server.
//!
//! # Architecture Overview
//!
//! ```text
//!     Browser                 ┌──────────────────────────────────────────────┐
//!     ───────────────────────▶│  setup listener (lifecycle::server)          │
//!     POST /finalize          │    → http::server → setup::orchestrator      │
//!                             │        → store (config, seeds, modules)      │
//!     ◀───────────────────────│    ← {ok, redirectPath, redirectPort}        │
//!                             └───────────────────┬──────────────────────────┘
//!                                                 │ handoff: flush → stop → settle
//!                                                 ▼
//!                             ┌──────────────────────────────────────────────┐
//!                             │  main server (kernel) on the same port       │
//!                             └──────────────────────────────────────────────┘
//! ```

use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;

use setup_orchestrator::config::validation::validate_config;
use setup_orchestrator::config::{load_or_default, ConfigError};
use setup_orchestrator::lifecycle::{run_handoff, shutdown_signal, ServerStatus};
use setup_orchestrator::observability::{logging, MetricsTelemetry};
use setup_orchestrator::setup::HostRuntime;
use setup_orchestrator::store::{JsonFileConfigStore, MemoryStore};
use setup_orchestrator::{start_setup, Collaborators, MainServer, SetupContext, SetupStack};

#[derive(Parser)]
#[command(name = "setup-orchestrator")]
#[command(version, about = "First-run setup server", long_about = None)]
struct Cli {
    /// Path to the TOML configuration file
    #[arg(short, long, default_value = "config.toml")]
    config: PathBuf,

    /// Override `listener.port`
    #[arg(short, long)]
    port: Option<u16>,

    /// Override `listener.bind_ip`
    #[arg(short, long)]
    bind: Option<String>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let mut config = load_or_default(&cli.config)?;
    if let Some(port) = cli.port {
        config.listener.port = port;
    }
    if let Some(bind) = cli.bind {
        config.listener.bind_ip = bind;
    }
    validate_config(&config).map_err(ConfigError::Validation)?;

    logging::init(&config.observability);
    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        port = config.listener.port,
        bind_ip = %config.listener.bind_ip,
        data_path = %config.setup.data_path.display(),
        "setup-orchestrator starting"
    );

    let store = Arc::new(MemoryStore::new());
    let config_path = config.setup.data_path.join("config.json");
    let ctx = Arc::new(SetupContext::new(config));
    let collaborators = Collaborators {
        config_store: Arc::new(JsonFileConfigStore::new(config_path)),
        seed_store: store.clone(),
        modules: store,
        importer: None,
        runtime: Arc::new(HostRuntime),
        telemetry: Arc::new(MetricsTelemetry::new(ctx.telemetry_client_id())),
    };

    let SetupStack {
        server,
        handoff,
        timing,
        ..
    } = match start_setup(ctx.clone(), collaborators).await {
        Ok(stack) => stack,
        Err(e) if e.is_fatal_bind() => {
            tracing::error!(error = %e, "Cannot start setup listener");
            std::process::exit(1);
        }
        Err(e) => return Err(e.into()),
    };

    let main_server = MainServer::new(ctx);
    let handoff = run_handoff(server.clone(), handoff, timing, &main_server);
    tokio::pin!(handoff);

    loop {
        tokio::select! {
            result = &mut handoff => {
                result?;
                break;
            }
            _ = shutdown_signal() => {
                if server.status() == ServerStatus::Running {
                    tracing::info!("Setup abandoned");
                    server.stop().await?;
                    break;
                }
                main_server.shutdown();
            }
            message = server.failure() => {
                return Err(message.into());
            }
        }
    }

    tracing::info!("Shutdown complete");
    Ok(())
}

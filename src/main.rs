//! api-scaffold
//!
//! A minimal web-API scaffold: an Axum HTTP server and an optional
//! coordination-service client, both driven by the lifecycle coordinator.
//!
//! # Lifecycle
//!
//! ```text
//!   config ──▶ resources ──▶ Coordinator::start_all ──▶ Running
//!                                                        │
//!                    SIGINT / SIGTERM / failure ─────────┘
//!                                                        ▼
//!        registry drain (FIFO) ──▶ close resources ──▶ Stopped ──▶ exit code
//! ```

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Instant;

use clap::Parser;

use api_scaffold::config::{self, AppConfig};
use api_scaffold::coordination::CoordinationOptions;
use api_scaffold::http::HttpServerOptions;
use api_scaffold::lifecycle::Coordinator;
use api_scaffold::observability::{logging, metrics};

#[derive(Parser)]
#[command(name = "api-scaffold", version)]
#[command(about = "Minimal web-API scaffold with coordinated startup and shutdown", long_about = None)]
struct Cli {
    /// Path to a TOML configuration file. Defaults are used when omitted.
    #[arg(short, long)]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => match config::load_config(path) {
            Ok(config) => config,
            Err(e) => {
                eprintln!("Error: failed to load {}: {}", path.display(), e);
                return ExitCode::FAILURE;
            }
        },
        None => AppConfig::default(),
    };

    if let Err(e) = logging::init_logging(&config.observability) {
        eprintln!("Error: failed to initialize logging: {}", e);
        return ExitCode::FAILURE;
    }

    tracing::info!(version = env!("CARGO_PKG_VERSION"), "api-scaffold starting");
    tracing::info!(
        bind_address = %config.server.bind_address,
        coordination = config.coordination.enabled,
        shutdown_timeout = ?config.lifecycle.shutdown_timeout(),
        "Configuration loaded"
    );

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse() {
            Ok(addr) => {
                if let Err(e) = metrics::init_metrics(addr) {
                    tracing::error!(error = %e, "Failed to start metrics exporter");
                }
            }
            Err(e) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                error = %e,
                "Failed to parse metrics address"
            ),
        }
    }

    let mut coordinator = Coordinator::new(config.lifecycle.clone());

    if config.coordination.enabled {
        let client = CoordinationOptions::from_config(&config.coordination).build();
        coordinator.add_resource(Arc::new(client));
    }
    let server = HttpServerOptions::from_config(&config.server).build();
    coordinator.add_resource(Arc::new(server));

    let booted = Instant::now();
    let registered = coordinator
        .registry()
        .register("report-uptime", move |_ctx| async move {
            tracing::info!(uptime = ?booted.elapsed(), "Process uptime");
            Ok(())
        });
    if let Err(e) = registered {
        tracing::warn!(error = %e, "Shutdown action not registered");
    }

    match coordinator.run().await {
        Ok(()) => {
            tracing::info!("Shutdown complete");
            ExitCode::SUCCESS
        }
        Err(e) => {
            tracing::error!(error = %e, "Exiting with failure");
            ExitCode::FAILURE
        }
    }
}

//! OS signal handling.
//!
//! # Responsibilities
//! - Listen for SIGTERM and SIGINT (Ctrl+C)
//! - Translate them into a `TerminationReason`
//!
//! # Design Decisions
//! - Uses Tokio's signal handling (async-safe)
//! - A handler that cannot be installed is logged and never fires; the
//!   programmatic trigger still works

use crate::lifecycle::shutdown::TerminationReason;

/// Wait for SIGINT or SIGTERM.
pub async fn wait_for_termination() -> TerminationReason {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
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
            tracing::info!("Received Ctrl+C, initiating shutdown");
            TerminationReason::Interrupt
        }
        _ = terminate => {
            tracing::info!("Received SIGTERM, initiating shutdown");
            TerminationReason::Terminate
        }
    }
}

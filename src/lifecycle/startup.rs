//! Startup orchestration.
//!
//! # Responsibilities
//! - Launch each resource's `start` on its own task
//! - Wait for the resource to report ready, fail, or time out
//! - Forward exits of running resources to the coordinator
//!
//! # Design Decisions
//! - Fail fast: the first resource that does not come up aborts the boot
//! - Resources start in insertion order, each one ready before the next

use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;

use futures_util::FutureExt;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::lifecycle::error::{BootError, ResourceError};
use crate::lifecycle::resource::{self, Resource, StartContext};
use crate::lifecycle::shutdown::Shutdown;
use crate::observability::metrics;

/// A resource whose `start` has returned or panicked after it became ready.
#[derive(Debug)]
pub struct ResourceExit {
    pub name: String,
    pub result: Result<(), ResourceError>,
}

/// A resource that reported ready and whose start task may still be running.
pub struct StartedResource {
    pub resource: Arc<dyn Resource>,
    pub task: JoinHandle<()>,
}

impl StartedResource {
    pub fn name(&self) -> &str {
        self.resource.name()
    }
}

/// Spawn `resource.start` and wait until it is ready.
///
/// Once ready, a later return from `start` is sent on `exits`. A trigger on
/// `shutdown` while waiting aborts the start task.
pub async fn start_resource(
    resource: Arc<dyn Resource>,
    exits: mpsc::UnboundedSender<ResourceExit>,
    timeout: Duration,
    shutdown: &Shutdown,
) -> Result<StartedResource, BootError> {
    let name = resource.name().to_string();
    let (ctx, ready) = StartContext::new();
    let slot = ctx.slot();

    tracing::info!(resource = %name, "Starting resource");

    let task_resource = resource.clone();
    let task = tokio::spawn(async move {
        let result = AssertUnwindSafe(task_resource.start(ctx))
            .catch_unwind()
            .await
            .unwrap_or_else(|payload| {
                Err(ResourceError::Panicked {
                    message: panic_message(&*payload),
                })
            });
        if let Some(result) = resource::settle(&slot, result) {
            let _ = exits.send(ResourceExit {
                name: task_resource.name().to_string(),
                result,
            });
        }
    });

    let outcome = tokio::select! {
        outcome = tokio::time::timeout(timeout, ready.wait()) => outcome,
        reason = shutdown.triggered() => {
            task.abort();
            metrics::record_resource_start("interrupted");
            tracing::warn!(resource = %name, reason = %reason, "Startup interrupted by shutdown");
            return Err(BootError::Interrupted { name, reason });
        }
    };

    match outcome {
        Ok(Some(Ok(()))) => {
            metrics::record_resource_start("ready");
            tracing::info!(resource = %name, "Resource ready");
            Ok(StartedResource { resource, task })
        }
        Ok(Some(Err(source))) => {
            metrics::record_resource_start("failed");
            tracing::error!(resource = %name, error = %source, "Resource failed to start");
            Err(BootError::Start { name, source })
        }
        Ok(None) => {
            metrics::record_resource_start("failed");
            tracing::error!(resource = %name, "Resource start task aborted");
            Err(BootError::Aborted { name })
        }
        Err(_) => {
            task.abort();
            metrics::record_resource_start("timed_out");
            tracing::error!(resource = %name, timeout = ?timeout, "Resource did not become ready in time");
            Err(BootError::Timeout { name, timeout })
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

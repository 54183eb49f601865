//! Process lifecycle coordinator.
//!
//! Starts every resource, waits for a termination trigger, then drains the
//! shutdown registry and closes the resources under one bounded deadline.

use std::fmt;
use std::sync::Arc;

use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;

use crate::config::LifecycleConfig;
use crate::lifecycle::error::{
    AggregateError, BootError, LifecycleError, ResourceError, ShutdownActionError,
};
use crate::lifecycle::registry::ShutdownRegistry;
use crate::lifecycle::resource::{Resource, ShutdownContext};
use crate::lifecycle::shutdown::{Shutdown, TerminationReason};
use crate::lifecycle::signals;
use crate::lifecycle::startup::{self, ResourceExit, StartedResource};

/// Lifecycle state of the process.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleState {
    NotStarted,
    Running,
    ShuttingDown,
    Stopped,
}

impl fmt::Display for LifecycleState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            LifecycleState::NotStarted => "not_started",
            LifecycleState::Running => "running",
            LifecycleState::ShuttingDown => "shutting_down",
            LifecycleState::Stopped => "stopped",
        };
        f.write_str(s)
    }
}

/// Drives resources through start, wait, and shutdown.
///
/// Owns the [`ShutdownRegistry`]; components receive it through
/// [`Coordinator::registry`] rather than through global state.
pub struct Coordinator {
    config: LifecycleConfig,
    registry: Arc<ShutdownRegistry>,
    shutdown: Shutdown,
    state: watch::Sender<LifecycleState>,
    pending: Vec<Arc<dyn Resource>>,
    started: Vec<StartedResource>,
    exits_tx: mpsc::UnboundedSender<ResourceExit>,
    exits_rx: mpsc::UnboundedReceiver<ResourceExit>,
    failure: Option<(String, ResourceError)>,
    boot_failure: Option<String>,
    signal_task: Option<JoinHandle<()>>,
}

impl Coordinator {
    pub fn new(config: LifecycleConfig) -> Self {
        let (state, _) = watch::channel(LifecycleState::NotStarted);
        let (exits_tx, exits_rx) = mpsc::unbounded_channel();
        Self {
            config,
            registry: Arc::new(ShutdownRegistry::new()),
            shutdown: Shutdown::new(),
            state,
            pending: Vec::new(),
            started: Vec::new(),
            exits_tx,
            exits_rx,
            failure: None,
            boot_failure: None,
            signal_task: None,
        }
    }

    /// The shutdown registry to inject into components.
    pub fn registry(&self) -> Arc<ShutdownRegistry> {
        self.registry.clone()
    }

    /// Handle for requesting shutdown programmatically.
    pub fn handle(&self) -> Shutdown {
        self.shutdown.clone()
    }

    pub fn state(&self) -> LifecycleState {
        *self.state.borrow()
    }

    pub fn subscribe_state(&self) -> watch::Receiver<LifecycleState> {
        self.state.subscribe()
    }

    /// Add a resource to be started by [`Coordinator::start_all`].
    pub fn add_resource(&mut self, resource: Arc<dyn Resource>) -> &mut Self {
        tracing::debug!(resource = %resource.name(), "Resource added");
        self.pending.push(resource);
        self
    }

    /// Start every added resource in order, each on its own task.
    ///
    /// Stops at the first resource that fails to become ready, or when
    /// shutdown is triggered mid-boot; resources after it are never started.
    /// Already started resources keep running until [`Coordinator::shutdown`].
    /// Once a boot has failed, later calls return [`BootError::AlreadyFailed`].
    pub async fn start_all(&mut self) -> Result<(), BootError> {
        if let Some(name) = &self.boot_failure {
            return Err(BootError::AlreadyFailed { name: name.clone() });
        }
        if self.state() != LifecycleState::NotStarted {
            tracing::warn!(state = %self.state(), "start_all called twice, ignoring");
            return Ok(());
        }

        self.listen_for_signals();

        let pending = std::mem::take(&mut self.pending);
        let total = pending.len();
        tracing::info!(resources = total, "Starting resources");

        for (index, resource) in pending.into_iter().enumerate() {
            let result = match self.shutdown.reason() {
                Some(reason) => Err(BootError::Interrupted {
                    name: resource.name().to_string(),
                    reason,
                }),
                None => {
                    startup::start_resource(
                        resource,
                        self.exits_tx.clone(),
                        self.config.startup_timeout(),
                        &self.shutdown,
                    )
                    .await
                }
            };

            match result {
                Ok(started) => self.started.push(started),
                Err(e) => {
                    tracing::error!(
                        error = %e,
                        not_started = total - index - 1,
                        "Boot aborted"
                    );
                    self.boot_failure = Some(e.resource().to_string());
                    return Err(e);
                }
            }
        }

        self.state.send_replace(LifecycleState::Running);
        tracing::info!(resources = total, "All resources started");
        Ok(())
    }

    /// Wait for an OS signal, a programmatic trigger, or a resource failure.
    ///
    /// Once a reason is recorded every later call returns it immediately.
    pub async fn await_shutdown_signal(&mut self) -> TerminationReason {
        self.listen_for_signals();

        let shutdown = self.shutdown.clone();
        let triggered = shutdown.triggered();
        tokio::pin!(triggered);

        let reason = loop {
            tokio::select! {
                reason = &mut triggered => break reason,
                Some(exit) = self.exits_rx.recv() => self.on_exit(exit),
            }
        };

        // Failures queued behind the trigger are still runtime failures.
        while let Ok(exit) = self.exits_rx.try_recv() {
            self.on_exit(exit);
        }
        reason
    }

    /// Drain the registry, then close every started resource.
    ///
    /// Bounded by the configured shutdown timeout. A second call is a no-op.
    pub async fn shutdown(&mut self, reason: TerminationReason) -> Result<(), AggregateError> {
        let current = self.state();
        if matches!(current, LifecycleState::ShuttingDown | LifecycleState::Stopped) {
            tracing::warn!(state = %current, "Shutdown already in progress, ignoring");
            return Ok(());
        }

        self.shutdown.trigger(reason.clone());
        self.state.send_replace(LifecycleState::ShuttingDown);

        let timeout = self.config.shutdown_timeout();
        let ctx = ShutdownContext::with_timeout(timeout);
        tracing::info!(
            reason = %reason,
            timeout = ?timeout,
            actions = self.registry.len(),
            resources = self.started.len(),
            "Shutting down"
        );

        let mut errors = AggregateError::new();
        if let Err(e) = self.registry.drain(ctx.deadline()).await {
            errors.extend(e);
        }

        for started in std::mem::take(&mut self.started) {
            close_resource(started, ctx, &mut errors).await;
        }

        while let Ok(exit) = self.exits_rx.try_recv() {
            match exit.result {
                Ok(()) => {}
                Err(e) if e.is_closed() => {}
                Err(e) => {
                    tracing::error!(resource = %exit.name, error = %e, "Resource stopped with error during shutdown");
                    errors.push(ShutdownActionError::Failed {
                        name: exit.name,
                        source: Box::new(e),
                    });
                }
            }
        }

        self.state.send_replace(LifecycleState::Stopped);
        if errors.is_empty() {
            tracing::info!("Shutdown complete");
        } else {
            tracing::error!(failures = errors.len(), error = %errors, "Shutdown completed with failures");
        }
        errors.into_result()
    }

    /// Boot, wait for a trigger, shut down.
    pub async fn run(mut self) -> Result<(), LifecycleError> {
        if let Err(boot) = self.start_all().await {
            let reason = self
                .shutdown
                .reason()
                .unwrap_or_else(|| TerminationReason::ResourceFailed(boot.resource().to_string()));
            if let Err(errors) = self.shutdown(reason).await {
                tracing::error!(error = %errors, "Cleanup after boot failure incomplete");
            }
            return Err(LifecycleError::Boot(boot));
        }

        let reason = self.await_shutdown_signal().await;
        let outcome = self.shutdown(reason).await;

        if let Some((name, source)) = self.failure.take() {
            return Err(LifecycleError::ResourceFailed { name, source });
        }
        outcome.map_err(LifecycleError::from)
    }

    /// Spawn the OS signal listener once, if enabled.
    fn listen_for_signals(&mut self) {
        if !self.config.handle_signals || self.signal_task.is_some() {
            return;
        }
        let shutdown = self.shutdown.clone();
        self.signal_task = Some(tokio::spawn(async move {
            let reason = signals::wait_for_termination().await;
            shutdown.trigger(reason);
        }));
    }

    fn on_exit(&mut self, exit: ResourceExit) {
        match exit.result {
            Ok(()) => {
                tracing::info!(resource = %exit.name, "Resource start returned");
            }
            Err(e) if e.is_closed() => {
                tracing::info!(resource = %exit.name, "Resource closed");
            }
            Err(e) => {
                tracing::error!(resource = %exit.name, error = %e, "Resource failed while running");
                self.shutdown
                    .trigger(TerminationReason::ResourceFailed(exit.name.clone()));
                if self.failure.is_none() {
                    self.failure = Some((exit.name, e));
                }
            }
        }
    }
}

/// Close one resource and wait for its start task, both within `ctx`.
async fn close_resource(
    started: StartedResource,
    ctx: ShutdownContext,
    errors: &mut AggregateError,
) {
    let name = started.name().to_string();
    let StartedResource { resource, mut task } = started;

    if ctx.is_expired() {
        task.abort();
        tracing::warn!(resource = %name, "Close skipped: deadline elapsed");
        errors.push(ShutdownActionError::Skipped { name });
        return;
    }

    tracing::debug!(resource = %name, "Closing resource");
    match ctx.timeout(resource.close(ctx)).await {
        Ok(Ok(())) => {}
        Ok(Err(e)) if e.is_closed() => {}
        Ok(Err(e)) => {
            tracing::error!(resource = %name, error = %e, "Resource close failed");
            errors.push(ShutdownActionError::Failed {
                name,
                source: Box::new(e),
            });
            task.abort();
            return;
        }
        Err(_) => {
            tracing::error!(resource = %name, "Resource close exceeded the shutdown deadline");
            errors.push(ShutdownActionError::TimedOut { name });
            task.abort();
            return;
        }
    }

    match ctx.timeout(&mut task).await {
        Ok(Ok(())) => tracing::info!(resource = %name, "Resource stopped"),
        Ok(Err(join_err)) if join_err.is_panic() => {
            tracing::error!(resource = %name, "Resource start task panicked");
            errors.push(ShutdownActionError::Failed {
                name,
                source: join_err.to_string().into(),
            });
        }
        Ok(Err(_)) => {}
        Err(_) => {
            task.abort();
            tracing::error!(resource = %name, "Resource did not stop before the shutdown deadline");
            errors.push(ShutdownActionError::TimedOut { name });
        }
    }
}

impl Drop for Coordinator {
    fn drop(&mut self) {
        if let Some(task) = self.signal_task.take() {
            task.abort();
        }
    }
}

impl fmt::Debug for Coordinator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Coordinator")
            .field("state", &self.state())
            .field("pending", &self.pending.len())
            .field("started", &self.started.len())
            .field("registry", &self.registry)
            .finish()
    }
}

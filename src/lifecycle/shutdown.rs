//! Shutdown trigger shared by the coordinator and anything that may stop the process.

use std::fmt;
use std::sync::Arc;

use tokio::sync::watch;

/// Why the process is shutting down.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TerminationReason {
    /// SIGINT / Ctrl+C.
    Interrupt,
    /// SIGTERM.
    Terminate,
    /// Explicit call to [`Shutdown::trigger`].
    Requested,
    /// A running resource failed.
    ResourceFailed(String),
}

impl fmt::Display for TerminationReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TerminationReason::Interrupt => write!(f, "interrupt signal"),
            TerminationReason::Terminate => write!(f, "terminate signal"),
            TerminationReason::Requested => write!(f, "shutdown requested"),
            TerminationReason::ResourceFailed(name) => write!(f, "resource `{}` failed", name),
        }
    }
}

/// One-shot shutdown trigger.
///
/// The first trigger wins and is remembered; later triggers are ignored.
/// Subscribers that arrive after the trigger still observe it.
#[derive(Clone)]
pub struct Shutdown {
    tx: Arc<watch::Sender<Option<TerminationReason>>>,
}

impl Shutdown {
    /// Create a new, untriggered shutdown handle.
    pub fn new() -> Self {
        let (tx, _) = watch::channel(None);
        Self { tx: Arc::new(tx) }
    }

    /// Subscribe to the shutdown signal.
    pub fn subscribe(&self) -> watch::Receiver<Option<TerminationReason>> {
        self.tx.subscribe()
    }

    /// Trigger shutdown. Returns `false` if it had already been triggered.
    pub fn trigger(&self, reason: TerminationReason) -> bool {
        let mut reason = Some(reason);
        let accepted = self.tx.send_if_modified(|current| {
            if current.is_some() {
                return false;
            }
            *current = reason.take();
            true
        });

        match (accepted, reason) {
            (true, _) => tracing::info!(reason = %self.reason_or_requested(), "Shutdown triggered"),
            (false, Some(ignored)) => tracing::debug!(reason = %ignored, "Shutdown already triggered, ignoring"),
            (false, None) => {}
        }
        accepted
    }

    pub fn is_triggered(&self) -> bool {
        self.tx.borrow().is_some()
    }

    /// The reason recorded by the first trigger, if any.
    pub fn reason(&self) -> Option<TerminationReason> {
        self.tx.borrow().clone()
    }

    /// Wait until shutdown is triggered and return the reason.
    pub async fn triggered(&self) -> TerminationReason {
        let mut rx = self.tx.subscribe();
        let reason = match rx.wait_for(Option::is_some).await {
            Ok(reason) => reason.clone(),
            // The sender lives in `self`, so the channel cannot close here.
            Err(_) => None,
        };
        reason.unwrap_or(TerminationReason::Requested)
    }

    /// Get the number of active subscribers.
    pub fn receiver_count(&self) -> usize {
        self.tx.receiver_count()
    }

    fn reason_or_requested(&self) -> TerminationReason {
        self.reason().unwrap_or(TerminationReason::Requested)
    }
}

impl Default for Shutdown {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Shutdown {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Shutdown")
            .field("reason", &*self.tx.borrow())
            .finish()
    }
}

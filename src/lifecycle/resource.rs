//! The start/close contract shared by every long-lived resource.
//!
//! # Responsibilities
//! - Define the `Resource` trait the coordinator drives
//! - Carry readiness out of a blocking `start` (`StartContext`)
//! - Carry the shutdown deadline into `close` and shutdown actions (`ShutdownContext`)

use std::future::Future;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use futures_util::future::BoxFuture;
use tokio::sync::oneshot;
use tokio::time::{error::Elapsed, Instant};

use crate::lifecycle::error::ResourceError;

/// A long-lived component with an explicit start/stop lifecycle.
///
/// `start` may block for the whole operational lifetime of the resource
/// (a listener) or return as soon as it is connected (a client). The
/// coordinator always runs it on its own task and calls `close` at most once,
/// only after the resource has become ready.
pub trait Resource: Send + Sync {
    /// Stable name used in logs and error reports.
    fn name(&self) -> &str;

    /// Begin serving or connecting.
    ///
    /// Call [`StartContext::ready`] once operational. A stop caused by `close`
    /// must come back as `Ok(())` or [`ResourceError::Closed`].
    fn start(&self, ctx: StartContext) -> BoxFuture<'_, Result<(), ResourceError>>;

    /// Request graceful termination, giving up once `ctx`'s deadline passes.
    fn close(&self, ctx: ShutdownContext) -> BoxFuture<'_, Result<(), ResourceError>>;
}

type ReadySlot = Arc<Mutex<Option<oneshot::Sender<Result<(), ResourceError>>>>>;

/// Handed to [`Resource::start`]; used to report that the resource is up.
pub struct StartContext {
    slot: ReadySlot,
}

impl StartContext {
    pub(crate) fn new() -> (Self, ReadyWatch) {
        let (tx, rx) = oneshot::channel();
        let slot = Arc::new(Mutex::new(Some(tx)));
        (Self { slot }, ReadyWatch { rx })
    }

    /// Report that the resource is operational. Later calls are ignored.
    pub fn ready(&self) {
        if let Some(tx) = take(&self.slot) {
            let _ = tx.send(Ok(()));
        }
    }

    /// Whether `ready` has already been reported.
    pub fn is_ready(&self) -> bool {
        self.slot
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .is_none()
    }

    pub(crate) fn slot(&self) -> ReadySlot {
        self.slot.clone()
    }
}

/// Coordinator side of a [`StartContext`].
pub(crate) struct ReadyWatch {
    rx: oneshot::Receiver<Result<(), ResourceError>>,
}

impl ReadyWatch {
    /// Wait until the resource reports ready or its `start` returns.
    ///
    /// `None` means the start task ended without reporting anything.
    pub(crate) async fn wait(self) -> Option<Result<(), ResourceError>> {
        self.rx.await.ok()
    }
}

/// Settle readiness with the outcome of `start` if `ready` was never called.
///
/// Returns the result back when readiness had already been reported, so the
/// caller can forward it as a runtime exit instead.
pub(crate) fn settle(
    slot: &ReadySlot,
    result: Result<(), ResourceError>,
) -> Option<Result<(), ResourceError>> {
    match take(slot) {
        Some(tx) => {
            let _ = tx.send(result);
            None
        }
        None => Some(result),
    }
}

fn take(slot: &ReadySlot) -> Option<oneshot::Sender<Result<(), ResourceError>>> {
    slot.lock().unwrap_or_else(PoisonError::into_inner).take()
}

/// Deadline carried through shutdown.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ShutdownContext {
    deadline: Instant,
}

impl ShutdownContext {
    pub fn new(deadline: Instant) -> Self {
        Self { deadline }
    }

    /// A context whose deadline is `timeout` from now.
    pub fn with_timeout(timeout: Duration) -> Self {
        Self::new(Instant::now() + timeout)
    }

    pub fn deadline(&self) -> Instant {
        self.deadline
    }

    /// Time left before the deadline, zero once it has passed.
    pub fn remaining(&self) -> Duration {
        self.deadline.saturating_duration_since(Instant::now())
    }

    pub fn is_expired(&self) -> bool {
        Instant::now() >= self.deadline
    }

    /// Run `fut` until it completes or the deadline passes.
    pub async fn timeout<F: Future>(&self, fut: F) -> Result<F::Output, Elapsed> {
        tokio::time::timeout_at(self.deadline, fut).await
    }
}

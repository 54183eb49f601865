//! Ordered registry of shutdown actions.
//!
//! # Design Decisions
//! - Actions run in registration order (FIFO), one at a time
//! - Every failure is collected; a failing action never stops the next one
//! - The registry is single-use: the first drain closes it for good
//! - A shared deadline bounds the whole drain; the running action is aborted
//!   when it passes and the rest are reported as skipped

use std::future::Future;
use std::sync::{Mutex, PoisonError};
use std::time::Instant as StdInstant;

use futures_util::future::BoxFuture;
use tokio::time::Instant;

use crate::lifecycle::error::{
    ActionError, AggregateError, RegistrationError, ShutdownActionError,
};
use crate::lifecycle::resource::ShutdownContext;
use crate::observability::metrics;

type BoxedAction =
    Box<dyn FnOnce(ShutdownContext) -> BoxFuture<'static, Result<(), ActionError>> + Send>;

struct Entry {
    name: String,
    action: BoxedAction,
}

#[derive(Default)]
struct Inner {
    entries: Vec<Entry>,
    closed: bool,
}

/// Registry of shutdown actions, drained once by the coordinator.
///
/// Shared via `Arc` with every component that needs to clean up on exit.
#[derive(Default)]
pub struct ShutdownRegistry {
    inner: Mutex<Inner>,
}

impl ShutdownRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a named shutdown action.
    ///
    /// Fails once a drain has begun; the action is then dropped without running.
    pub fn register<F, Fut>(
        &self,
        name: impl Into<String>,
        action: F,
    ) -> Result<(), RegistrationError>
    where
        F: FnOnce(ShutdownContext) -> Fut + Send + 'static,
        Fut: Future<Output = Result<(), ActionError>> + Send + 'static,
    {
        let name = name.into();
        let mut inner = self.lock();
        if inner.closed {
            tracing::warn!(action = %name, "Registration rejected: registry already drained");
            return Err(RegistrationError::RegistryClosed { name });
        }

        tracing::debug!(action = %name, position = inner.entries.len(), "Shutdown action registered");
        inner.entries.push(Entry {
            name,
            action: Box::new(move |ctx| Box::pin(action(ctx))),
        });
        Ok(())
    }

    /// Number of pending actions.
    pub fn len(&self) -> usize {
        self.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Whether a drain has begun.
    pub fn is_closed(&self) -> bool {
        self.lock().closed
    }

    /// Run every registered action in order under `deadline`.
    ///
    /// Closes the registry first, so registrations racing with the drain are
    /// rejected. Calling this again is a no-op.
    pub async fn drain(&self, deadline: Instant) -> Result<(), AggregateError> {
        let entries = {
            let mut inner = self.lock();
            if inner.closed {
                tracing::warn!("Shutdown registry already drained, ignoring");
                return Ok(());
            }
            inner.closed = true;
            std::mem::take(&mut inner.entries)
        };

        let total = entries.len();
        let started = StdInstant::now();
        let ctx = ShutdownContext::new(deadline);
        let mut errors = AggregateError::new();
        let mut entries = entries.into_iter();

        tracing::info!(actions = total, remaining_ms = ctx.remaining().as_millis() as u64, "Draining shutdown registry");

        for Entry { name, action } in entries.by_ref() {
            if ctx.is_expired() {
                metrics::record_shutdown_action("skipped");
                tracing::warn!(action = %name, "Shutdown action skipped: deadline elapsed");
                errors.push(ShutdownActionError::Skipped { name });
                break;
            }

            let action_started = StdInstant::now();
            let mut handle = tokio::spawn(action(ctx));
            match ctx.timeout(&mut handle).await {
                Ok(Ok(Ok(()))) => {
                    metrics::record_shutdown_action("ok");
                    tracing::debug!(action = %name, elapsed = ?action_started.elapsed(), "Shutdown action completed");
                }
                Ok(Ok(Err(e))) => {
                    metrics::record_shutdown_action("failed");
                    tracing::error!(action = %name, error = %e, "Shutdown action failed");
                    errors.push(ShutdownActionError::Failed { name, source: e });
                }
                Ok(Err(join_err)) => {
                    metrics::record_shutdown_action("failed");
                    tracing::error!(action = %name, error = %join_err, "Shutdown action panicked");
                    errors.push(ShutdownActionError::Failed {
                        name,
                        source: join_err.to_string().into(),
                    });
                }
                Err(_) => {
                    handle.abort();
                    metrics::record_shutdown_action("timed_out");
                    tracing::error!(action = %name, "Shutdown action exceeded the shutdown deadline");
                    errors.push(ShutdownActionError::TimedOut { name });
                }
            }
        }

        for Entry { name, .. } in entries {
            metrics::record_shutdown_action("skipped");
            tracing::warn!(action = %name, "Shutdown action skipped: deadline elapsed");
            errors.push(ShutdownActionError::Skipped { name });
        }

        metrics::record_shutdown_duration(started.elapsed());
        tracing::info!(
            actions = total,
            failures = errors.len(),
            elapsed = ?started.elapsed(),
            "Shutdown registry drained"
        );

        errors.into_result()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl std::fmt::Debug for ShutdownRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let inner = self.lock();
        f.debug_struct("ShutdownRegistry")
            .field("pending", &inner.entries.len())
            .field("closed", &inner.closed)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    type Log = Arc<Mutex<Vec<String>>>;

    fn recorder(registry: &ShutdownRegistry, log: &Log, name: &str) {
        let log = log.clone();
        let entry = name.to_string();
        registry
            .register(name, move |_ctx| async move {
                log.lock().unwrap().push(entry);
                Ok(())
            })
            .unwrap();
    }

    fn deadline(ms: u64) -> Instant {
        Instant::now() + Duration::from_millis(ms)
    }

    #[tokio::test]
    async fn drain_runs_actions_in_registration_order() {
        let registry = ShutdownRegistry::new();
        let log: Log = Arc::default();
        for name in ["A", "B", "C"] {
            recorder(&registry, &log, name);
        }
        assert_eq!(registry.len(), 3);

        registry.drain(deadline(1000)).await.unwrap();

        assert_eq!(*log.lock().unwrap(), vec!["A", "B", "C"]);
        assert!(registry.is_empty());
        assert!(registry.is_closed());
    }

    #[tokio::test]
    async fn order_holds_for_many_actions() {
        let registry = ShutdownRegistry::new();
        let log: Log = Arc::default();
        let names: Vec<String> = (0..50).map(|i| format!("action-{i}")).collect();
        for name in &names {
            recorder(&registry, &log, name);
        }

        registry.drain(deadline(1000)).await.unwrap();

        assert_eq!(*log.lock().unwrap(), names);
    }

    #[tokio::test]
    async fn failing_action_does_not_stop_the_rest() {
        let registry = ShutdownRegistry::new();
        let log: Log = Arc::default();

        let a_log = log.clone();
        registry
            .register("A", move |_| async move {
                a_log.lock().unwrap().push("A".into());
                Err::<(), ActionError>("x".into())
            })
            .unwrap();
        recorder(&registry, &log, "B");

        let err = registry.drain(deadline(1000)).await.unwrap_err();

        assert_eq!(*log.lock().unwrap(), vec!["A", "B"]);
        assert_eq!(err.len(), 1);
        match &err.errors()[0] {
            ShutdownActionError::Failed { name, source } => {
                assert_eq!(name, "A");
                assert_eq!(source.to_string(), "x");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn aggregate_contains_exactly_the_failures() {
        let registry = ShutdownRegistry::new();
        let runs = Arc::new(AtomicUsize::new(0));
        for i in 0..6 {
            let runs = runs.clone();
            registry
                .register(format!("a{i}"), move |_| async move {
                    runs.fetch_add(1, Ordering::SeqCst);
                    if i % 2 == 0 {
                        Err(format!("boom {i}").into())
                    } else {
                        Ok(())
                    }
                })
                .unwrap();
        }

        let err = registry.drain(deadline(1000)).await.unwrap_err();

        assert_eq!(runs.load(Ordering::SeqCst), 6);
        let failed: Vec<&str> = err.errors().iter().map(|e| e.name()).collect();
        assert_eq!(failed, vec!["a0", "a2", "a4"]);
    }

    #[tokio::test]
    async fn second_drain_is_a_noop() {
        let registry = ShutdownRegistry::new();
        let runs = Arc::new(AtomicUsize::new(0));
        let counter = runs.clone();
        registry
            .register("once", move |_| async move {
                counter.fetch_add(1, Ordering::SeqCst);
                Ok(())
            })
            .unwrap();

        registry.drain(deadline(1000)).await.unwrap();
        registry.drain(deadline(1000)).await.unwrap();

        assert_eq!(runs.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn register_after_drain_is_rejected() {
        let registry = ShutdownRegistry::new();
        let log: Log = Arc::default();
        recorder(&registry, &log, "A");

        registry.drain(deadline(1000)).await.unwrap();

        let late_log = log.clone();
        let result = registry.register("late", move |_| async move {
            late_log.lock().unwrap().push("late".into());
            Ok(())
        });
        assert_eq!(
            result,
            Err(RegistrationError::RegistryClosed { name: "late".into() })
        );

        registry.drain(deadline(1000)).await.unwrap();
        assert_eq!(*log.lock().unwrap(), vec!["A"]);
    }

    #[tokio::test]
    async fn registration_during_drain_is_rejected() {
        let registry = Arc::new(ShutdownRegistry::new());
        let log: Log = Arc::default();

        let inner_registry = registry.clone();
        let inner_log = log.clone();
        registry
            .register("registers-late", move |_| async move {
                let late_log = inner_log.clone();
                let outcome = inner_registry.register("late", move |_| async move {
                    late_log.lock().unwrap().push("late".into());
                    Ok(())
                });
                assert!(outcome.is_err());
                inner_log.lock().unwrap().push("registers-late".into());
                Ok(())
            })
            .unwrap();

        registry.drain(deadline(1000)).await.unwrap();
        assert_eq!(*log.lock().unwrap(), vec!["registers-late"]);
    }

    #[tokio::test]
    async fn slow_action_times_out_and_rest_are_skipped() {
        let registry = ShutdownRegistry::new();
        let log: Log = Arc::default();
        recorder(&registry, &log, "fast");
        registry
            .register("slow", |_| async {
                tokio::time::sleep(Duration::from_secs(30)).await;
                Ok(())
            })
            .unwrap();
        recorder(&registry, &log, "after");

        let started = StdInstant::now();
        let err = registry.drain(deadline(100)).await.unwrap_err();

        assert!(started.elapsed() < Duration::from_millis(1000));
        assert_eq!(*log.lock().unwrap(), vec!["fast"]);
        assert_eq!(err.len(), 2);
        assert!(matches!(&err.errors()[0], ShutdownActionError::TimedOut { name } if name == "slow"));
        assert!(matches!(&err.errors()[1], ShutdownActionError::Skipped { name } if name == "after"));
        assert!(err.errors().iter().all(ShutdownActionError::is_deadline));
    }

    #[tokio::test]
    async fn expired_deadline_skips_everything() {
        let registry = ShutdownRegistry::new();
        let log: Log = Arc::default();
        recorder(&registry, &log, "A");
        recorder(&registry, &log, "B");

        let err = registry.drain(Instant::now()).await.unwrap_err();

        assert!(log.lock().unwrap().is_empty());
        let skipped: Vec<&str> = err.errors().iter().map(|e| e.name()).collect();
        assert_eq!(skipped, vec!["A", "B"]);
    }

    #[tokio::test]
    async fn panicking_action_is_reported_as_failure() {
        let registry = ShutdownRegistry::new();
        let log: Log = Arc::default();
        let explode = true;
        registry
            .register("panics", move |_| async move {
                assert!(!explode, "bad cleanup");
                Ok(())
            })
            .unwrap();
        recorder(&registry, &log, "after");

        let err = registry.drain(deadline(1000)).await.unwrap_err();

        assert_eq!(*log.lock().unwrap(), vec!["after"]);
        assert!(matches!(&err.errors()[0], ShutdownActionError::Failed { name, .. } if name == "panics"));
    }

    #[test]
    fn concurrent_registration_keeps_every_action() {
        let registry = Arc::new(ShutdownRegistry::new());
        let threads: Vec<_> = (0..8)
            .map(|t| {
                let registry = registry.clone();
                std::thread::spawn(move || {
                    for i in 0..25 {
                        registry
                            .register(format!("t{t}-{i}"), |_| async { Ok(()) })
                            .unwrap();
                    }
                })
            })
            .collect();
        for t in threads {
            t.join().unwrap();
        }

        assert_eq!(registry.len(), 200);
    }
}

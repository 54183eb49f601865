//! Error types for the lifecycle subsystem.

use std::fmt;
use std::time::Duration;

use thiserror::Error;

use crate::lifecycle::shutdown::TerminationReason;

/// Error returned by a shutdown action.
pub type ActionError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Errors reported by a [`Resource`](crate::lifecycle::Resource).
#[derive(Debug, Error)]
pub enum ResourceError {
    /// The resource was stopped because `close` was requested.
    ///
    /// Treated as success by the coordinator.
    #[error("resource closed by request")]
    Closed,

    /// Failed to bind a listening socket.
    #[error("failed to bind {address}: {source}")]
    Bind {
        address: String,
        #[source]
        source: std::io::Error,
    },

    /// No endpoint could be reached.
    #[error("failed to connect to any of [{}]: {reason}", .endpoints.join(", "))]
    Connect { endpoints: Vec<String>, reason: String },

    /// `close` did not finish before the shutdown deadline.
    #[error("close did not complete before the shutdown deadline")]
    CloseTimedOut,

    /// `start` panicked.
    #[error("start panicked: {message}")]
    Panicked { message: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl ResourceError {
    /// Whether this error represents a requested stop rather than a failure.
    pub fn is_closed(&self) -> bool {
        matches!(self, ResourceError::Closed)
    }
}

/// A resource failed to come up.
#[derive(Debug, Error)]
pub enum BootError {
    #[error("resource `{name}` failed to start: {source}")]
    Start {
        name: String,
        #[source]
        source: ResourceError,
    },

    /// The start task ended without reporting a result.
    #[error("resource `{name}` start task aborted before becoming ready")]
    Aborted { name: String },

    #[error("resource `{name}` not ready after {timeout:?}")]
    Timeout { name: String, timeout: Duration },

    /// Shutdown was triggered before the resource became ready.
    #[error("startup of `{name}` interrupted: {reason}")]
    Interrupted {
        name: String,
        reason: TerminationReason,
    },

    /// An earlier boot attempt already failed on this resource.
    #[error("boot already failed on resource `{name}`")]
    AlreadyFailed { name: String },
}

impl BootError {
    /// Name of the resource that failed.
    pub fn resource(&self) -> &str {
        match self {
            BootError::Start { name, .. }
            | BootError::Aborted { name }
            | BootError::Timeout { name, .. }
            | BootError::Interrupted { name, .. }
            | BootError::AlreadyFailed { name } => name,
        }
    }
}

/// Registration of a shutdown action was refused.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum RegistrationError {
    #[error("shutdown registry is closed; `{name}` was not registered")]
    RegistryClosed { name: String },
}

/// A single shutdown action (or resource close) that did not complete cleanly.
#[derive(Debug, Error)]
pub enum ShutdownActionError {
    #[error("shutdown action `{name}` failed: {source}")]
    Failed {
        name: String,
        #[source]
        source: ActionError,
    },

    /// The action was running when the deadline elapsed and was aborted.
    #[error("shutdown action `{name}` timed out")]
    TimedOut { name: String },

    /// The deadline elapsed before the action could start.
    #[error("shutdown action `{name}` skipped: shutdown deadline elapsed")]
    Skipped { name: String },
}

impl ShutdownActionError {
    pub fn name(&self) -> &str {
        match self {
            ShutdownActionError::Failed { name, .. }
            | ShutdownActionError::TimedOut { name }
            | ShutdownActionError::Skipped { name } => name,
        }
    }

    /// True for failures caused by the shutdown deadline.
    pub fn is_deadline(&self) -> bool {
        matches!(
            self,
            ShutdownActionError::TimedOut { .. } | ShutdownActionError::Skipped { .. }
        )
    }
}

/// Zero or more shutdown failures collected during a drain.
///
/// An empty aggregate means the shutdown was clean.
#[derive(Debug, Default)]
pub struct AggregateError {
    errors: Vec<ShutdownActionError>,
}

impl AggregateError {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, error: ShutdownActionError) {
        self.errors.push(error);
    }

    pub fn extend(&mut self, other: AggregateError) {
        self.errors.extend(other.errors);
    }

    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn len(&self) -> usize {
        self.errors.len()
    }

    pub fn errors(&self) -> &[ShutdownActionError] {
        &self.errors
    }

    /// `Ok(())` when empty, otherwise `Err(self)`.
    pub fn into_result(self) -> Result<(), AggregateError> {
        if self.is_empty() {
            Ok(())
        } else {
            Err(self)
        }
    }
}

impl fmt::Display for AggregateError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} shutdown action(s) failed", self.errors.len())?;
        for (i, err) in self.errors.iter().enumerate() {
            let sep = if i == 0 { ": " } else { "; " };
            write!(f, "{}{}", sep, err)?;
        }
        Ok(())
    }
}

impl std::error::Error for AggregateError {}

impl From<ShutdownActionError> for AggregateError {
    fn from(error: ShutdownActionError) -> Self {
        Self { errors: vec![error] }
    }
}

/// Final outcome of a coordinated run, converted into an exit code by `main`.
#[derive(Debug, Error)]
pub enum LifecycleError {
    #[error("boot failed: {0}")]
    Boot(#[from] BootError),

    #[error("resource `{name}` failed while running: {source}")]
    ResourceFailed {
        name: String,
        #[source]
        source: ResourceError,
    },

    #[error("shutdown incomplete: {0}")]
    Shutdown(#[from] AggregateError),
}

//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Startup (startup.rs, coordinator.rs):
//!     Resources added → start each on its own task → wait for ready → Running
//!
//! Trigger (signals.rs, shutdown.rs):
//!     SIGTERM/SIGINT, Shutdown::trigger, or a failed resource → one reason, recorded once
//!
//! Shutdown (registry.rs, coordinator.rs):
//!     Drain registry (FIFO) → close resources (start order) → Stopped
//! ```
//!
//! # Design Decisions
//! - Fail fast: any resource that does not come up aborts the boot
//! - One deadline bounds the whole shutdown; overruns are reported, not waited on
//! - Shutdown failures are collected into one `AggregateError`

pub mod coordinator;
pub mod error;
pub mod registry;
pub mod resource;
pub mod shutdown;
pub mod signals;
pub mod startup;

pub use coordinator::{Coordinator, LifecycleState};
pub use error::{
    ActionError, AggregateError, BootError, LifecycleError, RegistrationError, ResourceError,
    ShutdownActionError,
};
pub use registry::ShutdownRegistry;
pub use resource::{Resource, ShutdownContext, StartContext};
pub use shutdown::{Shutdown, TerminationReason};

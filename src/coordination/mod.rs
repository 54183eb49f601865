//! Coordination-service integration.
//!
//! # Data Flow
//! ```text
//! CoordinationConfig
//!     → CoordinationOptions (builder)
//!     → CoordinationClient (Resource)
//!     → coordinator: start = connect, close = disconnect
//! ```

pub mod client;

pub use client::{CoordinationClient, CoordinationOptions};

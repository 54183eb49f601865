//! Minimal web-API scaffold with a process lifecycle coordinator.

pub mod config;
pub mod coordination;
pub mod http;
pub mod lifecycle;
pub mod observability;

pub use config::AppConfig;
pub use coordination::{CoordinationClient, CoordinationOptions};
pub use http::{HttpServer, HttpServerOptions};
pub use lifecycle::{Coordinator, Resource, Shutdown, ShutdownRegistry};

//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (Axum setup, middleware, graceful shutdown)
//!     → handlers.rs (route handlers)
//!     → response.rs (fixed envelope, status code table)
//!     → Send to client
//! ```

pub mod handlers;
pub mod response;
pub mod server;

pub use response::{ApiResponse, ResponseCode};
pub use server::{HttpServer, HttpServerOptions};

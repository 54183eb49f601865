//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Create Axum Router with the built-in and application handlers
//! - Wire up middleware (tracing, timeout, body limit, request ID)
//! - Bind the listener and serve until closed
//! - Expose the server as a lifecycle `Resource`

use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::OnceLock;
use std::time::Duration;

use axum::{routing::get, Router};
use futures_util::future::BoxFuture;
use tokio::net::TcpListener;
use tokio::sync::watch;
use tower::ServiceBuilder;
use tower_http::{
    limit::RequestBodyLimitLayer,
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};

use crate::config::ServerConfig;
use crate::http::handlers;
use crate::lifecycle::{Resource, ResourceError, ShutdownContext, StartContext};

/// Options for building an [`HttpServer`].
#[derive(Debug, Clone)]
pub struct HttpServerOptions {
    name: String,
    address: String,
    request_timeout: Duration,
    max_body_bytes: usize,
}

impl HttpServerOptions {
    pub fn new(address: impl Into<String>) -> Self {
        let defaults = ServerConfig::default();
        Self {
            name: "http-server".to_string(),
            address: address.into(),
            request_timeout: Duration::from_secs(defaults.request_timeout_secs),
            max_body_bytes: defaults.max_body_bytes,
        }
    }

    pub fn from_config(config: &ServerConfig) -> Self {
        Self::new(config.bind_address.clone())
            .request_timeout(Duration::from_secs(config.request_timeout_secs))
            .max_body_bytes(config.max_body_bytes)
    }

    /// Resource name used in logs and shutdown reports.
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    pub fn max_body_bytes(mut self, limit: usize) -> Self {
        self.max_body_bytes = limit;
        self
    }

    pub fn address(&self) -> &str {
        &self.address
    }

    /// Build a server with only the built-in routes.
    pub fn build(self) -> HttpServer {
        self.build_with(Router::new())
    }

    /// Build a server serving `routes` next to the built-in ones.
    pub fn build_with(self, routes: Router) -> HttpServer {
        HttpServer::new(self, routes)
    }
}

/// HTTP server run as a lifecycle resource.
pub struct HttpServer {
    options: HttpServerOptions,
    router: Router,
    close_tx: watch::Sender<bool>,
    stopped_tx: watch::Sender<bool>,
    serving: AtomicBool,
    local_addr: OnceLock<SocketAddr>,
}

impl HttpServer {
    fn new(options: HttpServerOptions, routes: Router) -> Self {
        let router = Self::build_router(&options, routes);
        let (close_tx, _) = watch::channel(false);
        let (stopped_tx, _) = watch::channel(false);
        Self {
            options,
            router,
            close_tx,
            stopped_tx,
            serving: AtomicBool::new(false),
            local_addr: OnceLock::new(),
        }
    }

    /// Build the Axum router with all middleware layers.
    #[allow(deprecated)]
    fn build_router(options: &HttpServerOptions, routes: Router) -> Router {
        Router::new()
            .route("/ping", get(handlers::ping))
            .route("/health", get(handlers::health))
            .merge(routes)
            .fallback(handlers::not_found)
            .layer(
                ServiceBuilder::new()
                    .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
                    .layer(TraceLayer::new_for_http())
                    .layer(PropagateRequestIdLayer::x_request_id())
                    .layer(RequestBodyLimitLayer::new(options.max_body_bytes))
                    // Innermost: its response body must be `Default`.
                    .layer(TimeoutLayer::new(options.request_timeout)),
            )
    }

    /// The bound address, once the listener is up.
    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.local_addr.get().copied()
    }

    /// The router with all layers applied.
    pub fn router(&self) -> Router {
        self.router.clone()
    }

    pub fn options(&self) -> &HttpServerOptions {
        &self.options
    }

    async fn serve(&self, ctx: StartContext) -> Result<(), ResourceError> {
        if *self.close_tx.borrow() {
            return Err(ResourceError::Closed);
        }

        let listener = TcpListener::bind(&self.options.address)
            .await
            .map_err(|source| ResourceError::Bind {
                address: self.options.address.clone(),
                source,
            })?;
        let addr = listener.local_addr()?;
        let _ = self.local_addr.set(addr);
        self.serving.store(true, Ordering::SeqCst);

        tracing::info!(resource = %self.options.name, address = %addr, "HTTP server listening");
        ctx.ready();

        let mut close_rx = self.close_tx.subscribe();
        let app = self
            .router
            .clone()
            .into_make_service_with_connect_info::<SocketAddr>();
        let result = axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                let _ = close_rx.wait_for(|closed| *closed).await;
            })
            .await;

        self.stopped_tx.send_replace(true);
        result?;

        tracing::info!(resource = %self.options.name, "HTTP server stopped");
        Ok(())
    }

    async fn shutdown(&self, ctx: ShutdownContext) -> Result<(), ResourceError> {
        self.close_tx.send_replace(true);
        if !self.serving.load(Ordering::SeqCst) {
            return Ok(());
        }

        tracing::info!(
            resource = %self.options.name,
            remaining = ?ctx.remaining(),
            "HTTP server draining connections"
        );
        let mut stopped = self.stopped_tx.subscribe();
        let stopped_in_time = ctx.timeout(stopped.wait_for(|stopped| *stopped)).await.is_ok();
        if stopped_in_time {
            Ok(())
        } else {
            tracing::warn!(resource = %self.options.name, "HTTP server still draining at deadline");
            Err(ResourceError::CloseTimedOut)
        }
    }
}

impl Resource for HttpServer {
    fn name(&self) -> &str {
        &self.options.name
    }

    fn start(&self, ctx: StartContext) -> BoxFuture<'_, Result<(), ResourceError>> {
        Box::pin(self.serve(ctx))
    }

    fn close(&self, ctx: ShutdownContext) -> BoxFuture<'_, Result<(), ResourceError>> {
        Box::pin(self.shutdown(ctx))
    }
}

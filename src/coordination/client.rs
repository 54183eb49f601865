//! Coordination-service client.
//!
//! # Responsibilities
//! - Dial the configured endpoints in order, keeping the first connection
//! - Hold the connection for the lifetime of the process
//! - Disconnect within the shutdown deadline
//!
//! # Design Decisions
//! - The wire protocol is out of scope; the client only owns the connection
//! - `start` returns as soon as a connection is established

use std::time::Duration;

use futures_util::future::BoxFuture;
use tokio::io::AsyncWriteExt;
use tokio::net::TcpStream;
use tokio::sync::Mutex;

use crate::config::CoordinationConfig;
use crate::lifecycle::{Resource, ResourceError, ShutdownContext, StartContext};

/// Options for building a [`CoordinationClient`].
#[derive(Debug, Clone)]
pub struct CoordinationOptions {
    name: String,
    endpoints: Vec<String>,
    dial_timeout: Duration,
}

impl CoordinationOptions {
    pub fn new() -> Self {
        Self {
            name: "coordination-client".to_string(),
            endpoints: Vec::new(),
            dial_timeout: Duration::from_secs(5),
        }
    }

    pub fn from_config(config: &CoordinationConfig) -> Self {
        Self::new()
            .endpoints(config.endpoints.iter().cloned())
            .dial_timeout(Duration::from_secs(config.dial_timeout_secs))
    }

    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoints.push(endpoint.into());
        self
    }

    pub fn endpoints<I, S>(mut self, endpoints: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.endpoints.extend(endpoints.into_iter().map(Into::into));
        self
    }

    pub fn dial_timeout(mut self, timeout: Duration) -> Self {
        self.dial_timeout = timeout;
        self
    }

    pub fn build(self) -> CoordinationClient {
        CoordinationClient {
            options: self,
            conn: Mutex::new(None),
        }
    }
}

impl Default for CoordinationOptions {
    fn default() -> Self {
        Self::new()
    }
}

struct Connection {
    endpoint: String,
    stream: TcpStream,
}

/// Client connection to the coordination service, run as a lifecycle resource.
pub struct CoordinationClient {
    options: CoordinationOptions,
    conn: Mutex<Option<Connection>>,
}

impl CoordinationClient {
    /// Endpoint of the current connection, if connected.
    pub async fn endpoint(&self) -> Option<String> {
        self.conn.lock().await.as_ref().map(|c| c.endpoint.clone())
    }

    pub async fn is_connected(&self) -> bool {
        self.conn.lock().await.is_some()
    }

    async fn connect(&self, ctx: StartContext) -> Result<(), ResourceError> {
        let mut last_error = String::from("no endpoints configured");

        for endpoint in &self.options.endpoints {
            tracing::debug!(endpoint = %endpoint, timeout = ?self.options.dial_timeout, "Dialing coordination endpoint");
            match tokio::time::timeout(self.options.dial_timeout, TcpStream::connect(endpoint)).await {
                Ok(Ok(stream)) => {
                    tracing::info!(resource = %self.options.name, endpoint = %endpoint, "Coordination client connected");
                    *self.conn.lock().await = Some(Connection {
                        endpoint: endpoint.clone(),
                        stream,
                    });
                    ctx.ready();
                    return Ok(());
                }
                Ok(Err(e)) => {
                    tracing::warn!(endpoint = %endpoint, error = %e, "Coordination endpoint unreachable");
                    last_error = format!("{}: {}", endpoint, e);
                }
                Err(_) => {
                    tracing::warn!(endpoint = %endpoint, "Coordination endpoint dial timed out");
                    last_error = format!("{}: dial timed out", endpoint);
                }
            }
        }

        Err(ResourceError::Connect {
            endpoints: self.options.endpoints.clone(),
            reason: last_error,
        })
    }

    async fn disconnect(&self, ctx: ShutdownContext) -> Result<(), ResourceError> {
        let Some(mut conn) = self.conn.lock().await.take() else {
            return Ok(());
        };

        match ctx.timeout(conn.stream.shutdown()).await {
            Ok(Ok(())) => {
                tracing::info!(resource = %self.options.name, endpoint = %conn.endpoint, "Coordination client disconnected");
                Ok(())
            }
            // The peer may already have gone away; the socket is released either way.
            Ok(Err(e)) if e.kind() == std::io::ErrorKind::NotConnected => Ok(()),
            Ok(Err(e)) => Err(ResourceError::Io(e)),
            Err(_) => Err(ResourceError::CloseTimedOut),
        }
    }
}

impl Resource for CoordinationClient {
    fn name(&self) -> &str {
        &self.options.name
    }

    fn start(&self, ctx: StartContext) -> BoxFuture<'_, Result<(), ResourceError>> {
        Box::pin(self.connect(ctx))
    }

    fn close(&self, ctx: ShutdownContext) -> BoxFuture<'_, Result<(), ResourceError>> {
        Box::pin(self.disconnect(ctx))
    }
}

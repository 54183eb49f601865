//! Shared utilities for integration testing.

use std::net::SocketAddr;
use std::time::Duration;

use tokio::io::AsyncReadExt;
use tokio::net::TcpListener;
use tokio::sync::mpsc;

use api_scaffold::config::LifecycleConfig;

/// Lifecycle settings with short bounds and no OS signal handling.
pub fn lifecycle_config() -> LifecycleConfig {
    LifecycleConfig {
        shutdown_timeout_ms: 2_000,
        startup_timeout_ms: 2_000,
        handle_signals: false,
    }
}

/// Start a stand-in coordination service.
///
/// Every accepted connection is read until EOF; the receiver yields one
/// message per connection the client closed.
pub async fn start_mock_coordination() -> (SocketAddr, mpsc::UnboundedReceiver<()>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let (tx, rx) = mpsc::unbounded_channel();

    tokio::spawn(async move {
        while let Ok((mut socket, _)) = listener.accept().await {
            let tx = tx.clone();
            tokio::spawn(async move {
                let mut buf = [0u8; 256];
                loop {
                    match socket.read(&mut buf).await {
                        Ok(0) | Err(_) => break,
                        Ok(_) => continue,
                    }
                }
                let _ = tx.send(());
            });
        }
    });

    (addr, rx)
}

/// Wait for one disconnect notification, failing the test after a second.
pub async fn expect_disconnect(rx: &mut mpsc::UnboundedReceiver<()>) {
    tokio::time::timeout(Duration::from_secs(1), rx.recv())
        .await
        .expect("coordination client should disconnect")
        .expect("mock coordination service stopped");
}

pub fn http_client() -> reqwest::Client {
    reqwest::Client::builder()
        .pool_max_idle_per_host(0)
        .no_proxy()
        .build()
        .unwrap()
}

//! End-to-end lifecycle tests: real HTTP server, stand-in coordination service.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use api_scaffold::coordination::CoordinationOptions;
use api_scaffold::http::handlers::HealthStatus;
use api_scaffold::http::{ApiResponse, HttpServer, HttpServerOptions};
use api_scaffold::lifecycle::{
    ActionError, BootError, Coordinator, LifecycleError, LifecycleState, ResourceError, Shutdown,
    ShutdownActionError, TerminationReason,
};

mod common;

/// Wait for the server to bind, hit `/ping`, then request shutdown.
fn ping_then_shutdown(server: Arc<HttpServer>, handle: Shutdown) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let addr = loop {
            if let Some(addr) = server.local_addr() {
                break addr;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        };
        let res = common::http_client()
            .get(format!("http://{}/ping", addr))
            .send()
            .await
            .expect("server unreachable");
        assert_eq!(res.status(), 200);
        handle.trigger(TerminationReason::Requested);
    })
}

#[tokio::test]
async fn http_server_serves_until_shutdown() {
    let server = Arc::new(HttpServerOptions::new("127.0.0.1:0").build());
    let mut coordinator = Coordinator::new(common::lifecycle_config());
    coordinator.add_resource(server.clone());

    coordinator.start_all().await.unwrap();
    assert_eq!(coordinator.state(), LifecycleState::Running);

    let addr = server.local_addr().expect("bound once ready");
    let client = common::http_client();

    let res = client.get(format!("http://{}/ping", addr)).send().await.unwrap();
    assert_eq!(res.status(), 200);
    assert!(res.headers().contains_key("x-request-id"));
    let body: ApiResponse<String> = res.json().await.unwrap();
    assert_eq!(
        body,
        ApiResponse {
            code: 200,
            msg: "ok".into(),
            data: Some("pong".into()),
        }
    );

    let health: ApiResponse<HealthStatus> = client
        .get(format!("http://{}/health", addr))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(health.data.unwrap().version, env!("CARGO_PKG_VERSION"));

    let res = client.get(format!("http://{}/nope", addr)).send().await.unwrap();
    assert_eq!(res.status(), 404);

    coordinator.handle().trigger(TerminationReason::Requested);
    let reason = coordinator.await_shutdown_signal().await;
    assert_eq!(reason, TerminationReason::Requested);
    coordinator.shutdown(reason).await.unwrap();
    assert_eq!(coordinator.state(), LifecycleState::Stopped);

    assert!(client.get(format!("http://{}/ping", addr)).send().await.is_err());
}

#[tokio::test]
async fn full_run_drains_registry_and_disconnects() {
    let (coord_addr, mut disconnects) = common::start_mock_coordination().await;
    let coord = Arc::new(
        CoordinationOptions::new()
            .endpoint(coord_addr.to_string())
            .dial_timeout(Duration::from_millis(500))
            .build(),
    );
    let server = Arc::new(HttpServerOptions::new("127.0.0.1:0").build());

    let mut coordinator = Coordinator::new(common::lifecycle_config());
    coordinator
        .add_resource(coord.clone())
        .add_resource(server.clone());

    let log: Arc<Mutex<Vec<&'static str>>> = Arc::default();
    let action_log = log.clone();
    coordinator
        .registry()
        .register("flush", move |_| async move {
            action_log.lock().unwrap().push("flush");
            Ok(())
        })
        .unwrap();

    let pinger = ping_then_shutdown(server.clone(), coordinator.handle());

    tokio::time::timeout(Duration::from_secs(5), coordinator.run())
        .await
        .expect("run should finish after trigger")
        .unwrap();
    pinger.await.unwrap();

    assert_eq!(*log.lock().unwrap(), vec!["flush"]);
    common::expect_disconnect(&mut disconnects).await;
    assert!(!coord.is_connected().await);
}

#[tokio::test]
async fn bind_failure_aborts_boot_and_cleans_up() {
    let (coord_addr, mut disconnects) = common::start_mock_coordination().await;
    let taken = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();

    let coord = Arc::new(
        CoordinationOptions::new()
            .endpoint(coord_addr.to_string())
            .build(),
    );
    let server = Arc::new(
        HttpServerOptions::new(taken.local_addr().unwrap().to_string()).build(),
    );

    let mut coordinator = Coordinator::new(common::lifecycle_config());
    coordinator
        .add_resource(coord.clone())
        .add_resource(server.clone());

    let ran = Arc::new(Mutex::new(false));
    let flag = ran.clone();
    coordinator
        .registry()
        .register("cleanup", move |_| async move {
            *flag.lock().unwrap() = true;
            Ok(())
        })
        .unwrap();

    let err = coordinator.run().await.unwrap_err();

    match err {
        LifecycleError::Boot(BootError::Start { name, source }) => {
            assert_eq!(name, "http-server");
            assert!(matches!(source, ResourceError::Bind { .. }));
        }
        other => panic!("unexpected error: {other:?}"),
    }
    assert!(*ran.lock().unwrap());
    common::expect_disconnect(&mut disconnects).await;
}

#[tokio::test]
async fn unreachable_coordination_service_fails_boot() {
    let dead = {
        let l = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        l.local_addr().unwrap().to_string()
    };
    let coord = Arc::new(
        CoordinationOptions::new()
            .endpoint(dead)
            .dial_timeout(Duration::from_millis(200))
            .build(),
    );
    let server = Arc::new(HttpServerOptions::new("127.0.0.1:0").build());

    let mut coordinator = Coordinator::new(common::lifecycle_config());
    coordinator.add_resource(coord).add_resource(server.clone());

    let err = coordinator.run().await.unwrap_err();

    assert!(matches!(
        err,
        LifecycleError::Boot(BootError::Start {
            source: ResourceError::Connect { .. },
            ..
        })
    ));
    assert!(server.local_addr().is_none(), "server must not start after a boot failure");
}

#[tokio::test]
async fn failing_shutdown_action_is_reported_but_server_still_stops() {
    let server = Arc::new(HttpServerOptions::new("127.0.0.1:0").build());
    let mut coordinator = Coordinator::new(common::lifecycle_config());
    coordinator.add_resource(server.clone());
    coordinator
        .registry()
        .register("broken", |_| async { Err::<(), ActionError>("x".into()) })
        .unwrap();

    let pinger = ping_then_shutdown(server.clone(), coordinator.handle());
    let err = coordinator.run().await.unwrap_err();
    pinger.await.unwrap();

    let LifecycleError::Shutdown(agg) = err else {
        panic!("expected aggregate shutdown error");
    };
    assert_eq!(agg.len(), 1);
    match &agg.errors()[0] {
        ShutdownActionError::Failed { name, source } => {
            assert_eq!(name, "broken");
            assert_eq!(source.to_string(), "x");
        }
        other => panic!("unexpected error: {other:?}"),
    }

    let addr = server.local_addr().unwrap();
    assert!(common::http_client()
        .get(format!("http://{}/ping", addr))
        .send()
        .await
        .is_err());
}

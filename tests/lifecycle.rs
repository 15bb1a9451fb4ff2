//! Startup and shutdown lifecycle tests.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use tokio::io::AsyncWriteExt;
use tokio::net::TcpStream;

use http::StatusCode;
use portico::config::PortConfig;
use portico::http::{handler_fn, Response};
use portico::routing::{RouteBinding, RouteRegistry, RouteSpec};
use portico::{LifecycleState, Protocol, Server, StartupError};

mod common;

fn empty_registry() -> Arc<RouteRegistry> {
    Arc::new(RouteRegistry::builder().freeze())
}

#[test]
fn bind_retry_moves_forward_and_preserves_protocols() {
    let occupier = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let taken = occupier.local_addr().unwrap();

    let mut config = common::loopback_config(taken.port());
    config.ports[0].protocols = vec![Protocol::Http, Protocol::Proxy];
    config.server_restart_count = 2;

    let server = Server::new(config, empty_registry(), common::line_codec(), None);
    server.start().unwrap();

    let bound = server.bound_ports();
    assert_eq!(bound.len(), 1);
    assert!(bound[0].address().port() > taken.port());
    assert_eq!(
        bound[0].protocols(),
        &[Protocol::Http, Protocol::Proxy]
            .into_iter()
            .collect::<HashSet<_>>()
    );

    server.stop(Duration::from_secs(1), Duration::from_secs(2));
}

#[test]
fn exhausted_bind_retries_fail_startup() {
    let occupier = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let taken = occupier.local_addr().unwrap();

    let mut config = common::loopback_config(taken.port());
    config.server_restart_count = 0;

    let server = Server::new(config, empty_registry(), common::line_codec(), None);
    let result = server.start();

    assert!(matches!(result, Err(StartupError::Bind(_))));
    assert_eq!(server.state(), LifecycleState::Failed);
    assert!(!server.is_running());
    assert!(server.bound_ports().is_empty());
}

#[test]
fn ephemeral_ports_bind_separately() {
    let mut config = common::loopback_config(0);
    config.ports.push(PortConfig {
        host: "127.0.0.1".to_string(),
        port: 0,
        protocols: vec![Protocol::Https],
    });

    let server = Server::new(config, empty_registry(), common::line_codec(), None);
    server.start().unwrap();

    let bound = server.bound_ports();
    assert_eq!(bound.len(), 2, "port-0 entries never merge");

    server.stop(Duration::from_secs(1), Duration::from_secs(2));
}

#[test]
fn start_while_running_is_rejected() {
    let server = Server::new(
        common::loopback_config(0),
        empty_registry(),
        common::line_codec(),
        None,
    );
    server.start().unwrap();

    assert!(matches!(server.start(), Err(StartupError::AlreadyRunning)));
    assert_eq!(server.state(), LifecycleState::Running);

    server.stop(Duration::from_secs(1), Duration::from_secs(2));
}

#[test]
fn stop_is_idempotent() {
    let server = Server::new(
        common::loopback_config(0),
        empty_registry(),
        common::line_codec(),
        None,
    );
    server.start().unwrap();
    assert_eq!(server.state(), LifecycleState::Running);

    server.stop(Duration::from_secs(1), Duration::from_secs(2));
    assert_eq!(server.state(), LifecycleState::Stopped);
    assert!(!server.is_running());
    assert!(server.bound_ports().is_empty());

    // Second stop observes running == false and changes nothing.
    server.stop(Duration::from_secs(1), Duration::from_secs(2));
    assert_eq!(server.state(), LifecycleState::Stopped);
}

#[test]
fn stop_before_start_is_a_noop() {
    let server = Server::new(
        common::loopback_config(0),
        empty_registry(),
        common::line_codec(),
        None,
    );
    server.stop(Duration::from_secs(1), Duration::from_secs(2));
    assert_eq!(server.state(), LifecycleState::Created);
}

#[test]
fn drain_waits_for_in_flight_request() {
    let registry = RouteRegistry::builder()
        .register(RouteBinding::new(
            RouteSpec::builder().path("/slow").build().unwrap(),
            Arc::new(handler_fn(|_| async {
                tokio::time::sleep(Duration::from_millis(500)).await;
                Response::text(StatusCode::OK, "done")
            })),
        ))
        .freeze();

    let server = Arc::new(Server::new(
        common::loopback_config(0),
        Arc::new(registry),
        common::line_codec(),
        None,
    ));
    server.start().unwrap();
    let addr = server.bound_ports()[0].address();

    let rt = tokio::runtime::Runtime::new().unwrap();
    rt.block_on(async {
        let mut stream = TcpStream::connect(addr).await.unwrap();
        stream.write_all(b"GET /slow||\n").await.unwrap();

        // Give the worker time to start the handler, then stop while the
        // request is in flight.
        tokio::time::sleep(Duration::from_millis(150)).await;
        let stopper = {
            let server = Arc::clone(&server);
            std::thread::spawn(move || {
                server.stop(Duration::from_secs(1), Duration::from_secs(3))
            })
        };

        // The in-flight request completes before the connection closes.
        let mut raw = Vec::new();
        tokio::io::AsyncReadExt::read_to_end(&mut stream, &mut raw)
            .await
            .unwrap();
        let line = String::from_utf8_lossy(&raw);
        assert!(line.starts_with("200|"), "expected a response, got {line:?}");

        stopper.join().unwrap();
    });

    assert_eq!(server.state(), LifecycleState::Stopped);
    assert_eq!(server.admission().active_count(), 0);
}

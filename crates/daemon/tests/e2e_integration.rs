//! End-to-end integration tests for RPCS.
//!
//! These tests verify complete flows over a real UDP socket:
//! - Server startup and shutdown
//! - Authenticated dispatch
//! - Rejection of replayed, forged, stale and malformed datagrams

use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use daemon::client;
use daemon::executor::{CommandExecutor, ExecError};
use daemon::registry::CommandRegistry;
use daemon::server::{ProtocolServer, ServerError, ServerSettings, ServerState};
use protocol::{current_timestamp, Authenticator, SharedSecret};
use tokio::net::UdpSocket;

const SECRET: &str = "s3cr3t";

/// Executor that records every invocation instead of running it.
#[derive(Clone, Default)]
struct RecordingExecutor {
    calls: Arc<Mutex<Vec<(String, Vec<String>)>>>,
}

impl RecordingExecutor {
    fn calls(&self) -> Vec<(String, Vec<String>)> {
        self.calls.lock().unwrap().clone()
    }
}

impl CommandExecutor for RecordingExecutor {
    async fn run(&self, program: &str, args: &[String]) -> Result<(), ExecError> {
        self.calls
            .lock()
            .unwrap()
            .push((program.to_string(), args.to_vec()));
        Ok(())
    }
}

fn authenticator() -> Authenticator {
    Authenticator::new(SharedSecret::new(SECRET).unwrap(), 60).unwrap()
}

fn test_settings() -> ServerSettings {
    ServerSettings {
        bind_addr: "127.0.0.1:0".parse().unwrap(),
        max_in_flight: 4,
    }
}

/// Start a server on an ephemeral port.
async fn start_server() -> (
    ProtocolServer<RecordingExecutor>,
    RecordingExecutor,
    SocketAddr,
) {
    let executor = RecordingExecutor::default();
    let registry = Arc::new(CommandRegistry::with_builtin(executor.clone()).unwrap());
    let mut server = ProtocolServer::new(test_settings(), authenticator(), registry);
    let addr = server.start().await.unwrap();
    (server, executor, addr)
}

async fn send_raw(target: SocketAddr, payload: &[u8]) {
    let socket = UdpSocket::bind("127.0.0.1:0").await.unwrap();
    socket.send_to(payload, target).await.unwrap();
}

/// Wait until `executor` has seen `expected` calls, or give up.
async fn wait_for_calls(
    executor: &RecordingExecutor,
    expected: usize,
) -> Vec<(String, Vec<String>)> {
    for _ in 0..100 {
        let calls = executor.calls();
        if calls.len() >= expected {
            return calls;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    executor.calls()
}

/// Give the receive loop time to process anything that is in flight.
async fn settle() {
    tokio::time::sleep(Duration::from_millis(150)).await;
}

// =============================================================================
// Server Lifecycle Tests
// =============================================================================

#[tokio::test]
async fn test_server_starts_and_stops() {
    let (mut server, _, addr) = start_server().await;

    assert_eq!(server.state().await, ServerState::Listening);
    assert_eq!(addr.ip().to_string(), "127.0.0.1");

    server.shutdown().await;
    assert_eq!(server.state().await, ServerState::Stopped);
}

#[tokio::test]
async fn test_shutdown_is_idempotent() {
    let (mut server, _, _) = start_server().await;

    server.shutdown().await;
    server.shutdown().await;
    assert_eq!(server.state().await, ServerState::Stopped);
}

#[tokio::test]
async fn test_bind_conflict_is_reported() {
    let (mut first, _, addr) = start_server().await;

    let registry = Arc::new(CommandRegistry::with_builtin(RecordingExecutor::default()).unwrap());
    let settings = ServerSettings {
        bind_addr: addr,
        max_in_flight: 4,
    };
    let mut second = ProtocolServer::new(settings, authenticator(), registry);

    match second.start().await {
        Err(ServerError::Bind { addr: failed, .. }) => assert_eq!(failed, addr),
        other => panic!("expected bind error, got {:?}", other.map(|_| ())),
    }
    assert_eq!(second.state().await, ServerState::Stopped);

    first.shutdown().await;
}

// =============================================================================
// Dispatch Tests
// =============================================================================

#[tokio::test]
async fn test_valid_request_dispatches_once() {
    let (mut server, executor, addr) = start_server().await;

    let datagram =
        authenticator().encode_signed::<&str>(current_timestamp(), "abc123", "suspend", &[]);
    send_raw(addr, datagram.as_bytes()).await;

    let calls = wait_for_calls(&executor, 1).await;
    assert_eq!(
        calls,
        vec![("systemctl".to_string(), vec!["suspend".to_string()])]
    );

    server.shutdown().await;
}

#[tokio::test]
async fn test_client_send_reaches_server() {
    let (mut server, executor, addr) = start_server().await;

    client::send_command(&authenticator(), addr, "TEST", &["from-client".to_string()])
        .await
        .unwrap();

    let calls = wait_for_calls(&executor, 1).await;
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].0, "echo");
    assert_eq!(calls[0].1, vec!["dev Test working ;)"]);

    server.shutdown().await;
}

#[tokio::test]
async fn test_replayed_datagram_rejected() {
    let (mut server, executor, addr) = start_server().await;

    let datagram =
        authenticator().encode_signed::<&str>(current_timestamp(), "replay-me", "reboot", &[]);
    send_raw(addr, datagram.as_bytes()).await;
    wait_for_calls(&executor, 1).await;

    send_raw(addr, datagram.as_bytes()).await;
    settle().await;

    assert_eq!(executor.calls().len(), 1);
    server.shutdown().await;
}

#[tokio::test]
async fn test_forged_mac_rejected() {
    let (mut server, executor, addr) = start_server().await;

    let other = Authenticator::new(SharedSecret::new("wrong-secret").unwrap(), 60).unwrap();
    let datagram = other.encode_signed::<&str>(current_timestamp(), "n-1", "poweroff", &[]);
    send_raw(addr, datagram.as_bytes()).await;
    settle().await;

    assert!(executor.calls().is_empty());
    // The forged request did not burn the nonce
    assert_eq!(server.remembered_nonces(), 0);

    server.shutdown().await;
}

#[tokio::test]
async fn test_stale_request_rejected() {
    let (mut server, executor, addr) = start_server().await;

    let datagram =
        authenticator().encode_signed::<&str>(current_timestamp() - 3600, "old", "suspend", &[]);
    send_raw(addr, datagram.as_bytes()).await;
    settle().await;

    assert!(executor.calls().is_empty());
    server.shutdown().await;
}

#[tokio::test]
async fn test_malformed_and_junk_ignored() {
    let (mut server, executor, addr) = start_server().await;

    send_raw(addr, b"hello").await;
    send_raw(addr, b"RPCS|1700000000|abc").await;
    send_raw(addr, &[0xff, 0xfe, 0x00]).await;
    settle().await;

    assert!(executor.calls().is_empty());

    // The server keeps working afterwards
    let datagram =
        authenticator().encode_signed::<&str>(current_timestamp(), "after-junk", "suspend", &[]);
    send_raw(addr, datagram.as_bytes()).await;
    assert_eq!(wait_for_calls(&executor, 1).await.len(), 1);

    server.shutdown().await;
}

#[tokio::test]
async fn test_unknown_command_has_no_side_effect() {
    let (mut server, executor, addr) = start_server().await;

    let datagram =
        authenticator().encode_signed::<&str>(current_timestamp(), "n-2", "hibernate", &[]);
    send_raw(addr, datagram.as_bytes()).await;
    settle().await;

    assert!(executor.calls().is_empty());
    server.shutdown().await;
}

#[tokio::test]
async fn test_no_dispatch_after_shutdown() {
    let (mut server, executor, addr) = start_server().await;
    server.shutdown().await;

    let datagram =
        authenticator().encode_signed::<&str>(current_timestamp(), "late", "suspend", &[]);
    send_raw(addr, datagram.as_bytes()).await;
    settle().await;

    assert!(executor.calls().is_empty());
}

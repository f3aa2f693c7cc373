//! End-to-end tests: discovery, pairing, commands, reconnection, and
//! disconnect against a running [`Host`] on loopback.
//!
//! The host is wired exactly as the binary wires it, except that input goes
//! to a [`MockInputBackend`] so the tests can assert on what was injected.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use pcremote_client::{discover, ClientError, RemoteClient};
use pcremote_core::{encode, Command, DerivedKeys, InputCommand, SharedSecret, SpecialKey};
use pcremote_host::application::control_input::InputCommandDispatcher;
use pcremote_host::application::host::{Host, HostExit, HostPolicy};
use pcremote_host::application::pairing::create_secret;
use pcremote_host::application::pointer::{spawn_pointer_actor, PointerConfig};
use pcremote_host::application::state::{HostEvent, SessionState};
use pcremote_host::infrastructure::input::{InputAction, MockInputBackend};
use pcremote_host::infrastructure::network::{TcpAcceptor, UdpDiscoveryResponder};
use pcremote_host::infrastructure::power::DisabledPower;
use tokio::sync::mpsc;

const TIMEOUT: Duration = Duration::from_secs(2);

// ── Helpers ───────────────────────────────────────────────────────────────────

struct RunningHost {
    discovery_addr: SocketAddr,
    control_addr: SocketAddr,
    client_keys: DerivedKeys,
    backend: Arc<MockInputBackend>,
    events: mpsc::UnboundedReceiver<HostEvent>,
    task: tokio::task::JoinHandle<HostExit>,
}

fn free_addrs() -> (SocketAddr, SocketAddr) {
    let udp = std::net::UdpSocket::bind("127.0.0.1:0").unwrap();
    let tcp = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    (udp.local_addr().unwrap(), tcp.local_addr().unwrap())
}

fn start_host() -> RunningHost {
    let (discovery_addr, control_addr) = free_addrs();
    let (secret, keys) = create_secret();
    // What the phone ends up with after scanning the QR code.
    let scanned = SharedSecret::from_hex(&secret.to_hex()).unwrap();
    let client_keys = DerivedKeys::derive(&scanned);

    let backend = Arc::new(MockInputBackend::new());
    let pointer = spawn_pointer_actor(backend.clone(), PointerConfig::default());
    let dispatcher = InputCommandDispatcher::new(backend.clone(), pointer, Arc::new(DisabledPower));

    let (mut host, events) = Host::new(
        Box::new(UdpDiscoveryResponder::new(discovery_addr)),
        Box::new(TcpAcceptor::new(control_addr)),
        Box::new(dispatcher),
        keys,
        HostPolicy::default(),
    );
    let task = tokio::spawn(async move { host.run().await.unwrap() });

    RunningHost {
        discovery_addr,
        control_addr,
        client_keys,
        backend,
        events,
        task,
    }
}

async fn discover_with_retry(addr: SocketAddr) -> SocketAddr {
    for _ in 0..20 {
        match discover(addr, Duration::from_millis(200)).await {
            Ok(found) => return found,
            Err(ClientError::Timeout) => continue,
            Err(e) => panic!("unexpected discovery error: {e}"),
        }
    }
    panic!("host never answered discovery on {addr}");
}

async fn connect_and_pair(addr: SocketAddr, keys: &DerivedKeys) -> RemoteClient {
    for _ in 0..100 {
        match RemoteClient::connect(addr, keys.clone()).await {
            Ok(mut client) => {
                client.pair(TIMEOUT).await.unwrap();
                return client;
            }
            Err(ClientError::ConnectFailed { .. }) => {
                tokio::time::sleep(Duration::from_millis(20)).await
            }
            Err(e) => panic!("unexpected connect error: {e}"),
        }
    }
    panic!("host never accepted on {addr}");
}

fn drain(events: &mut mpsc::UnboundedReceiver<HostEvent>) -> Vec<HostEvent> {
    let mut out = Vec::new();
    while let Ok(event) = events.try_recv() {
        out.push(event);
    }
    out
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn test_full_session_with_reconnect_and_disconnect() {
    // Arrange
    let mut host = start_host();

    // Act: discovery
    let found = discover_with_retry(host.discovery_addr).await;
    assert_eq!(found.ip(), host.discovery_addr.ip());

    // Act: first connection
    let mut client = connect_and_pair(host.control_addr, &host.client_keys).await;
    client
        .send_and_ack(&Command::Input(InputCommand::MouseClick), TIMEOUT)
        .await
        .unwrap();
    client
        .send_and_ack(&Command::Input(InputCommand::TypeText("hi".into())), TIMEOUT)
        .await
        .unwrap();
    client.close().await.unwrap();

    // Act: the same keys work again without rediscovery
    let mut client = connect_and_pair(host.control_addr, &host.client_keys).await;
    client
        .send_and_ack(&Command::Input(InputCommand::Key(SpecialKey::Enter)), TIMEOUT)
        .await
        .unwrap();
    client.send_and_ack(&Command::Disconnect, TIMEOUT).await.unwrap();

    // Assert
    let exit = tokio::time::timeout(TIMEOUT, host.task).await.unwrap().unwrap();
    assert_eq!(exit, HostExit::Terminated);
    assert_eq!(
        host.backend.actions(),
        vec![
            InputAction::Click,
            InputAction::TypeText("hi".into()),
            InputAction::PressKey(SpecialKey::Enter),
        ]
    );

    let events = drain(&mut host.events);
    let discoveries = events
        .iter()
        .filter(|e| **e == HostEvent::StateChanged(SessionState::AwaitingDiscovery))
        .count();
    assert_eq!(discoveries, 0, "the host never went back to discovery");
    let connections = events
        .iter()
        .filter(|e| matches!(e, HostEvent::ClientConnected { .. }))
        .count();
    assert_eq!(connections, 2);
}

#[tokio::test]
async fn test_tampered_frame_leaves_the_session_open() {
    // Arrange
    let host = start_host();
    discover_with_retry(host.discovery_addr).await;
    let mut client = connect_and_pair(host.control_addr, &host.client_keys).await;
    let mut tampered: Vec<char> = encode("COMMAND:SHUTDOWN", &host.client_keys)
        .to_line()
        .chars()
        .collect();
    // First ciphertext hex digit, just after the iv and its separator.
    tampered[33] = if tampered[33] == '0' { '1' } else { '0' };
    let tampered: String = tampered.into_iter().collect();

    // Act
    client.send_raw_line(&tampered).await.unwrap();
    let after = client
        .send_and_ack(&Command::Input(InputCommand::MouseClick), TIMEOUT)
        .await;

    // Assert
    assert!(after.is_ok(), "session must survive a tampered frame: {after:?}");

    client.send_and_ack(&Command::Disconnect, TIMEOUT).await.unwrap();
    let exit = tokio::time::timeout(TIMEOUT, host.task).await.unwrap().unwrap();
    assert_eq!(exit, HostExit::Terminated);
    // The tampered shutdown never reached the dispatcher.
    assert_eq!(host.backend.actions(), vec![InputAction::Click]);
}

#[tokio::test]
async fn test_discovery_answers_only_the_first_requester() {
    // Arrange
    let host = start_host();

    // Act
    let first = discover_with_retry(host.discovery_addr).await;
    let second = discover(host.discovery_addr, Duration::from_millis(300)).await;

    // Assert
    assert_eq!(first.ip(), host.discovery_addr.ip());
    assert!(matches!(second, Err(ClientError::Timeout)));
    host.task.abort();
}

#[tokio::test]
async fn test_unknown_command_is_acknowledged_and_ignored() {
    let host = start_host();
    discover_with_retry(host.discovery_addr).await;
    let mut client = connect_and_pair(host.control_addr, &host.client_keys).await;

    client.send_text("COMMAND:FLY_TO_MOON").await.unwrap();
    let ack = client.next_message(TIMEOUT).await.unwrap();

    assert_eq!(ack, "ACK:COMMAND:FLY_TO_MOON");
    assert!(host.backend.actions().is_empty());
    host.task.abort();
}

//! End-to-end integration tests for the netcafe server.
//!
//! These tests start a real server on loopback, connect real TCP clients,
//! and exercise the full path: socket → framing → codec → dispatch → store,
//! plus the command path back out to the client. The beacon is aimed at an
//! unused loopback port so it stays quiet.

use std::time::Duration;

use netcafe_core::{decode_message, encode_message, Message, MessageKind, PcState, PcStatus};
use netcafe_server::{CommandError, Server, ServerConfig, StatusStore};
use serde_json::{json, Map, Value};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;
use tokio::time::timeout;

fn test_config() -> ServerConfig {
    ServerConfig {
        server_port: 0,
        bind_address: "127.0.0.1".to_string(),
        broadcast_address: "127.0.0.1".to_string(),
        broadcast_port: 1,
        broadcast_interval_secs: 3600,
        connection_timeout_secs: 5,
        ..ServerConfig::default()
    }
}

fn object(value: Value) -> Map<String, Value> {
    match value {
        Value::Object(map) => map,
        _ => panic!("expected a JSON object"),
    }
}

async fn write_frame(client: &mut TcpStream, msg: &Message) {
    client
        .write_all(&encode_message(msg).expect("encode"))
        .await
        .expect("write frame");
    client.write_all(b"\n").await.expect("write delimiter");
}

/// Polls the store until `cond` holds, failing the test after one second.
async fn wait_for_store<F: Fn(&StatusStore) -> bool>(store: &StatusStore, cond: F) {
    for _ in 0..100 {
        if cond(store) {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("store did not reach expected state within 1s");
}

#[tokio::test]
async fn test_discover_response_over_the_wire_registers_an_idle_client() {
    let handle = Server::start(test_config()).await.expect("start");

    let mut client = TcpStream::connect(handle.local_addr()).await.expect("connect");
    let msg = Message::with_payload(
        MessageKind::DiscoverResponse,
        object(json!({"pc_name": "PC-007", "mac_address": "AA:BB:CC"})),
        "whatever-the-client-claims",
        "server",
    );
    write_frame(&mut client, &msg).await;

    wait_for_store(handle.store(), |s| s.get("127.0.0.1").is_some()).await;
    let record = handle.store().get("127.0.0.1").unwrap();
    assert_eq!(record.state, PcState::Idle);
    assert_eq!(record.name, "PC-007");
    assert_eq!(record.hardware_id, "AA:BB:CC");
    assert_eq!(record.address, "127.0.0.1", "source is the observed peer, not the claim");

    handle.shutdown().await;
}

#[tokio::test]
async fn test_garbage_then_valid_frame_still_updates_the_store() {
    let handle = Server::start(test_config()).await.expect("start");

    let mut client = TcpStream::connect(handle.local_addr()).await.expect("connect");
    // One byte of garbage terminated as a frame, then a valid report.
    client.write_all(b"\x07\n").await.expect("write garbage");
    let report = Message::with_payload(
        MessageKind::StatusUpdate,
        object(json!({"pc_name": "PC-001", "status": "busy", "current_user": "guest1"})),
        "client",
        "server",
    );
    write_frame(&mut client, &report).await;

    wait_for_store(handle.store(), |s| {
        s.get("127.0.0.1").map(|r| r.state) == Some(PcState::Busy)
    })
    .await;
    assert_eq!(handle.store().get("127.0.0.1").unwrap().current_user, "guest1");

    handle.shutdown().await;
}

#[tokio::test]
async fn test_command_round_trip_to_a_live_client() {
    let handle = Server::start(test_config()).await.expect("start");

    let client = TcpStream::connect(handle.local_addr()).await.expect("connect");
    let (read_half, mut write_half) = client.into_split();
    let mut reader = BufReader::new(read_half);

    // Announce ourselves so the server has a record and the connection map
    // has our handle.
    let announce = Message::with_payload(
        MessageKind::DiscoverResponse,
        object(json!({"pc_name": "PC-002", "mac_address": "DD:EE"})),
        "client",
        "server",
    );
    write_half
        .write_all(&encode_message(&announce).unwrap())
        .await
        .unwrap();
    write_half.write_all(b"\n").await.unwrap();
    wait_for_store(handle.store(), |s| s.get_connection("127.0.0.1").is_some()).await;

    handle.commands().shutdown("127.0.0.1").await.expect("command must deliver");

    let mut line = String::new();
    timeout(Duration::from_secs(1), reader.read_line(&mut line))
        .await
        .expect("client must receive the command")
        .expect("read");
    let received = decode_message(line.trim().as_bytes()).expect("decode");
    assert_eq!(received.kind, MessageKind::Shutdown);
    assert_eq!(received.source, "server");
    assert_eq!(received.target, "127.0.0.1");

    handle.shutdown().await;
}

#[tokio::test]
async fn test_command_to_never_registered_address_fails_without_side_effects() {
    let handle = Server::start(test_config()).await.expect("start");

    let result = handle.commands().request_status("10.0.0.9").await;

    assert!(matches!(result, Err(CommandError::TargetUnreachable { .. })));
    assert!(handle.store().get("10.0.0.9").is_none(), "no record is created");
    assert!(handle.store().list_all().is_empty());

    handle.shutdown().await;
}

#[tokio::test]
async fn test_disconnect_marks_offline_but_keeps_the_record() {
    let handle = Server::start(test_config()).await.expect("start");

    let mut client = TcpStream::connect(handle.local_addr()).await.expect("connect");
    let report = Message::with_payload(
        MessageKind::StatusUpdate,
        object(json!({"pc_name": "PC-003", "status": "busy", "cpu_usage": 42.0})),
        "client",
        "server",
    );
    write_frame(&mut client, &report).await;
    wait_for_store(handle.store(), |s| s.get("127.0.0.1").is_some()).await;

    drop(client);

    wait_for_store(handle.store(), |s| {
        s.get("127.0.0.1").map(|r| r.state) == Some(PcState::Offline)
    })
    .await;
    let record = handle.store().get("127.0.0.1").unwrap();
    assert_eq!(record.name, "PC-003");
    assert_eq!(record.cpu_usage, 42.0, "last metrics survive the disconnect");
    assert!(handle.store().get_connection("127.0.0.1").is_none());

    handle.shutdown().await;
}

#[tokio::test]
async fn test_status_events_surface_online_and_offline_transitions() {
    let mut handle = Server::start(test_config()).await.expect("start");
    let mut events = handle.take_events().expect("events receiver");

    let mut client = TcpStream::connect(handle.local_addr()).await.expect("connect");
    let report = Message::with_payload(
        MessageKind::StatusUpdate,
        object(json!({"pc_name": "PC-004", "status": "busy"})),
        "client",
        "server",
    );
    write_frame(&mut client, &report).await;

    let online = timeout(Duration::from_secs(1), events.recv())
        .await
        .expect("online event")
        .expect("channel open");
    assert_eq!(online.address, "127.0.0.1");
    assert_eq!(online.state, PcState::Busy);

    drop(client);

    let offline = timeout(Duration::from_secs(1), events.recv())
        .await
        .expect("offline event")
        .expect("channel open");
    assert_eq!(offline.state, PcState::Offline);

    handle.shutdown().await;
}

#[tokio::test]
async fn test_concurrent_status_reports_for_distinct_addresses() {
    // Loopback connections all share one peer IP, so exercise the concurrent
    // path the way the workers do: through the dispatch registry.
    use std::sync::Arc;

    let (store, _rx) = StatusStore::new();
    let store = Arc::new(store);
    let registry = Arc::new(netcafe_server::dispatch::DispatchRegistry::with_default_handlers(
        Arc::clone(&store),
    ));

    let mut tasks = Vec::new();
    for i in 1..=2u8 {
        let registry = Arc::clone(&registry);
        tasks.push(tokio::spawn(async move {
            let addr = format!("10.0.0.{i}");
            let report = object(json!({
                "pc_name": format!("PC-00{i}"),
                "status": "busy",
                "current_user": format!("guest{i}"),
            }));
            let msg = Message::with_payload(MessageKind::StatusResponse, report, &addr, "server");
            registry.dispatch(msg, &addr);
        }));
    }
    for task in tasks {
        task.await.expect("dispatch task");
    }

    let all = store.list_all();
    assert_eq!(all.len(), 2);
    assert_eq!(all[0].name, "PC-001");
    assert_eq!(all[0].current_user, "guest1");
    assert_eq!(all[1].name, "PC-002");
    assert_eq!(all[1].current_user, "guest2");
}

#[tokio::test]
async fn test_reconnect_supersedes_and_commands_reach_the_new_connection() {
    let handle = Server::start(test_config()).await.expect("start");

    // First connection registers the address.
    let mut first = TcpStream::connect(handle.local_addr()).await.expect("connect");
    let hello = Message::with_payload(
        MessageKind::DiscoverResponse,
        object(json!({"pc_name": "PC-005", "mac_address": "AA"})),
        "client",
        "server",
    );
    write_frame(&mut first, &hello).await;
    wait_for_store(handle.store(), |s| s.get_connection("127.0.0.1").is_some()).await;

    // Second connection from the same address silently supersedes the first.
    let second = TcpStream::connect(handle.local_addr()).await.expect("connect");
    let (second_read, mut second_write) = second.into_split();
    let mut second_reader = BufReader::new(second_read);
    write_frame_split(&mut second_write, &hello).await;
    tokio::time::sleep(Duration::from_millis(100)).await;

    handle.commands().lock_screen("127.0.0.1").await.expect("command must deliver");

    let mut line = String::new();
    timeout(Duration::from_secs(1), second_reader.read_line(&mut line))
        .await
        .expect("new connection must receive the command")
        .expect("read");
    let received = decode_message(line.trim().as_bytes()).expect("decode");
    assert_eq!(received.kind, MessageKind::LockScreen);

    handle.shutdown().await;
}

async fn write_frame_split(write_half: &mut tokio::net::tcp::OwnedWriteHalf, msg: &Message) {
    write_half
        .write_all(&encode_message(msg).expect("encode"))
        .await
        .expect("write frame");
    write_half.write_all(b"\n").await.expect("write delimiter");
}

#[tokio::test]
async fn test_full_status_report_replaces_discovery_record_wholesale() {
    let handle = Server::start(test_config()).await.expect("start");

    let mut client = TcpStream::connect(handle.local_addr()).await.expect("connect");
    let hello = Message::with_payload(
        MessageKind::DiscoverResponse,
        object(json!({"pc_name": "PC-006", "mac_address": "AA:BB"})),
        "client",
        "server",
    );
    write_frame(&mut client, &hello).await;
    wait_for_store(handle.store(), |s| {
        s.get("127.0.0.1").map(|r| r.state) == Some(PcState::Idle)
    })
    .await;

    let status = PcStatus {
        name: "PC-006".to_string(),
        state: PcState::Busy,
        cpu_usage: 77.0,
        current_user: "guest6".to_string(),
        ..PcStatus::default()
    };
    let report = Message::with_payload(
        MessageKind::StatusResponse,
        status.to_payload(),
        "client",
        "server",
    );
    write_frame(&mut client, &report).await;

    wait_for_store(handle.store(), |s| {
        s.get("127.0.0.1").map(|r| r.state) == Some(PcState::Busy)
    })
    .await;
    let record = handle.store().get("127.0.0.1").unwrap();
    assert_eq!(record.cpu_usage, 77.0);
    assert_eq!(record.current_user, "guest6");
    // hardware_id came only from discovery and the replacement is wholesale.
    assert_eq!(record.hardware_id, "");

    handle.shutdown().await;
}

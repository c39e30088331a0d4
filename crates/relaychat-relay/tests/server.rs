//! Integration tests for the relay server: real sockets, raw WebSocket
//! clients.

use std::sync::Arc;
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use relaychat_relay::{Relay, RelayConfig, RelayServer};
use relaychat_transport::WebSocketConnection;
use tokio_tungstenite::tungstenite::Message;

type ClientWs = tokio_tungstenite::WebSocketStream<
    tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>,
>;

// =========================================================================
// Helpers
// =========================================================================

/// Starts a relay on a random port. Returns its address and the shared
/// relay for registry inspection.
async fn start_relay(config: RelayConfig) -> (String, Arc<Relay<WebSocketConnection>>) {
    let server = RelayServer::builder()
        .config(config)
        .bind("127.0.0.1:0")
        .build()
        .await
        .expect("server should build");
    let addr = server.local_addr().expect("local addr").to_string();
    let relay = server.relay();
    tokio::spawn(server.run());
    (addr, relay)
}

async fn connect(addr: &str) -> ClientWs {
    let (ws, _) = tokio_tungstenite::connect_async(format!("ws://{addr}"))
        .await
        .expect("should connect");
    ws
}

/// Polls until the registry reaches `expected` participants.
async fn wait_for_participants(relay: &Relay<WebSocketConnection>, expected: usize) {
    let waited = tokio::time::timeout(Duration::from_secs(5), async {
        while relay.registry().len() != expected {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await;
    assert!(
        waited.is_ok(),
        "expected {expected} participants, have {}",
        relay.registry().len()
    );
}

async fn next_text(ws: &mut ClientWs) -> String {
    let msg = tokio::time::timeout(Duration::from_secs(2), ws.next())
        .await
        .expect("should receive within timeout")
        .expect("stream should be open")
        .expect("frame should be valid");
    msg.into_text().expect("text frame").as_str().to_owned()
}

async fn assert_silent(ws: &mut ClientWs) {
    let result = tokio::time::timeout(Duration::from_millis(150), ws.next()).await;
    assert!(result.is_err(), "expected no message, got {result:?}");
}

// =========================================================================
// Tests
// =========================================================================

#[tokio::test]
async fn test_message_fans_out_to_everyone_but_sender() {
    let (addr, relay) = start_relay(RelayConfig::default()).await;
    let mut a = connect(&addr).await;
    let mut b = connect(&addr).await;
    let mut c = connect(&addr).await;
    wait_for_participants(&relay, 3).await;

    a.send(Message::Text("hi all".into())).await.unwrap();

    assert_eq!(next_text(&mut b).await, "hi all");
    assert_eq!(next_text(&mut c).await, "hi all");
    assert_silent(&mut a).await;
    assert_eq!(relay.registry().len(), 3);
}

#[tokio::test]
async fn test_headless_mode_sends_system_message() {
    let (addr, relay) = start_relay(RelayConfig {
        system_message: Some("self-test".into()),
        ..RelayConfig::default()
    })
    .await;

    let mut a = connect(&addr).await;
    assert_eq!(next_text(&mut a).await, "self-test");
    let mut b = connect(&addr).await;
    assert_eq!(next_text(&mut b).await, "self-test");
    wait_for_participants(&relay, 2).await;

    a.send(Message::Text("ping".into())).await.unwrap();
    assert_eq!(next_text(&mut b).await, "ping");
    assert_eq!(next_text(&mut a).await, "self-test");
}

#[tokio::test]
async fn test_each_disconnect_removes_exactly_one_entry() {
    let (addr, relay) = start_relay(RelayConfig::default()).await;
    let mut clients = Vec::new();
    for _ in 0..6 {
        clients.push(connect(&addr).await);
    }
    wait_for_participants(&relay, 6).await;

    let mut first = clients.remove(0);
    first.close(None).await.unwrap();
    wait_for_participants(&relay, 5).await;

    // Close the rest concurrently.
    let closers: Vec<_> = clients
        .into_iter()
        .map(|mut ws| tokio::spawn(async move { ws.close(None).await }))
        .collect();
    for closer in closers {
        let _ = closer.await.unwrap();
    }
    wait_for_participants(&relay, 0).await;
}

#[tokio::test]
async fn test_dropped_socket_is_removed() {
    let (addr, relay) = start_relay(RelayConfig::default()).await;
    let a = connect(&addr).await;
    let mut b = connect(&addr).await;
    wait_for_participants(&relay, 2).await;

    // No close frame: just drop the TCP connection.
    drop(a);
    wait_for_participants(&relay, 1).await;

    b.send(Message::Text("anyone?".into())).await.unwrap();
    assert_silent(&mut b).await;
}

#[tokio::test]
async fn test_max_clients_rejects_extra_connection() {
    let (addr, relay) = start_relay(RelayConfig {
        max_clients: Some(1),
        ..RelayConfig::default()
    })
    .await;
    let _a = connect(&addr).await;
    wait_for_participants(&relay, 1).await;

    let mut b = connect(&addr).await;
    let msg = tokio::time::timeout(Duration::from_secs(2), b.next())
        .await
        .expect("server should close the extra connection");
    assert!(matches!(msg, Some(Ok(Message::Close(_))) | None | Some(Err(_))));
    assert_eq!(relay.registry().len(), 1);
}

#[tokio::test]
async fn test_run_until_stops_accepting() {
    let server = RelayServer::builder()
        .bind("127.0.0.1:0")
        .build()
        .await
        .unwrap();
    let addr = server.local_addr().unwrap();
    let (stop_tx, stop_rx) = tokio::sync::oneshot::channel::<()>();
    let running = tokio::spawn(server.run_until(async {
        let _ = stop_rx.await;
    }));

    stop_tx.send(()).unwrap();
    tokio::time::timeout(Duration::from_secs(2), running)
        .await
        .expect("server should stop")
        .unwrap();

    let refused = tokio_tungstenite::connect_async(format!("ws://{addr}")).await;
    assert!(refused.is_err());
}

#[tokio::test]
async fn test_envelopes_are_rewritten_with_announced_name() {
    let (addr, relay) = start_relay(RelayConfig::default()).await;
    let mut a = connect(&addr).await;
    let mut b = connect(&addr).await;
    wait_for_participants(&relay, 2).await;

    a.send(Message::Text(
        r#"{"user":{"name":"alice"},"message":{"text":"null","text_len":4,"info":5}}"#.into(),
    ))
    .await
    .unwrap();
    a.send(Message::Text(
        r#"{"user":{"name":"someone"},"message":{"text":"hey","text_len":3,"info":0}}"#.into(),
    ))
    .await
    .unwrap();

    let got: serde_json::Value = serde_json::from_str(&next_text(&mut b).await).unwrap();
    assert_eq!(got["user"]["name"], "alice");
    assert_eq!(got["message"]["text"], "hey");
    assert_eq!(got["message"]["info"], 0);
}

#[tokio::test]
async fn test_silent_socket_does_not_block_joins() {
    let (addr, relay) = start_relay(RelayConfig::default()).await;

    // TCP only, no upgrade request.
    let _silent = tokio::net::TcpStream::connect(addr.as_str()).await.unwrap();

    let joined = tokio::time::timeout(Duration::from_secs(2), async {
        let a = connect(&addr).await;
        let b = connect(&addr).await;
        (a, b)
    })
    .await
    .expect("clients should join while another socket stalls");
    let (mut a, mut b) = joined;
    wait_for_participants(&relay, 2).await;

    a.send(Message::Text("still relaying".into())).await.unwrap();
    assert_eq!(next_text(&mut b).await, "still relaying");
}

#[tokio::test]
async fn test_stalled_handshake_is_dropped_after_timeout() {
    let (addr, relay) = start_relay(RelayConfig {
        handshake_timeout: Duration::from_millis(100),
        ..RelayConfig::default()
    })
    .await;

    let mut silent = tokio::net::TcpStream::connect(addr.as_str()).await.unwrap();
    let mut buf = [0u8; 16];
    let read = tokio::time::timeout(
        Duration::from_secs(2),
        tokio::io::AsyncReadExt::read(&mut silent, &mut buf),
    )
    .await
    .expect("server should hang up on the silent socket");
    assert!(matches!(read, Ok(0) | Err(_)));
    assert_eq!(relay.registry().len(), 0);
}

#[tokio::test]
async fn test_oversized_message_disconnects_sender_only() {
    let (addr, relay) = start_relay(RelayConfig {
        max_message_size: Some(32),
        ..RelayConfig::default()
    })
    .await;
    let mut a = connect(&addr).await;
    let mut b = connect(&addr).await;
    wait_for_participants(&relay, 2).await;

    a.send(Message::Text("x".repeat(100).into())).await.unwrap();
    wait_for_participants(&relay, 1).await;
    assert_silent(&mut b).await;

    let mut c = connect(&addr).await;
    wait_for_participants(&relay, 2).await;
    b.send(Message::Text("fits".into())).await.unwrap();
    assert_eq!(next_text(&mut c).await, "fits");
}

//! Integration tests for the Livewire server over real WebSocket
//! connections.

use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use livewire::prelude::*;
use livewire_protocol::{Init, LiveApiEvent, LiveApiPayload, MatchStateEnd, Player};
use prost::Message as _;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::Message;

// =========================================================================
// Helpers
// =========================================================================

type ClientWs = tokio_tungstenite::WebSocketStream<
    tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>,
>;

type Events = mpsc::UnboundedReceiver<(String, DecodedEvent)>;

struct TestServer {
    addr: String,
    events: Events,
    stop: oneshot::Sender<()>,
    handle: JoinHandle<Result<(), LivewireError>>,
}

/// Starts a server on a random port.
async fn start_server(format: WireFormat) -> TestServer {
    let (tx, events) = mpsc::unbounded_channel();
    let server = LivewireServerBuilder::new()
        .bind("127.0.0.1:0")
        .format(format)
        .drain_timeout(Duration::from_secs(1))
        .build(move |peer: &str, event: DecodedEvent| {
            let _ = tx.send((peer.to_string(), event));
        })
        .await
        .expect("server should build");

    let addr = server
        .local_addr()
        .expect("should have local addr")
        .to_string();

    let (stop, stopped) = oneshot::channel::<()>();
    let handle = tokio::spawn(server.run_until(async move {
        let _ = stopped.await;
    }));

    TestServer {
        addr,
        events,
        stop,
        handle,
    }
}

async fn connect(addr: &str) -> ClientWs {
    let (ws, _) = tokio_tungstenite::connect_async(format!("ws://{addr}"))
        .await
        .expect("should connect");
    ws
}

/// Reads the next text frame, skipping control frames.
async fn recv_text(ws: &mut ClientWs) -> String {
    loop {
        let msg = tokio::time::timeout(Duration::from_secs(2), ws.next())
            .await
            .expect("timed out waiting for a frame")
            .expect("stream ended")
            .expect("read failed");
        match msg {
            Message::Text(text) => return text.to_string(),
            Message::Ping(_) | Message::Pong(_) => continue,
            other => panic!("expected a text frame, got {other:?}"),
        }
    }
}

/// Connects and consumes the client's own arrival notice, returning the
/// label the server knows it by.
async fn join(addr: &str) -> (ClientWs, String) {
    let mut ws = connect(addr).await;
    let notice = recv_text(&mut ws).await;
    let label = notice
        .strip_suffix(" connected")
        .unwrap_or_else(|| panic!("unexpected first frame {notice:?}"))
        .to_string();
    (ws, label)
}

async fn next_event(events: &mut Events) -> (String, DecodedEvent) {
    tokio::time::timeout(Duration::from_secs(2), events.recv())
        .await
        .expect("timed out waiting for an event")
        .expect("sink channel closed")
}

fn envelope(payload: &impl LiveApiPayload) -> Message {
    let event = LiveApiEvent {
        event_size: 0,
        game_message: Some(payload.to_any()),
    };
    Message::binary(event.encode_to_vec())
}

// =========================================================================
// Notices
// =========================================================================

#[tokio::test]
async fn test_first_frame_is_own_connect_notice() {
    let server = start_server(WireFormat::Json).await;

    let (_ws, label) = join(&server.addr).await;
    assert!(label.starts_with("127.0.0.1:"), "label was {label:?}");

    server.stop.send(()).unwrap();
    server.handle.await.unwrap().unwrap();
}

#[tokio::test]
async fn test_members_hear_arrivals_and_departures() {
    let server = start_server(WireFormat::Json).await;

    let (mut a, _) = join(&server.addr).await;
    let (mut b, b_label) = join(&server.addr).await;
    assert_eq!(recv_text(&mut a).await, format!("{b_label} connected"));

    b.close(None).await.expect("client close");
    assert_eq!(recv_text(&mut a).await, format!("{b_label} disconnected"));

    server.stop.send(()).unwrap();
    server.handle.await.unwrap().unwrap();
}

#[tokio::test]
async fn test_abrupt_disconnect_is_announced() {
    let server = start_server(WireFormat::Json).await;

    let (mut a, _) = join(&server.addr).await;
    let (b, b_label) = join(&server.addr).await;
    assert_eq!(recv_text(&mut a).await, format!("{b_label} connected"));

    // No close handshake: just drop the socket.
    drop(b);
    assert_eq!(recv_text(&mut a).await, format!("{b_label} disconnected"));

    server.stop.send(()).unwrap();
    server.handle.await.unwrap().unwrap();
}

#[tokio::test]
async fn test_silent_tcp_client_does_not_starve_others() {
    let server = start_server(WireFormat::Json).await;

    let _silent = tokio::net::TcpStream::connect(&server.addr).await.unwrap();
    tokio::time::sleep(Duration::from_millis(20)).await;

    let (_ws, label) = tokio::time::timeout(Duration::from_secs(2), join(&server.addr))
        .await
        .expect("a real client should be admitted while another is stuck upgrading");
    assert!(label.starts_with("127.0.0.1:"));

    server.stop.send(()).unwrap();
    server.handle.await.unwrap().unwrap();
}

// =========================================================================
// Dispatch
// =========================================================================

#[tokio::test]
async fn test_json_mode_skips_malformed_text() {
    let mut server = start_server(WireFormat::Json).await;
    let (mut ws, label) = join(&server.addr).await;

    ws.send(Message::text("{not json".to_string())).await.unwrap();
    ws.send(Message::text(r#"{"category":"init","gameVersion":"v1"}"#.to_string()))
        .await
        .unwrap();

    let (peer, event) = next_event(&mut server.events).await;
    assert_eq!(peer, label);
    assert_eq!(
        event,
        DecodedEvent::Json(serde_json::json!({"category": "init", "gameVersion": "v1"}))
    );

    server.stop.send(()).unwrap();
    server.handle.await.unwrap().unwrap();
    assert!(server.events.try_recv().is_err());
}

#[tokio::test]
async fn test_protobuf_mode_skips_bad_envelopes() {
    let mut server = start_server(WireFormat::Protobuf).await;
    let (mut ws, _) = join(&server.addr).await;

    let init = Init {
        category: "init".into(),
        game_version: "v1".into(),
        ..Default::default()
    };
    let end = MatchStateEnd {
        category: "matchStateEnd".into(),
        state: "WinnerDetermined".into(),
        winners: vec![Player {
            name: "Wraith".into(),
            team_id: 2,
            ..Default::default()
        }],
        ..Default::default()
    };

    ws.send(envelope(&init)).await.unwrap();
    ws.send(Message::binary(b"not a protobuf".to_vec())).await.unwrap();
    ws.send(envelope(&end)).await.unwrap();

    let (_, first) = next_event(&mut server.events).await;
    let (_, second) = next_event(&mut server.events).await;
    assert_eq!(first, DecodedEvent::Game(GameMessage::Init(init)));
    assert_eq!(second, DecodedEvent::Game(GameMessage::MatchStateEnd(end)));

    server.stop.send(()).unwrap();
    server.handle.await.unwrap().unwrap();
    assert!(server.events.try_recv().is_err());
}

// =========================================================================
// Shutdown
// =========================================================================

#[tokio::test]
async fn test_shutdown_closes_client_sockets() {
    let server = start_server(WireFormat::Json).await;
    let (mut ws, _) = join(&server.addr).await;

    server.stop.send(()).unwrap();

    // The server initiates the close; reading drives the handshake.
    let closed = tokio::time::timeout(Duration::from_secs(2), async {
        while let Some(Ok(_)) = ws.next().await {}
    })
    .await;
    assert!(closed.is_ok(), "client socket should be closed by the server");

    tokio::time::timeout(Duration::from_secs(3), server.handle)
        .await
        .expect("server should stop")
        .unwrap()
        .unwrap();
}

//! End-to-end test of the live results channel over a real socket

use futures::{SinkExt, StreamExt};
use livepoll_api::{serve, ApiState};
use livepoll_core::{AdmissionPolicy, BroadcastHub, MemoryStore, PollService};
use serde_json::{json, Value};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::sync::oneshot;
use tokio_tungstenite::{connect_async, tungstenite::Message, MaybeTlsStream, WebSocketStream};

type Socket = WebSocketStream<MaybeTlsStream<TcpStream>>;

async fn start() -> (SocketAddr, oneshot::Sender<()>, tokio::task::JoinHandle<()>) {
    let service = PollService::new(
        Arc::new(MemoryStore::new()),
        AdmissionPolicy::default(),
        Arc::new(BroadcastHub::new()),
    );
    let state = ApiState::new(Arc::new(service));
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let (stop_tx, stop_rx) = oneshot::channel::<()>();

    let server = tokio::spawn(async move {
        serve(listener, state, async {
            let _ = stop_rx.await;
        })
        .await
        .unwrap();
    });
    (addr, stop_tx, server)
}

async fn next_event(socket: &mut Socket) -> Value {
    loop {
        let msg = tokio::time::timeout(Duration::from_secs(5), socket.next())
            .await
            .expect("timed out waiting for event")
            .expect("socket closed")
            .unwrap();
        if let Message::Text(text) = msg {
            return serde_json::from_str(text.as_str()).unwrap();
        }
    }
}

async fn join(socket: &mut Socket, poll_id: &str) {
    let frame = json!({ "event": "join_poll", "data": poll_id }).to_string();
    socket.send(Message::text(frame)).await.unwrap();
    // Frames are handled in order, so the pong proves the join landed
    socket
        .send(Message::text(json!({ "event": "ping" }).to_string()))
        .await
        .unwrap();
    assert_eq!(next_event(socket).await["event"], "pong");
}

#[tokio::test]
async fn test_joined_socket_receives_update() {
    let (addr, stop, server) = start().await;
    let http = reqwest::Client::new();

    let poll: Value = http
        .post(format!("http://{}/api/polls", addr))
        .json(&json!({ "question": "Best color?", "options": ["Red", "Blue"] }))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    let poll_id = poll["id"].as_str().unwrap().to_string();

    let (mut watcher, _) = connect_async(format!("ws://{}/socket", addr)).await.unwrap();
    let (mut bystander, _) = connect_async(format!("ws://{}/socket", addr)).await.unwrap();
    join(&mut watcher, &poll_id).await;
    join(&mut bystander, "some-other-poll").await;

    let response: Value = http
        .post(format!("http://{}/api/polls/{}/vote", addr, poll_id))
        .json(&json!({ "optionIndex": 1, "fingerprint": "abc" }))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(response["votes"], json!([0, 1]));

    let event = next_event(&mut watcher).await;
    assert_eq!(event["event"], "update_results");
    assert_eq!(event["data"]["pollId"], poll_id.as_str());
    assert_eq!(event["data"]["votes"], json!([0, 1]));

    // The bystander only ever sees its own pong reply
    bystander
        .send(Message::text(json!({ "event": "ping" }).to_string()))
        .await
        .unwrap();
    assert_eq!(next_event(&mut bystander).await["event"], "pong");

    let _ = stop.send(());
    tokio::time::timeout(Duration::from_secs(5), server)
        .await
        .expect("server did not shut down")
        .unwrap();
}

#[tokio::test]
async fn test_malformed_frame_gets_error_event() {
    let (addr, stop, server) = start().await;
    let (mut socket, _) = connect_async(format!("ws://{}/socket", addr)).await.unwrap();

    socket.send(Message::text("not json".to_string())).await.unwrap();
    let event = next_event(&mut socket).await;
    assert_eq!(event["event"], "error");
    assert_eq!(event["data"]["message"], "Invalid message format");

    let _ = stop.send(());
    tokio::time::timeout(Duration::from_secs(5), server)
        .await
        .expect("server did not shut down")
        .unwrap();
}

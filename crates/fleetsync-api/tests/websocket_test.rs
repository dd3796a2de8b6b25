// Push socket tests against a throwaway local WebSocket server.
#![allow(clippy::unwrap_used)]

use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpListener;
use tokio_tungstenite::tungstenite::Message;
use url::Url;

use fleetsync_api::{PushConnector, PushFrame, PushSession, WebSocketConnector};

/// Accept one client, wait for its subscribe frame, push `frames`, close.
async fn serve_once(frames: Vec<String>) -> (Url, tokio::task::JoinHandle<String>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    let handle = tokio::spawn(async move {
        let (tcp, _) = listener.accept().await.unwrap();
        let mut ws = tokio_tungstenite::accept_async(tcp).await.unwrap();

        let subscribe = match ws.next().await.unwrap().unwrap() {
            Message::Text(text) => text.to_string(),
            other => panic!("expected text subscribe frame, got {other:?}"),
        };

        for frame in frames {
            ws.send(Message::Text(frame.into())).await.unwrap();
        }
        ws.close(None).await.unwrap();
        subscribe
    });

    let url = Url::parse(&format!("ws://{addr}/ws")).unwrap();
    (url, handle)
}

#[tokio::test]
async fn session_announces_then_reads_frames_until_close() {
    let (url, server) = serve_once(vec![
        r#"{"event": "connected", "data": {"message": "hello"}}"#.into(),
        r#"{"event": "bus_update", "data": {"vehicle_id": "B1", "safe_speed": 55}}"#.into(),
        "garbage".into(),
    ])
    .await;

    let connector = WebSocketConnector::new(url);
    let mut session = connector.connect().await.unwrap();
    session.announce().await.unwrap();

    let greeting = session.next_frame().await.unwrap().unwrap();
    assert_eq!(
        greeting,
        PushFrame::Greeting {
            message: Some("hello".into())
        }
    );

    let PushFrame::Update(update) = session.next_frame().await.unwrap().unwrap() else {
        panic!("expected update frame");
    };
    assert_eq!(update.vehicle_id.as_deref(), Some("B1"));
    assert_eq!(update.safe_speed, Some(55.0));

    assert!(matches!(
        session.next_frame().await.unwrap().unwrap(),
        PushFrame::Malformed { .. }
    ));

    // Server closed: the session reports end-of-stream.
    assert!(session.next_frame().await.is_none());

    let subscribe = server.await.unwrap();
    let value: serde_json::Value = serde_json::from_str(&subscribe).unwrap();
    assert_eq!(value["event"], "subscribe_updates");
}

#[tokio::test]
async fn connect_to_dead_port_fails() {
    // Bind then drop to get a port nobody listens on.
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let connector = WebSocketConnector::new(Url::parse(&format!("ws://{addr}/ws")).unwrap());
    let err = connector.connect().await.err().unwrap();
    assert!(err.is_transient());
}

//! Two sessions talking over loopback TCP.

#![allow(clippy::expect_used, clippy::unwrap_used)]

use std::sync::{Arc, Mutex};

use packet_session::transport::tcp::{self, Acceptor};
use packet_session::{Category, Packet, ProtocolError, Session, SessionConfig, SessionState};

async fn listen(config: SessionConfig) -> (Acceptor, u16) {
    let acceptor = Acceptor::bind("127.0.0.1:0", config).await.unwrap();
    let port = acceptor.local_addr().unwrap().port();
    (acceptor, port)
}

#[tokio::test]
async fn ping_reaches_listener_and_reply_reaches_callback() {
    let (acceptor, port) = listen(SessionConfig::default()).await;

    let x = Session::new("127.0.0.1", port, SessionConfig::default());
    assert_eq!(x.state(), SessionState::Unconnected);
    let (connected, accepted) = tokio::join!(x.connect(), acceptor.accept());
    connected.unwrap();
    let y = accepted.unwrap();
    assert!(x.idle());
    assert!(y.idle());

    let seen = Arc::new(Mutex::new(Vec::new()));
    {
        let seen = Arc::clone(&seen);
        y.subscribe(move |packet| seen.lock().unwrap().push(packet.clone()));
    }

    x.send(Packet::data("ping")).await.unwrap();
    y.read().await.unwrap();
    {
        let seen = seen.lock().unwrap();
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0].category(), Category::Data);
        assert_eq!(seen[0].as_text(), Some("ping"));
    }

    let responder = {
        let y = y.clone();
        tokio::spawn(async move {
            let request = y.read().await.unwrap().unwrap();
            y.send(Packet::response(format!("pong:{}", request.as_text().unwrap())))
                .await
                .unwrap();
        })
    };

    let mut replies = 0;
    let mut last = None;
    x.send_and_await_reply(Packet::data("ping"), |reply| {
        replies += 1;
        last = Some(reply.clone());
    })
    .await
    .unwrap();
    responder.await.unwrap();

    assert_eq!(replies, 1);
    assert_eq!(last, Some(Packet::response("pong:ping")));
    assert_eq!(seen.lock().unwrap().len(), 2);

    x.disconnect().await;
    y.disconnect().await;
}

#[tokio::test]
async fn name_exchange_over_tcp() {
    let (acceptor, port) = listen(SessionConfig::default().with_display_name("Alice")).await;

    let (bob, alice) = tokio::join!(
        tcp::connect("127.0.0.1", port, SessionConfig::default()),
        acceptor.accept()
    );
    let bob = bob.unwrap();
    let alice = alice.unwrap();

    bob.request_name().await.unwrap();
    assert_eq!(alice.read().await.unwrap(), None);
    assert_eq!(bob.read().await.unwrap(), None);
    assert_eq!(bob.display_name().as_deref(), Some("Alice"));

    let metrics = bob.metrics();
    assert_eq!(metrics.frames_sent, 1);
    assert_eq!(metrics.frames_received, 1);
    assert_eq!(metrics.packets_delivered, 0);
}

#[tokio::test]
async fn second_connect_is_rejected() {
    let (acceptor, port) = listen(SessionConfig::default()).await;

    let session = Session::new("127.0.0.1", port, SessionConfig::default());
    let (connected, _peer) = tokio::join!(session.connect(), acceptor.accept());
    connected.unwrap();

    assert!(matches!(
        session.connect().await,
        Err(ProtocolError::InvalidState { operation: "connect", .. })
    ));
    assert!(session.idle());
}

#[tokio::test]
async fn remote_disconnect_is_seen_by_reader() {
    let (acceptor, port) = listen(SessionConfig::default()).await;

    let (client, server) = tokio::join!(
        tcp::connect("127.0.0.1", port, SessionConfig::default()),
        acceptor.accept()
    );
    let client = client.unwrap();
    let server = server.unwrap();

    let reading = server.begin_read().unwrap();
    client.disconnect().await;

    assert!(matches!(reading.await, Err(ProtocolError::ConnectionClosed)));
    assert!(server.disconnected());
    assert_eq!(server.metrics().transport_errors, 1);
}

#[tokio::test]
async fn accepted_session_cannot_dial() {
    let (acceptor, port) = listen(SessionConfig::default()).await;

    let (client, server) = tokio::join!(
        tcp::connect("127.0.0.1", port, SessionConfig::default()),
        acceptor.accept()
    );
    let _client = client.unwrap();
    let server = server.unwrap();

    assert!(matches!(
        server.connect().await,
        Err(ProtocolError::InvalidState { operation: "connect", state: SessionState::Connected })
    ));
    assert!(server.idle());
}

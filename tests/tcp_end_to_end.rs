//! Server and clients over real TCP sockets.

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

use chat_protocol::config::{ChatConfig, ClientConfig};
use chat_protocol::core::codec::PacketCodec;
use chat_protocol::core::packet::{Auth, ChatList, Packet};
use chat_protocol::protocol::client::ClientEvent;
use chat_protocol::store::memory::{InMemoryChatStore, InMemoryUserStore};
use chat_protocol::transport::{server_dispatcher, ChatClient, ChatServer};
use chat_protocol::utils::diagnostics::{Diagnostics, NoopDiagnostics};
use chat_protocol::utils::metrics::Metrics;
use chat_protocol::ProtocolError;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

struct Running {
    addr: SocketAddr,
    metrics: Arc<Metrics>,
    shutdown_tx: mpsc::Sender<()>,
    handle: JoinHandle<chat_protocol::Result<()>>,
}

impl Running {
    async fn stop(self) {
        self.shutdown_tx.send(()).await.unwrap();
        self.handle.await.unwrap().unwrap();
    }
}

async fn start_server(configure: impl FnOnce(&mut ChatConfig)) -> Running {
    let config = ChatConfig::default_with_overrides(|c| {
        c.server.address = "127.0.0.1:0".into();
        c.server.shutdown_timeout = Duration::from_millis(500);
        configure(c);
    });

    let metrics = Arc::new(Metrics::new());
    let diagnostics: Arc<dyn Diagnostics> = metrics.clone();
    let users = Arc::new(InMemoryUserStore::new());
    let chats = Arc::new(InMemoryChatStore::with_chats(["general", "random"]));
    let dispatcher = server_dispatcher(&config.auth, users, chats, diagnostics.clone()).unwrap();

    let server = ChatServer::bind(&config, Arc::new(dispatcher), diagnostics)
        .await
        .unwrap();
    let addr = server.local_addr().unwrap();

    let (shutdown_tx, shutdown_rx) = mpsc::channel(1);
    let handle = tokio::spawn(server.run(shutdown_rx));

    Running {
        addr,
        metrics,
        shutdown_tx,
        handle,
    }
}

async fn client(addr: SocketAddr) -> ChatClient {
    let config = ClientConfig {
        address: addr.to_string(),
        connection_timeout: Duration::from_secs(2),
        response_timeout: Duration::from_secs(2),
    };
    ChatClient::connect(&config, PacketCodec::new(1 << 20, Arc::new(NoopDiagnostics)))
        .await
        .unwrap()
}

async fn registered_and_logged_in(addr: SocketAddr, username: &str, password: &str) -> ChatClient {
    let mut c = client(addr).await;
    c.register(username, password, "First", "Last").await.unwrap();
    assert_eq!(c.next_event().await.unwrap(), ClientEvent::RegisterSucceeded);

    c.login(username, password).await.unwrap();
    assert_eq!(c.next_event().await.unwrap(), ClientEvent::AuthSucceeded);
    assert!(c.is_authenticated());
    c
}

#[tokio::test]
async fn test_register_login_and_chat_list() {
    let server = start_server(|_| {}).await;

    let mut alice = registered_and_logged_in(server.addr, "alice", "pw1").await;
    assert_eq!(alice.username(), Some("alice"));

    alice.request_chat_list().await.unwrap();
    assert_eq!(
        alice.next_event().await.unwrap(),
        ClientEvent::ChatList(vec!["general".into(), "random".into()])
    );

    alice.close().await.unwrap();
    server.stop().await;
}

#[tokio::test]
async fn test_wrong_password_and_duplicate_registration() {
    let server = start_server(|_| {}).await;
    let mut bob = client(server.addr).await;

    bob.register("bob", "right", "B", "C").await.unwrap();
    assert_eq!(bob.next_event().await.unwrap(), ClientEvent::RegisterSucceeded);
    bob.register("bob", "again", "B", "C").await.unwrap();
    assert_eq!(
        bob.next_event().await.unwrap(),
        ClientEvent::RegisterFailed("username taken".into())
    );

    bob.login("bob", "wrong").await.unwrap();
    assert_eq!(
        bob.next_event().await.unwrap(),
        ClientEvent::AuthFailed("wrong password".into())
    );
    assert!(!bob.is_authenticated());

    bob.login("nobody", "x").await.unwrap();
    assert_eq!(
        bob.next_event().await.unwrap(),
        ClientEvent::AuthFailed("not registered".into())
    );

    server.stop().await;
}

#[tokio::test]
async fn test_message_broadcast_to_every_connection() {
    let server = start_server(|_| {}).await;

    let mut alice = registered_and_logged_in(server.addr, "alice", "pw1").await;
    let mut bob = registered_and_logged_in(server.addr, "bob", "pw2").await;

    alice.send_message("general", "hi all").await.unwrap();

    for receiver in [&mut alice, &mut bob] {
        match receiver.next_event().await.unwrap() {
            ClientEvent::Message(message) => {
                assert_eq!(message.from, "alice");
                assert_eq!(message.text, "hi all");
                assert_eq!(message.chat_name, "general");
                assert_eq!((message.first_name.as_str(), message.last_name.as_str()), ("First", "Last"));
                assert!(message.timestamp > 0);
            }
            other => panic!("expected a message, got {other:?}"),
        }
    }

    server.stop().await;
}

#[tokio::test]
async fn test_send_message_requires_login() {
    let server = start_server(|_| {}).await;
    let mut c = client(server.addr).await;
    assert!(matches!(
        c.send_message("general", "hello").await,
        Err(ProtocolError::Custom(_))
    ));
    server.stop().await;
}

#[tokio::test]
async fn test_next_event_times_out() {
    let server = start_server(|_| {}).await;
    let config = ClientConfig {
        address: server.addr.to_string(),
        connection_timeout: Duration::from_secs(2),
        response_timeout: Duration::from_millis(150),
    };
    let mut c = ChatClient::connect(&config, PacketCodec::default()).await.unwrap();
    assert!(matches!(c.next_event().await, Err(ProtocolError::Timeout)));
    server.stop().await;
}

#[tokio::test]
async fn test_corrupt_frame_does_not_close_connection() {
    let server = start_server(|_| {}).await;
    let mut stream = TcpStream::connect(server.addr).await.unwrap();

    let mut bad = Packet::ChatList(ChatList::default()).to_bytes().unwrap();
    let last = bad.len() - 1;
    bad[last] ^= 0xFF;
    let good = Packet::ChatList(ChatList::default()).to_bytes().unwrap();

    // Corrupt frame and a good one, dribbled in small writes.
    let mut wire = bad;
    wire.extend(good);
    for chunk in wire.chunks(3) {
        stream.write_all(chunk).await.unwrap();
        stream.flush().await.unwrap();
    }

    let mut header = [0u8; 9];
    tokio::time::timeout(Duration::from_secs(2), stream.read_exact(&mut header))
        .await
        .unwrap()
        .unwrap();
    let payload_len = u32::from_le_bytes(header[1..5].try_into().unwrap()) as usize;
    let mut frame = header.to_vec();
    frame.resize(9 + payload_len, 0);
    stream.read_exact(&mut frame[9..]).await.unwrap();

    assert_eq!(
        Packet::from_bytes(&frame).unwrap(),
        Packet::ChatList(ChatList {
            chat_names: vec!["general".into(), "random".into()]
        })
    );
    assert_eq!(server.metrics.snapshot().frames_dropped, 1);
    server.stop().await;
}

#[tokio::test]
async fn test_max_connections_enforced() {
    let server = start_server(|c| c.server.max_connections = 1).await;

    let mut first = client(server.addr).await;
    first.register("only", "pw", "O", "N").await.unwrap();
    assert_eq!(first.next_event().await.unwrap(), ClientEvent::RegisterSucceeded);

    // The second connection is accepted by the OS and then dropped.
    let mut second = TcpStream::connect(server.addr).await.unwrap();
    let request = Packet::Auth(Auth::request_salt("only")).to_bytes().unwrap();
    let _ = second.write_all(&request).await;
    let mut buf = [0u8; 16];
    let read = tokio::time::timeout(Duration::from_secs(2), second.read(&mut buf))
        .await
        .unwrap();
    assert!(matches!(read, Ok(0) | Err(_)));

    server.stop().await;
}

#[tokio::test]
async fn test_shutdown_closes_connections() {
    let server = start_server(|_| {}).await;
    let mut c = client(server.addr).await;
    c.request_chat_list().await.unwrap();
    c.next_event().await.unwrap();

    let metrics = server.metrics.clone();
    server.stop().await;

    assert!(matches!(
        c.next_event().await,
        Err(ProtocolError::ConnectionClosed) | Err(ProtocolError::Io(_))
    ));
    assert_eq!(metrics.snapshot().connections_active, 0);
}

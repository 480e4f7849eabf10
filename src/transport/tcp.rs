use crate::config::{AuthConfig, ChatConfig, ClientConfig, ServerConfig};
use crate::core::codec::PacketCodec;
use crate::core::packet::{ChatList, Message, Packet, Register};
use crate::error::{constants, ProtocolError, Result};
use crate::protocol::auth::AuthService;
use crate::protocol::chat::ChatService;
use crate::protocol::client::{ClientEvent, ClientHandler};
use crate::protocol::dispatcher::{Dispatcher, HandlerContext, Outbox};
use crate::protocol::session::{AuthSession, ConnectionId, ConnectionSession};
use crate::store::{ChatStore, UserStore};
use crate::utils::diagnostics::{DiagnosticEvent, Diagnostics};
use crate::utils::metrics::Timer;
use bytes::{Bytes, BytesMut};
use futures::{SinkExt, StreamExt};
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::tcp::OwnedWriteHalf;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{broadcast, mpsc, watch};
use tokio_util::codec::{Encoder, Framed};
use tracing::{debug, error, info, instrument, warn};

/// Dispatcher with the server's business handlers registered.
pub fn server_dispatcher(
    auth: &AuthConfig,
    users: Arc<dyn UserStore>,
    chats: Arc<dyn ChatStore>,
    diagnostics: Arc<dyn Diagnostics>,
) -> Result<Dispatcher> {
    let dispatcher = Dispatcher::new(diagnostics.clone());
    dispatcher.register(Arc::new(
        AuthService::new(users.clone(), diagnostics).with_salt_length(auth.salt_length),
    ))?;
    dispatcher.register(Arc::new(ChatService::new(users, chats)))?;
    Ok(dispatcher)
}

/// Connection-task state shared by every accepted connection.
struct Shared {
    codec: PacketCodec,
    dispatcher: Arc<Dispatcher>,
    diagnostics: Arc<dyn Diagnostics>,
    broadcast_tx: broadcast::Sender<Bytes>,
    read_buffer_size: usize,
}

pub struct ChatServer {
    listener: TcpListener,
    config: ServerConfig,
    shared: Arc<Shared>,
    next_id: AtomicU64,
    active: Arc<AtomicUsize>,
}

impl ChatServer {
    pub async fn bind(
        config: &ChatConfig,
        dispatcher: Arc<Dispatcher>,
        diagnostics: Arc<dyn Diagnostics>,
    ) -> Result<Self> {
        let listener = TcpListener::bind(&config.server.address).await?;
        info!(address = %listener.local_addr()?, "Listening");

        let (broadcast_tx, _) = broadcast::channel(config.server.broadcast_capacity.max(1));
        let codec = PacketCodec::new(config.transport.max_payload_size, diagnostics.clone());

        Ok(Self {
            listener,
            config: config.server.clone(),
            shared: Arc::new(Shared {
                codec,
                dispatcher,
                diagnostics,
                broadcast_tx,
                read_buffer_size: config.server.read_buffer_size.max(1),
            }),
            next_id: AtomicU64::new(1),
            active: Arc::new(AtomicUsize::new(0)),
        })
    }

    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.listener.local_addr()?)
    }

    pub fn active_connections(&self) -> usize {
        self.active.load(Ordering::Relaxed)
    }

    /// Accept connections until `shutdown_rx` fires or its sender is dropped,
    /// then give open connections `shutdown_timeout` to wind down.
    #[instrument(skip_all, fields(address = %self.config.address))]
    pub async fn run(self, mut shutdown_rx: mpsc::Receiver<()>) -> Result<()> {
        let (stop_tx, stop_rx) = watch::channel(false);

        loop {
            tokio::select! {
                _ = shutdown_rx.recv() => {
                    info!("Shutting down server. Waiting for connections to close...");
                    let _ = stop_tx.send(true);
                    self.drain().await;
                    return Ok(());
                }

                accept_result = self.listener.accept() => {
                    match accept_result {
                        Ok((stream, peer)) => self.admit(stream, peer, stop_rx.clone()),
                        Err(e) => error!(error = %e, "Error accepting connection"),
                    }
                }
            }
        }
    }

    fn admit(&self, stream: TcpStream, peer: SocketAddr, stop_rx: watch::Receiver<bool>) {
        if self.active.load(Ordering::Relaxed) >= self.config.max_connections {
            warn!(peer = %peer, limit = self.config.max_connections, "{}", constants::ERR_MAX_CONNECTIONS);
            return;
        }

        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let shared = self.shared.clone();
        let active = self.active.clone();
        active.fetch_add(1, Ordering::Relaxed);

        tokio::spawn(async move {
            shared
                .diagnostics
                .emit(DiagnosticEvent::ConnectionOpened { connection_id: id });

            if let Err(e) = serve_connection(id, stream, &shared, stop_rx).await {
                debug!(connection_id = id, error = %e, "Connection ended with error");
            }

            shared
                .diagnostics
                .emit(DiagnosticEvent::ConnectionClosed { connection_id: id });
            active.fetch_sub(1, Ordering::Relaxed);
        });
    }

    async fn drain(&self) {
        let timeout = tokio::time::sleep(self.config.shutdown_timeout);
        tokio::pin!(timeout);

        loop {
            let connections = self.active.load(Ordering::Relaxed);
            if connections == 0 {
                info!("All connections closed, shutting down");
                return;
            }
            tokio::select! {
                _ = &mut timeout => {
                    warn!(connections, "Shutdown timeout reached, forcing exit");
                    return;
                }
                _ = tokio::time::sleep(Duration::from_millis(50)) => {
                    debug!(connections, "Waiting for connections to close");
                }
            }
        }
    }
}

async fn write_packet(writer: &mut OwnedWriteHalf, codec: &mut PacketCodec, packet: Packet) -> Result<()> {
    let mut frame = BytesMut::new();
    codec.encode(packet, &mut frame)?;
    writer.write_all(&frame).await?;
    Ok(())
}

/// Per-connection loop. The session lives and dies with this task.
#[instrument(skip(stream, shared, stop_rx), fields(peer = ?stream.peer_addr().ok()))]
async fn serve_connection(
    id: ConnectionId,
    stream: TcpStream,
    shared: &Shared,
    mut stop_rx: watch::Receiver<bool>,
) -> Result<()> {
    let _timer = Timer::start("connection");
    let mut codec = shared.codec.clone();
    let mut session = ConnectionSession::new(id, codec.clone());
    let mut broadcast_rx = shared.broadcast_tx.subscribe();
    let (mut reader, mut writer) = stream.into_split();
    let mut buf = vec![0u8; shared.read_buffer_size];

    loop {
        tokio::select! {
            read = reader.read(&mut buf) => {
                let n = read?;
                if n == 0 {
                    debug!(buffered = session.buffered(), "{}", constants::ERR_CONNECTION_CLOSED);
                    return session.finish();
                }

                let outbox = session.process(&buf[..n], &shared.dispatcher);
                for reply in outbox.replies {
                    write_packet(&mut writer, &mut codec, reply).await?;
                }
                for packet in outbox.broadcasts {
                    let mut frame = BytesMut::new();
                    codec.encode(packet, &mut frame)?;
                    // No receivers only means nobody else is connected.
                    let _ = shared.broadcast_tx.send(frame.freeze());
                }
            }

            received = broadcast_rx.recv() => match received {
                Ok(frame) => writer.write_all(&frame).await?,
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    warn!(skipped, "Connection fell behind on broadcasts");
                }
                Err(broadcast::error::RecvError::Closed) => return Ok(()),
            },

            _ = stop_rx.changed() => {
                debug!("Closing connection for shutdown");
                writer.shutdown().await.ok();
                return Ok(());
            }
        }
    }
}

/// Async client over one TCP connection.
pub struct ChatClient {
    framed: Framed<TcpStream, PacketCodec>,
    dispatcher: Dispatcher,
    handler: Arc<ClientHandler>,
    auth: AuthSession,
    response_timeout: Duration,
}

impl ChatClient {
    pub async fn connect(config: &ClientConfig, codec: PacketCodec) -> Result<Self> {
        let stream = tokio::time::timeout(config.connection_timeout, TcpStream::connect(&config.address))
            .await
            .map_err(|_| ProtocolError::Timeout)??;
        stream.set_nodelay(true)?;
        info!(address = %config.address, "Connected");

        let handler = Arc::new(ClientHandler::new());
        let dispatcher = Dispatcher::new(codec.diagnostics().clone());
        dispatcher.register(handler.clone())?;

        Ok(Self {
            framed: Framed::new(stream, codec),
            dispatcher,
            handler,
            auth: AuthSession::new(),
            response_timeout: config.response_timeout,
        })
    }

    pub fn is_authenticated(&self) -> bool {
        self.auth.is_authenticated()
    }

    pub fn username(&self) -> Option<&str> {
        self.auth.authenticated_user()
    }

    pub async fn send(&mut self, packet: impl Into<Packet>) -> Result<()> {
        self.framed.send(packet.into()).await
    }

    /// The result arrives as `RegisterSucceeded` or `RegisterFailed`.
    pub async fn register(&mut self, username: &str, password: &str, first_name: &str, last_name: &str) -> Result<()> {
        self.send(Register {
            username: username.into(),
            password: password.into(),
            first_name: first_name.into(),
            last_name: last_name.into(),
        })
        .await
    }

    /// Start the two-round login. [`next_event`](Self::next_event) answers
    /// the salt and yields `AuthSucceeded` or `AuthFailed`.
    pub async fn login(&mut self, username: &str, password: &str) -> Result<()> {
        let request = self.handler.begin_login(username, password)?;
        self.send(request).await
    }

    pub async fn send_message(&mut self, chat_name: &str, text: &str) -> Result<()> {
        let from = self
            .auth
            .authenticated_user()
            .ok_or_else(|| ProtocolError::Custom(constants::ERR_NOT_AUTHENTICATED.to_string()))?
            .to_string();
        self.send(Message {
            from,
            text: text.into(),
            chat_name: chat_name.into(),
            ..Message::default()
        })
        .await
    }

    pub async fn request_chat_list(&mut self) -> Result<()> {
        self.send(ChatList::default()).await
    }

    /// Wait for the next event, handling protocol traffic on the way.
    ///
    /// Fails with `Timeout` if nothing arrives within the configured response
    /// timeout and `ConnectionClosed` if the server hangs up.
    pub async fn next_event(&mut self) -> Result<ClientEvent> {
        let deadline = tokio::time::Instant::now() + self.response_timeout;

        loop {
            if let Some(event) = self.handler.next_event() {
                return Ok(event);
            }

            let packet = match tokio::time::timeout_at(deadline, self.framed.next()).await {
                Err(_) => return Err(ProtocolError::Timeout),
                Ok(None) => return Err(ProtocolError::ConnectionClosed),
                Ok(Some(packet)) => packet?,
            };

            let mut outbox = Outbox::default();
            let mut ctx = HandlerContext::new(0, &mut self.auth, &mut outbox);
            self.dispatcher.dispatch(&packet, &mut ctx)?;
            for reply in outbox.replies {
                self.framed.send(reply).await?;
            }
        }
    }

    pub async fn close(mut self) -> Result<()> {
        self.framed.close().await
    }
}

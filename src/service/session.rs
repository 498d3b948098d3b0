//! # Packet Session
//!
//! [`Session`] is the engine's handle to one peer. It owns the transport,
//! the receive buffer and the handshake state, and exposes:
//!
//! - lifecycle: [`Session::connect`], [`Session::disconnect`] and state reads
//!   ([`Session::connected`], [`Session::reading`], [`Session::sending`],
//!   [`Session::disconnected`], [`Session::idle`])
//! - primitives: [`Session::begin_send`] / [`Session::send`] and
//!   [`Session::begin_read`] / [`Session::read`]
//! - composites: [`Session::send_and_await_reply`], [`Session::send_and_wait`],
//!   [`Session::request`]
//! - notifications: [`Session::subscribe`] / [`Session::unsubscribe`]
//!
//! ## Concurrency
//! A session runs at most one operation at a time: one read or one send,
//! never both. The `begin_*` calls switch state before returning, then the
//! I/O runs on a tokio task. A call made while another operation is
//! outstanding fails with `ProtocolError::InvalidState` and changes nothing.
//!
//! ## Failure handling
//! - connect failure: session becomes `Disconnected`, no retry
//! - undecodable frame: dropped, peer gets one `Response` packet starting with `error:`
//! - bad management command: logged and dropped
//! - transport failure or end of stream: transport released, session `Disconnected`
//!
//! ## Example
//! ```rust,no_run
//! use packet_session::config::SessionConfig;
//! use packet_session::core::packet::Packet;
//! use packet_session::service::session::Session;
//!
//! #[tokio::main]
//! async fn main() -> packet_session::error::Result<()> {
//!     let session = Session::new("127.0.0.1", 7000, SessionConfig::default().with_display_name("Alice"));
//!     session.connect().await?;
//!
//!     session.subscribe(|packet| println!("arrived: {packet:?}"));
//!     session
//!         .send_and_await_reply(Packet::data("ping"), |reply| println!("reply: {reply:?}"))
//!         .await?;
//!
//!     session.disconnect().await;
//!     Ok(())
//! }
//! ```

use std::fmt;
use std::sync::Arc;

use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::sync::{watch, Mutex};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

use crate::config::SessionConfig;
use crate::core::codec::{PacketCodec, MAX_LENGTH_PREFIX};
use crate::core::packet::Packet;
use crate::error::{ProtocolError, Result};
use crate::protocol::dispatcher::{ListenerId, Listeners};
use crate::protocol::handshake::{HandshakeState, NameExchange};
use crate::protocol::state::SessionState;
use crate::service::completion::Completion;
use crate::transport::receiver::FrameReceiver;
use crate::transport::sender::FrameSender;
use crate::utils::metrics::{MetricsSnapshot, SessionMetrics, Timer};

/// How the session obtained its transport
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Origin {
    /// The session dials this endpoint on [`Session::connect`]
    Remote { host: String, port: u16 },
    /// The session wraps a transport that was already connected
    Accepted,
}

impl fmt::Display for Origin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Origin::Remote { host, port } => write!(f, "{host}:{port}"),
            Origin::Accepted => f.write_str("accepted"),
        }
    }
}

/// Transport plus its framing state; owned exclusively by the session
struct Link<S> {
    stream: S,
    receiver: FrameReceiver,
    sender: FrameSender,
}

impl<S> Link<S> {
    fn new(stream: S, config: &SessionConfig) -> Self {
        Self {
            stream,
            receiver: FrameReceiver::new(config.read_chunk_size, config.max_frame_size),
            sender: FrameSender::new(config.read_chunk_size, config.max_frame_size),
        }
    }
}

struct Shared<S> {
    config: SessionConfig,
    origin: Origin,
    codec: PacketCodec,
    state: watch::Sender<SessionState>,
    names: NameExchange,
    listeners: Listeners,
    metrics: SessionMetrics,
    link: Mutex<Option<Link<S>>>,
    shutdown: CancellationToken,
}

impl<S> Shared<S>
where
    S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
{
    fn state(&self) -> SessionState {
        *self.state.borrow()
    }

    /// Validated state change; refuses without side effects.
    fn transition(&self, operation: &'static str, next: SessionState) -> Result<()> {
        let mut refused = None;
        self.state.send_if_modified(|current| {
            if current.can_transition_to(next) {
                *current = next;
                true
            } else {
                refused = Some(*current);
                false
            }
        });

        match refused {
            None => Ok(()),
            Some(state) => Err(ProtocolError::InvalidState { operation, state }),
        }
    }

    /// Return from `busy` to `Connected`, unless the session moved on meanwhile.
    fn settle(&self, busy: SessionState) {
        self.state.send_if_modified(|current| {
            if *current == busy {
                *current = SessionState::Connected;
                true
            } else {
                false
            }
        });
    }

    /// Move to `Disconnected`; returns the state that was left.
    fn mark_disconnected(&self) -> SessionState {
        let mut previous = SessionState::Disconnected;
        self.state.send_if_modified(|current| {
            previous = *current;
            if current.is_disconnected() {
                false
            } else {
                *current = SessionState::Disconnected;
                true
            }
        });
        previous
    }

    /// Release the transport after a fatal error. A deliberate disconnect
    /// tears the transport down itself, so cancellation is not a failure here.
    fn fail(&self, link: &mut Option<Link<S>>, error: &ProtocolError) {
        if !error.is_fatal() || self.shutdown.is_cancelled() {
            return;
        }

        self.metrics.transport_error();
        if link.take().is_some() {
            warn!(error = %error, origin = %self.origin, "transport failed, releasing it");
        }
        self.mark_disconnected();
        self.shutdown.cancel();
    }

    async fn attach(&self, stream: S) -> Result<()> {
        let mut link = self.link.lock().await;
        self.transition("connect", SessionState::Connected)?;
        *link = Some(Link::new(stream, &self.config));
        info!(origin = %self.origin, "session connected");
        Ok(())
    }

    async fn close_transport(&self) -> Result<()> {
        let mut link = self.link.lock().await;
        let mut active = link.take().ok_or(ProtocolError::AlreadyClosed)?;
        if let Err(e) = active.stream.shutdown().await {
            debug!(error = %e, "transport shutdown reported an error");
        }
        Ok(())
    }

    async fn write_body(&self, body: &[u8]) -> Result<()> {
        let mut link = self.link.lock().await;
        let written = match link.as_mut() {
            Some(active) => tokio::select! {
                written = active.sender.write_frame(&mut active.stream, body) => written,
                _ = self.shutdown.cancelled() => Err(ProtocolError::ConnectionClosed),
            },
            None => Err(ProtocolError::ConnectionClosed),
        };

        match written {
            Ok(bytes) => {
                self.metrics.frame_sent(bytes as u64);
                Ok(())
            }
            Err(e) => {
                self.fail(&mut link, &e);
                Err(e)
            }
        }
    }

    /// Read one frame and route it. `None` means the frame was consumed
    /// internally (management packet or undecodable bytes).
    async fn read_one(&self) -> Result<Option<Packet>> {
        let mut link = self.link.lock().await;
        let received = match link.as_mut() {
            Some(active) => tokio::select! {
                frame = active.receiver.read_frame(&mut active.stream) => frame,
                _ = self.shutdown.cancelled() => Err(ProtocolError::ConnectionClosed),
            },
            None => Err(ProtocolError::ConnectionClosed),
        };

        let frame = match received {
            Ok(frame) => frame,
            Err(e) => {
                self.fail(&mut link, &e);
                return Err(e);
            }
        };
        self.metrics.frame_received(frame.len() as u64);

        let packet = match self.codec.decode(&frame) {
            Ok(packet) => packet,
            Err(e) => {
                self.metrics.decode_error();
                warn!(error = %e, bytes = frame.len(), "discarding undecodable frame");
                self.reply(&mut link, &Packet::response(format!("error: {e}")))
                    .await;
                return Ok(None);
            }
        };

        if packet.is_management() {
            self.metrics.management_message();
            match self.names.handle(&packet) {
                Ok(Some(reply)) => self.reply(&mut link, &reply).await,
                Ok(None) => {}
                Err(e) => {
                    self.metrics.handshake_error();
                    warn!(error = %e, "dropping management packet");
                }
            }
            return Ok(None);
        }

        debug!(category = %packet.category(), bytes = packet.payload().len(), "packet received");
        Ok(Some(packet))
    }

    /// Internal reply written while the current operation still holds the transport.
    async fn reply(&self, link: &mut Option<Link<S>>, packet: &Packet) {
        let body = match self.codec.encode(packet) {
            Ok(body) => body,
            Err(e) => {
                warn!(error = %e, "could not encode internal reply");
                return;
            }
        };

        let Some(active) = link.as_mut() else {
            return;
        };
        let written = tokio::select! {
            written = active.sender.write_frame(&mut active.stream, &body) => written,
            _ = self.shutdown.cancelled() => Err(ProtocolError::ConnectionClosed),
        };
        match written {
            Ok(bytes) => {
                self.metrics.frame_sent(bytes as u64);
                debug!(category = %packet.category(), "internal reply sent");
            }
            Err(e) => {
                warn!(error = %e, "internal reply failed");
                self.fail(link, &e);
            }
        }
    }
}

/// Handle to one peer connection. Cloning yields another handle to the same session.
pub struct Session<S = TcpStream> {
    shared: Arc<Shared<S>>,
}

impl<S> Clone for Session<S> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
        }
    }
}

impl<S> fmt::Debug for Session<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("origin", &self.shared.origin)
            .field("state", &*self.shared.state.borrow())
            .field("display_name", &self.shared.names.name())
            .finish_non_exhaustive()
    }
}

impl Session<TcpStream> {
    /// Session that will dial `host:port` on [`Session::connect`].
    pub fn new(host: impl Into<String>, port: u16, config: SessionConfig) -> Self {
        let origin = Origin::Remote {
            host: host.into(),
            port,
        };
        Self::with_parts(config, origin, SessionState::Unconnected, None)
    }

    /// Open the TCP transport.
    ///
    /// Valid only from `Unconnected`. On failure the session becomes
    /// `Disconnected` for good; there is no retry.
    ///
    /// # Errors
    /// `InvalidState` when called twice or after teardown, `ConnectFailure`
    /// when the endpoint is unreachable.
    #[instrument(skip(self), fields(origin = %self.shared.origin))]
    pub async fn connect(&self) -> Result<()> {
        // Accepted sessions already own their transport.
        let (host, port) = match &self.shared.origin {
            Origin::Remote { host, port } => (host.as_str(), *port),
            Origin::Accepted => {
                return Err(ProtocolError::InvalidState {
                    operation: "connect",
                    state: self.shared.state(),
                })
            }
        };
        self.shared.transition("connect", SessionState::Connecting)?;

        let _timer = Timer::start("connect");
        match TcpStream::connect((host, port)).await {
            Ok(stream) => {
                if let Err(e) = stream.set_nodelay(true) {
                    debug!(error = %e, "could not set TCP_NODELAY");
                }
                self.shared.attach(stream).await
            }
            Err(e) => {
                self.shared.metrics.transport_error();
                self.shared.mark_disconnected();
                warn!(error = %e, "connect failed");
                Err(ProtocolError::ConnectFailure(format!("{host}:{port}: {e}")))
            }
        }
    }
}

impl<S> Session<S>
where
    S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
{
    /// Wrap a transport that is already connected (accepted socket, TLS stream, ...).
    pub fn from_stream(stream: S, config: SessionConfig) -> Self {
        let link = Link::new(stream, &config);
        Self::with_parts(config, Origin::Accepted, SessionState::Connected, Some(link))
    }

    fn with_parts(
        mut config: SessionConfig,
        origin: Origin,
        state: SessionState,
        link: Option<Link<S>>,
    ) -> Self {
        config.max_frame_size = config.max_frame_size.min(MAX_LENGTH_PREFIX);
        let (state, _) = watch::channel(state);
        Self {
            shared: Arc::new(Shared {
                codec: PacketCodec::new(config.format),
                names: NameExchange::new(config.display_name.clone()),
                config,
                origin,
                state,
                listeners: Listeners::new(),
                metrics: SessionMetrics::new(),
                link: Mutex::new(link),
                shutdown: CancellationToken::new(),
            }),
        }
    }

    pub fn origin(&self) -> &Origin {
        &self.shared.origin
    }

    pub fn config(&self) -> &SessionConfig {
        &self.shared.config
    }

    pub fn state(&self) -> SessionState {
        self.shared.state()
    }

    pub fn connected(&self) -> bool {
        self.state().is_connected()
    }

    pub fn reading(&self) -> bool {
        self.state().is_reading()
    }

    pub fn sending(&self) -> bool {
        self.state().is_sending()
    }

    pub fn disconnected(&self) -> bool {
        self.state().is_disconnected()
    }

    /// Connected, not disconnected, not reading, not sending.
    pub fn idle(&self) -> bool {
        self.state().is_idle()
    }

    /// Receiver that observes every state change.
    pub fn watch_state(&self) -> watch::Receiver<SessionState> {
        self.shared.state.subscribe()
    }

    /// Wait until the session is idle.
    ///
    /// # Errors
    /// `ConnectionClosed` if the session reaches `Disconnected` first.
    pub async fn wait_idle(&self) -> Result<()> {
        let mut states = self.shared.state.subscribe();
        let state = *states
            .wait_for(|s| s.is_idle() || s.is_disconnected())
            .await
            .map_err(|_| ProtocolError::ConnectionClosed)?;

        if state.is_disconnected() {
            Err(ProtocolError::ConnectionClosed)
        } else {
            Ok(())
        }
    }

    pub fn display_name(&self) -> Option<String> {
        self.shared.names.name()
    }

    pub fn set_display_name(&self, name: impl Into<String>) {
        self.shared.names.set_name(name);
    }

    pub fn handshake_state(&self) -> HandshakeState {
        self.shared.names.state()
    }

    /// Register a listener for delivered (non-management) packets.
    pub fn subscribe<F>(&self, listener: F) -> ListenerId
    where
        F: Fn(&Packet) + Send + Sync + 'static,
    {
        self.shared.listeners.subscribe(listener)
    }

    pub fn unsubscribe(&self, id: ListenerId) -> bool {
        self.shared.listeners.unsubscribe(id)
    }

    pub fn metrics(&self) -> MetricsSnapshot {
        self.shared.metrics.snapshot()
    }

    pub fn log_metrics(&self) {
        self.shared.metrics.log_metrics();
    }

    /// Bytes waiting in the receive buffer, or `None` while an operation holds the transport.
    pub fn buffered_bytes(&self) -> Option<usize> {
        let link = self.shared.link.try_lock().ok()?;
        Some(link.as_ref().map_or(0, |active| active.receiver.buffered()))
    }

    /// Start sending `packet`. The session is `Sending` when this returns.
    ///
    /// Must be called within a tokio runtime.
    ///
    /// # Errors
    /// Codec and size errors are reported before any state change;
    /// `InvalidState` unless the session is idle.
    pub fn begin_send(&self, packet: Packet) -> Result<Completion<()>> {
        let body = self.shared.codec.encode(&packet)?;
        if body.len() > self.shared.config.max_frame_size {
            return Err(ProtocolError::OversizedFrame(body.len()));
        }
        self.shared.transition("send", SessionState::Sending)?;
        debug!(category = %packet.category(), bytes = body.len(), "send started");

        let shared = Arc::clone(&self.shared);
        Ok(Completion::new(tokio::spawn(async move {
            let outcome = shared.write_body(&body).await;
            shared.settle(SessionState::Sending);
            outcome
        })))
    }

    /// Send `packet` and wait until it is fully written.
    pub async fn send(&self, packet: Packet) -> Result<()> {
        self.begin_send(packet)?.await
    }

    /// Start reading one frame. The session is `Reading` when this returns.
    ///
    /// The completion yields the delivered packet, or `None` if the frame was
    /// consumed internally. Listeners are notified after the session is idle
    /// again, so they may send from inside the callback.
    ///
    /// Must be called within a tokio runtime.
    pub fn begin_read(&self) -> Result<Completion<Option<Packet>>> {
        self.shared.transition("begin_read", SessionState::Reading)?;

        let shared = Arc::clone(&self.shared);
        Ok(Completion::new(tokio::spawn(async move {
            let outcome = shared.read_one().await;
            shared.settle(SessionState::Reading);

            let packet = outcome?;
            if let Some(packet) = &packet {
                shared.metrics.packet_delivered();
                shared.listeners.notify(packet);
            }
            Ok(packet)
        })))
    }

    /// Read one frame and wait for it.
    pub async fn read(&self) -> Result<Option<Packet>> {
        self.begin_read()?.await
    }

    /// Send `packet`, read one frame, and hand it to `on_reply`.
    ///
    /// `on_reply` runs at most once, before this returns, and only for a
    /// delivered packet. Nothing ties the frame read to the packet sent; the
    /// caller relies on the peer answering in order.
    pub async fn send_and_await_reply<F>(&self, packet: Packet, on_reply: F) -> Result<()>
    where
        F: FnOnce(&Packet),
    {
        self.send(packet).await?;
        if let Some(reply) = self.read().await? {
            on_reply(&reply);
        }
        Ok(())
    }

    /// Send `packet` and wait for one frame back, without a callback.
    pub async fn send_and_wait(&self, packet: Packet) -> Result<()> {
        self.send(packet).await?;
        self.read().await.map(|_| ())
    }

    /// Send `packet` and return the frame read back, if it was delivered.
    pub async fn request(&self, packet: Packet) -> Result<Option<Packet>> {
        self.send(packet).await?;
        self.read().await
    }

    /// Ask the peer for its name (`setup`).
    pub async fn request_name(&self) -> Result<()> {
        self.send(NameExchange::request()).await
    }

    /// Close the transport and move to `Disconnected`.
    ///
    /// Cancels an outstanding read or send. Calling it again is harmless.
    #[instrument(skip(self), fields(origin = %self.shared.origin))]
    pub async fn disconnect(&self) {
        let previous = self.shared.mark_disconnected();
        self.shared.shutdown.cancel();

        match self.shared.close_transport().await {
            Ok(()) => info!(previous = %previous, "session disconnected"),
            Err(e) => debug!(error = %e, "disconnect ignored"),
        }
    }
}

//! Connection management.
//!
//! A [`Connection`] owns at most one TCP socket. Requests are written
//! eagerly and pipelined; a background reader task decodes response frames
//! and hands each one to the oldest pending request. Any transport failure
//! or request timeout invalidates the socket and fails every pending
//! request; the next request reconnects lazily.

use crate::error::ClientError;
use crate::pending::{PendingQueue, PendingRequest};
use antidote_protocol::{Decoder, Frame, Inbound, Request, DEFAULT_PORT};
use bytes::Bytes;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicU64, AtomicU8, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWriteExt};
use tokio::net::tcp::OwnedWriteHalf;
use tokio::net::TcpStream;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio::time::Instant;

/// Default read buffer size (8 KiB).
pub const DEFAULT_READ_BUFFER_SIZE: usize = 8 * 1024;

/// Minimum read buffer size (1 KiB).
pub const MIN_READ_BUFFER_SIZE: usize = 1024;

/// Maximum read buffer size (1 MiB).
pub const MAX_READ_BUFFER_SIZE: usize = 1024 * 1024;

/// Default per-request timeout.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_millis(1000);

/// Default connect timeout.
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Connection configuration.
#[derive(Debug, Clone)]
pub struct ConnectionConfig {
    /// Server host name or IP address.
    pub host: String,
    /// Server port.
    pub port: u16,
    /// Connection timeout.
    pub connect_timeout: Duration,
    /// Per-request timeout. Expiry invalidates the whole connection.
    pub request_timeout: Duration,
    /// Invalidate the connection when no bytes arrive for this long.
    pub idle_timeout: Option<Duration>,
    /// Read buffer size for socket reads.
    pub read_buffer_size: usize,
    /// Set TCP_NODELAY on new sockets.
    pub nodelay: bool,
}

impl ConnectionConfig {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            idle_timeout: None,
            read_buffer_size: DEFAULT_READ_BUFFER_SIZE,
            nodelay: true,
        }
    }

    /// Loads configuration from environment variables only.
    pub fn from_env() -> Self {
        let mut config = Self::new("localhost", DEFAULT_PORT);
        config.apply_env_overrides();
        config
    }

    /// Applies environment variable overrides to the configuration.
    pub fn apply_env_overrides(&mut self) {
        if let Ok(host) = std::env::var("ANTIDOTE_HOST") {
            if !host.is_empty() {
                self.host = host;
            }
        }

        if let Ok(port) = std::env::var("ANTIDOTE_PORT") {
            if let Ok(parsed) = port.parse() {
                self.port = parsed;
            }
        }

        if let Ok(timeout) = std::env::var("ANTIDOTE_CONNECT_TIMEOUT_MS") {
            if let Ok(ms) = timeout.parse() {
                self.connect_timeout = Duration::from_millis(ms);
            }
        }

        if let Ok(timeout) = std::env::var("ANTIDOTE_REQUEST_TIMEOUT_MS") {
            if let Ok(ms) = timeout.parse() {
                self.request_timeout = Duration::from_millis(ms);
            }
        }

        if let Ok(timeout) = std::env::var("ANTIDOTE_IDLE_TIMEOUT_MS") {
            if let Ok(ms) = timeout.parse::<u64>() {
                self.idle_timeout = (ms > 0).then(|| Duration::from_millis(ms));
            }
        }
    }

    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    pub fn with_idle_timeout(mut self, timeout: Duration) -> Self {
        self.idle_timeout = Some(timeout);
        self
    }

    pub fn with_read_buffer_size(mut self, size: usize) -> Self {
        self.read_buffer_size = size.clamp(MIN_READ_BUFFER_SIZE, MAX_READ_BUFFER_SIZE);
        self
    }

    pub fn with_nodelay(mut self, nodelay: bool) -> Self {
        self.nodelay = nodelay;
        self
    }

    /// Returns `host:port`, for diagnostics.
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Observable connection state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// No socket; the next request connects.
    Disconnected,
    /// A socket is established.
    Connected,
    /// Closed by the caller. Terminal.
    Closed,
}

impl ConnectionState {
    fn as_u8(self) -> u8 {
        match self {
            ConnectionState::Disconnected => 0,
            ConnectionState::Connected => 1,
            ConnectionState::Closed => 2,
        }
    }

    fn from_u8(value: u8) -> Self {
        match value {
            1 => ConnectionState::Connected,
            2 => ConnectionState::Closed,
            _ => ConnectionState::Disconnected,
        }
    }
}

/// Why a reader task stopped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Disconnect {
    /// The server closed the socket.
    Eof,
    /// A socket read failed.
    Io(String),
    /// No bytes arrived within the idle timeout.
    Idle,
    /// The byte stream cannot be framed any more.
    Corrupt(String),
}

impl Disconnect {
    fn to_error(&self) -> ClientError {
        match self {
            Disconnect::Eof => ClientError::ConnectionClosed,
            Disconnect::Io(msg) => ClientError::ConnectionLost(msg.clone()),
            Disconnect::Idle => ClientError::Timeout,
            Disconnect::Corrupt(msg) => ClientError::ConnectionLost(format!("corrupt stream: {}", msg)),
        }
    }
}

/// One established socket together with its reader and pending requests.
struct Link {
    generation: u64,
    writer: OwnedWriteHalf,
    pending: Arc<Mutex<PendingQueue>>,
    reader: JoinHandle<()>,
}

impl Drop for Link {
    fn drop(&mut self) {
        self.reader.abort();
    }
}

enum Socket {
    Disconnected,
    Connected(Link),
    Closed,
}

struct Inner {
    config: ConnectionConfig,
    socket: tokio::sync::Mutex<Socket>,
    state: AtomicU8,
    request_timeout_ms: AtomicU64,
    next_generation: AtomicU64,
}

impl Inner {
    fn set_state(&self, state: ConnectionState) {
        self.state.store(state.as_u8(), Ordering::SeqCst);
    }

    /// Opens a socket and starts its reader task.
    async fn open_link(self: &Arc<Self>) -> Result<Link, ClientError> {
        let addr = self.config.addr();
        tracing::debug!("Connecting to {}...", addr);

        let stream = tokio::time::timeout(
            self.config.connect_timeout,
            TcpStream::connect((self.config.host.as_str(), self.config.port)),
        )
        .await
        .map_err(|_| {
            tracing::debug!("Connection to {} timed out", addr);
            ClientError::Timeout
        })?
        .map_err(|e| {
            tracing::debug!("Connection to {} failed: {}", addr, e);
            ClientError::Io(e)
        })?;

        stream.set_nodelay(self.config.nodelay).ok();

        let generation = self.next_generation.fetch_add(1, Ordering::SeqCst);
        let (read_half, writer) = stream.into_split();
        let pending = Arc::new(Mutex::new(PendingQueue::new()));

        let reader = tokio::spawn(read_loop(
            Arc::downgrade(self),
            generation,
            read_half,
            pending.clone(),
            self.config.read_buffer_size,
            self.config.idle_timeout,
        ));

        tracing::debug!("Connected to {} (generation {})", addr, generation);
        Ok(Link {
            generation,
            writer,
            pending,
            reader,
        })
    }

    /// Tears down the socket of `generation`, if it is still the current one.
    async fn invalidate(&self, generation: u64, make_error: impl Fn() -> ClientError) {
        let mut socket = self.socket.lock().await;
        self.invalidate_locked(&mut socket, generation, make_error);
    }

    fn invalidate_locked(
        &self,
        socket: &mut Socket,
        generation: u64,
        make_error: impl Fn() -> ClientError,
    ) {
        match socket {
            Socket::Connected(link) if link.generation == generation => {}
            // Already replaced, disconnected or closed
            _ => return,
        }

        let previous = std::mem::replace(socket, Socket::Disconnected);
        self.set_state(ConnectionState::Disconnected);

        if let Socket::Connected(link) = previous {
            let failed = link.pending.lock().fail_all(&make_error);
            tracing::debug!(
                "Connection to {} invalidated: {} ({} pending request(s) failed)",
                self.config.addr(),
                make_error(),
                failed
            );
        }
    }
}

/// A connection to an Antidote server.
pub struct Connection {
    inner: Arc<Inner>,
}

impl Connection {
    /// Creates a new connection (not yet connected).
    pub fn new(config: ConnectionConfig) -> Self {
        let request_timeout_ms = config.request_timeout.as_millis() as u64;
        Self {
            inner: Arc::new(Inner {
                config,
                socket: tokio::sync::Mutex::new(Socket::Disconnected),
                state: AtomicU8::new(ConnectionState::Disconnected.as_u8()),
                request_timeout_ms: AtomicU64::new(request_timeout_ms),
                next_generation: AtomicU64::new(1),
            }),
        }
    }

    /// Returns the configuration.
    pub fn config(&self) -> &ConnectionConfig {
        &self.inner.config
    }

    /// Connects to the server if not already connected.
    pub async fn connect(&self) -> Result<(), ClientError> {
        let mut socket = self.inner.socket.lock().await;
        match *socket {
            Socket::Closed => return Err(ClientError::Closed),
            Socket::Connected(_) => return Ok(()),
            Socket::Disconnected => {}
        }

        let link = self.inner.open_link().await?;
        *socket = Socket::Connected(link);
        self.inner.set_state(ConnectionState::Connected);
        Ok(())
    }

    /// Sends a request message and waits for its response frame.
    pub async fn send(&self, request: &Request) -> Result<Inbound, ClientError> {
        self.request(request.code().as_u8(), request.encode_payload())
            .await
    }

    /// Sends a raw request frame and waits for its response frame.
    ///
    /// Reconnects first if the previous socket was invalidated. An error
    /// frame from the server fails this request only; a timeout fails every
    /// request pending on the socket. The timeout also bounds the write, so
    /// a peer that stops reading cannot hold the socket forever.
    pub async fn request(&self, code: u8, payload: Bytes) -> Result<Inbound, ClientError> {
        let encoded = Frame::new(code, payload).encode()?;
        let timeout = self.request_timeout();
        let deadline = Instant::now() + timeout;

        let (rx, generation) = {
            let mut socket = match tokio::time::timeout_at(deadline, self.inner.socket.lock()).await {
                Ok(socket) => socket,
                Err(_) => {
                    tracing::debug!("Request code={} timed out waiting for the socket", code);
                    return Err(ClientError::Timeout);
                }
            };

            if matches!(*socket, Socket::Disconnected) {
                tracing::debug!("request() called while disconnected, reconnecting");
                let link = self.inner.open_link().await?;
                *socket = Socket::Connected(link);
                self.inner.set_state(ConnectionState::Connected);
            }

            let link = match &mut *socket {
                Socket::Connected(link) => link,
                _ => {
                    tracing::debug!("request() called after close");
                    return Err(ClientError::Closed);
                }
            };

            let generation = link.generation;
            let (tx, rx) = oneshot::channel();

            // Queue before writing so that queue order matches wire order
            link.pending
                .lock()
                .enqueue(PendingRequest::new(code, tx), || ClientError::ConnectionClosed);

            let written = tokio::time::timeout_at(deadline, link.writer.write_all(&encoded)).await;
            match written {
                Ok(Ok(())) => {}
                Ok(Err(e)) => {
                    tracing::debug!("Write failed (code {}): {}", code, e);
                    let message = e.to_string();
                    self.inner.invalidate_locked(&mut socket, generation, || {
                        ClientError::ConnectionLost(message.clone())
                    });
                    return Err(ClientError::Io(e));
                }
                Err(_) => {
                    // A partial frame may be on the wire; the socket is unusable
                    tracing::debug!(
                        "Write of request code={} stalled for {:?}, invalidating connection",
                        code,
                        timeout
                    );
                    self.inner
                        .invalidate_locked(&mut socket, generation, || ClientError::Timeout);
                    return Err(ClientError::Timeout);
                }
            }

            tracing::trace!("Request code={} sent ({} bytes)", code, encoded.len());
            (rx, generation)
        };

        match tokio::time::timeout_at(deadline, rx).await {
            Ok(Ok(result)) => result,
            Ok(Err(_)) => Err(ClientError::ConnectionClosed),
            Err(_) => {
                tracing::debug!(
                    "Request code={} timed out after {:?}, invalidating connection",
                    code,
                    timeout
                );
                self.inner
                    .invalidate(generation, || ClientError::Timeout)
                    .await;
                Err(ClientError::Timeout)
            }
        }
    }

    /// Returns the current connection state.
    pub fn state(&self) -> ConnectionState {
        ConnectionState::from_u8(self.inner.state.load(Ordering::SeqCst))
    }

    /// Returns whether the connection is established.
    pub fn is_connected(&self) -> bool {
        self.state() == ConnectionState::Connected
    }

    /// Returns the per-request timeout.
    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.inner.request_timeout_ms.load(Ordering::SeqCst))
    }

    /// Sets the per-request timeout for subsequent requests.
    pub fn set_request_timeout(&self, timeout: Duration) {
        self.inner
            .request_timeout_ms
            .store(timeout.as_millis() as u64, Ordering::SeqCst);
    }

    /// Closes the connection.
    ///
    /// Pending requests fail with [`ClientError::Closed`], and so does every
    /// later request; a closed connection never reconnects.
    pub async fn close(&self) -> Result<(), ClientError> {
        tracing::debug!("Closing connection...");

        let mut socket = self.inner.socket.lock().await;
        let previous = std::mem::replace(&mut *socket, Socket::Closed);
        self.inner.set_state(ConnectionState::Closed);

        if let Socket::Connected(mut link) = previous {
            let failed = link.pending.lock().fail_all(|| ClientError::Closed);
            tracing::debug!("Rejected {} pending request(s)", failed);
            let _ = link.writer.shutdown().await;
        }

        tracing::debug!("Connection closed");
        Ok(())
    }

    /// Returns the number of requests waiting for a response.
    pub async fn pending_count(&self) -> usize {
        match &*self.inner.socket.lock().await {
            Socket::Connected(link) => link.pending.lock().len(),
            _ => 0,
        }
    }
}

/// Reader task of one socket.
async fn read_loop<R>(
    inner: Weak<Inner>,
    generation: u64,
    reader: R,
    pending: Arc<Mutex<PendingQueue>>,
    buffer_size: usize,
    idle_timeout: Option<Duration>,
) where
    R: AsyncRead + Unpin,
{
    let reason = dispatch_frames(reader, &pending, buffer_size, idle_timeout).await;
    tracing::debug!("read_loop (generation {}) stopped: {:?}", generation, reason);

    match inner.upgrade() {
        Some(inner) => inner.invalidate(generation, || reason.to_error()).await,
        None => {
            pending.lock().fail_all(|| reason.to_error());
        }
    }
}

/// Reads from `reader` and resolves pending requests until the stream fails.
pub(crate) async fn dispatch_frames<R>(
    mut reader: R,
    pending: &Mutex<PendingQueue>,
    buffer_size: usize,
    idle_timeout: Option<Duration>,
) -> Disconnect
where
    R: AsyncRead + Unpin,
{
    let mut decoder = Decoder::with_capacity(buffer_size);
    let mut buf = vec![0u8; buffer_size];

    loop {
        let read = match idle_timeout {
            Some(idle) => match tokio::time::timeout(idle, reader.read(&mut buf)).await {
                Ok(read) => read,
                Err(_) => return Disconnect::Idle,
            },
            None => reader.read(&mut buf).await,
        };

        let n = match read {
            Ok(0) => return Disconnect::Eof,
            Ok(n) => n,
            Err(e) => return Disconnect::Io(e.to_string()),
        };

        decoder.extend(&buf[..n]);
        tracing::trace!("read_loop: received {} bytes, {} buffered", n, decoder.buffered());

        // Extract every complete frame before reading again
        loop {
            let frame = match decoder.decode_frame() {
                Ok(Some(frame)) => frame,
                Ok(None) => break,
                Err(e) => return Disconnect::Corrupt(e.to_string()),
            };
            dispatch(pending, Inbound::from_frame(frame).map_err(ClientError::Protocol));
        }
    }
}

/// Hands one decoded frame to the oldest pending request.
fn dispatch(pending: &Mutex<PendingQueue>, result: Result<Inbound, ClientError>) {
    let Some(request) = pending.lock().dequeue_oldest() else {
        match &result {
            Ok(inbound) => tracing::warn!("Unexpected {} with no pending request", inbound.describe()),
            Err(e) => tracing::warn!("Undecodable frame with no pending request: {}", e),
        }
        return;
    };

    match result {
        Ok(Inbound::Error(err)) => request.reject(ClientError::server(err)),
        Ok(inbound) => request.resolve(inbound),
        Err(e) => request.reject(e),
    }
}

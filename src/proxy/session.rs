//! Forwarding session
//!
//! A session owns one client stream (already TLS-handshaken) and, once `run`
//! has dialed it, one backend TCP stream. It relays bytes between them until
//! either side reaches EOF or fails, then releases both.

use std::fmt;
use std::io;
use std::net::SocketAddr;
use std::time::Duration;

use log::{debug, info};
use thiserror::Error;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::time::timeout;

use crate::common::loopback;
use crate::config::defaults;

const CLOSE_TIMEOUT: Duration = Duration::from_millis(defaults::CLOSE_TIMEOUT_MILLIS);

/// Streams a session can serve as its client side
///
/// Implemented for every async byte stream; in production this is
/// `tokio_openssl::SslStream<TcpStream>`.
pub trait ClientStream: AsyncRead + AsyncWrite + Unpin + Send + 'static {}

impl<T> ClientStream for T where T: AsyncRead + AsyncWrite + Unpin + Send + 'static {}

/// Session lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Client accepted, backend not dialed yet
    Created,
    /// Backend dial in progress
    Dialing,
    /// Relaying bytes in both directions
    Forwarding,
    /// Both handles released; terminal
    Closed,
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Created => write!(f, "created"),
            Self::Dialing => write!(f, "dialing"),
            Self::Forwarding => write!(f, "forwarding"),
            Self::Closed => write!(f, "closed"),
        }
    }
}

/// One end of a session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Side {
    /// The TLS client
    Client,
    /// The plaintext backend
    Backend,
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Client => write!(f, "client"),
            Self::Backend => write!(f, "backend"),
        }
    }
}

/// Errors that end a single session
#[derive(Error, Debug)]
pub enum SessionError {
    /// Backend refused or failed the connection
    #[error("failed to connect to backend port {port}: {source}")]
    Dial {
        port: u16,
        #[source]
        source: io::Error,
    },

    /// Backend did not accept the connection in time
    #[error("timed out connecting to backend port {port}")]
    DialTimeout { port: u16 },

    /// Read or write failure on one side
    #[error("{side} I/O error: {source}")]
    Io {
        side: Side,
        #[source]
        source: io::Error,
    },

    /// `run` called on a session that already ran
    #[error("session cannot run in state {0}")]
    InvalidState(SessionState),
}

/// Per-session settings, shared by every session a listener creates
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionOptions {
    /// Loopback port of the backend
    pub target_port: u16,
    /// Bytes read per forwarding step
    pub chunk_size: usize,
    /// Backend connect timeout
    pub connect_timeout: Duration,
}

impl SessionOptions {
    /// Options with default chunk size and connect timeout
    pub fn new(target_port: u16) -> Self {
        Self {
            target_port,
            chunk_size: defaults::CHUNK_SIZE,
            connect_timeout: Duration::from_secs(defaults::CONNECT_TIMEOUT_SECS),
        }
    }
}

/// Outcome of a session that ended on a clean EOF
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionSummary {
    /// Bytes relayed from the client to the backend
    pub client_to_backend: u64,
    /// Bytes relayed from the backend to the client
    pub backend_to_client: u64,
    /// Side whose EOF ended the session
    pub closed_by: Side,
}

/// A proxied connection
pub struct Session<S> {
    id: u64,
    remote_addr: SocketAddr,
    options: SessionOptions,
    state: SessionState,
    client: Option<S>,
    backend: Option<TcpStream>,
}

impl<S: ClientStream> Session<S> {
    /// Wrap an accepted client stream
    ///
    /// The backend is not dialed until [`Session::run`].
    pub fn new(id: u64, client: S, remote_addr: SocketAddr, options: SessionOptions) -> Self {
        Self {
            id,
            remote_addr,
            options,
            state: SessionState::Created,
            client: Some(client),
            backend: None,
        }
    }

    /// Session id, unique per listener
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Address of the client
    pub fn remote_addr(&self) -> SocketAddr {
        self.remote_addr
    }

    /// Backend port this session dials
    pub fn target_port(&self) -> u16 {
        self.options.target_port
    }

    /// Current lifecycle state
    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Whether the backend connection is currently held
    pub fn has_backend(&self) -> bool {
        self.backend.is_some()
    }

    /// Dial the backend and relay bytes until either side ends
    ///
    /// On return, successful or not, the session is closed.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::Dial`/`DialTimeout` if the backend cannot be
    /// reached, `SessionError::Io` on a read or write failure, and
    /// `SessionError::InvalidState` if the session already ran.
    pub async fn run(&mut self) -> Result<SessionSummary, SessionError> {
        if self.state != SessionState::Created {
            return Err(SessionError::InvalidState(self.state));
        }

        self.state = SessionState::Dialing;
        let backend = match dial(self.options).await {
            Ok(backend) => backend,
            Err(e) => {
                self.close().await;
                return Err(e);
            }
        };

        debug!(
            "Session {}: connected {} to backend port {}",
            self.id, self.remote_addr, self.options.target_port
        );
        self.backend = Some(backend);
        self.state = SessionState::Forwarding;

        let result = self.forward().await;
        self.close().await;
        result
    }

    /// Relay bytes until EOF or error
    ///
    /// Each iteration waits for whichever handle becomes readable first and
    /// services only that direction, writing the full chunk before reading again.
    async fn forward(&mut self) -> Result<SessionSummary, SessionError> {
        let (client, backend) = match (self.client.as_mut(), self.backend.as_mut()) {
            (Some(client), Some(backend)) => (client, backend),
            _ => return Err(SessionError::InvalidState(self.state)),
        };

        let mut client_buf = vec![0u8; self.options.chunk_size];
        let mut backend_buf = vec![0u8; self.options.chunk_size];
        let mut client_to_backend = 0u64;
        let mut backend_to_client = 0u64;

        let closed_by = loop {
            tokio::select! {
                read = client.read(&mut client_buf) => {
                    let n = read.map_err(|source| SessionError::Io { side: Side::Client, source })?;
                    if n == 0 {
                        break Side::Client;
                    }
                    relay(backend, &client_buf[..n])
                        .await
                        .map_err(|source| SessionError::Io { side: Side::Backend, source })?;
                    client_to_backend += n as u64;
                    metrics::counter!("forwarder.bytes", "direction" => "client_to_backend").increment(n as u64);
                }
                read = backend.read(&mut backend_buf) => {
                    let n = read.map_err(|source| SessionError::Io { side: Side::Backend, source })?;
                    if n == 0 {
                        break Side::Backend;
                    }
                    relay(client, &backend_buf[..n])
                        .await
                        .map_err(|source| SessionError::Io { side: Side::Client, source })?;
                    backend_to_client += n as u64;
                    metrics::counter!("forwarder.bytes", "direction" => "backend_to_client").increment(n as u64);
                }
            }
        };

        debug!(
            "Session {}: {} closed, {} bytes to backend, {} bytes to client",
            self.id, closed_by, client_to_backend, backend_to_client
        );

        Ok(SessionSummary {
            client_to_backend,
            backend_to_client,
            closed_by,
        })
    }

    /// Release both handles
    ///
    /// The backend is shut down first, then the client gets a bounded
    /// graceful shutdown (TLS close_notify) before it is dropped. A failure
    /// or stall on one handle never keeps the other open. Calls after the
    /// first are no-ops.
    pub async fn close(&mut self) {
        if self.state == SessionState::Closed {
            return;
        }
        self.state = SessionState::Closed;

        if let Some(mut backend) = self.backend.take() {
            if let Err(e) = backend.shutdown().await {
                debug!("Session {}: error closing backend: {}", self.id, e);
            }
        }

        if let Some(mut client) = self.client.take() {
            match timeout(CLOSE_TIMEOUT, client.shutdown()).await {
                Ok(Ok(())) => {}
                Ok(Err(e)) => {
                    debug!("Session {}: error closing client {}: {}", self.id, self.remote_addr, e)
                }
                Err(_) => {
                    debug!("Session {}: client {} did not take close_notify, dropping", self.id, self.remote_addr)
                }
            }
        }

        info!("Session {}: closed connection from {}", self.id, self.remote_addr);
    }
}

impl<S> fmt::Debug for Session<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("id", &self.id)
            .field("remote_addr", &self.remote_addr)
            .field("target_port", &self.options.target_port)
            .field("state", &self.state)
            .field("backend", &self.backend.as_ref().map(|_| "<TcpStream>"))
            .finish()
    }
}

/// Connect to the backend on loopback
async fn dial(options: SessionOptions) -> Result<TcpStream, SessionError> {
    let port = options.target_port;

    let stream = timeout(options.connect_timeout, TcpStream::connect(loopback(port)))
        .await
        .map_err(|_| SessionError::DialTimeout { port })?
        .map_err(|source| SessionError::Dial { port, source })?;

    // Relayed chunks are already sized; don't let Nagle hold them back.
    stream
        .set_nodelay(true)
        .map_err(|source| SessionError::Io { side: Side::Backend, source })?;

    Ok(stream)
}

/// Write a whole chunk and flush it through any buffering layer (TLS records)
async fn relay<W: AsyncWrite + Unpin>(writer: &mut W, chunk: &[u8]) -> io::Result<()> {
    writer.write_all(chunk).await?;
    writer.flush().await
}

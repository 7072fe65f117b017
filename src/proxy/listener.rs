//! Listener and acceptor
//!
//! Binds the loopback listen socket, accepts connections, terminates TLS and
//! hands each handshaken connection to the work queue as a new session.

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use log::{debug, error, info, warn};
use openssl::ssl::SslAcceptor;
use socket2::{Domain, Protocol, Socket, Type};
use tokio::net::{TcpListener, TcpStream};
use tokio::task::JoinSet;
use tokio::time::timeout;
use tokio_openssl::SslStream;

use crate::common::{loopback, ProxyError, Result};
use crate::tls::accept_tls;
use super::queue::WorkQueue;
use super::session::{Session, SessionOptions};

/// Client stream type produced by the listener
pub type TlsStream = SslStream<TcpStream>;

/// Session type produced by the listener
pub type TlsSession = Session<TlsStream>;

/// TLS-terminating listener bound to a loopback port
pub struct Listener {
    listener: TcpListener,
    tls_acceptor: Arc<SslAcceptor>,
    options: SessionOptions,
    handshake_timeout: Duration,
}

impl Listener {
    /// Bind `127.0.0.1:port` with the given backlog
    ///
    /// Must be called from within a tokio runtime.
    ///
    /// # Errors
    ///
    /// Returns `ProxyError::Bind` if the socket cannot be created, bound or
    /// put into listening state.
    pub fn bind(
        port: u16,
        backlog: u32,
        tls_acceptor: SslAcceptor,
        options: SessionOptions,
        handshake_timeout: Duration,
    ) -> Result<Self> {
        let addr = loopback(port);
        let listener = bind_socket(addr, backlog).map_err(|source| ProxyError::Bind { addr, source })?;

        info!("Listening on {} (backlog {})", listener.local_addr()?, backlog);

        Ok(Self {
            listener,
            tls_acceptor: Arc::new(tls_acceptor),
            options,
            handshake_timeout,
        })
    }

    /// Address actually bound (resolves port 0)
    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.listener.local_addr()?)
    }

    /// Accept connections until `shutdown` completes
    ///
    /// Each connection is handshaken in its own short-lived task so a slow
    /// client never stalls acceptance. Failures of a single connection are
    /// logged and do not end the loop.
    pub async fn accept_loop<F>(self, queue: WorkQueue<TlsStream>, shutdown: F) -> Result<()>
    where
        F: Future<Output = ()>,
    {
        tokio::pin!(shutdown);

        let mut handshakes = JoinSet::new();
        let mut next_id = 0u64;

        loop {
            // Reap finished handshake tasks
            while let Some(result) = handshakes.try_join_next() {
                if let Err(e) = result {
                    error!("Handshake task error: {}", e);
                }
            }

            tokio::select! {
                _ = &mut shutdown => {
                    info!("Shutdown requested, no longer accepting connections");
                    break;
                }
                accepted = self.listener.accept() => match accepted {
                    Ok((stream, remote_addr)) => {
                        next_id += 1;
                        debug!("Accepted connection {} from {}", next_id, remote_addr);
                        metrics::counter!("forwarder.sessions.accepted").increment(1);

                        handshakes.spawn(establish(
                            next_id,
                            stream,
                            remote_addr,
                            Arc::clone(&self.tls_acceptor),
                            self.options,
                            self.handshake_timeout,
                            queue.clone(),
                        ));
                    }
                    Err(e) => {
                        error!("Error accepting connection: {}", e);
                    }
                }
            }
        }

        // Connections still mid-handshake are dropped.
        handshakes.shutdown().await;
        Ok(())
    }
}

/// Create the listening socket through socket2 so the backlog can be set
fn bind_socket(addr: SocketAddr, backlog: u32) -> std::io::Result<TcpListener> {
    let socket = Socket::new(Domain::for_address(addr), Type::STREAM, Some(Protocol::TCP))?;
    socket.set_reuse_address(true)?;
    socket.set_nonblocking(true)?;
    socket.bind(&addr.into())?;
    socket.listen(i32::try_from(backlog).unwrap_or(i32::MAX))?;

    TcpListener::from_std(socket.into())
}

/// Handshake one connection and enqueue the resulting session
async fn establish(
    id: u64,
    stream: TcpStream,
    remote_addr: SocketAddr,
    tls_acceptor: Arc<SslAcceptor>,
    options: SessionOptions,
    handshake_timeout: Duration,
    queue: WorkQueue<TlsStream>,
) {
    if let Err(e) = stream.set_nodelay(true) {
        debug!("Failed to set TCP_NODELAY for {}: {}", remote_addr, e);
    }

    let tls_stream = match timeout(handshake_timeout, accept_tls(&tls_acceptor, stream)).await {
        Ok(Ok(tls_stream)) => tls_stream,
        Ok(Err(e)) => {
            metrics::counter!("forwarder.handshakes.failed").increment(1);
            warn!("TLS handshake with {} failed: {}", remote_addr, e);
            return;
        }
        Err(_) => {
            metrics::counter!("forwarder.handshakes.failed").increment(1);
            warn!("TLS handshake with {} timed out after {:?}", remote_addr, handshake_timeout);
            return;
        }
    };

    let session = Session::new(id, tls_stream, remote_addr, options);
    if let Err(e) = queue.push(session).await {
        error!("Dropping connection {} from {}: {}", id, remote_addr, e);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::test_utils::{tls_connect, TestCertificate};
    use crate::tls::create_tls_acceptor;
    use tokio::io::AsyncWriteExt;
    use tokio::sync::oneshot;

    fn acceptor(cert: &TestCertificate) -> SslAcceptor {
        create_tls_acceptor(&cert.cert_path, &cert.key_path).unwrap()
    }

    #[tokio::test]
    async fn test_bind_ephemeral_port() {
        let cert = TestCertificate::generate();
        let listener = Listener::bind(
            0,
            128,
            acceptor(&cert),
            SessionOptions::new(8080),
            Duration::from_secs(5),
        )
        .unwrap();

        let addr = listener.local_addr().unwrap();
        assert!(addr.ip().is_loopback());
        assert_ne!(addr.port(), 0);
    }

    #[tokio::test]
    async fn test_bind_port_in_use() {
        let cert = TestCertificate::generate();
        let taken = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let port = taken.local_addr().unwrap().port();

        let result = Listener::bind(port, 128, acceptor(&cert), SessionOptions::new(8080), Duration::from_secs(5));
        match result {
            Err(e @ ProxyError::Bind { .. }) => assert_eq!(e.exit_code(), 4),
            Err(e) => panic!("unexpected error: {}", e),
            Ok(_) => panic!("binding a port in use should fail"),
        }
    }

    #[tokio::test]
    async fn test_handshake_failure_keeps_accepting() {
        let cert = TestCertificate::generate();
        let listener = Listener::bind(0, 128, acceptor(&cert), SessionOptions::new(8080), Duration::from_secs(5)).unwrap();
        let port = listener.local_addr().unwrap().port();

        let queue = WorkQueue::unbounded();
        let (stop_tx, stop_rx) = oneshot::channel::<()>();
        let acceptor_task = tokio::spawn(listener.accept_loop(queue.clone(), async move {
            let _ = stop_rx.await;
        }));

        // A plaintext client fails the handshake
        let mut plain = TcpStream::connect(("127.0.0.1", port)).await.unwrap();
        plain.write_all(b"not a client hello\r\n\r\n").await.unwrap();

        // A TLS client still gets through and becomes a queued session
        let _client = tls_connect(port).await;
        let session = queue.pop().await.unwrap();
        assert_eq!(session.target_port(), 8080);
        assert!(session.remote_addr().ip().is_loopback());

        stop_tx.send(()).unwrap();
        acceptor_task.await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn test_handshake_timeout() {
        let cert = TestCertificate::generate();
        let listener = Listener::bind(0, 128, acceptor(&cert), SessionOptions::new(8080), Duration::from_millis(100)).unwrap();
        let port = listener.local_addr().unwrap().port();

        let queue = WorkQueue::unbounded();
        let (stop_tx, stop_rx) = oneshot::channel::<()>();
        let acceptor_task = tokio::spawn(listener.accept_loop(queue.clone(), async move {
            let _ = stop_rx.await;
        }));

        // Connects but never sends a ClientHello
        let mut silent = TcpStream::connect(("127.0.0.1", port)).await.unwrap();
        let mut buf = [0u8; 1];
        let read = tokio::time::timeout(Duration::from_secs(5), tokio::io::AsyncReadExt::read(&mut silent, &mut buf))
            .await
            .expect("stalled handshake should be dropped");
        assert!(matches!(read, Ok(0) | Err(_)));

        stop_tx.send(()).unwrap();
        acceptor_task.await.unwrap().unwrap();
    }
}

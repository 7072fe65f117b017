//! Forwarder server
//!
//! Wires the listener, work queue and worker pool together and owns their
//! lifecycle from bind to graceful shutdown.

use std::future::Future;
use std::net::SocketAddr;

use log::{info, warn};
use tokio::time::timeout;

use crate::common::{ProxyError, Result};
use crate::config::ForwarderConfig;
use crate::tls::create_tls_acceptor;
use super::listener::Listener;
use super::queue::WorkQueue;
use super::worker::{WorkerPool, WorkerStats};

/// TLS forwarder
///
/// Terminates TLS on `127.0.0.1:source_port` and relays each connection to
/// `127.0.0.1:target_port` in plaintext.
///
/// # Example
///
/// ```no_run
/// # use tls_forwarder::{Forwarder, ForwarderConfig};
/// # #[tokio::main]
/// # async fn main() -> tls_forwarder::Result<()> {
/// let config = ForwarderConfig::new(8443, 8080, "certs/server.crt", "certs/server.key");
/// let forwarder = Forwarder::bind(config)?;
/// forwarder.run().await?;
/// # Ok(())
/// # }
/// ```
pub struct Forwarder {
    listener: Listener,
    config: ForwarderConfig,
}

impl Forwarder {
    /// Validate the configuration, load the certificate and bind the listener
    ///
    /// Nothing is bound when the certificate or key cannot be loaded.
    ///
    /// # Errors
    ///
    /// Returns `ProxyError::Config` for invalid values, `ProxyError::Certificate`
    /// for unusable certificate material and `ProxyError::Bind` when the
    /// listen socket cannot be set up.
    pub fn bind(config: ForwarderConfig) -> Result<Self> {
        config.validate()?;

        let tls_acceptor = create_tls_acceptor(&config.public_certificate, &config.private_key)?;

        let listener = Listener::bind(
            config.source_port,
            config.backlog,
            tls_acceptor,
            config.session_options(),
            config.handshake_timeout(),
        )?;

        Ok(Self { listener, config })
    }

    /// Address the listener is bound to
    pub fn local_addr(&self) -> Result<SocketAddr> {
        self.listener.local_addr()
    }

    /// Configuration in use
    pub fn config(&self) -> &ForwarderConfig {
        &self.config
    }

    /// Run until Ctrl+C
    pub async fn run(self) -> Result<Vec<WorkerStats>> {
        self.run_until(async {
            match tokio::signal::ctrl_c().await {
                Ok(()) => info!("Received Ctrl+C"),
                Err(e) => warn!("Failed to listen for Ctrl+C: {}", e),
            }
        })
        .await
    }

    /// Run until `shutdown` completes
    ///
    /// On shutdown the listener stops accepting, every worker receives a
    /// sentinel behind the already queued sessions, and the pool is given
    /// `shutdown_timeout` to drain. Returns the stats of the workers that
    /// exited in time.
    pub async fn run_until<F>(self, shutdown: F) -> Result<Vec<WorkerStats>>
    where
        F: Future<Output = ()>,
    {
        let Self { listener, config } = self;

        info!(
            "Forwarding {} -> 127.0.0.1:{} with {} workers",
            listener.local_addr()?,
            config.target_port,
            config.workers
        );

        let queue = WorkQueue::new(config.queue_capacity);
        let pool = WorkerPool::spawn(config.workers, queue.clone());

        listener.accept_loop(queue.clone(), shutdown).await?;

        // Sentinels may wait for queue space, so they share the drain deadline.
        let workers = pool.size();
        let abort_handles = pool.abort_handles();
        let drain = async move {
            queue.shutdown(workers).await?;
            Ok::<_, ProxyError>(pool.join().await)
        };

        match timeout(config.shutdown_timeout(), drain).await {
            Ok(stats) => {
                let stats = stats?;
                let (completed, failed) = stats
                    .iter()
                    .fold((0, 0), |(c, f), s| (c + s.completed, f + s.failed));
                info!(
                    "All workers stopped ({} sessions completed, {} failed)",
                    completed, failed
                );
                Ok(stats)
            }
            Err(_) => {
                warn!(
                    "Workers did not finish within {:?}, abandoning open sessions",
                    config.shutdown_timeout()
                );
                for handle in abort_handles {
                    handle.abort();
                }
                Ok(Vec::new())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::test_utils::{tls_connect, TestCertificate};
    use std::time::Duration;
    use tokio::net::TcpListener;
    use tokio::sync::oneshot;

    #[tokio::test]
    async fn test_bind_ephemeral_port() {
        let cert = TestCertificate::generate();
        let config = ForwarderConfig::new(0, 8080, &cert.cert_path, &cert.key_path);

        let forwarder = Forwarder::bind(config).unwrap();
        assert_ne!(forwarder.local_addr().unwrap().port(), 0);
        assert_eq!(forwarder.config().target_port, 8080);
    }

    #[tokio::test]
    async fn test_bad_certificate_binds_nothing() {
        let cert = TestCertificate::generate();
        let other = TestCertificate::generate();
        let taken = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let port = taken.local_addr().unwrap().port();
        drop(taken);

        // Key does not match the certificate
        let config = ForwarderConfig::new(port, 8080, &cert.cert_path, &other.key_path);
        let err = Forwarder::bind(config).err().unwrap();
        assert!(matches!(err, ProxyError::Certificate(_)));
        assert_eq!(err.exit_code(), 3);

        // The port was never claimed
        std::net::TcpListener::bind(("127.0.0.1", port)).unwrap();
    }

    #[tokio::test]
    async fn test_shutdown_stops_workers() {
        let cert = TestCertificate::generate();
        let mut config = ForwarderConfig::new(0, 8080, &cert.cert_path, &cert.key_path);
        config.workers = 2;

        let forwarder = Forwarder::bind(config).unwrap();
        let stats = forwarder.run_until(async {}).await.unwrap();

        assert_eq!(stats.len(), 2);
        assert!(stats.iter().all(|s| s.completed == 0 && s.failed == 0));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_shutdown_with_full_queue_respects_deadline() {
        let backend = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let backend_port = backend.local_addr().unwrap().port();

        // Accept backend connections and hold them open
        let _backend_task = tokio::spawn(async move {
            let mut held = Vec::new();
            while let Ok((conn, _)) = backend.accept().await {
                held.push(conn);
            }
        });

        let cert = TestCertificate::generate();
        let mut config = ForwarderConfig::new(0, backend_port, &cert.cert_path, &cert.key_path);
        config.workers = 1;
        config.queue_capacity = Some(1);
        config.shutdown_timeout = 1;

        let forwarder = Forwarder::bind(config).unwrap();
        let port = forwarder.local_addr().unwrap().port();

        let (stop_tx, stop_rx) = oneshot::channel::<()>();
        let run = tokio::spawn(forwarder.run_until(async move {
            let _ = stop_rx.await;
        }));

        // The first session occupies the only worker, the second fills the queue
        let _held = tls_connect(port).await;
        tokio::time::sleep(Duration::from_millis(200)).await;
        let _queued = tls_connect(port).await;
        tokio::time::sleep(Duration::from_millis(200)).await;

        stop_tx.send(()).unwrap();
        let stats = tokio::time::timeout(Duration::from_secs(5), run)
            .await
            .expect("shutdown should finish within its deadline")
            .unwrap()
            .unwrap();
        assert!(stats.is_empty());
    }
}

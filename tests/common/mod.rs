//! Shared helpers for integration tests

#![allow(dead_code)]

use std::time::Duration;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;

use tls_forwarder::proxy::WorkerStats;
use tls_forwarder::{Forwarder, ForwarderConfig};

pub use tls_forwarder::common::test_utils::{tls_connect, TestCertificate};

/// A port nothing listens on at the time of the call
pub fn unused_port() -> u16 {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    listener.local_addr().unwrap().port()
}

/// Plaintext backend that echoes every connection until EOF
pub async fn spawn_echo_backend() -> (u16, JoinHandle<()>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();

    let handle = tokio::spawn(async move {
        loop {
            let Ok((mut stream, _)) = listener.accept().await else {
                return;
            };
            tokio::spawn(async move {
                let mut buf = vec![0u8; 4096];
                loop {
                    match stream.read(&mut buf).await {
                        Ok(0) | Err(_) => return,
                        Ok(n) => {
                            if stream.write_all(&buf[..n]).await.is_err() {
                                return;
                            }
                        }
                    }
                }
            });
        }
    });

    (port, handle)
}

/// Forwarder running in the background
pub struct RunningForwarder {
    pub port: u16,
    stop: Option<oneshot::Sender<()>>,
    handle: JoinHandle<tls_forwarder::Result<Vec<WorkerStats>>>,
    _cert: TestCertificate,
}

impl RunningForwarder {
    pub async fn start(target_port: u16, workers: usize) -> Self {
        let cert = TestCertificate::generate();
        let mut config = ForwarderConfig::new(0, target_port, &cert.cert_path, &cert.key_path);
        config.workers = workers;
        config.connect_timeout = 5;
        config.shutdown_timeout = 5;

        let forwarder = Forwarder::bind(config).unwrap();
        let port = forwarder.local_addr().unwrap().port();

        let (stop, stopped) = oneshot::channel::<()>();
        let handle = tokio::spawn(forwarder.run_until(async move {
            let _ = stopped.await;
        }));

        Self { port, stop: Some(stop), handle, _cert: cert }
    }

    /// Stop accepting, drain the workers and return their stats
    pub async fn stop(mut self) -> Vec<WorkerStats> {
        if let Some(stop) = self.stop.take() {
            let _ = stop.send(());
        }
        tokio::time::timeout(Duration::from_secs(10), &mut self.handle)
            .await
            .expect("forwarder should stop")
            .unwrap()
            .unwrap()
    }
}

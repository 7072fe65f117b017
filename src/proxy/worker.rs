//! Worker pool
//!
//! A fixed set of tasks, each taking one session from the work queue and
//! running it to completion before taking the next.

use std::panic::AssertUnwindSafe;

use futures::FutureExt;
use log::{debug, error, info, warn};
use tokio::task::{AbortHandle, JoinHandle};

use super::queue::WorkQueue;
use super::session::{ClientStream, SessionError};

/// Counters reported by a worker when it exits
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WorkerStats {
    /// Worker index
    pub worker: usize,
    /// Sessions that ended on a clean EOF
    pub completed: u64,
    /// Sessions that ended with an error or panic
    pub failed: u64,
}

/// Fixed-size pool of session workers
#[derive(Debug)]
pub struct WorkerPool {
    handles: Vec<JoinHandle<WorkerStats>>,
}

impl WorkerPool {
    /// Spawn `size` workers on the current runtime, all reading from `queue`
    pub fn spawn<S: ClientStream>(size: usize, queue: WorkQueue<S>) -> Self {
        let handles = (0..size)
            .map(|worker| tokio::spawn(run_worker(worker, queue.clone())))
            .collect();

        info!("Started {} workers", size);
        Self { handles }
    }

    /// Number of workers
    pub fn size(&self) -> usize {
        self.handles.len()
    }

    /// Handles that cancel the workers, usable after `join` has taken the pool
    pub fn abort_handles(&self) -> Vec<AbortHandle> {
        self.handles.iter().map(JoinHandle::abort_handle).collect()
    }

    /// Wait for every worker to exit
    ///
    /// Workers exit after popping a shutdown sentinel.
    pub async fn join(self) -> Vec<WorkerStats> {
        let mut stats = Vec::with_capacity(self.handles.len());

        for handle in self.handles {
            match handle.await {
                Ok(worker_stats) => stats.push(worker_stats),
                Err(e) => error!("Worker task error: {}", e),
            }
        }

        stats
    }
}

/// Worker loop: pop, run, close, repeat
async fn run_worker<S: ClientStream>(worker: usize, queue: WorkQueue<S>) -> WorkerStats {
    let mut stats = WorkerStats { worker, ..WorkerStats::default() };
    debug!("Worker {} started", worker);

    while let Some(mut session) = queue.pop().await {
        let id = session.id();
        let remote_addr = session.remote_addr();
        metrics::gauge!("forwarder.sessions.active").increment(1.0);

        match AssertUnwindSafe(session.run()).catch_unwind().await {
            Ok(Ok(summary)) => {
                stats.completed += 1;
                debug!(
                    "Worker {}: session {} from {} finished ({} closed first)",
                    worker, id, remote_addr, summary.closed_by
                );
            }
            Ok(Err(e)) => {
                stats.failed += 1;
                metrics::counter!("forwarder.sessions.failed").increment(1);
                match e {
                    SessionError::InvalidState(_) => {
                        error!("Worker {}: session {} from {}: {}", worker, id, remote_addr, e)
                    }
                    _ => warn!("Worker {}: session {} from {} failed: {}", worker, id, remote_addr, e),
                }
            }
            Err(_) => {
                stats.failed += 1;
                metrics::counter!("forwarder.sessions.failed").increment(1);
                error!("Worker {}: session {} from {} panicked", worker, id, remote_addr);
            }
        }

        session.close().await;
        metrics::gauge!("forwarder.sessions.active").decrement(1.0);
    }

    debug!(
        "Worker {} exiting after {} completed and {} failed sessions",
        worker, stats.completed, stats.failed
    );
    stats
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::proxy::{Session, SessionOptions};
    use std::time::Duration;
    use tokio::io::{duplex, AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;
    use tokio::time::timeout;

    fn remote() -> std::net::SocketAddr {
        "127.0.0.1:40000".parse().unwrap()
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_worker_survives_dial_failure() {
        let refused = {
            let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
            listener.local_addr().unwrap().port()
        };
        let backend = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let backend_port = backend.local_addr().unwrap().port();

        let queue = WorkQueue::unbounded();
        let pool = WorkerPool::spawn(1, queue.clone());
        assert_eq!(pool.size(), 1);

        let (failing, _failing_peer) = duplex(64);
        queue.push(Session::new(1, failing, remote(), SessionOptions::new(refused))).await.unwrap();

        let (working, mut peer) = duplex(64);
        queue.push(Session::new(2, working, remote(), SessionOptions::new(backend_port))).await.unwrap();

        let (mut conn, _) = timeout(Duration::from_secs(5), backend.accept())
            .await
            .expect("worker should reach the second session")
            .unwrap();

        peer.write_all(b"ping").await.unwrap();
        let mut buf = [0u8; 4];
        conn.read_exact(&mut buf).await.unwrap();
        assert_eq!(&buf, b"ping");

        peer.shutdown().await.unwrap();
        drop(peer);

        queue.shutdown(1).await.unwrap();
        let stats = timeout(Duration::from_secs(5), pool.join()).await.unwrap();
        assert_eq!(stats, vec![WorkerStats { worker: 0, completed: 1, failed: 1 }]);
    }

    #[tokio::test]
    async fn test_workers_exit_on_sentinels() {
        let queue = WorkQueue::<tokio::io::DuplexStream>::unbounded();
        let pool = WorkerPool::spawn(3, queue.clone());

        queue.shutdown(3).await.unwrap();
        let stats = timeout(Duration::from_secs(5), pool.join()).await.unwrap();

        assert_eq!(stats.len(), 3);
        assert!(stats.iter().all(|s| s.completed == 0 && s.failed == 0));
    }
}

//! Work queue between the acceptor and the worker pool
//!
//! The queue is constructed once by the composition root and cloned into the
//! acceptor and every worker. Each pushed item is received by exactly one worker.

use std::fmt;
use std::sync::Arc;

use tokio::sync::{mpsc, Mutex};

use crate::common::{ProxyError, Result};
use super::session::{ClientStream, Session};

/// Item handed to a worker
pub enum WorkItem<S> {
    /// A session to run
    Session(Session<S>),
    /// Sentinel telling one worker to exit
    Shutdown,
}

impl<S> fmt::Debug for WorkItem<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Session(session) => f.debug_tuple("Session").field(session).finish(),
            Self::Shutdown => write!(f, "Shutdown"),
        }
    }
}

enum QueueSender<S> {
    Bounded(mpsc::Sender<WorkItem<S>>),
    Unbounded(mpsc::UnboundedSender<WorkItem<S>>),
}

impl<S> Clone for QueueSender<S> {
    fn clone(&self) -> Self {
        match self {
            Self::Bounded(tx) => Self::Bounded(tx.clone()),
            Self::Unbounded(tx) => Self::Unbounded(tx.clone()),
        }
    }
}

enum QueueReceiver<S> {
    Bounded(mpsc::Receiver<WorkItem<S>>),
    Unbounded(mpsc::UnboundedReceiver<WorkItem<S>>),
}

impl<S> QueueReceiver<S> {
    async fn recv(&mut self) -> Option<WorkItem<S>> {
        match self {
            Self::Bounded(rx) => rx.recv().await,
            Self::Unbounded(rx) => rx.recv().await,
        }
    }
}

/// Multi-producer, multi-consumer session queue
pub struct WorkQueue<S> {
    sender: QueueSender<S>,
    receiver: Arc<Mutex<QueueReceiver<S>>>,
    capacity: Option<usize>,
}

impl<S> Clone for WorkQueue<S> {
    fn clone(&self) -> Self {
        Self {
            sender: self.sender.clone(),
            receiver: Arc::clone(&self.receiver),
            capacity: self.capacity,
        }
    }
}

impl<S> fmt::Debug for WorkQueue<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WorkQueue")
            .field("capacity", &self.capacity)
            .finish()
    }
}

impl<S: ClientStream> WorkQueue<S> {
    /// Create a queue
    ///
    /// `None` creates an unbounded queue; `Some(n)` holds at most `n` pending
    /// items and makes `push` wait for space.
    ///
    /// # Panics
    ///
    /// Panics if `capacity` is `Some(0)`; configuration validation rejects that value.
    pub fn new(capacity: Option<usize>) -> Self {
        let (sender, receiver) = match capacity {
            Some(n) => {
                let (tx, rx) = mpsc::channel(n);
                (QueueSender::Bounded(tx), QueueReceiver::Bounded(rx))
            }
            None => {
                let (tx, rx) = mpsc::unbounded_channel();
                (QueueSender::Unbounded(tx), QueueReceiver::Unbounded(rx))
            }
        };

        Self {
            sender,
            receiver: Arc::new(Mutex::new(receiver)),
            capacity,
        }
    }

    /// Unbounded queue
    pub fn unbounded() -> Self {
        Self::new(None)
    }

    /// Configured capacity, `None` when unbounded
    pub fn capacity(&self) -> Option<usize> {
        self.capacity
    }

    /// Enqueue a session
    ///
    /// Waits for space when the queue is bounded and full.
    pub async fn push(&self, session: Session<S>) -> Result<()> {
        self.send(WorkItem::Session(session)).await
    }

    /// Take the next session
    ///
    /// Waits until an item is available. Returns `None` when the item is a
    /// shutdown sentinel, telling the calling worker to exit.
    pub async fn pop(&self) -> Option<Session<S>> {
        let item = self.receiver.lock().await.recv().await;

        match item {
            Some(WorkItem::Session(session)) => Some(session),
            Some(WorkItem::Shutdown) | None => None,
        }
    }

    /// Push one shutdown sentinel per worker
    ///
    /// Sentinels queue behind pending sessions, so those are still served.
    pub async fn shutdown(&self, workers: usize) -> Result<()> {
        for _ in 0..workers {
            self.send(WorkItem::Shutdown).await?;
        }
        Ok(())
    }

    async fn send(&self, item: WorkItem<S>) -> Result<()> {
        match &self.sender {
            QueueSender::Bounded(tx) => tx.send(item).await.map_err(|_| ProxyError::QueueClosed),
            QueueSender::Unbounded(tx) => tx.send(item).map_err(|_| ProxyError::QueueClosed),
        }
    }
}

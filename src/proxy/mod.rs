//! Forwarding proxy
//!
//! The listener accepts and handshakes connections, pushes each one onto the
//! work queue as a session, and a fixed pool of workers runs the sessions.
//! A session owns both of its connections; nothing is shared between sessions.

mod listener;
mod queue;
pub mod server;
mod session;
mod worker;

pub use listener::{Listener, TlsSession, TlsStream};
pub use queue::{WorkItem, WorkQueue};
pub use server::Forwarder;
pub use session::{
    ClientStream, Session, SessionError, SessionOptions, SessionState, SessionSummary, Side,
};
pub use worker::{WorkerPool, WorkerStats};

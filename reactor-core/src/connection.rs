//! Per-connection state and lifetime.
//!
//! A `Connection` is shared (`Arc`) between the fd-index entry that
//! registers it, its read task, its write task, and any in-flight
//! `Message`. Its fields other than `status`, `msg_refcount` and `owner`
//! are touched only by its owning reactor's tasks, which is what lets the
//! reactor loop use plain fields instead of locking on every access.

use std::os::unix::io::RawFd;
use std::sync::atomic::{AtomicU8, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use bytes::Bytes;

use crate::buffer::FrameBuffer;
use crate::handle_set::HandleSet;

/// Sentinel meaning "not yet steered to a reactor."
pub const NO_OWNER: usize = usize::MAX;

/// Connection lifecycle status.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnStatus {
    Open,
    Closed,
}

impl ConnStatus {
    const fn as_u8(self) -> u8 {
        match self {
            Self::Open => 0,
            Self::Closed => 1,
        }
    }

    const fn from_u8(v: u8) -> Self {
        match v {
            0 => Self::Open,
            _ => Self::Closed,
        }
    }
}

/// Commands sent to a connection's write task.
pub enum ConnCmd {
    /// Write these bytes (already encoded) to the socket.
    Send(Bytes),
    /// Stop accepting further writes and tear the write half down.
    Close,
}

/// Per-socket state: address, buffers, status, and the message ref-count.
pub struct Connection<Req, Resp> {
    pub remote_addr: String,
    pub remote_port: u16,
    fd: RawFd,
    status: AtomicU8,
    /// Baseline 1 (the fd-index's registration) plus one per in-flight
    /// `Message`.
    msg_refcount: AtomicUsize,
    /// Reactor index that adopted this connection, set once at steering
    /// time. `NO_OWNER` until then.
    owner: AtomicUsize,
    /// Whether a write-drain is currently needed (the "write-event
    /// watermark" for queued writes).
    write_armed: AtomicUsize,
    pub(crate) read_buf: Mutex<FrameBuffer>,
    pub(crate) write_buf: Mutex<FrameBuffer>,
    pub handle_set: Arc<HandleSet<Req, Resp>>,
    write_tx: flume::Sender<ConnCmd>,
}

impl<Req, Resp> Connection<Req, Resp> {
    #[must_use]
    pub fn new(
        remote_addr: String,
        remote_port: u16,
        fd: RawFd,
        handle_set: Arc<HandleSet<Req, Resp>>,
        write_tx: flume::Sender<ConnCmd>,
    ) -> Self {
        Self {
            remote_addr,
            remote_port,
            fd,
            status: AtomicU8::new(ConnStatus::Open.as_u8()),
            msg_refcount: AtomicUsize::new(1),
            owner: AtomicUsize::new(NO_OWNER),
            write_armed: AtomicUsize::new(0),
            read_buf: Mutex::new(FrameBuffer::new()),
            write_buf: Mutex::new(FrameBuffer::new()),
            handle_set,
            write_tx,
        }
    }

    #[must_use]
    pub const fn fd(&self) -> RawFd {
        self.fd
    }

    #[must_use]
    pub fn status(&self) -> ConnStatus {
        ConnStatus::from_u8(self.status.load(Ordering::SeqCst))
    }

    #[must_use]
    pub fn is_open(&self) -> bool {
        self.status() == ConnStatus::Open
    }

    /// Adopt this connection onto reactor `idx`. Called exactly once, by
    /// the reactor that accepted or was steered the connection.
    pub fn set_owner(&self, idx: usize) {
        self.owner.store(idx, Ordering::SeqCst);
    }

    /// The reactor that owns this connection, or `None` before steering.
    #[must_use]
    pub fn owner(&self) -> Option<usize> {
        match self.owner.load(Ordering::SeqCst) {
            NO_OWNER => None,
            idx => Some(idx),
        }
    }

    /// Transition `Open -> Closed`. Returns `true` if this call performed
    /// the transition (so the caller knows whether to run `on_disconnect`
    /// and whether to inspect `msg_refcount` for finalization).
    pub fn mark_closed(&self) -> bool {
        self.status
            .compare_exchange(
                ConnStatus::Open.as_u8(),
                ConnStatus::Closed.as_u8(),
                Ordering::SeqCst,
                Ordering::SeqCst,
            )
            .is_ok()
    }

    /// Increment the message ref-count (called by `Message::new`).
    pub(crate) fn retain(&self) {
        self.msg_refcount.fetch_add(1, Ordering::SeqCst);
    }

    /// Decrement the message ref-count (called by `Message::drop`).
    /// Returns the ref-count *after* decrementing.
    pub(crate) fn release(&self) -> usize {
        self.msg_refcount.fetch_sub(1, Ordering::SeqCst) - 1
    }

    /// Current message ref-count (1 == only the baseline registration
    /// remains, i.e. no in-flight `Message`).
    #[must_use]
    pub fn refcount(&self) -> usize {
        self.msg_refcount.load(Ordering::SeqCst)
    }

    /// Whether this connection is closed and has no in-flight `Message`
    /// left (ref-count at or below the registration baseline). A
    /// connection in this state is ready for the fd-index to drop it.
    #[must_use]
    pub fn is_quiescent(&self) -> bool {
        !self.is_open() && self.refcount() <= 1
    }

    /// Queue bytes for the write task to send. No-op if the write task has
    /// already gone away (connection closing concurrently).
    pub fn queue_write(&self, bytes: Bytes) {
        if bytes.is_empty() {
            return;
        }
        self.write_armed.store(1, Ordering::SeqCst);
        let _ = self.write_tx.send(ConnCmd::Send(bytes));
    }

    /// Ask the write task to shut down.
    pub fn queue_close(&self) {
        let _ = self.write_tx.send(ConnCmd::Close);
    }

    /// Mark the write-event watermark disarmed (write buffer drained).
    pub(crate) fn disarm_write(&self) {
        self.write_armed.store(0, Ordering::SeqCst);
    }

    #[must_use]
    pub fn write_armed(&self) -> bool {
        self.write_armed.load(Ordering::SeqCst) != 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handle_set::HandleSet;

    fn test_conn() -> Arc<Connection<u8, u8>> {
        let (tx, _rx) = flume::unbounded();
        Arc::new(Connection::new(
            "127.0.0.1".into(),
            1234,
            7,
            Arc::new(HandleSet::new()),
            tx,
        ))
    }

    #[test]
    fn starts_open_with_baseline_refcount() {
        let conn = test_conn();
        assert!(conn.is_open());
        assert_eq!(conn.refcount(), 1);
        assert_eq!(conn.owner(), None);
    }

    #[test]
    fn mark_closed_is_idempotent_transition() {
        let conn = test_conn();
        assert!(conn.mark_closed());
        assert!(!conn.is_open());
        // second call: no transition occurred (already closed)
        assert!(!conn.mark_closed());
    }

    #[test]
    fn retain_and_release_track_in_flight_messages() {
        let conn = test_conn();
        conn.retain();
        conn.retain();
        assert_eq!(conn.refcount(), 3);
        assert_eq!(conn.release(), 2);
        assert_eq!(conn.release(), 1);
    }

    #[test]
    fn owner_set_once_is_observable() {
        let conn = test_conn();
        conn.set_owner(2);
        assert_eq!(conn.owner(), Some(2));
    }

    #[test]
    fn quiescent_only_when_closed_and_no_messages_in_flight() {
        let conn = test_conn();
        assert!(!conn.is_quiescent(), "open connection is never quiescent");
        conn.retain();
        conn.mark_closed();
        assert!(!conn.is_quiescent(), "message still in flight");
        conn.release();
        assert!(conn.is_quiescent());
    }
}

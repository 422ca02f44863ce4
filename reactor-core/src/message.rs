//! The request/response envelope handed to `process` and carried back
//! across the cross-thread message-return channel.

use std::sync::Arc;

use crate::connection::Connection;

/// A single request/response cycle in flight for a connection.
///
/// `Message::new` increments the owning `Connection`'s message ref-count;
/// `Drop` decrements it and runs `packet_cleanup` (if registered) on
/// whatever request/response is still present. A `Message` outlives the
/// reactor thread that produced it whenever it crosses to a worker thread
/// and back, so it is `Send` as long as `Req`/`Resp` are.
pub struct Message<Req, Resp> {
    conn: Arc<Connection<Req, Resp>>,
    request: Option<Req>,
    response: Option<Resp>,
}

impl<Req, Resp> Message<Req, Resp> {
    /// Construct a message for `request`, retaining `conn`'s ref-count.
    pub fn new(conn: Arc<Connection<Req, Resp>>, request: Req) -> Self {
        conn.retain();
        Self {
            conn,
            request: Some(request),
            response: None,
        }
    }

    /// Construct a message carrying only a response, for server-initiated
    /// sends (`Server::send_message`). Still retains `conn`'s ref-count like
    /// any other in-flight `Message`.
    pub fn for_response(conn: Arc<Connection<Req, Resp>>, response: Resp) -> Self {
        conn.retain();
        Self {
            conn,
            request: None,
            response: Some(response),
        }
    }

    #[must_use]
    pub fn connection(&self) -> &Arc<Connection<Req, Resp>> {
        &self.conn
    }

    /// Take the request, leaving `None` behind. `process` callbacks that
    /// need to consume the request by value use this.
    pub fn take_request(&mut self) -> Option<Req> {
        self.request.take()
    }

    #[must_use]
    pub fn request(&self) -> Option<&Req> {
        self.request.as_ref()
    }

    /// Set the response to be encoded and written back once `process`
    /// returns.
    pub fn set_response(&mut self, response: Resp) {
        self.response = Some(response);
    }

    #[must_use]
    pub fn response(&self) -> Option<&Resp> {
        self.response.as_ref()
    }

    /// Take the response, consuming it for encoding.
    pub fn take_response(&mut self) -> Option<Resp> {
        self.response.take()
    }
}

impl<Req, Resp> Drop for Message<Req, Resp> {
    fn drop(&mut self) {
        let request = self.request.take();
        let response = self.response.take();
        if let Some(cleanup) = self.conn.handle_set.packet_cleanup.clone() {
            cleanup(request, response);
        }
        let remaining = self.conn.release();
        tracing::trace!(fd = self.conn.fd(), remaining, "message dropped");
        // Finalizing the connection (removing it from the fd-index and
        // closing the fd) needs the server's index, which a `Connection`
        // doesn't hold a reference to; the reactor loop checks
        // `Connection::is_quiescent` after draining a returned message.
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handle_set::HandleSet;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn test_conn() -> Arc<Connection<u32, u32>> {
        let (tx, _rx) = flume::unbounded();
        Arc::new(Connection::new(
            "127.0.0.1".into(),
            1,
            3,
            Arc::new(HandleSet::new()),
            tx,
        ))
    }

    #[test]
    fn new_increments_and_drop_decrements_refcount() {
        let conn = test_conn();
        assert_eq!(conn.refcount(), 1);
        let msg = Message::new(conn.clone(), 42u32);
        assert_eq!(conn.refcount(), 2);
        drop(msg);
        assert_eq!(conn.refcount(), 1);
    }

    #[test]
    fn take_request_and_set_response_round_trip() {
        let conn = test_conn();
        let mut msg = Message::new(conn, 7u32);
        assert_eq!(msg.take_request(), Some(7));
        assert_eq!(msg.request(), None);
        msg.set_response(99u32);
        assert_eq!(msg.response(), Some(&99));
    }

    #[test]
    fn drop_invokes_packet_cleanup_with_remaining_parts() {
        let seen_request = Arc::new(AtomicUsize::new(0));
        let seen_request2 = seen_request.clone();
        let handle_set = HandleSet::new().with_packet_cleanup(move |req, _resp| {
            if let Some(r) = req {
                seen_request2.store(r as usize, Ordering::SeqCst);
            }
        });
        let (tx, _rx) = flume::unbounded();
        let conn = Arc::new(Connection::new(
            "127.0.0.1".into(),
            1,
            3,
            Arc::new(handle_set),
            tx,
        ));
        let msg = Message::new(conn, 55u32);
        drop(msg);
        assert_eq!(seen_request.load(Ordering::SeqCst), 55);
    }
}

//! A bound, listening TCP socket and the handle-set it dispatches to.

use std::net::SocketAddr;
use std::os::unix::io::RawFd;
use std::sync::Arc;

use crate::handle_set::HandleSet;

/// A single `bind`+`listen` registered with `Server::add_listen`.
///
/// Holds the handle-set new connections accepted on this listener will be
/// wired up with; the listening socket itself lives on the leader reactor,
/// which owns every listening socket in the pool.
pub struct Listener<Req, Resp> {
    pub addr: SocketAddr,
    pub fd: RawFd,
    pub handle_set: Arc<HandleSet<Req, Resp>>,
}

impl<Req, Resp> Listener<Req, Resp> {
    #[must_use]
    pub fn new(addr: SocketAddr, fd: RawFd, handle_set: Arc<HandleSet<Req, Resp>>) -> Self {
        Self {
            addr,
            fd,
            handle_set,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn listener_carries_addr_fd_and_handle_set() {
        let addr: SocketAddr = "127.0.0.1:9000".parse().unwrap();
        let listener: Listener<u8, u8> = Listener::new(addr, 5, Arc::new(HandleSet::new()));
        assert_eq!(listener.addr, addr);
        assert_eq!(listener.fd, 5);
        assert!(!listener.handle_set.is_usable());
    }
}

//! TCP socket option helpers.
//!
//! # Safety
//!
//! This module uses unsafe code to reconstruct a `socket2::Socket` from a
//! raw file descriptor/handle purely to flip a socket option; the
//! reconstructed socket is forgotten immediately afterward so it never
//! closes the underlying fd.

#![allow(unsafe_code)]

use std::io;
use std::net::SocketAddr;

use socket2::{Domain, Socket, Type};

/// Bind and `listen(2)` a TCP socket with an explicit backlog, returning a
/// non-blocking `std::net::TcpListener` ready to be adopted by `compio`.
///
/// `std::net::TcpListener::bind` hardcodes its own backlog and offers no
/// way to override it; `socket2` is used here (no unsafe code needed,
/// unlike `enable_tcp_nodelay` below) to bind, set the backlog, and then
/// hand the socket back as a standard listener.
///
/// # Errors
///
/// Returns an error if the socket cannot be created, bound, or put into
/// listening state.
pub fn bind_listener(addr: SocketAddr, backlog: u32) -> io::Result<std::net::TcpListener> {
    let domain = if addr.is_ipv6() { Domain::IPV6 } else { Domain::IPV4 };
    let socket = Socket::new(domain, Type::STREAM, None)?;
    if addr.is_ipv6() {
        let _ = socket.set_only_v6(false);
    }
    socket.set_reuse_address(true)?;
    socket.bind(&addr.into())?;
    let backlog = i32::try_from(backlog).unwrap_or(i32::MAX);
    socket.listen(backlog)?;
    socket.set_nonblocking(true)?;
    Ok(socket.into())
}

/// Enable `TCP_NODELAY` on a compio `TcpStream`, disabling Nagle's
/// algorithm so small request/response frames aren't held back waiting
/// for more data to batch.
///
/// # Errors
///
/// Returns an error if the socket option cannot be set.
#[inline]
pub fn enable_tcp_nodelay(stream: &compio::net::TcpStream) -> io::Result<()> {
    #[cfg(unix)]
    {
        use std::os::unix::io::{AsRawFd, FromRawFd};
        let fd = stream.as_raw_fd();
        let sock = unsafe { socket2::Socket::from_raw_fd(fd) };
        sock.set_nodelay(true)?;
        std::mem::forget(sock);
        Ok(())
    }

    #[cfg(windows)]
    {
        use std::os::windows::io::{AsRawSocket, FromRawSocket};
        let raw = stream.as_raw_socket();
        let sock = unsafe { socket2::Socket::from_raw_socket(raw) };
        sock.set_nodelay(true)?;
        std::mem::forget(sock);
        Ok(())
    }

    #[cfg(not(any(unix, windows)))]
    {
        Ok(())
    }
}

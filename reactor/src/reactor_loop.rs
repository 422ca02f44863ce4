//! The I/O reactor: one `compio` runtime per OS thread, servicing a subset
//! of connections plus (on the leader) every listening socket.
//!
//! A connection's event handles, buffers and callbacks (other
//! than `process`) are touched only by its owning reactor. Here "owning
//! reactor" means the two `compio`-spawned tasks (read task, write task)
//! that this module spawns for a connection run as cooperative tasks on
//! the reactor's single OS thread — never on a second thread — so no
//! mutex is needed around a connection's buffers.

use std::net::SocketAddr;
use std::os::unix::io::AsRawFd;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;

use compio::buf::BufResult;
use compio::io::{AsyncReadExt, AsyncWriteExt};
use compio::net::{OwnedReadHalf, OwnedWriteHalf, TcpListener, TcpStream};
use futures::FutureExt;

use reactor_core::connection::{ConnCmd, Connection};
use reactor_core::handle_set::{DecodeOutcome, HandleSet};
use reactor_core::message::Message;
use reactor_core::tcp::enable_tcp_nodelay;
use reactor_core::worker::process_inline;

use crate::server::Shared;

/// Interval of the periodic wakeup each reactor uses to notice
/// `Server::stop` promptly (around 100 Hz).
const TICK: Duration = Duration::from_millis(10);

/// A connection handed from the leader to a follower reactor, still
/// carrying its unsplit stream and the receiving end of its write-command
/// channel (the follower does the split once it has adopted the
/// connection on its own thread).
pub(crate) struct Accepted<Req, Resp> {
    pub conn: Arc<Connection<Req, Resp>>,
    pub stream: TcpStream,
    pub write_rx: flume::Receiver<ConnCmd>,
}

/// What the leader binds per listener before `Server::start`; handed into
/// the leader's reactor thread to be turned into a live `compio::net::TcpListener`.
pub(crate) struct BoundListener<Req, Resp> {
    pub addr: SocketAddr,
    pub std_listener: std::net::TcpListener,
    pub handle_set: Arc<HandleSet<Req, Resp>>,
}

/// Entry point run inside `compio::runtime::Runtime::new().block_on(..)` on
/// each reactor's dedicated OS thread.
pub(crate) async fn run_reactor<Req, Resp>(
    index: usize,
    shared: Arc<Shared<Req, Resp>>,
    inbound_rx: flume::Receiver<Accepted<Req, Resp>>,
    return_rx: flume::Receiver<Message<Req, Resp>>,
    shutdown_rx: flume::Receiver<()>,
    listeners: Vec<BoundListener<Req, Resp>>,
) where
    Req: Send + 'static,
    Resp: Send + 'static,
{
    for bound in listeners {
        let shared = shared.clone();
        compio::runtime::spawn(accept_loop(shared, bound)).detach();
    }

    tracing::info!(reactor = index, "reactor started");

    loop {
        futures::select! {
            accepted = inbound_rx.recv_async().fuse() => {
                match accepted {
                    Ok(accepted) => adopt_connection(index, &shared, accepted),
                    Err(_) => break,
                }
            }
            message = return_rx.recv_async().fuse() => {
                match message {
                    Ok(message) => handle_returned_message(&shared, message),
                    Err(_) => break,
                }
            }
            _ = shutdown_rx.recv_async().fuse() => {
                close_owned_connections(index, &shared).await;
                break;
            }
            _ = compio::time::sleep(TICK).fuse() => {
                if !shared.started.load(Ordering::SeqCst) {
                    close_owned_connections(index, &shared).await;
                    break;
                }
            }
        }
    }

    tracing::info!(reactor = index, "reactor stopped");
}

/// Close every connection this reactor owns, firing `on_disconnect` for
/// each on this reactor's own thread, per the thread-affinity rule that
/// only a connection's owning reactor may touch its lifecycle callbacks.
/// Called when `Server::stop` signals shutdown, so that no still-open
/// connection is silently dropped when the reactor's runtime tears down.
///
/// `close_connection` only queues a `Close` command for each connection's
/// write task; it does not itself run the FIN-sending shutdown. Since this
/// function runs on the reactor's main future, its caller returns (ending
/// `run_reactor` and dropping the runtime) as soon as it does, so a tick is
/// spent here giving the detached write tasks a turn to actually drain
/// their close commands first.
async fn close_owned_connections<Req, Resp>(index: usize, shared: &Arc<Shared<Req, Resp>>) {
    let owned: Vec<_> = shared
        .conns
        .iter()
        .filter(|entry| entry.value().owner() == Some(index))
        .map(|entry| entry.value().clone())
        .collect();
    if owned.is_empty() {
        return;
    }
    for conn in &owned {
        close_connection(shared, conn);
    }
    compio::time::sleep(TICK).await;
}

/// Leader-only: accept loop for one listener.
async fn accept_loop<Req, Resp>(shared: Arc<Shared<Req, Resp>>, bound: BoundListener<Req, Resp>)
where
    Req: Send + 'static,
    Resp: Send + 'static,
{
    let listener = match TcpListener::from_std(bound.std_listener) {
        Ok(listener) => listener,
        Err(error) => {
            tracing::error!(%error, addr = %bound.addr, "failed to adopt bound listener");
            return;
        }
    };

    // Polls `shared.started` on the same cadence as each reactor's main
    // loop rather than racing a shutdown channel: `Server::stop` only
    // sends one shutdown notice per reactor, and that reactor's main loop
    // is the intended receiver.
    while shared.started.load(Ordering::SeqCst) {
        futures::select! {
            accepted = listener.accept().fuse() => {
                let (stream, peer) = match accepted {
                    Ok(pair) => pair,
                    Err(error) => {
                        tracing::warn!(%error, "accept failed");
                        continue;
                    }
                };
                if shared.config.tcp_nodelay {
                    if let Err(error) = enable_tcp_nodelay(&stream) {
                        tracing::warn!(%error, "failed to set TCP_NODELAY");
                    }
                }
                on_accept(&shared, &bound.handle_set, stream, peer);
            }
            _ = compio::time::sleep(TICK).fuse() => {}
        }
    }
}

fn on_accept<Req, Resp>(shared: &Arc<Shared<Req, Resp>>, handle_set: &Arc<HandleSet<Req, Resp>>, stream: TcpStream, peer: SocketAddr)
where
    Req: Send + 'static,
    Resp: Send + 'static,
{
    let fd = stream.as_raw_fd();
    let (write_tx, write_rx) = flume::unbounded();
    let conn = Arc::new(Connection::new(
        peer.ip().to_string(),
        peer.port(),
        fd,
        handle_set.clone(),
        write_tx,
    ));

    if let Some(on_connect) = conn.handle_set.on_connect.clone() {
        on_connect(&conn);
    }

    // Assign an owner before the connection becomes visible in the
    // fd-index: `Server::send_message` looks a connection up by fd and
    // immediately needs `conn.owner()` to route onto the right reactor.
    let follower_count = shared.config.follower_count();
    let idx = if follower_count == 0 { 0 } else { (fd as usize % follower_count) + 1 };
    conn.set_owner(idx);

    shared.conns.insert(fd, conn.clone());
    shared.conn_count.fetch_add(1, Ordering::SeqCst);

    if idx == 0 {
        spawn_connection_tasks(0, shared.clone(), conn, stream, write_rx);
        return;
    }

    tracing::debug!(fd, reactor = idx, "steering accepted connection");
    let accepted = Accepted {
        conn,
        stream,
        write_rx,
    };
    if shared.inboxes[idx].send(accepted).is_err() {
        tracing::warn!(fd, reactor = idx, "target reactor gone, dropping accepted connection");
    }
}

/// Follower side of steering: adopt the connection on this reactor thread.
fn adopt_connection<Req, Resp>(index: usize, shared: &Arc<Shared<Req, Resp>>, accepted: Accepted<Req, Resp>)
where
    Req: Send + 'static,
    Resp: Send + 'static,
{
    let Accepted {
        conn,
        stream,
        write_rx,
    } = accepted;
    debug_assert_eq!(conn.owner(), Some(index), "on_accept must set owner before steering");
    tracing::debug!(fd = conn.fd(), reactor = index, "adopted steered connection");
    spawn_connection_tasks(index, shared.clone(), conn, stream, write_rx);
}

/// Spawn the read task and write task for a freshly-adopted connection on
/// the calling (owning) reactor's runtime.
fn spawn_connection_tasks<Req, Resp>(
    index: usize,
    shared: Arc<Shared<Req, Resp>>,
    conn: Arc<Connection<Req, Resp>>,
    stream: TcpStream,
    write_rx: flume::Receiver<ConnCmd>,
) where
    Req: Send + 'static,
    Resp: Send + 'static,
{
    let (read_half, write_half) = stream.into_split();
    compio::runtime::spawn(read_task(index, shared.clone(), conn.clone(), read_half)).detach();
    compio::runtime::spawn(write_task(shared, conn, write_half, write_rx)).detach();
}

async fn read_task<Req, Resp>(index: usize, shared: Arc<Shared<Req, Resp>>, conn: Arc<Connection<Req, Resp>>, mut read_half: OwnedReadHalf<TcpStream>)
where
    Req: Send + 'static,
    Resp: Send + 'static,
{
    let reserve = shared.config.read_buffer_size;
    while conn.is_open() {
        let buf = vec![0u8; reserve];
        let BufResult(res, buf) = read_half.read(buf).await;
        match res {
            Ok(0) => {
                tracing::debug!(fd = conn.fd(), "peer closed connection");
                close_connection(&shared, &conn);
                break;
            }
            Err(error) => {
                tracing::debug!(fd = conn.fd(), %error, "read error");
                close_connection(&shared, &conn);
                break;
            }
            Ok(n) => {
                {
                    let mut read_buf = conn.read_buf.lock().unwrap();
                    read_buf.extend_from_slice(&buf[..n]);
                }
                if !decode_dispatch(index, &shared, &conn) {
                    break;
                }
            }
        }
    }
}

/// Drain complete packets from the connection's read buffer, looping until
/// `decode` reports `Again`. Returns `false` if the connection was closed
/// (decode error) and the read task should stop.
fn decode_dispatch<Req, Resp>(index: usize, shared: &Arc<Shared<Req, Resp>>, conn: &Arc<Connection<Req, Resp>>) -> bool
where
    Req: Send + 'static,
    Resp: Send + 'static,
{
    let handle_set = conn.handle_set.clone();
    if !handle_set.is_usable() {
        // Protocol is unusable on this listener; drop whatever arrived.
        let mut read_buf = conn.read_buf.lock().unwrap();
        let len = read_buf.len();
        read_buf.advance(len);
        return true;
    }
    let decode = handle_set.decode.clone().expect("checked by is_usable");

    loop {
        let outcome = {
            let mut read_buf = conn.read_buf.lock().unwrap();
            decode(&mut read_buf)
        };
        match outcome {
            DecodeOutcome::Again => return true,
            DecodeOutcome::Err(reason) => {
                tracing::debug!(fd = conn.fd(), %reason, "decode error, closing connection");
                close_connection(shared, conn);
                return false;
            }
            DecodeOutcome::Complete(request) => {
                let mut message = Message::new(conn.clone(), request);
                if let Some(pool) = &shared.worker_pool {
                    pool.dispatch(message, shared.returns[index].clone());
                } else {
                    process_inline(conn, &mut message);
                    finish_message(shared, conn, message);
                }
            }
        }
    }
}

/// Common tail for a `Message` whose `process` already ran: write any
/// response, drop the message, and finalize the connection if this was
/// its last reference.
fn finish_message<Req, Resp>(shared: &Arc<Shared<Req, Resp>>, conn: &Arc<Connection<Req, Resp>>, mut message: Message<Req, Resp>) {
    if conn.is_open() {
        if let Some(response) = message.take_response() {
            encode_and_queue(conn, response);
        }
    }
    drop(message);
    maybe_finalize(shared, conn);
}

fn handle_returned_message<Req, Resp>(shared: &Arc<Shared<Req, Resp>>, message: Message<Req, Resp>) {
    let conn = message.connection().clone();
    finish_message(shared, &conn, message);
}

/// Run `encode` into the connection's write buffer, drain it, and hand the
/// drained bytes to the write task.
fn encode_and_queue<Req, Resp>(conn: &Arc<Connection<Req, Resp>>, response: Resp) {
    let Some(encode) = conn.handle_set.encode.clone() else {
        return;
    };
    let bytes = {
        let mut write_buf = conn.write_buf.lock().unwrap();
        encode(&response, &mut write_buf);
        let len = write_buf.len();
        write_buf.take_bytes(len).unwrap_or_default()
    };
    conn.queue_write(bytes);
}

async fn write_task<Req, Resp>(
    shared: Arc<Shared<Req, Resp>>,
    conn: Arc<Connection<Req, Resp>>,
    mut write_half: OwnedWriteHalf<TcpStream>,
    cmd_rx: flume::Receiver<ConnCmd>,
) where
    Req: Send + 'static,
    Resp: Send + 'static,
{
    loop {
        let cmd = match cmd_rx.recv_async().await {
            Ok(cmd) => cmd,
            Err(_) => break,
        };
        let mut pending = match cmd {
            ConnCmd::Send(bytes) => bytes.to_vec(),
            ConnCmd::Close => break,
        };

        // Coalesce any further already-queued sends into one write attempt.
        let mut closing = false;
        while let Ok(cmd) = cmd_rx.try_recv() {
            match cmd {
                ConnCmd::Send(more) => pending.extend_from_slice(&more),
                ConnCmd::Close => {
                    closing = true;
                    break;
                }
            }
        }

        let mut offset = 0;
        let mut fatal = false;
        while offset < pending.len() {
            let chunk = pending[offset..].to_vec();
            let BufResult(res, _buf) = write_half.write(chunk).await;
            match res {
                Ok(0) => {
                    fatal = true;
                    break;
                }
                Err(error) => {
                    tracing::debug!(fd = conn.fd(), %error, "write error");
                    fatal = true;
                    break;
                }
                Ok(n) => offset += n,
            }
        }

        if fatal {
            close_connection(&shared, &conn);
            break;
        }
        conn.disarm_write();
        if closing {
            break;
        }
    }
    let _ = write_half.flush().await;
    // Send a real FIN so the peer observes EOF promptly. Closing happens
    // from whichever task noticed first (this one, the read task, or
    // `Server::stop` closing a connection the read task is still blocked
    // reading on), so this cannot rely on the read half also dropping.
    let _ = write_half.shutdown().await;
}

fn close_connection<Req, Resp>(shared: &Arc<Shared<Req, Resp>>, conn: &Arc<Connection<Req, Resp>>) {
    if conn.mark_closed() {
        if let Some(on_disconnect) = conn.handle_set.on_disconnect.clone() {
            on_disconnect(conn);
        }
        conn.queue_close();
    }
    maybe_finalize(shared, conn);
}

/// Only drop the connection from the fd-index once it is closed and no
/// `Message` still references it.
pub(crate) fn maybe_finalize<Req, Resp>(shared: &Arc<Shared<Req, Resp>>, conn: &Arc<Connection<Req, Resp>>) {
    if conn.is_quiescent() && shared.conns.remove(&conn.fd()).is_some() {
        shared.conn_count.fetch_sub(1, Ordering::SeqCst);
        tracing::debug!(fd = conn.fd(), "connection finalized");
    }
}

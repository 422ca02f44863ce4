//! The public `Server` API: configure listeners and handle-sets, then run
//! the reactor pool and optional worker pool.

use std::net::SocketAddr;
use std::os::unix::io::{AsRawFd, RawFd};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;

use dashmap::DashMap;

use reactor_core::config::ServerConfig;
use reactor_core::connection::Connection;
use reactor_core::error::{ReactorError, Result};
use reactor_core::handle_set::HandleSet;
use reactor_core::listener::Listener;
use reactor_core::message::Message;
use reactor_core::worker::WorkerPool;

use crate::reactor_loop::{self, Accepted, BoundListener};

/// State shared by every reactor thread: the fd-index, the per-reactor
/// inbound channels, and the optional worker pool.
pub(crate) struct Shared<Req, Resp> {
    pub config: ServerConfig,
    pub conns: DashMap<RawFd, Arc<Connection<Req, Resp>>>,
    pub conn_count: AtomicUsize,
    pub started: AtomicBool,
    /// Per-reactor channel for connections steered to it. Index 0
    /// (the leader) is never sent to; followers are `1..reactor_count`.
    pub inboxes: Vec<flume::Sender<Accepted<Req, Resp>>>,
    /// Per-reactor channel for messages returning from a worker thread or
    /// from `Server::send_message`.
    pub returns: Vec<flume::Sender<Message<Req, Resp>>>,
    pub worker_pool: Option<WorkerPool<Req, Resp>>,
}

/// A multi-reactor TCP server: a leader reactor that owns every listening
/// socket plus `reactor_count - 1` follower reactors, with connections
/// steered to followers by file descriptor.
///
/// # Examples
///
/// ```no_run
/// use reactor::{Server, ServerConfig};
/// use reactor_core::handle_set::{DecodeOutcome, HandleSet};
///
/// let handle_set = HandleSet::<Vec<u8>, Vec<u8>>::new()
///     .with_decode(|buf| {
///         let n = buf.len();
///         if n == 0 {
///             return DecodeOutcome::Again;
///         }
///         DecodeOutcome::Complete(buf.take_bytes(n).unwrap().to_vec())
///     })
///     .with_encode(|resp, buf| buf.push(resp))
///     .with_process(|msg| {
///         let req = msg.take_request().unwrap_or_default();
///         msg.set_response(req);
///     });
///
/// let mut server = Server::init(ServerConfig::default()).unwrap();
/// server.add_listen("127.0.0.1:0".parse().unwrap(), handle_set).unwrap();
/// server.start().unwrap();
/// server.stop().unwrap();
/// ```
pub struct Server<Req, Resp> {
    shared: Arc<Shared<Req, Resp>>,
    pending_listeners: Vec<BoundListener<Req, Resp>>,
    listeners: Vec<Listener<Req, Resp>>,
    reactor_handles: Vec<JoinHandle<()>>,
    shutdown_txs: Vec<flume::Sender<()>>,
    /// `compio`'s internal notification loop for the leader needs a real
    /// reactor count known up front; `inboxes`/`returns` are built here
    /// too so reactor threads borrow nothing from `Server` itself.
    inbound_rxs: Vec<Option<flume::Receiver<Accepted<Req, Resp>>>>,
    return_rxs: Vec<Option<flume::Receiver<Message<Req, Resp>>>>,
}

impl<Req, Resp> Server<Req, Resp>
where
    Req: Send + 'static,
    Resp: Send + 'static,
{
    /// Create a server with the given configuration. No sockets are bound
    /// and no threads are spawned until [`Server::start`].
    ///
    /// # Errors
    ///
    /// Returns [`ReactorError::Config`] if `config.reactor_count` is `0`.
    /// `ServerConfig`'s builder methods already floor `reactor_count` at
    /// 1, but its fields are public, so a caller can still construct an
    /// invalid value directly.
    pub fn init(config: ServerConfig) -> Result<Self> {
        if config.reactor_count == 0 {
            return Err(ReactorError::config("reactor_count must be at least 1"));
        }
        let reactor_count = config.reactor_count;
        let mut inboxes = Vec::with_capacity(reactor_count);
        let mut returns = Vec::with_capacity(reactor_count);
        let mut inbound_rxs = Vec::with_capacity(reactor_count);
        let mut return_rxs = Vec::with_capacity(reactor_count);
        for _ in 0..reactor_count {
            let (itx, irx) = flume::unbounded();
            let (rtx, rrx) = flume::unbounded();
            inboxes.push(itx);
            returns.push(rtx);
            inbound_rxs.push(Some(irx));
            return_rxs.push(Some(rrx));
        }

        let worker_pool = config
            .has_worker_pool()
            .then(|| WorkerPool::start(config.worker_count, config.affinity_enable, reactor_count));

        let shared = Arc::new(Shared {
            config,
            conns: DashMap::new(),
            conn_count: AtomicUsize::new(0),
            started: AtomicBool::new(false),
            inboxes,
            returns,
            worker_pool,
        });

        Ok(Self {
            shared,
            pending_listeners: Vec::new(),
            listeners: Vec::new(),
            reactor_handles: Vec::new(),
            shutdown_txs: Vec::new(),
            inbound_rxs,
            return_rxs,
        })
    }

    /// Register a listener with its handle-set. Must be called before
    /// [`Server::start`]: the socket is bound synchronously here so a
    /// bind failure surfaces immediately, before any reactor thread exists.
    ///
    /// # Errors
    ///
    /// Returns [`ReactorError::AlreadyStarted`] if the server is already
    /// running, or [`ReactorError::Io`] if the bind fails.
    pub fn add_listen(&mut self, addr: SocketAddr, handle_set: HandleSet<Req, Resp>) -> Result<()> {
        if self.shared.started.load(Ordering::SeqCst) {
            return Err(ReactorError::AlreadyStarted);
        }
        let std_listener = reactor_core::tcp::bind_listener(addr, self.shared.config.accept_backlog)?;
        let fd = std_listener.as_raw_fd();
        // Resolve the actual bound address: callers may pass port 0 to let
        // the OS assign one (e.g. tests), in which case `addr` itself is
        // not the real listening address.
        let addr = std_listener.local_addr()?;
        tracing::debug!(%addr, fd, "bound listener");
        let handle_set = Arc::new(handle_set);
        self.listeners.push(Listener::new(addr, fd, handle_set.clone()));
        self.pending_listeners.push(BoundListener {
            addr,
            std_listener,
            handle_set,
        });
        Ok(())
    }

    /// The listeners registered so far via [`Server::add_listen`].
    #[must_use]
    pub fn listeners(&self) -> &[Listener<Req, Resp>] {
        &self.listeners
    }

    /// Spawn the reactor pool (and worker pool, if configured) and begin
    /// accepting connections.
    ///
    /// # Errors
    ///
    /// Returns [`ReactorError::AlreadyStarted`] if called twice.
    pub fn start(&mut self) -> Result<()> {
        if self.shared.started.swap(true, Ordering::SeqCst) {
            return Err(ReactorError::AlreadyStarted);
        }

        let reactor_count = self.shared.config.reactor_count;
        let mut leader_listeners = std::mem::take(&mut self.pending_listeners);

        for index in 0..reactor_count {
            let shared = self.shared.clone();
            let inbound_rx = self.inbound_rxs[index].take().expect("inbound_rx taken twice");
            let return_rx = self.return_rxs[index].take().expect("return_rx taken twice");
            let (shutdown_tx, shutdown_rx) = flume::unbounded();
            self.shutdown_txs.push(shutdown_tx);

            let listeners = if index == 0 { std::mem::take(&mut leader_listeners) } else { Vec::new() };

            let affinity_enable = self.shared.config.affinity_enable;
            let handle = std::thread::Builder::new()
                .name(format!("reactor-{index}"))
                .spawn(move || {
                    if affinity_enable {
                        reactor_core::affinity::pin_current_thread(index);
                    }
                    let runtime = compio::runtime::Runtime::new().expect("failed to start compio runtime");
                    runtime.block_on(reactor_loop::run_reactor(index, shared, inbound_rx, return_rx, shutdown_rx, listeners));
                })
                .expect("failed to spawn reactor thread");
            self.reactor_handles.push(handle);
        }

        tracing::info!(reactors = reactor_count, "server started");
        Ok(())
    }

    /// Block the calling thread until every reactor has stopped (i.e.
    /// until [`Server::stop`] is called from another thread, or a signal
    /// handler installed by the caller does so).
    ///
    /// # Errors
    ///
    /// Returns [`ReactorError::NotStarted`] if `start` was never called.
    pub fn run(&mut self) -> Result<()> {
        if !self.shared.started.load(Ordering::SeqCst) {
            return Err(ReactorError::NotStarted);
        }
        for handle in self.reactor_handles.drain(..) {
            let _ = handle.join();
        }
        Ok(())
    }

    /// Signal every reactor to stop its loop. Does not wait for in-flight
    /// writes to drain beyond `ServerConfig::linger` (not yet enforced by
    /// the reactor loop's close path, which closes immediately on
    /// shutdown notice).
    ///
    /// # Errors
    ///
    /// Returns [`ReactorError::NotStarted`] if `start` was never called.
    pub fn stop(&mut self) -> Result<()> {
        if !self.shared.started.swap(false, Ordering::SeqCst) {
            return Err(ReactorError::NotStarted);
        }
        for tx in &self.shutdown_txs {
            let _ = tx.send(());
        }
        Ok(())
    }

    /// Stop the server (if running) and wait for every reactor thread to
    /// exit. Drops the worker pool, joining its threads too.
    pub fn destroy(mut self) {
        let _ = self.stop();
        for handle in self.reactor_handles.drain(..) {
            let _ = handle.join();
        }
    }

    /// Number of connections currently registered in the fd-index, across
    /// every reactor.
    #[must_use]
    pub fn connection_count(&self) -> usize {
        self.shared.conn_count.load(Ordering::SeqCst)
    }

    /// Server-initiated send to a connection that isn't responding to a
    /// request right now: pushes `response` onto the connection's owning
    /// reactor as a `Message` carrying no request, reusing the same
    /// encode-and-queue path as a request-driven reply.
    ///
    /// # Errors
    ///
    /// Returns [`ReactorError::UnknownConnection`] if `fd` is not
    /// currently registered, or [`ReactorError::ConnectionClosed`] if the
    /// connection has already been closed.
    pub fn send_message(&self, fd: RawFd, response: Resp) -> Result<()> {
        let conn = self.shared.conns.get(&fd).map(|entry| entry.value().clone()).ok_or(ReactorError::UnknownConnection)?;
        if !conn.is_open() {
            return Err(ReactorError::ConnectionClosed);
        }
        // `on_accept` assigns an owner before the connection is inserted into
        // `shared.conns`, so a connection visible here always already has one.
        let owner = conn.owner().ok_or(ReactorError::UnknownConnection)?;
        let message = Message::for_response(conn, response);
        self.shared.returns[owner].send(message).map_err(|_| ReactorError::ConnectionClosed)?;
        Ok(())
    }
}

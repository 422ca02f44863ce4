//! Server-wide configuration.

use std::time::Duration;

/// Configuration for a `Server`, set once at `Server::init` and immutable
/// for the server's lifetime.
///
/// # Examples
///
/// ```
/// use reactor_core::config::ServerConfig;
/// use std::time::Duration;
///
/// let cfg = ServerConfig::default()
///     .with_reactor_count(4)
///     .with_worker_count(8);
/// ```
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Number of I/O reactor threads, including the leader. Must be at
    /// least 1. Reactor 0 is always the leader and owns every listening
    /// socket.
    pub reactor_count: usize,

    /// Number of worker threads in the optional worker pool. `0` means no
    /// worker pool: `process` callbacks run inline on the owning reactor
    /// thread.
    pub worker_count: usize,

    /// Initial capacity reserved for each connection's read buffer.
    pub read_buffer_size: usize,

    /// Initial capacity reserved for each connection's write buffer.
    pub write_buffer_size: usize,

    /// Reject (close the connection) if a single undecoded frame would
    /// grow the read buffer past this size. `None` means no limit.
    pub max_message_size: Option<usize>,

    /// Backlog passed to `listen(2)` for each listener.
    pub accept_backlog: u32,

    /// Whether to set `TCP_NODELAY` on accepted connections.
    pub tcp_nodelay: bool,

    /// Time to wait for a connection's outstanding writes to drain during
    /// an orderly shutdown before it is force-closed. `None` closes
    /// immediately, discarding unsent bytes.
    pub linger: Option<Duration>,

    /// Pin reactor and worker threads to distinct CPU cores, best-effort.
    /// Disabled by default: pinning helps cache locality on dedicated
    /// hardware but actively hurts shared or oversubscribed hosts.
    pub affinity_enable: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            reactor_count: 1,
            worker_count: 0,
            read_buffer_size: crate::buffer::DEFAULT_READ_RESERVE,
            write_buffer_size: crate::buffer::DEFAULT_READ_RESERVE,
            max_message_size: None,
            accept_backlog: 1024,
            tcp_nodelay: true,
            linger: Some(Duration::from_secs(5)),
            affinity_enable: false,
        }
    }
}

impl ServerConfig {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the number of I/O reactor threads (including the leader).
    #[must_use]
    pub fn with_reactor_count(mut self, count: usize) -> Self {
        self.reactor_count = count.max(1);
        self
    }

    /// Set the number of worker-pool threads. `0` disables the pool.
    #[must_use]
    pub fn with_worker_count(mut self, count: usize) -> Self {
        self.worker_count = count;
        self
    }

    #[must_use]
    pub fn with_read_buffer_size(mut self, size: usize) -> Self {
        self.read_buffer_size = size;
        self
    }

    #[must_use]
    pub fn with_write_buffer_size(mut self, size: usize) -> Self {
        self.write_buffer_size = size;
        self
    }

    #[must_use]
    pub fn with_buffer_sizes(mut self, read_size: usize, write_size: usize) -> Self {
        self.read_buffer_size = read_size;
        self.write_buffer_size = write_size;
        self
    }

    #[must_use]
    pub fn with_max_message_size(mut self, size: Option<usize>) -> Self {
        self.max_message_size = size;
        self
    }

    #[must_use]
    pub fn with_accept_backlog(mut self, backlog: u32) -> Self {
        self.accept_backlog = backlog;
        self
    }

    #[must_use]
    pub fn with_tcp_nodelay(mut self, enabled: bool) -> Self {
        self.tcp_nodelay = enabled;
        self
    }

    #[must_use]
    pub fn with_linger(mut self, linger: Option<Duration>) -> Self {
        self.linger = linger;
        self
    }

    /// Enable best-effort pinning of reactor and worker threads to cores.
    #[must_use]
    pub fn with_affinity_enable(mut self, enabled: bool) -> Self {
        self.affinity_enable = enabled;
        self
    }

    /// Number of follower reactors (everything but the leader).
    #[must_use]
    pub fn follower_count(&self) -> usize {
        self.reactor_count.saturating_sub(1)
    }

    /// Whether a worker pool should be spawned.
    #[must_use]
    pub fn has_worker_pool(&self) -> bool {
        self.worker_count > 0
    }
}

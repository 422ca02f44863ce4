//! The six application callbacks registered per listener, plus the
//! three-outcome decode contract.

use std::sync::Arc;

use crate::buffer::FrameBuffer;
use crate::connection::Connection;
use crate::message::Message;

/// Outcome of a single `decode` attempt against the read buffer.
pub enum DecodeOutcome<Req> {
    /// A complete packet was produced; the buffer's read cursor has already
    /// been advanced past it.
    Complete(Req),
    /// Not enough bytes yet; the buffer is left untouched.
    Again,
    /// Malformed framing; the connection must be closed.
    Err(String),
}

/// `decode(read_buffer) -> DecodeOutcome<Req>`.
///
/// Consumes from the front of `buf` on `Complete`, must leave `buf`
/// byte-for-byte untouched on `Again`.
pub type DecodeFn<Req> = Arc<dyn Fn(&mut FrameBuffer) -> DecodeOutcome<Req> + Send + Sync>;

/// `encode(response, write_buffer)`.
///
/// Appends the encoded bytes for `response` onto the back of `buf`.
pub type EncodeFn<Resp> = Arc<dyn Fn(&Resp, &mut FrameBuffer) + Send + Sync>;

/// `process(message)`.
///
/// Consumes the request and is expected to set a response. May run on a
/// worker thread (if a worker pool is configured) or inline on the owning
/// reactor thread otherwise; either way it must not assume it runs on the
/// connection's reactor.
pub type ProcessFn<Req, Resp> = Arc<dyn Fn(&mut Message<Req, Resp>) + Send + Sync>;

/// `packet_cleanup(request, response)`.
///
/// Invoked once per `Message` drop, for any non-`None` request/response
/// still present. Most handle-sets can omit this and rely on `Req`/`Resp`'s
/// own `Drop`; it exists for handle-sets that pool or otherwise need custom
/// release logic.
pub type CleanupFn<Req, Resp> = Arc<dyn Fn(Option<Req>, Option<Resp>) + Send + Sync>;

/// `on_connect(connection)` / `on_disconnect(connection)`.
///
/// Advisory lifecycle notifications, always invoked on the connection's
/// owning reactor thread.
pub type LifecycleFn<Req, Resp> = Arc<dyn Fn(&Connection<Req, Resp>) + Send + Sync>;

/// The per-listener set of application callbacks.
///
/// A listener with `decode` or `process` left `None` is "unusable": reads
/// on its connections are dropped and the read buffer is discarded, but
/// this is not fatal to the socket by itself.
pub struct HandleSet<Req, Resp> {
    pub decode: Option<DecodeFn<Req>>,
    pub encode: Option<EncodeFn<Resp>>,
    pub process: Option<ProcessFn<Req, Resp>>,
    pub packet_cleanup: Option<CleanupFn<Req, Resp>>,
    pub on_connect: Option<LifecycleFn<Req, Resp>>,
    pub on_disconnect: Option<LifecycleFn<Req, Resp>>,
}

impl<Req, Resp> Default for HandleSet<Req, Resp> {
    fn default() -> Self {
        Self {
            decode: None,
            encode: None,
            process: None,
            packet_cleanup: None,
            on_connect: None,
            on_disconnect: None,
        }
    }
}

impl<Req, Resp> HandleSet<Req, Resp> {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_decode(mut self, f: impl Fn(&mut FrameBuffer) -> DecodeOutcome<Req> + Send + Sync + 'static) -> Self {
        self.decode = Some(Arc::new(f));
        self
    }

    #[must_use]
    pub fn with_encode(mut self, f: impl Fn(&Resp, &mut FrameBuffer) + Send + Sync + 'static) -> Self {
        self.encode = Some(Arc::new(f));
        self
    }

    #[must_use]
    pub fn with_process(mut self, f: impl Fn(&mut Message<Req, Resp>) + Send + Sync + 'static) -> Self {
        self.process = Some(Arc::new(f));
        self
    }

    #[must_use]
    pub fn with_packet_cleanup(mut self, f: impl Fn(Option<Req>, Option<Resp>) + Send + Sync + 'static) -> Self {
        self.packet_cleanup = Some(Arc::new(f));
        self
    }

    #[must_use]
    pub fn with_on_connect(mut self, f: impl Fn(&Connection<Req, Resp>) + Send + Sync + 'static) -> Self {
        self.on_connect = Some(Arc::new(f));
        self
    }

    #[must_use]
    pub fn with_on_disconnect(mut self, f: impl Fn(&Connection<Req, Resp>) + Send + Sync + 'static) -> Self {
        self.on_disconnect = Some(Arc::new(f));
        self
    }

    /// A listener without both `decode` and `process` cannot do anything
    /// useful with a read; callers use this to decide whether to drop reads.
    #[must_use]
    pub fn is_usable(&self) -> bool {
        self.decode.is_some() && self.process.is_some()
    }
}

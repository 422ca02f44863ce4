//! The optional worker thread pool.
//!
//! Unlike the I/O reactors (one `compio` runtime per OS thread),
//! worker threads run no async runtime: `process` callbacks are
//! ordinary, potentially blocking, application code, so each
//! worker is a plain loop over a `flume` queue, mirroring the
//! `std::thread::spawn` + channel shape the reactor threads themselves
//! use for cross-thread handoff (just without the `compio::runtime`
//! wrapper).

use std::sync::Arc;
use std::thread::JoinHandle;

use crate::connection::Connection;
use crate::message::Message;

/// A unit of work dispatched to the pool: a `Message` to run through its
/// connection's `process` callback, plus a return channel back to the
/// owning reactor.
pub struct WorkItem<Req, Resp> {
    pub message: Message<Req, Resp>,
    pub return_tx: flume::Sender<Message<Req, Resp>>,
}

/// A fixed-size pool of OS threads draining a shared work queue.
///
/// Threads are spawned once at `WorkerPool::start` and run until the
/// queue's sender side is dropped (`WorkerPool::drop` closes it), at
/// which point each worker's `recv()` returns an error and the thread
/// exits.
pub struct WorkerPool<Req, Resp> {
    tx: flume::Sender<WorkItem<Req, Resp>>,
    handles: Vec<JoinHandle<()>>,
}

impl<Req, Resp> WorkerPool<Req, Resp>
where
    Req: Send + 'static,
    Resp: Send + 'static,
{
    /// Spawn `count` worker threads. `count` must be at least 1; callers
    /// check `ServerConfig::has_worker_pool` before constructing one at
    /// all. When `affinity_enable` is set, each worker thread is pinned
    /// (best-effort) to a distinct core, offset past the reactor threads'
    /// own pinned cores.
    #[must_use]
    pub fn start(count: usize, affinity_enable: bool, reactor_count: usize) -> Self {
        let (tx, rx) = flume::unbounded::<WorkItem<Req, Resp>>();
        let mut handles = Vec::with_capacity(count);
        for idx in 0..count.max(1) {
            let rx = rx.clone();
            let handle = std::thread::Builder::new()
                .name(format!("reactor-worker-{idx}"))
                .spawn(move || {
                    if affinity_enable {
                        crate::affinity::pin_current_thread(reactor_count + idx);
                    }
                    while let Ok(item) = rx.recv() {
                        let WorkItem {
                            mut message,
                            return_tx,
                        } = item;
                        let process = message.connection().handle_set.process.clone();
                        if let Some(process) = process {
                            process(&mut message);
                        }
                        let _ = return_tx.send(message);
                    }
                    tracing::trace!(worker = idx, "worker thread exiting");
                })
                .expect("failed to spawn worker thread");
            handles.push(handle);
        }
        Self { tx, handles }
    }

    /// Queue `message` for processing; the result is sent back on
    /// `return_tx` once `process` returns.
    pub fn dispatch(&self, message: Message<Req, Resp>, return_tx: flume::Sender<Message<Req, Resp>>) {
        let _ = self.tx.send(WorkItem { message, return_tx });
    }

    #[must_use]
    pub fn worker_count(&self) -> usize {
        self.handles.len()
    }
}

impl<Req, Resp> Drop for WorkerPool<Req, Resp> {
    fn drop(&mut self) {
        for handle in self.handles.drain(..) {
            let _ = handle.join();
        }
    }
}

/// Run `process` inline on the calling (reactor) thread, for the
/// no-worker-pool configuration.
pub fn process_inline<Req, Resp>(conn: &Arc<Connection<Req, Resp>>, message: &mut Message<Req, Resp>) {
    if let Some(process) = conn.handle_set.process.clone() {
        process(message);
    }
}

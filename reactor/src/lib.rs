//! # Reactor
//!
//! A multi-reactor TCP server framework built on `io_uring`.
//!
//! ## Architecture
//!
//! - **`reactor-core`**: connections, framing buffers, messages, the
//!   worker pool — the protocol-agnostic substrate.
//! - **`reactor`**: public API surface (this crate) — `Server`,
//!   `ServerConfig`, the reactor pool's event loop.
//!
//! A `Server` runs `reactor_count` I/O reactors, each its own OS thread
//! with its own `compio` event loop. Reactor 0 (the leader) owns every
//! listening socket; accepted connections are steered to a follower by
//! file descriptor so each reactor services a disjoint subset of
//! connections. An optional fixed-size worker thread pool runs the
//! application's `process` callback off the reactor threads when it may
//! block.
//!
//! ## Quick start
//!
//! ```no_run
//! use reactor::{Server, ServerConfig};
//! use reactor_core::handle_set::{DecodeOutcome, HandleSet};
//!
//! // Length-prefixed echo protocol: u32 length header, then that many bytes.
//! let handle_set = HandleSet::<Vec<u8>, Vec<u8>>::new()
//!     .with_decode(|buf| {
//!         if buf.len() < 4 {
//!             return DecodeOutcome::Again;
//!         }
//!         let len = u32::from_be_bytes(buf.as_slice()[..4].try_into().unwrap()) as usize;
//!         if buf.len() < 4 + len {
//!             return DecodeOutcome::Again;
//!         }
//!         buf.advance(4);
//!         DecodeOutcome::Complete(buf.take_bytes(len).unwrap().to_vec())
//!     })
//!     .with_encode(|resp: &Vec<u8>, buf| {
//!         buf.push((resp.len() as u32).to_be_bytes());
//!         buf.push(resp);
//!     })
//!     .with_process(|msg| {
//!         let req = msg.take_request().unwrap_or_default();
//!         msg.set_response(req);
//!     });
//!
//! let mut server = Server::init(ServerConfig::default().with_reactor_count(4))?;
//! server.add_listen("127.0.0.1:0".parse().unwrap(), handle_set)?;
//! server.start()?;
//! server.stop()?;
//! server.run()?;
//! # Ok::<(), reactor_core::error::ReactorError>(())
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::must_use_candidate)]
#![allow(clippy::needless_pass_by_value)]
#![allow(clippy::future_not_send)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::doc_markdown)]

pub use reactor_core::buffer::FrameBuffer;
pub use reactor_core::config::ServerConfig;
pub use reactor_core::connection::{ConnStatus, Connection};
pub use reactor_core::error::{ReactorError, Result};
pub use reactor_core::handle_set::{DecodeOutcome, HandleSet};
pub use reactor_core::message::Message;

pub(crate) mod reactor_loop;
mod server;

pub use server::Server;

/// Development helper: initialize `tracing` when `RUST_LOG` is set.
pub mod dev_tracing;

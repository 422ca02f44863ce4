//! Reactor Core
//!
//! Protocol-agnostic building blocks for the reactor server framework:
//! - Per-connection state and lifetime (`connection`)
//! - Listening sockets and the application handle-set they carry (`listener`)
//! - The decoded-request/response envelope (`message`)
//! - A segmented, auto-growing frame buffer (`buffer`)
//! - The six application callbacks and the decode outcome (`handle_set`)
//! - A fixed worker thread pool for off-reactor `process` calls (`worker`)
//! - TCP socket tuning (`tcp`)
//! - Best-effort CPU core pinning (`affinity`)
//! - Server configuration (`config`)
//! - Error types (`error`)

#![deny(unsafe_code)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::needless_pass_by_value)]

pub mod affinity;
pub mod buffer;
pub mod config;
pub mod connection;
pub mod error;
pub mod handle_set;
pub mod listener;
pub mod message;
pub mod tcp;
pub mod worker;

pub mod prelude {
    pub use crate::buffer::FrameBuffer;
    pub use crate::config::ServerConfig;
    pub use crate::connection::{Connection, ConnStatus};
    pub use crate::error::{ReactorError, Result};
    pub use crate::handle_set::{DecodeOutcome, HandleSet};
    pub use crate::listener::Listener;
    pub use crate::message::Message;
    pub use crate::worker::WorkerPool;
}

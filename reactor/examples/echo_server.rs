//! A length-prefixed echo server: four reactors, no worker pool.
//!
//! Run with `cargo run --example echo_server`, then connect with any
//! client that writes a 4-byte big-endian length header followed by that
//! many bytes and reads the same framing back.

use reactor::{Server, ServerConfig};
use reactor_core::handle_set::{DecodeOutcome, HandleSet};

fn main() {
    reactor::dev_tracing::init_tracing();

    let handle_set = HandleSet::<Vec<u8>, Vec<u8>>::new()
        .with_decode(|buf| {
            if buf.len() < 4 {
                return DecodeOutcome::Again;
            }
            let len = u32::from_be_bytes(buf.as_slice()[..4].try_into().unwrap()) as usize;
            if buf.len() < 4 + len {
                return DecodeOutcome::Again;
            }
            buf.advance(4);
            DecodeOutcome::Complete(buf.take_bytes(len).expect("length already checked").to_vec())
        })
        .with_encode(|resp: &Vec<u8>, buf| {
            buf.push((resp.len() as u32).to_be_bytes());
            buf.push(resp);
        })
        .with_process(|msg| {
            let req = msg.take_request().unwrap_or_default();
            msg.set_response(req);
        })
        .with_on_connect(|conn| {
            println!("connected: {}:{}", conn.remote_addr, conn.remote_port);
        })
        .with_on_disconnect(|conn| {
            println!("disconnected: {}:{}", conn.remote_addr, conn.remote_port);
        });

    let mut server = Server::init(ServerConfig::default().with_reactor_count(4)).expect("reactor_count is nonzero");
    server
        .add_listen("127.0.0.1:7878".parse().unwrap(), handle_set)
        .expect("failed to bind 127.0.0.1:7878");
    server.start().expect("failed to start server");

    println!("echoing on 127.0.0.1:7878, press Ctrl+C to stop");
    server.run().expect("server was never started");
}

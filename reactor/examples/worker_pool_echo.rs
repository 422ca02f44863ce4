//! Same framing as `echo_server`, but `process` sleeps to simulate
//! blocking work, and runs on a worker pool instead of the reactor thread.

use std::time::Duration;

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
            // Pretend this is a blocking call (disk, a C library, a
            // synchronous DB driver) that would stall a reactor thread.
            std::thread::sleep(Duration::from_millis(20));
            let mut req = msg.take_request().unwrap_or_default();
            req.reverse();
            msg.set_response(req);
        });

    let worker_count = num_cpus::get();
    let mut server = Server::init(ServerConfig::default().with_reactor_count(2).with_worker_count(worker_count)).expect("reactor_count is nonzero");
    server
        .add_listen("127.0.0.1:7879".parse().unwrap(), handle_set)
        .expect("failed to bind 127.0.0.1:7879");
    server.start().expect("failed to start server");

    println!("reversing on 127.0.0.1:7879 via a {worker_count}-thread worker pool, press Ctrl+C to stop");
    server.run().expect("server was never started");
}

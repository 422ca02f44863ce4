//! `process` runs on a worker thread, off the reactor, when a worker pool
//! is configured: the reply still makes it back to the right
//! connection via the return-message channel.

mod support;

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use compio::net::TcpStream;
use reactor::{Server, ServerConfig};
use support::{framed_handle_set, recv_frame, send_frame};

#[compio::test]
async fn worker_pool_processes_and_replies() {
    let seen = Arc::new(AtomicUsize::new(0));
    let seen_in_process = seen.clone();

    let handle_set = framed_handle_set().with_process(move |msg| {
        seen_in_process.fetch_add(1, Ordering::SeqCst);
        // A blocking call here would stall a reactor thread; it's fine on
        // a worker thread.
        std::thread::sleep(Duration::from_millis(5));
        let mut req = msg.take_request().unwrap_or_default();
        req.reverse();
        msg.set_response(req);
    });

    let mut server = Server::init(ServerConfig::default().with_reactor_count(1).with_worker_count(4)).unwrap();
    server.add_listen("127.0.0.1:0".parse().unwrap(), handle_set).unwrap();
    let addr = server.listeners()[0].addr;
    server.start().unwrap();
    compio::time::sleep(Duration::from_millis(50)).await;

    let mut client = TcpStream::connect(addr).await.unwrap();
    send_frame(&mut client, b"abcdef").await;
    let reply = recv_frame(&mut client)
        .await
        .expect("worker reply never arrived on the connection");
    assert_eq!(reply, b"fedcba");
    assert_eq!(seen.load(Ordering::SeqCst), 1);

    drop(client);
    server.destroy();
}

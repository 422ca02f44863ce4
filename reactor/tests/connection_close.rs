//! Closing a connection mid-flight (request dispatched to a worker, client
//! hangs up before the reply is written) must not leak the fd-index entry
//! or panic the reactor.

mod support;

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use compio::buf::BufResult;
use compio::io::AsyncReadExt;
use compio::net::TcpStream;
use reactor::{Server, ServerConfig};
use support::{framed_handle_set, send_frame};

#[compio::test]
async fn client_disconnect_during_processing_finalizes_cleanly() {
    let handle_set = framed_handle_set().with_process(|msg| {
        // Long enough that the client below has already dropped its
        // socket by the time this returns.
        std::thread::sleep(Duration::from_millis(100));
        let req = msg.take_request().unwrap_or_default();
        msg.set_response(req);
    });

    let mut server = Server::init(ServerConfig::default().with_reactor_count(1).with_worker_count(1)).unwrap();
    server.add_listen("127.0.0.1:0".parse().unwrap(), handle_set).unwrap();
    let addr = server.listeners()[0].addr;
    server.start().unwrap();
    compio::time::sleep(Duration::from_millis(50)).await;

    {
        let mut client = TcpStream::connect(addr).await.unwrap();
        send_frame(&mut client, b"in flight").await;
        // Drop the socket immediately; the worker is still processing.
    }

    // Give the worker time to finish and the reactor time to notice the
    // closed write and finalize the connection.
    compio::time::sleep(Duration::from_millis(300)).await;
    assert_eq!(server.connection_count(), 0);

    server.destroy();
}

#[compio::test]
async fn plain_disconnect_drops_from_fd_index() {
    let handle_set = framed_handle_set().with_process(|msg| {
        let req = msg.take_request().unwrap_or_default();
        msg.set_response(req);
    });

    let mut server = Server::init(ServerConfig::default().with_reactor_count(1)).unwrap();
    server.add_listen("127.0.0.1:0".parse().unwrap(), handle_set).unwrap();
    let addr = server.listeners()[0].addr;
    server.start().unwrap();
    compio::time::sleep(Duration::from_millis(50)).await;

    let client = TcpStream::connect(addr).await.unwrap();
    compio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(server.connection_count(), 1);

    drop(client);
    compio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(server.connection_count(), 0);

    server.destroy();
}

#[compio::test]
async fn stop_closes_still_open_connections_exactly_once() {
    let disconnects = Arc::new(AtomicUsize::new(0));
    let disconnects_cb = disconnects.clone();
    let handle_set = framed_handle_set()
        .with_process(|msg| {
            let req = msg.take_request().unwrap_or_default();
            msg.set_response(req);
        })
        .with_on_disconnect(move |_conn| {
            disconnects_cb.fetch_add(1, Ordering::SeqCst);
        });

    let mut server = Server::init(ServerConfig::default().with_reactor_count(2)).unwrap();
    server.add_listen("127.0.0.1:0".parse().unwrap(), handle_set).unwrap();
    let addr = server.listeners()[0].addr;
    server.start().unwrap();
    compio::time::sleep(Duration::from_millis(50)).await;

    // Leave these connections open; never send a close from the client side.
    let mut clients = Vec::new();
    for _ in 0..4 {
        clients.push(TcpStream::connect(addr).await.unwrap());
    }
    compio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(server.connection_count(), 4);

    server.stop().unwrap();
    compio::time::sleep(Duration::from_millis(100)).await;

    assert_eq!(disconnects.load(Ordering::SeqCst), 4, "on_disconnect must fire exactly once per still-open connection");

    // The server side of each socket should now be closed.
    for mut client in clients {
        let scratch = vec![0u8; 16];
        let BufResult(res, _buf) = client.read(scratch).await;
        assert_eq!(res.unwrap(), 0, "expected EOF after stop() closed the connection");
    }

    server.destroy();
}

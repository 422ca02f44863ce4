//! Malformed framing reported by `decode` closes the connection: the
//! client observes EOF rather than a hang.

mod support;

use std::time::Duration;

use compio::buf::BufResult;
use compio::io::AsyncWriteExt;
use compio::net::TcpStream;
use reactor::{Server, ServerConfig};
use reactor_core::handle_set::{DecodeOutcome, HandleSet};

#[compio::test]
async fn malformed_frame_closes_the_connection() {
    let handle_set = HandleSet::<Vec<u8>, Vec<u8>>::new()
        .with_decode(|buf| {
            if buf.is_empty() {
                return DecodeOutcome::Again;
            }
            DecodeOutcome::Err("unsupported leading byte".into())
        })
        .with_process(|_msg| {});

    let mut server = Server::init(ServerConfig::default().with_reactor_count(1)).unwrap();
    server.add_listen("127.0.0.1:0".parse().unwrap(), handle_set).unwrap();
    let addr = server.listeners()[0].addr;
    server.start().unwrap();
    compio::time::sleep(Duration::from_millis(50)).await;

    let mut client = TcpStream::connect(addr).await.unwrap();
    let BufResult(res, _buf) = client.write(vec![0xFFu8]).await;
    res.unwrap();

    // The server closes on the decode error; reading from the client side
    // should observe EOF rather than block forever.
    let mut scratch = vec![0u8; 16];
    let BufResult(res, _buf) = compio::io::AsyncReadExt::read(&mut client, std::mem::take(&mut scratch)).await;
    assert_eq!(res.unwrap(), 0, "expected EOF after decode error");

    server.destroy();
}

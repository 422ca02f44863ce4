//! Shared test fixtures: a length-prefixed echo-ish protocol and a minimal
//! blocking-free client used to drive a `Server` under test.

use compio::buf::BufResult;
use compio::io::{AsyncReadExt, AsyncWriteExt};
use compio::net::TcpStream;
use reactor_core::handle_set::{DecodeOutcome, HandleSet};

/// `u32` big-endian length header followed by that many bytes.
pub fn framed_handle_set() -> HandleSet<Vec<u8>, Vec<u8>> {
    HandleSet::new()
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
}

/// Write one framed message to `stream`.
pub async fn send_frame(stream: &mut TcpStream, payload: &[u8]) {
    let mut out = Vec::with_capacity(4 + payload.len());
    out.extend_from_slice(&(payload.len() as u32).to_be_bytes());
    out.extend_from_slice(payload);
    write_all(stream, &out).await;
}

/// Read exactly one framed message from `stream`, or `None` on EOF before a
/// full frame arrives.
pub async fn recv_frame(stream: &mut TcpStream) -> Option<Vec<u8>> {
    let header = read_exact(stream, 4).await?;
    let len = u32::from_be_bytes(header.try_into().unwrap()) as usize;
    read_exact(stream, len).await
}

async fn write_all(stream: &mut TcpStream, data: &[u8]) {
    let mut offset = 0;
    while offset < data.len() {
        let chunk = data[offset..].to_vec();
        let BufResult(res, _chunk) = stream.write(chunk).await;
        let n = res.expect("test write failed");
        assert!(n > 0, "write made no progress");
        offset += n;
    }
}

async fn read_exact(stream: &mut TcpStream, want: usize) -> Option<Vec<u8>> {
    let mut out = vec![0u8; want];
    let mut filled = 0;
    while filled < want {
        let scratch = vec![0u8; want - filled];
        let BufResult(res, scratch) = stream.read(scratch).await;
        let n = res.expect("test read failed");
        if n == 0 {
            return None;
        }
        out[filled..filled + n].copy_from_slice(&scratch[..n]);
        filled += n;
    }
    Some(out)
}

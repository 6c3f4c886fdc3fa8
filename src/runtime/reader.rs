//! Draining a request off a connection.
//!
//! "Drain" means: take every byte that is readable right now, without
//! waiting for more. There is no framing, so a request that arrives in
//! bursts a few milliseconds apart can be cut short.

use crate::echo::decode_ascii;
use crate::quit::QuitSignal;
use bytes::BytesMut;
use std::io::{self, Read};
use std::thread;
use std::time::Duration;
use tracing::trace;

/// Outcome of draining a connection.
#[derive(Debug, PartialEq, Eq)]
pub enum Drained {
    /// Everything that was available, decoded. May be empty.
    Request(String),
    Cancelled,
}

/// Read all currently available bytes from a non-blocking `stream`.
///
/// Reads at most `chunk_size` bytes at a time, appending in arrival order,
/// and pauses `poll_interval` after every chunk. The quit signal is checked
/// before every read. `WouldBlock` or end of stream ends the drain; any
/// other error is returned.
pub fn drain_request<R: Read, Q: QuitSignal + ?Sized>(
    stream: &mut R,
    quit: &mut Q,
    chunk_size: usize,
    poll_interval: Duration,
) -> io::Result<Drained> {
    let mut request = BytesMut::new();
    let mut chunk = vec![0u8; chunk_size];

    loop {
        if quit.poll_quit() {
            return Ok(Drained::Cancelled);
        }

        match stream.read(&mut chunk) {
            Ok(0) => break,
            Ok(n) => {
                request.extend_from_slice(&chunk[..n]);
                trace!(received = request.len(), "Receiving request");
                thread::sleep(poll_interval);
            }
            Err(ref e) if e.kind() == io::ErrorKind::WouldBlock => break,
            Err(ref e) if e.kind() == io::ErrorKind::Interrupted => {}
            Err(e) => return Err(e),
        }
    }

    Ok(Drained::Request(decode_ascii(&request)))
}

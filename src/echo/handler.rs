//! Writes the echo response to a client connection.

use super::render::{html_body, render_response, ServerStamp};
use chrono::{DateTime, Utc};
use std::io::{self, Write};
use std::thread;
use std::time::Duration;
use tracing::trace;

/// Send the echo of `request` and flush it.
///
/// The stream may be non-blocking: a `WouldBlock` waits `retry_interval`
/// and retries. Any other error is returned as a send failure.
///
/// Returns the number of bytes written.
pub fn send_response<W: Write>(
    stream: &mut W,
    request: &str,
    stamp: &ServerStamp,
    now: DateTime<Utc>,
    retry_interval: Duration,
) -> io::Result<usize> {
    let body = html_body(request);
    let response = render_response(&body, stamp, now);
    let bytes = response.as_bytes();

    let mut written = 0;
    while written < bytes.len() {
        match stream.write(&bytes[written..]) {
            Ok(0) => {
                return Err(io::Error::new(io::ErrorKind::WriteZero, "write returned 0"));
            }
            Ok(n) => {
                written += n;
                trace!(written, total = bytes.len(), "Sending response");
            }
            Err(ref e) if e.kind() == io::ErrorKind::WouldBlock => thread::sleep(retry_interval),
            Err(ref e) if e.kind() == io::ErrorKind::Interrupted => {}
            Err(e) => return Err(e),
        }
    }

    loop {
        match stream.flush() {
            Ok(()) => return Ok(written),
            Err(ref e) if e.kind() == io::ErrorKind::WouldBlock => thread::sleep(retry_interval),
            Err(e) => return Err(e),
        }
    }
}

//! Single-connection serve loop.
//!
//! One client at a time, no reactor-driven dispatch: the loop waits for a
//! client, drains whatever bytes it has already sent, answers, closes the
//! connection and starts over. Every wait is bounded by a short poll
//! interval so the `QuitSignal` is consulted promptly.
//!
//! - `acceptor`: waits for the next client (mio poll with a timeout)
//! - `reader`: drains currently available request bytes
//! - `event_loop`: the `Server` state machine tying them together

mod acceptor;
mod event_loop;
mod reader;

pub use event_loop::{Server, Shutdown};

use std::io;
use std::net::SocketAddr;

const LISTEN_BACKLOG: i32 = 1024;

/// Create a non-blocking TCP listener.
fn create_listener(addr: SocketAddr) -> io::Result<std::net::TcpListener> {
    let socket = socket2::Socket::new(
        socket2::Domain::for_address(addr),
        socket2::Type::STREAM,
        Some(socket2::Protocol::TCP),
    )?;

    socket.set_reuse_address(true)?;
    socket.set_nonblocking(true)?;
    socket.bind(&addr.into())?;
    socket.listen(LISTEN_BACKLOG)?;

    Ok(socket.into())
}

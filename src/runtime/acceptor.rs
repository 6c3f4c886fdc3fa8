//! Waiting for the next client.
//!
//! The listener is registered with a mio `Poll`; each wait blocks for at
//! most one poll interval, so a pending connection wakes us early while a
//! quit request is still noticed within one interval. An accept that never
//! arrives and is never cancelled keeps the loop waiting forever.

use crate::quit::QuitSignal;
use mio::net::{TcpListener, TcpStream};
use mio::{Events, Interest, Poll, Token};
use std::io;
use std::net::SocketAddr;
use std::time::{Duration, Instant};
use tracing::debug;

const LISTENER_TOKEN: Token = Token(0);

/// Outcome of waiting for a client.
#[derive(Debug)]
pub enum Accepted {
    Client(TcpStream, SocketAddr),
    Cancelled,
}

pub struct Acceptor {
    poll: Poll,
    events: Events,
    listener: TcpListener,
    poll_interval: Duration,
    progress_interval: Duration,
}

impl Acceptor {
    /// Wrap a non-blocking std listener.
    pub fn new(
        listener: std::net::TcpListener,
        poll_interval: Duration,
        progress_interval: Duration,
    ) -> io::Result<Self> {
        let poll = Poll::new()?;
        let mut listener = TcpListener::from_std(listener);
        poll.registry()
            .register(&mut listener, LISTENER_TOKEN, Interest::READABLE)?;

        Ok(Self {
            poll,
            events: Events::with_capacity(16),
            listener,
            poll_interval,
            progress_interval,
        })
    }

    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    /// Wait for the next client.
    ///
    /// A completed accept takes priority over a quit request seen in the
    /// same round. Errors other than `WouldBlock`/`Interrupted` are returned.
    pub fn accept_next<Q: QuitSignal + ?Sized>(&mut self, quit: &mut Q) -> io::Result<Accepted> {
        let started = Instant::now();
        let mut last_progress = started;

        loop {
            match self.listener.accept() {
                Ok((stream, peer)) => return Ok(Accepted::Client(stream, peer)),
                Err(ref e) if e.kind() == io::ErrorKind::WouldBlock => {}
                Err(ref e) if e.kind() == io::ErrorKind::Interrupted => {}
                Err(e) => return Err(e),
            }

            if quit.poll_quit() {
                return Ok(Accepted::Cancelled);
            }

            if last_progress.elapsed() >= self.progress_interval {
                debug!(waited_secs = started.elapsed().as_secs(), "Waiting for client");
                last_progress = Instant::now();
            }

            match self.poll.poll(&mut self.events, Some(self.poll_interval)) {
                Ok(()) => {}
                // Ctrl-C lands here; the quit check picks it up next round
                Err(ref e) if e.kind() == io::ErrorKind::Interrupted => {}
                Err(e) => return Err(e),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::create_listener;
    use std::thread;

    fn acceptor() -> Acceptor {
        let listener = create_listener("127.0.0.1:0".parse().unwrap()).unwrap();
        Acceptor::new(listener, Duration::from_millis(1), Duration::from_secs(1)).unwrap()
    }

    #[test]
    fn test_cancelled_while_waiting() {
        let mut acceptor = acceptor();
        let mut polls = 0;
        let mut quit = || {
            polls += 1;
            polls == 5
        };

        let accepted = acceptor.accept_next(&mut quit).unwrap();
        assert!(matches!(accepted, Accepted::Cancelled));
        assert_eq!(polls, 5);
    }

    #[test]
    fn test_accepts_pending_client() {
        let mut acceptor = acceptor();
        let addr = acceptor.local_addr().unwrap();
        let client = std::net::TcpStream::connect(addr).unwrap();

        let accepted = acceptor.accept_next(&mut || false).unwrap();
        match accepted {
            Accepted::Client(_, peer) => assert_eq!(peer, client.local_addr().unwrap()),
            other => panic!("unexpected: {:?}", other),
        }
    }

    #[test]
    fn test_completed_accept_beats_quit() {
        let mut acceptor = acceptor();
        let addr = acceptor.local_addr().unwrap();
        let _client = std::net::TcpStream::connect(addr).unwrap();
        // Let the handshake land in the backlog
        thread::sleep(Duration::from_millis(50));

        let accepted = acceptor.accept_next(&mut || true).unwrap();
        assert!(matches!(accepted, Accepted::Client(..)));
    }

    #[test]
    fn test_client_arriving_later() {
        let mut acceptor = acceptor();
        let addr = acceptor.local_addr().unwrap();
        let connector = thread::spawn(move || {
            thread::sleep(Duration::from_millis(20));
            std::net::TcpStream::connect(addr).unwrap()
        });

        let deadline = Instant::now() + Duration::from_secs(5);
        let mut quit = || Instant::now() > deadline;
        let accepted = acceptor.accept_next(&mut quit).unwrap();
        assert!(matches!(accepted, Accepted::Client(..)));
        connector.join().unwrap();
    }
}

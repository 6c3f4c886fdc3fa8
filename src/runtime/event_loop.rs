//! The serve loop.
//!
//! ```text
//! Idle -> Accepting -> Reading -> Responding -> Idle
//!            |            |
//!            +------------+--> Terminated (quit, accept error, read error under fail-stop)
//! ```
//!
//! A read failure stops the loop under `ReadErrorPolicy::FailStop` and only
//! drops the connection under `Isolate`. A send failure is always logged
//! and the loop carries on. The client stream is owned by one iteration and
//! closed when it ends, whichever way it ends.

use super::acceptor::{Accepted, Acceptor};
use super::create_listener;
use super::reader::{drain_request, Drained};
use crate::clock::{Clock, SystemClock};
use crate::config::{Config, ReadErrorPolicy};
use crate::echo::{send_response, ServerStamp};
use crate::error::ServeError;
use crate::quit::QuitSignal;
use std::io::{Read, Write};
use std::net::SocketAddr;
use std::time::Duration;
use tracing::{debug, error, info, warn};

/// Why the loop stopped without an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Shutdown {
    Cancelled,
}

/// Result of serving one connection.
#[derive(Debug, PartialEq, Eq)]
enum Step {
    /// Response sent, send failed, or read failed under `Isolate`.
    Served,
    Cancelled,
}

pub struct Server<C: Clock = SystemClock> {
    acceptor: Acceptor,
    stamp: ServerStamp,
    clock: C,
    read_error_policy: ReadErrorPolicy,
    chunk_size: usize,
    poll_interval: Duration,
    echo_requests: bool,
}

impl Server<SystemClock> {
    /// Bind the listener described by `config`.
    pub fn bind(config: &Config) -> Result<Self, ServeError> {
        Self::with_clock(config, SystemClock)
    }
}

impl<C: Clock> Server<C> {
    /// Bind with a custom clock. The start timestamp is taken from it now.
    pub fn with_clock(config: &Config, clock: C) -> Result<Self, ServeError> {
        let listener = create_listener(config.listen).map_err(ServeError::Bind)?;
        let acceptor = Acceptor::new(listener, config.poll_interval, config.progress_interval)
            .map_err(ServeError::Bind)?;
        let stamp = ServerStamp::new(config.identity.clone(), clock.now());

        Ok(Self {
            acceptor,
            stamp,
            clock,
            read_error_policy: config.read_error_policy,
            chunk_size: config.chunk_size,
            poll_interval: config.poll_interval,
            echo_requests: config.echo_requests,
        })
    }

    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.acceptor.local_addr()
    }

    pub fn stamp(&self) -> &ServerStamp {
        &self.stamp
    }

    /// Serve clients one at a time until `quit` fires or a fatal error.
    pub fn run<Q: QuitSignal + ?Sized>(&mut self, quit: &mut Q) -> Result<Shutdown, ServeError> {
        loop {
            if quit.poll_quit() {
                info!("Quit requested");
                return Ok(Shutdown::Cancelled);
            }

            let (mut stream, peer) = match self.acceptor.accept_next(quit) {
                Ok(Accepted::Client(stream, peer)) => (stream, peer),
                Ok(Accepted::Cancelled) => {
                    info!("Quit requested while waiting for a client");
                    return Ok(Shutdown::Cancelled);
                }
                Err(e) => {
                    error!(error = %e, "Accept failed");
                    return Err(ServeError::Accept(e));
                }
            };
            info!(peer = %peer, "Client connected");

            let step = self.serve_connection(&mut stream, peer, quit);
            drop(stream);
            debug!(peer = %peer, "Connection closed");

            if step? == Step::Cancelled {
                info!("Quit requested while reading a request");
                return Ok(Shutdown::Cancelled);
            }
        }
    }

    /// Drain, echo and respond on one connection.
    fn serve_connection<S: Read + Write, Q: QuitSignal + ?Sized>(
        &self,
        stream: &mut S,
        peer: SocketAddr,
        quit: &mut Q,
    ) -> Result<Step, ServeError> {
        let request = match drain_request(stream, quit, self.chunk_size, self.poll_interval) {
            Ok(Drained::Request(request)) => request,
            Ok(Drained::Cancelled) => return Ok(Step::Cancelled),
            Err(e) => match self.read_error_policy {
                ReadErrorPolicy::FailStop => {
                    error!(peer = %peer, error = %e, "Failed to read request, stopping");
                    return Err(ServeError::Read(e));
                }
                ReadErrorPolicy::Isolate => {
                    warn!(peer = %peer, error = %e, "Failed to read request, dropping client");
                    return Ok(Step::Served);
                }
            },
        };

        info!(peer = %peer, bytes = request.len(), "Received request");
        if self.echo_requests {
            info!("\n{request}");
        }

        match send_response(
            stream,
            &request,
            &self.stamp,
            self.clock.now(),
            self.poll_interval,
        ) {
            Ok(bytes) => debug!(peer = %peer, bytes, "Response sent"),
            Err(e) => warn!(peer = %peer, error = %e, "Failed to send response"),
        }

        Ok(Step::Served)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::quit::QuitFlag;
    use crate::runtime::reader::tests::{ScriptedStream, Step as ReadStep};
    use chrono::{DateTime, TimeZone, Utc};
    use std::cell::Cell;
    use std::io;
    use std::thread;

    /// Advances one second per reading.
    struct TickingClock {
        next: Cell<DateTime<Utc>>,
    }

    impl Clock for TickingClock {
        fn now(&self) -> DateTime<Utc> {
            let now = self.next.get();
            self.next.set(now + chrono::Duration::seconds(1));
            now
        }
    }

    fn peer() -> SocketAddr {
        "127.0.0.1:40000".parse().unwrap()
    }

    fn config(policy: ReadErrorPolicy) -> Config {
        let mut config = Config::for_test();
        config.read_error_policy = policy;
        config
    }

    fn header<'a>(response: &'a str, name: &str) -> &'a str {
        let prefix = format!("{name}: ");
        response
            .split("\r\n")
            .find_map(|line| line.strip_prefix(prefix.as_str()))
            .unwrap()
    }

    fn body(response: &str) -> &str {
        response.split_once("\r\n\r\n").unwrap().1
    }

    /// Connect and send `request` before the server starts polling.
    fn send_early(addr: SocketAddr, request: &[u8]) -> std::net::TcpStream {
        let mut client = std::net::TcpStream::connect(addr).unwrap();
        client.write_all(request).unwrap();
        client
            .set_read_timeout(Some(Duration::from_secs(5)))
            .unwrap();
        client
    }

    fn read_response(client: &mut std::net::TcpStream) -> String {
        let mut response = String::new();
        client.read_to_string(&mut response).unwrap();
        response
    }

    #[test]
    fn test_serve_connection_echoes() {
        let server = Server::bind(&config(ReadErrorPolicy::FailStop)).unwrap();
        let mut stream = ScriptedStream::new([ReadStep::Data(b"A\r\nB".to_vec())]);

        let step = server.serve_connection(&mut stream, peer(), &mut || false).unwrap();
        assert_eq!(step, Step::Served);

        let response = String::from_utf8(stream.written).unwrap();
        assert!(response.starts_with("HTTP/1.1 200 OK\r\n"));
        assert_eq!(body(&response), "A<br>\nB");
        assert_eq!(header(&response, "Content-Length"), "7");
    }

    #[test]
    fn test_empty_request_gets_empty_body() {
        let server = Server::bind(&config(ReadErrorPolicy::FailStop)).unwrap();
        let mut stream = ScriptedStream::idle();

        let step = server.serve_connection(&mut stream, peer(), &mut || false).unwrap();
        assert_eq!(step, Step::Served);

        let response = String::from_utf8(stream.written).unwrap();
        assert_eq!(header(&response, "Content-Length"), "0");
        assert_eq!(body(&response), "");
    }

    #[test]
    fn test_read_failure_is_fatal_under_fail_stop() {
        let server = Server::bind(&config(ReadErrorPolicy::FailStop)).unwrap();
        let mut stream = ScriptedStream::new([ReadStep::Fail(io::ErrorKind::ConnectionReset)]);

        let result = server.serve_connection(&mut stream, peer(), &mut || false);
        assert!(matches!(result, Err(ServeError::Read(_))));
        assert!(stream.written.is_empty());
    }

    #[test]
    fn test_read_failure_isolated() {
        let server = Server::bind(&config(ReadErrorPolicy::Isolate)).unwrap();
        let mut stream = ScriptedStream::new([ReadStep::Fail(io::ErrorKind::ConnectionReset)]);

        let step = server.serve_connection(&mut stream, peer(), &mut || false).unwrap();
        assert_eq!(step, Step::Served);
        assert!(stream.written.is_empty());
    }

    #[test]
    fn test_send_failure_is_not_fatal() {
        let server = Server::bind(&config(ReadErrorPolicy::FailStop)).unwrap();
        let mut stream = ScriptedStream::new([ReadStep::Data(b"GET /".to_vec())]);
        stream.write_error = Some(io::ErrorKind::BrokenPipe);

        let step = server.serve_connection(&mut stream, peer(), &mut || false).unwrap();
        assert_eq!(step, Step::Served);
    }

    #[test]
    fn test_quit_during_drain_sends_nothing() {
        let server = Server::bind(&config(ReadErrorPolicy::Isolate)).unwrap();
        let mut stream = ScriptedStream::new([ReadStep::Data(b"GET /".to_vec())]);

        let step = server.serve_connection(&mut stream, peer(), &mut || true).unwrap();
        assert_eq!(step, Step::Cancelled);
        assert!(stream.written.is_empty());
    }

    #[test]
    fn test_quit_before_any_client() {
        let mut server = Server::bind(&config(ReadErrorPolicy::FailStop)).unwrap();
        let mut polls = 0;
        let mut quit = || {
            polls += 1;
            polls >= 10
        };

        assert_eq!(server.run(&mut quit).unwrap(), Shutdown::Cancelled);
        assert_eq!(polls, 10);
    }

    #[test]
    fn test_end_to_end_echo() {
        let mut server = Server::bind(&config(ReadErrorPolicy::FailStop)).unwrap();
        let addr = server.local_addr().unwrap();
        let mut client = send_early(addr, b"GET / HTTP/1.1\r\nHost: x\r\n\r\n");
        thread::sleep(Duration::from_millis(50));

        let quit = QuitFlag::new();
        let mut server_quit = quit.clone();
        let handle = thread::spawn(move || server.run(&mut server_quit));

        let response = read_response(&mut client);
        quit.request();
        assert_eq!(handle.join().unwrap().unwrap(), Shutdown::Cancelled);

        let expected_body = "GET / HTTP/1.1<br>\nHost: x<br>\n<br>\n";
        assert!(response.starts_with("HTTP/1.1 200 OK\r\n"));
        assert_eq!(body(&response), expected_body);
        assert_eq!(
            header(&response, "Content-Length"),
            expected_body.len().to_string()
        );
        assert_eq!(
            header(&response, "Server"),
            "Apache/2.4.4 (Win32) OpenSSL/0.9.8y PHP/5.4.16"
        );
    }

    #[test]
    fn test_clients_served_in_turn_with_fixed_stamp() {
        let start = Utc.with_ymd_and_hms(2030, 1, 1, 0, 0, 0).unwrap();
        let clock = TickingClock {
            next: Cell::new(start),
        };
        let mut server =
            Server::with_clock(&config(ReadErrorPolicy::FailStop), clock).unwrap();
        let addr = server.local_addr().unwrap();
        assert_eq!(server.stamp().last_modified, "Tue, 01 Jan 2030 00:00:00 GMT");

        let mut first = send_early(addr, b"first");
        let mut second = send_early(addr, b"second");
        thread::sleep(Duration::from_millis(50));

        let quit = QuitFlag::new();
        let mut server_quit = quit.clone();
        let handle = thread::spawn(move || server.run(&mut server_quit));

        let first = read_response(&mut first);
        let second = read_response(&mut second);
        quit.request();
        assert_eq!(handle.join().unwrap().unwrap(), Shutdown::Cancelled);

        assert_eq!(body(&first), "first");
        assert_eq!(body(&second), "second");
        assert_ne!(header(&first, "Date"), header(&second, "Date"));
        assert_eq!(header(&first, "Server"), header(&second, "Server"));
        assert_eq!(
            header(&first, "Last-Modified"),
            "Tue, 01 Jan 2030 00:00:00 GMT"
        );
        assert_eq!(
            header(&first, "Last-Modified"),
            header(&second, "Last-Modified")
        );
    }
}

//! wire-echo: shows exactly what a client sends over the wire.
//!
//! Listens on a single address, takes one client at a time, reads whatever
//! bytes it has sent and answers with a well-formed HTTP/1.1 response whose
//! HTML body is that raw request, line by line.
//!
//! Features:
//! - Configuration via CLI arguments or TOML file
//! - Stops on Escape / `q` at the terminal, or Ctrl-C
//! - Fail-stop or per-connection handling of read errors

mod clock;
mod config;
mod echo;
mod error;
mod quit;
mod runtime;

use config::Config;
use quit::{QuitFlag, QuitSources};
use runtime::Server;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load configuration
    let config = Config::load()?;

    // Initialize logging
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();

    let mut quit = QuitSources::new();

    let interrupted = QuitFlag::new();
    let handler_flag = interrupted.clone();
    ctrlc::set_handler(move || handler_flag.request())?;
    quit.push(interrupted);

    if config.keyboard {
        attach_keyboard(&mut quit);
    }

    let mut server = Server::bind(&config)?;

    info!(
        listen = %server.local_addr()?,
        identity = %server.stamp().identity,
        read_error_policy = ?config.read_error_policy,
        chunk_size = config.chunk_size,
        poll_interval_ms = config.poll_interval.as_millis() as u64,
        quit_sources = quit.len(),
        "Starting wire-echo server"
    );

    match server.run(&mut quit) {
        Ok(shutdown) => {
            info!(?shutdown, "Server stopped");
            Ok(())
        }
        Err(e) => {
            error!(error = %e, "Server stopped on error");
            Err(e.into())
        }
    }
}

#[cfg(unix)]
fn attach_keyboard(quit: &mut QuitSources) {
    match quit::keyboard::Keyboard::attach() {
        Ok(Some(keyboard)) => {
            info!("Press Escape or q to quit");
            quit.push(keyboard);
        }
        Ok(None) => info!("stdin is not a terminal, key quit disabled"),
        Err(e) => warn!(error = %e, "Failed to set up terminal, key quit disabled"),
    }
}

#[cfg(not(unix))]
fn attach_keyboard(_quit: &mut QuitSources) {
    warn!("Key quit is not supported on this platform");
}

//! Escape / `q` on the controlling terminal as a quit source.
//!
//! The terminal is switched to non-canonical, no-echo mode so single key
//! presses are visible without Enter, and restored when the `Keyboard`
//! is dropped.

use super::QuitSignal;
use std::io;
use std::mem::MaybeUninit;
use tracing::debug;

const ESCAPE: u8 = 0x1b;

pub struct Keyboard {
    original: libc::termios,
}

impl Keyboard {
    /// Take over stdin for key polling.
    ///
    /// Returns `Ok(None)` when stdin is not a terminal.
    pub fn attach() -> io::Result<Option<Self>> {
        // SAFETY: isatty only inspects the descriptor.
        if unsafe { libc::isatty(libc::STDIN_FILENO) } != 1 {
            return Ok(None);
        }

        let mut original = MaybeUninit::<libc::termios>::uninit();
        // SAFETY: tcgetattr fully initializes `original` on success.
        let original = unsafe {
            if libc::tcgetattr(libc::STDIN_FILENO, original.as_mut_ptr()) != 0 {
                return Err(io::Error::last_os_error());
            }
            original.assume_init()
        };

        let mut raw = original;
        raw.c_lflag &= !(libc::ICANON | libc::ECHO);
        raw.c_cc[libc::VMIN] = 0;
        raw.c_cc[libc::VTIME] = 0;
        // SAFETY: `raw` is a valid termios copied from the current settings.
        if unsafe { libc::tcsetattr(libc::STDIN_FILENO, libc::TCSANOW, &raw) } != 0 {
            return Err(io::Error::last_os_error());
        }

        debug!("Terminal key polling enabled");
        Ok(Some(Self { original }))
    }

    /// Read whatever key bytes are pending, without waiting.
    fn read_pending(&self, buf: &mut [u8]) -> usize {
        let mut pfd = libc::pollfd {
            fd: libc::STDIN_FILENO,
            events: libc::POLLIN,
            revents: 0,
        };
        // SAFETY: a single valid pollfd, zero timeout.
        let ready = unsafe { libc::poll(&mut pfd, 1, 0) };
        if ready <= 0 || pfd.revents & libc::POLLIN == 0 {
            return 0;
        }
        // SAFETY: `buf` is valid for `buf.len()` bytes.
        let n = unsafe { libc::read(libc::STDIN_FILENO, buf.as_mut_ptr().cast(), buf.len()) };
        n.max(0) as usize
    }
}

impl QuitSignal for Keyboard {
    fn poll_quit(&mut self) -> bool {
        let mut buf = [0u8; 8];
        let n = self.read_pending(&mut buf);
        is_quit_key(&buf[..n])
    }
}

impl Drop for Keyboard {
    fn drop(&mut self) {
        // SAFETY: restores the settings captured in `attach`.
        unsafe {
            libc::tcsetattr(libc::STDIN_FILENO, libc::TCSANOW, &self.original);
        }
    }
}

/// A lone ESC byte is the Escape key; ESC followed by more bytes is an
/// escape sequence (arrow keys and the like) and is ignored.
fn is_quit_key(pending: &[u8]) -> bool {
    match pending {
        [ESCAPE] => true,
        [ESCAPE, ..] => false,
        keys => keys.contains(&b'q'),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_quit_keys() {
        assert!(is_quit_key(b"q"));
        assert!(is_quit_key(&[ESCAPE]));
        assert!(is_quit_key(b"xq"));
    }

    #[test]
    fn test_non_quit_keys() {
        assert!(!is_quit_key(b""));
        assert!(!is_quit_key(b"Q"));
        assert!(!is_quit_key(b"x"));
        // Up arrow
        assert!(!is_quit_key(b"\x1b[A"));
    }
}

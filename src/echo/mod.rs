//! HTML echo "protocol".
//!
//! Nothing is parsed. Whatever bytes the client sent are decoded one byte
//! per character and sent straight back as the body of an HTML page, with
//! every CRLF turned into `<br>` plus newline so the request reads line by
//! line in a browser.
//!
//! ## Response Format
//!
//! ```text
//! HTTP/1.1 200 OK
//! Date: <now>
//! Server: <identity>
//! Last-Modified: <server start>
//! ETag: "<hex hash of Date>"
//! Accept-Ranges: bytes
//! Content-Length: <body bytes>
//! Keep-Alive: timeout=5, max=100
//! Connection: Keep-Alive
//! Content-Type: text/html
//!
//! <body>
//! ```
//!
//! The Keep-Alive headers are advertised only; the connection is always
//! closed after one response.

pub mod handler;
pub mod render;

pub use handler::send_response;
pub use render::{decode_ascii, ServerStamp};

//! Response synthesis for the HTML echo.

use crate::clock::http_date;
use chrono::{DateTime, Utc};
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

const LINE_END: &str = "\r\n";

/// Values fixed at startup and reused for every response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerStamp {
    /// `Server` header value.
    pub identity: String,
    /// `Last-Modified` header value: when the server started.
    pub last_modified: String,
}

impl ServerStamp {
    pub fn new(identity: impl Into<String>, started: DateTime<Utc>) -> Self {
        Self {
            identity: identity.into(),
            last_modified: http_date(started),
        }
    }
}

/// Decode request bytes one byte per character.
///
/// Bytes outside 7-bit ASCII become `?`, so the result always has exactly
/// one byte per input byte.
pub fn decode_ascii(bytes: &[u8]) -> String {
    bytes
        .iter()
        .map(|&b| if b.is_ascii() { b as char } else { '?' })
        .collect()
}

/// Turn raw request text into the HTML body sent back.
pub fn html_body(request: &str) -> String {
    request.replace("\r\n", "<br>\n")
}

/// Cache validator derived from the `Date` value, not from the content.
pub fn etag(timestamp: &str) -> String {
    let mut hasher = DefaultHasher::new();
    timestamp.hash(&mut hasher);
    format!("{:x}", hasher.finish())
}

/// Build the full response text: status line, headers, blank line, body.
pub fn render_response(body: &str, stamp: &ServerStamp, now: DateTime<Utc>) -> String {
    let date = http_date(now);
    let headers = [
        "HTTP/1.1 200 OK".to_string(),
        format!("Date: {date}"),
        format!("Server: {}", stamp.identity),
        format!("Last-Modified: {}", stamp.last_modified),
        format!("ETag: \"{}\"", etag(&date)),
        "Accept-Ranges: bytes".to_string(),
        format!("Content-Length: {}", body.len()),
        "Keep-Alive: timeout=5, max=100".to_string(),
        "Connection: Keep-Alive".to_string(),
        "Content-Type: text/html".to_string(),
    ];

    let mut response = headers.join(LINE_END);
    response.push_str(LINE_END);
    response.push_str(LINE_END);
    response.push_str(body);
    response
}

//! Minimal HTTP/1.1 request parsing.
//!
//! The listener fleet reads one request per connection straight off the
//! socket. Only the pieces the dispatcher routes on are kept: method,
//! path, `Host`, and the body for `PUT /servers`.

use anyhow::{anyhow, Result};
use tokio::io::{AsyncRead, AsyncReadExt};

use crate::config::constants::MAX_REQUEST_HEAD;

/// A parsed HTTP request.
#[derive(Debug, Clone)]
pub struct Request {
    /// Request method, upper-case as sent.
    pub method: String,
    /// Request path with any query string stripped.
    pub path: String,
    /// Value of the `Host` header, which may carry an encoded rebinding
    /// program. Empty if absent.
    pub host: String,
    /// Request body, empty unless a `Content-Length` was given.
    pub body: Vec<u8>,
}

/// Reads and parses one request from `stream`.
///
/// The head is capped at [`MAX_REQUEST_HEAD`] and the body at `max_body`
/// bytes; anything larger is an error, which the dispatcher answers
/// with 400.
pub async fn read_request<S>(stream: &mut S, max_body: usize) -> Result<Request>
where
    S: AsyncRead + Unpin,
{
    let mut buf: Vec<u8> = Vec::with_capacity(1024);
    let head_end = loop {
        if let Some(pos) = find_head_end(&buf) {
            break pos;
        }
        if buf.len() >= MAX_REQUEST_HEAD {
            return Err(anyhow!("request head exceeds {} bytes", MAX_REQUEST_HEAD));
        }
        let mut chunk = [0u8; 1024];
        let n = stream.read(&mut chunk).await?;
        if n == 0 {
            return Err(anyhow!("connection closed before end of request head"));
        }
        buf.extend_from_slice(&chunk[..n]);
    };

    let head = std::str::from_utf8(&buf[..head_end])
        .map_err(|_| anyhow!("request head is not valid UTF-8"))?;
    let mut lines = head.split("\r\n");

    let request_line = lines.next().unwrap_or_default();
    let mut parts = request_line.split_whitespace();
    let method = parts
        .next()
        .ok_or_else(|| anyhow!("missing request method"))?
        .to_string();
    let target = parts
        .next()
        .ok_or_else(|| anyhow!("missing request target"))?;
    let path = target.split('?').next().unwrap_or(target).to_string();

    let mut host = String::new();
    let mut content_length = 0usize;
    for line in lines {
        let Some((name, value)) = line.split_once(':') else {
            continue;
        };
        let value = value.trim();
        if name.eq_ignore_ascii_case("host") {
            host = value.to_string();
        } else if name.eq_ignore_ascii_case("content-length") {
            content_length = value
                .parse()
                .map_err(|_| anyhow!("invalid Content-Length: {:?}", value))?;
        }
    }

    if content_length > max_body {
        return Err(anyhow!(
            "request body of {} bytes exceeds limit of {}",
            content_length,
            max_body
        ));
    }

    let mut body = buf[head_end + 4..].to_vec();
    body.truncate(content_length);
    while body.len() < content_length {
        let mut chunk = vec![0u8; content_length - body.len()];
        let n = stream.read(&mut chunk).await?;
        if n == 0 {
            return Err(anyhow!("connection closed before end of request body"));
        }
        body.extend_from_slice(&chunk[..n]);
    }

    Ok(Request {
        method,
        path,
        host,
        body,
    })
}

fn find_head_end(buf: &[u8]) -> Option<usize> {
    buf.windows(4).position(|w| w == b"\r\n\r\n")
}

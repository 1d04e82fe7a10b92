//! HTTP/1.1 response writing.
//!
//! Every response carries the anti-caching defaults and `Connection:
//! close`: the browser must tear the socket down after each exchange or a
//! pooled connection would pin the attacker address past the rebind.

use anyhow::Result;
use tokio::io::{AsyncWrite, AsyncWriteExt};

use crate::config::headers::{CONTENT_TYPE_JSON, DEFAULT_HEADERS};

/// An HTTP response about to be written.
#[derive(Debug, Clone)]
pub struct Response {
    /// Status code.
    pub status: u16,
    /// Content-Type header value.
    pub content_type: String,
    /// Response body.
    pub body: Vec<u8>,
}

impl Response {
    /// 200 with a JSON body.
    pub fn ok_json(body: String) -> Self {
        Self {
            status: 200,
            content_type: CONTENT_TYPE_JSON.to_string(),
            body: body.into_bytes(),
        }
    }

    /// 200 with an HTML body.
    pub fn ok_html(body: String) -> Self {
        Self {
            status: 200,
            content_type: "text/html; charset=utf-8".to_string(),
            body: body.into_bytes(),
        }
    }

    /// 200 with an arbitrary content type.
    pub fn ok_with_content_type(content_type: &str, body: Vec<u8>) -> Self {
        Self {
            status: 200,
            content_type: content_type.to_string(),
            body,
        }
    }

    /// 400 with an empty JSON object body.
    pub fn bad_request_json() -> Self {
        Self {
            status: 400,
            content_type: CONTENT_TYPE_JSON.to_string(),
            body: b"{}".to_vec(),
        }
    }

    /// 404 in the classic file-server phrasing.
    pub fn not_found() -> Self {
        Self {
            status: 404,
            content_type: "text/plain; charset=utf-8".to_string(),
            body: b"404 page not found".to_vec(),
        }
    }
}

fn status_text(status: u16) -> &'static str {
    match status {
        200 => "OK",
        400 => "Bad Request",
        404 => "Not Found",
        500 => "Internal Server Error",
        _ => "Unknown",
    }
}

/// Writes `response` to the stream with the fleet-wide default headers.
pub async fn write_response<S>(stream: &mut S, response: &Response) -> Result<()>
where
    S: AsyncWrite + Unpin,
{
    let mut head = format!(
        "HTTP/1.1 {} {}\r\n",
        response.status,
        status_text(response.status)
    );
    for (name, value) in DEFAULT_HEADERS {
        head.push_str(name);
        head.push_str(": ");
        head.push_str(value);
        head.push_str("\r\n");
    }
    head.push_str(&format!("Content-Type: {}\r\n", response.content_type));
    head.push_str(&format!("Content-Length: {}\r\n", response.body.len()));
    head.push_str("Connection: close\r\n\r\n");

    stream.write_all(head.as_bytes()).await?;
    stream.write_all(&response.body).await?;
    stream.flush().await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_write_response_includes_default_headers() {
        let mut out = Vec::new();
        let response = Response::ok_json("{\"a\":1}".into());
        write_response(&mut out, &response).await.unwrap();

        let text = String::from_utf8(out).unwrap();
        assert!(text.starts_with("HTTP/1.1 200 OK\r\n"));
        assert!(text.contains("Cache-Control: no-cache, no-store, must-revalidate\r\n"));
        assert!(text.contains("Pragma: no-cache\r\n"));
        assert!(text.contains("Expires: 0\r\n"));
        assert!(text.contains("X-DNS-Prefetch-Control: off\r\n"));
        assert!(text.contains("X-Singularity-Of-Origin: t\r\n"));
        assert!(text.contains("Connection: close\r\n"));
        assert!(text.contains("Content-Length: 7\r\n"));
        assert!(text.ends_with("{\"a\":1}"));
    }

    #[tokio::test]
    async fn test_bad_request_has_empty_json_body() {
        let mut out = Vec::new();
        write_response(&mut out, &Response::bad_request_json())
            .await
            .unwrap();
        let text = String::from_utf8(out).unwrap();
        assert!(text.starts_with("HTTP/1.1 400 Bad Request\r\n"));
        assert!(text.ends_with("{}"));
    }
}

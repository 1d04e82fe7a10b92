//! Static file serving for the attack pages.
//!
//! The catch-all route serves the HTML root directory; everything the
//! victim browser loads before the rebind (frames, payload scripts,
//! manager assets) comes from here.

use std::path::{Path, PathBuf};

use log::debug;

use crate::http::response::Response;

/// Serves `request_path` from below `html_root`.
///
/// Directory requests fall through to their `index.html`. Traversal
/// segments are rejected with a 404 rather than an error page; probing
/// tools learn nothing from the difference.
pub async fn serve_path(html_root: &Path, request_path: &str) -> Response {
    let Some(relative) = sanitize(request_path) else {
        return Response::not_found();
    };

    let mut target = html_root.join(relative);
    if let Ok(metadata) = tokio::fs::metadata(&target).await {
        if metadata.is_dir() {
            target = target.join("index.html");
        }
    }

    match tokio::fs::read(&target).await {
        Ok(body) => Response::ok_with_content_type(content_type_for(&target), body),
        Err(e) => {
            debug!("HTTP: static file {} not served: {}", target.display(), e);
            Response::not_found()
        }
    }
}

/// Normalizes a request path into a safe relative path, or `None` if it
/// tries to escape the root.
fn sanitize(request_path: &str) -> Option<PathBuf> {
    let mut clean = PathBuf::new();
    for segment in request_path.split('/') {
        match segment {
            "" | "." => {}
            ".." => return None,
            s => clean.push(s),
        }
    }
    Some(clean)
}

/// Content type by file extension; the set covers what the attack pages
/// actually ship.
fn content_type_for(path: &Path) -> &'static str {
    match path.extension().and_then(|e| e.to_str()) {
        Some("html") | Some("htm") => "text/html; charset=utf-8",
        Some("js") => "text/javascript; charset=utf-8",
        Some("css") => "text/css; charset=utf-8",
        Some("json") => "application/json",
        Some("png") => "image/png",
        Some("jpg") | Some("jpeg") => "image/jpeg",
        Some("svg") => "image/svg+xml",
        Some("ico") => "image/x-icon",
        Some("txt") => "text/plain; charset=utf-8",
        Some("wasm") => "application/wasm",
        _ => "application/octet-stream",
    }
}

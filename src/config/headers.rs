//! HTTP header constants.
//!
//! Every response from the listener fleet carries these headers. Caching
//! and DNS prefetching must stay off on the victim side or the browser
//! would keep using the attacker address past the rebind.

/// Cache-Control header value (HTTP 1.1).
pub const HEADER_CACHE_CONTROL: (&str, &str) = ("Cache-Control", "no-cache, no-store, must-revalidate");
/// Pragma header value (HTTP 1.0 caches).
pub const HEADER_PRAGMA: (&str, &str) = ("Pragma", "no-cache");
/// Expires header value (proxies).
pub const HEADER_EXPIRES: (&str, &str) = ("Expires", "0");
/// Disables speculative DNS prefetching in Chrome.
pub const HEADER_DNS_PREFETCH: (&str, &str) = ("X-DNS-Prefetch-Control", "off");
/// Marker header: attack code probes for this to tell the attacker origin
/// from the rebound target.
pub const HEADER_ORIGIN_MARKER: (&str, &str) = ("X-Singularity-Of-Origin", "t");

/// Default headers applied to every response, in emission order.
pub const DEFAULT_HEADERS: &[(&str, &str)] = &[
    HEADER_CACHE_CONTROL,
    HEADER_PRAGMA,
    HEADER_EXPIRES,
    HEADER_DNS_PREFETCH,
    HEADER_ORIGIN_MARKER,
];

/// Content type of the JSON API endpoints.
pub const CONTENT_TYPE_JSON: &str = "application/json; charset=UTF-8";

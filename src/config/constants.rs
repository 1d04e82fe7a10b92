//! Configuration constants.
//!
//! This module defines the fixed operational parameters of the rebinding
//! server: record TTLs, the firewall-trick timing, and request size limits.

use std::time::Duration;

// DNS answer TTLs
/// TTL of the leading record in a multi-answer response.
/// The browser may pin the attacker address for this long, which is fine:
/// the attacker origin is the one serving the payload.
pub const LEAD_RECORD_TTL: u32 = 10;
/// TTL of the record the victim must re-resolve. Zero so the resolver
/// discards it immediately and the next lookup reaches us again.
pub const REBIND_RECORD_TTL: u32 = 0;
/// TTL of CNAME answers.
pub const CNAME_RECORD_TTL: u32 = 10;

// Firewall trick timing
/// Minimum age of a DNS session before the HTTP layer will drop the
/// attacker-bound flow. Gives the browser time to fetch the payload first.
pub const FIREWALL_TRIGGER_DELAY: Duration = Duration::from_secs(3);
/// Lifetime of an installed drop rule before it is removed again.
pub const FIREWALL_RULE_LIFETIME: Duration = Duration::from_secs(5);
/// Source ports covered by a drop rule beyond the observed one.
/// Browsers retry dropped connections from nearby ephemeral ports.
pub const SOURCE_PORT_WINDOW: u16 = 10;

/// Token written on the hijacked socket after the drop rule is installed.
/// Attack code in the browser reads this to distinguish attacker from target.
pub const HIJACK_TOKEN: &str = "thisismytesttoken";

/// How long `/delaydomload` stalls the connection to hold off the
/// browser's DOM load event.
pub const DOM_LOAD_STALL: Duration = Duration::from_secs(90);

// HTTP request limits
/// Maximum size of a request head (request line plus headers).
pub const MAX_REQUEST_HEAD: usize = 8192;
/// Maximum accepted body size for `PUT /servers`.
pub const SERVERS_PUT_MAX_BODY: usize = 5000;

/// Default interval between session expiry sweeps; also the default
/// maximum session age.
pub const DEFAULT_SESSION_EXPIRY_SECS: u64 = 600;

/// Default path of the directory holding attack pages and payloads.
pub const DEFAULT_HTML_ROOT: &str = "./html";

/// Subdirectory of the HTML root whose `.js` files are concatenated into
/// the `/soopayload.html` attack frame.
pub const PAYLOADS_SUBDIR: &str = "payloads";

//! Rebinding DNS authority.
//!
//! - [`codec`]: the encoded query-name grammar
//! - [`responder`]: per-session answer construction
//! - [`server`]: UDP/TCP transport loops

pub mod codec;
pub mod responder;
pub mod server;

pub use codec::RebindQuery;
pub use responder::DnsResponder;
pub use server::run_dns_server;

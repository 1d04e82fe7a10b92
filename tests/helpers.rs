// Shared test helpers for driving the DNS responder with wire messages.
//
// This module provides common utilities used across multiple test files to
// reduce duplication.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use hickory_proto::op::{Message, MessageType, Query};
use hickory_proto::rr::{Name, RData, RecordType};

use rebinder::config::AppConfig;
use rebinder::dns::DnsResponder;
use rebinder::session::SessionStore;
use rebinder::strategy::Strategy;

/// A config with test-friendly defaults; tweak fields per test.
#[allow(dead_code)] // Used by other test files
pub fn test_config() -> AppConfig {
    AppConfig {
        http_server_ports: vec![],
        response_ip: "203.0.113.5".to_string(),
        response_rebound_ip: "127.0.0.1".to_string(),
        default_strategy: Strategy::FirstThenSecond,
        rebound_timeout_secs: 30,
        allow_dynamic_http_servers: false,
        dns_bind_addr: "127.0.0.1:0".to_string(),
        ws_proxy_port: 3129,
        tproxy: false,
        ignore_dns_request_from: vec![],
        html_root: PathBuf::from("./html"),
        session_expiry: Duration::from_secs(600),
    }
}

/// A responder over a fresh store, returning both.
#[allow(dead_code)]
pub fn test_responder(config: AppConfig) -> (Arc<DnsResponder>, Arc<SessionStore>) {
    let sessions = Arc::new(SessionStore::new());
    let responder = Arc::new(DnsResponder::new(Arc::new(config), Arc::clone(&sessions)));
    (responder, sessions)
}

/// The peer all test queries appear to come from.
#[allow(dead_code)]
pub fn test_peer() -> SocketAddr {
    "198.51.100.7:53000".parse().unwrap()
}

/// Builds a wire-format query for `name` with the given record type.
#[allow(dead_code)]
pub fn wire_query(name: &str, rtype: RecordType) -> Vec<u8> {
    let mut message = Message::new();
    message.set_id(4242);
    message.set_message_type(MessageType::Query);
    message.set_recursion_desired(true);
    let qname = Name::from_ascii(name).expect("test query name must be valid");
    message.add_query(Query::query(qname, rtype));
    message.to_vec().expect("test query must serialize")
}

/// One answer record flattened for assertions: (type, ttl, value).
#[allow(dead_code)]
pub fn answers_of(reply: &[u8]) -> Vec<(RecordType, u32, String)> {
    let message = Message::from_vec(reply).expect("reply must parse");
    message
        .answers()
        .iter()
        .map(|record| {
            let value = match record.data() {
                RData::A(a) => a.0.to_string(),
                RData::AAAA(aaaa) => aaaa.0.to_string(),
                RData::CNAME(cname) => cname.0.to_string(),
                other => panic!("unexpected rdata in test reply: {:?}", other),
            };
            (record.record_type(), record.ttl(), value)
        })
        .collect()
}

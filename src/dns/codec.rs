//! Encoded query-name codec.
//!
//! A rebinding program rides inside the DNS query name, one level deep and
//! dash-separated:
//!
//! ```text
//! s-<host1>.<host2>-<session>-<strategy>-e.<suffix>
//! ```
//!
//! `host1` and `host2` are fully-expanded hex addresses (4 bytes for IPv4,
//! 16 for IPv6); `host2` may instead be a DNS name, with any literal dash
//! doubled (`--`). The codec substitutes `_` for each doubled dash before
//! splitting so CNAME targets survive the field separator.

use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};

use crate::error_handling::QueryParseError;

/// Placeholder for an escaped dash while fields are being split.
const DASH_PLACEHOLDER: char = '_';

/// A parsed rebinding program.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RebindQuery {
    /// String form of the first host: the attacker address.
    pub attacker_ip: String,
    /// String form of the second host: IP literal, DNS name, or `localhost`.
    pub rebound_target: String,
    /// Opaque session token, lower-cased.
    pub session: String,
    /// Raw strategy tag. Unknown tags are accepted here and fall back to
    /// the configured default at dispatch.
    pub strategy_tag: String,
    /// Domain suffix after the end tag.
    pub domain_suffix: String,
}

impl RebindQuery {
    /// Parses a fully-qualified query name into a rebinding program.
    ///
    /// The name is lower-cased first; session ids therefore compare
    /// case-insensitively. No partial record is ever returned.
    pub fn parse(qname: &str) -> Result<Self, QueryParseError> {
        let qname = qname.to_ascii_lowercase();
        // Preserve dashes inside a CNAME target across the field split.
        let qname = qname.replace("--", &DASH_PLACEHOLDER.to_string());

        let rest = qname
            .strip_prefix("s-")
            .ok_or(QueryParseError::MissingStartTag)?;

        let parts: Vec<&str> = rest.split("-e.").collect();
        if parts.len() != 2 {
            return Err(QueryParseError::MissingEndTag);
        }
        let (program, domain_suffix) = (parts[0], parts[1]);

        if domain_suffix.len() < 3 || !domain_suffix.contains('.') {
            return Err(QueryParseError::InvalidSuffix);
        }

        let fields: Vec<&str> = program.split('-').collect();
        if fields.len() != 3 {
            return Err(QueryParseError::FieldCount);
        }

        let (host1, host2) = fields[0]
            .split_once('.')
            .ok_or(QueryParseError::MissingHostSeparator)?;

        let attacker_ip = decode_hex_addr(host1)
            .ok_or(QueryParseError::InvalidAttackerHost)?
            .to_string();

        let rebound_target = match decode_hex_addr(host2) {
            Some(ip) => ip.to_string(),
            None if host2 == "localhost" => host2.to_string(),
            None => {
                let unescaped = host2.replace(DASH_PLACEHOLDER, "-");
                if !is_domain_name(&unescaped) {
                    return Err(QueryParseError::InvalidReboundHost);
                }
                unescaped
            }
        };

        let session = fields[1].to_string();
        if session.is_empty() {
            return Err(QueryParseError::EmptySession);
        }

        Ok(Self {
            attacker_ip,
            rebound_target,
            session,
            strategy_tag: fields[2].to_string(),
            domain_suffix: domain_suffix.to_string(),
        })
    }

    /// Renders this program back into a query name.
    ///
    /// The inverse of [`parse`](Self::parse) for records obeying the
    /// grammar; dashes in a CNAME target are escaped by doubling.
    pub fn encode(&self) -> String {
        let host2 = match self.rebound_target.parse::<IpAddr>() {
            Ok(ip) => encode_hex_addr(ip),
            Err(_) => self.rebound_target.replace('-', "--"),
        };
        let host1 = match self.attacker_ip.parse::<IpAddr>() {
            Ok(ip) => encode_hex_addr(ip),
            Err(_) => self.attacker_ip.clone(),
        };
        format!(
            "s-{}.{}-{}-{}-e.{}",
            host1, host2, self.session, self.strategy_tag, self.domain_suffix
        )
    }
}

/// Decodes a fully-expanded hex address: 8 hex chars for IPv4, 32 for IPv6.
fn decode_hex_addr(s: &str) -> Option<IpAddr> {
    let bytes = decode_hex(s)?;
    match bytes.len() {
        4 => {
            let octets: [u8; 4] = bytes.try_into().ok()?;
            Some(IpAddr::V4(Ipv4Addr::from(octets)))
        }
        16 => {
            let octets: [u8; 16] = bytes.try_into().ok()?;
            Some(IpAddr::V6(Ipv6Addr::from(octets)))
        }
        _ => None,
    }
}

fn encode_hex_addr(ip: IpAddr) -> String {
    let bytes = match ip {
        IpAddr::V4(v4) => v4.octets().to_vec(),
        IpAddr::V6(v6) => v6.octets().to_vec(),
    };
    bytes.iter().map(|b| format!("{:02x}", b)).collect()
}

fn decode_hex(s: &str) -> Option<Vec<u8>> {
    if s.is_empty() || s.len() % 2 != 0 {
        return None;
    }
    (0..s.len())
        .step_by(2)
        .map(|i| u8::from_str_radix(&s[i..i + 2], 16).ok())
        .collect()
}

/// Syntactic validity of a DNS name.
///
/// Labels of 1-63 characters from `[a-z0-9_-]`, not starting or ending
/// with a dash, at most 253 characters overall, and at least one
/// non-numeric character so bare integers are not mistaken for names.
/// A single trailing dot is tolerated.
pub fn is_domain_name(name: &str) -> bool {
    let name = name.strip_suffix('.').unwrap_or(name);
    if name.is_empty() || name.len() > 253 {
        return false;
    }
    let mut non_numeric = false;
    for label in name.split('.') {
        if label.is_empty() || label.len() > 63 {
            return false;
        }
        if label.starts_with('-') || label.ends_with('-') {
            return false;
        }
        for c in label.chars() {
            match c {
                'a'..='z' | 'A'..='Z' | '_' | '-' => non_numeric = true,
                '0'..='9' => {}
                _ => return false,
            }
        }
    }
    non_numeric
}

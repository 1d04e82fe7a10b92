//! End-to-end responder scenarios, driven with wire-format DNS messages.

mod helpers;

use hickory_proto::op::Message;
use hickory_proto::rr::RecordType;

use rebinder::strategy::Strategy;

use helpers::{answers_of, test_config, test_peer, test_responder, wire_query};

#[test]
fn test_fs_first_query_answers_attacker() {
    // S1: first query for a first-then-second program.
    let (responder, sessions) = test_responder(test_config());
    let query = wire_query("s-c0a80001.7f000001-abc-fs-e.attacker.tld", RecordType::A);

    let reply = responder.handle(&query, test_peer()).expect("a reply");
    assert_eq!(
        answers_of(&reply),
        vec![(RecordType::A, 0, "192.168.0.1".to_string())]
    );

    // The store now holds the parsed program under the session id.
    assert_eq!(
        sessions.read("abc", |s| s.attacker_ip.clone()),
        Some("192.168.0.1".to_string())
    );
    assert_eq!(
        sessions.read("abc", |s| s.rebound_target.clone()),
        Some("127.0.0.1".to_string())
    );
}

#[test]
fn test_fs_second_query_within_timeout_answers_target() {
    // S2: the follow-up query lands on the rebound target.
    let (responder, _sessions) = test_responder(test_config());
    let query = wire_query("s-c0a80001.7f000001-abc-fs-e.attacker.tld", RecordType::A);

    responder.handle(&query, test_peer()).expect("first reply");
    let reply = responder.handle(&query, test_peer()).expect("second reply");

    assert_eq!(
        answers_of(&reply),
        vec![(RecordType::A, 0, "127.0.0.1".to_string())]
    );
}

#[test]
fn test_rr_alternates_across_queries() {
    // S3: round robin answers attacker, target, attacker.
    let (responder, _sessions) = test_responder(test_config());
    let query = wire_query("s-0a000001.0a000002-xyz-rr-e.a.tld", RecordType::A);

    let expected = ["10.0.0.1", "10.0.0.2", "10.0.0.1"];
    for ip in expected {
        let reply = responder.handle(&query, test_peer()).expect("a reply");
        assert_eq!(answers_of(&reply), vec![(RecordType::A, 0, ip.to_string())]);
    }
}

#[test]
fn test_ma_before_firewall_answers_both_records() {
    // S4: multi-A leads with the attacker IP at TTL 10, target at TTL 0.
    let (responder, _sessions) = test_responder(test_config());
    let query = wire_query("s-c0a80001.7f000001-m1-ma-e.a.tld", RecordType::A);

    let reply = responder.handle(&query, test_peer()).expect("a reply");
    assert_eq!(
        answers_of(&reply),
        vec![
            (RecordType::A, 10, "192.168.0.1".to_string()),
            (RecordType::A, 0, "127.0.0.1".to_string()),
        ]
    );
}

#[test]
fn test_ma_after_firewall_answers_only_target() {
    // S5: once the dispatcher latched the firewall flag, the attacker IP
    // disappears from the answers.
    let (responder, sessions) = test_responder(test_config());
    let query = wire_query("s-c0a80001.7f000001-m1-ma-e.a.tld", RecordType::A);

    responder.handle(&query, test_peer()).expect("setup reply");
    sessions.update("m1", |s| s.firewalled_once = true);

    let reply = responder.handle(&query, test_peer()).expect("a reply");
    assert_eq!(
        answers_of(&reply),
        vec![(RecordType::A, 0, "127.0.0.1".to_string())]
    );
}

#[test]
fn test_qname_minimization_fallback() {
    // S6: a bare label is a resolver probe; answer with the public
    // address and do not create a session.
    let (responder, sessions) = test_responder(test_config());
    let query = wire_query("tld.", RecordType::A);

    let reply = responder.handle(&query, test_peer()).expect("a reply");
    assert_eq!(
        answers_of(&reply),
        vec![(RecordType::A, 0, "203.0.113.5".to_string())]
    );
    assert!(sessions.is_empty());
}

#[test]
fn test_cname_target_answer() {
    // S7: a non-IP rebound target is answered as a CNAME with TTL 10.
    let (responder, _sessions) = test_responder(test_config());
    let query = wire_query("s-c0a80001.example--com-u1-fs-e.a.tld", RecordType::A);

    responder.handle(&query, test_peer()).expect("first reply");
    let reply = responder.handle(&query, test_peer()).expect("second reply");

    assert_eq!(
        answers_of(&reply),
        vec![(RecordType::CNAME, 10, "example-com.".to_string())]
    );
}

#[test]
fn test_minimization_with_ipv6_response_ip_answers_aaaa() {
    let mut config = test_config();
    config.response_ip = "2001:db8::5".to_string();
    let (responder, _sessions) = test_responder(config);

    let reply = responder
        .handle(&wire_query("tld.", RecordType::AAAA), test_peer())
        .expect("a reply");
    assert_eq!(
        answers_of(&reply),
        vec![(RecordType::AAAA, 0, "2001:db8::5".to_string())]
    );
}

#[test]
fn test_minimization_with_unparseable_response_ip_drops() {
    let mut config = test_config();
    config.response_ip = "not-an-ip".to_string();
    let (responder, _sessions) = test_responder(config);

    assert!(responder
        .handle(&wire_query("tld.", RecordType::A), test_peer())
        .is_none());
}

#[test]
fn test_unparseable_program_is_dropped_and_creates_no_session() {
    // Property 2: rejected names do not mutate the store and get no reply.
    let (responder, sessions) = test_responder(test_config());

    let bad_names = [
        "s-c0a80001.7f000001-abc-fs.a.tld.",       // no end tag
        "s-c0a80001.7f000001-a-b-c-fs-e.a.tld.",   // wrong field count
        "s-zzzz9999.7f000001-abc-fs-e.a.tld.",     // undecodable attacker hex
        "s-c0a80001.9999-abc-fs-e.a.tld.",         // target neither address nor name
    ];
    for name in bad_names {
        assert!(
            responder
                .handle(&wire_query(name, RecordType::A), test_peer())
                .is_none(),
            "{} should be dropped",
            name
        );
    }
    assert!(sessions.is_empty());
}

#[test]
fn test_ignored_peer_is_dropped_silently() {
    let mut config = test_config();
    config.ignore_dns_request_from = vec![test_peer().ip()];
    let (responder, sessions) = test_responder(config);

    let query = wire_query("s-c0a80001.7f000001-abc-fs-e.a.tld", RecordType::A);
    assert!(responder.handle(&query, test_peer()).is_none());
    assert!(sessions.is_empty());
}

#[test]
fn test_unrecognized_qtype_gets_empty_answer() {
    let (responder, _sessions) = test_responder(test_config());
    let query = wire_query("s-c0a80001.7f000001-abc-fs-e.a.tld", RecordType::TXT);

    let reply = responder.handle(&query, test_peer()).expect("a reply");
    let message = Message::from_vec(&reply).unwrap();
    assert!(message.answers().is_empty());
    // the question is still echoed
    assert_eq!(message.queries().len(), 1);
}

#[test]
fn test_single_answer_family_mismatch_sends_empty_reply() {
    // An AAAA question against a v4-only program cannot be answered in a
    // single-answer reply; the responder sends what it has built: nothing.
    let (responder, sessions) = test_responder(test_config());
    let query = wire_query("s-c0a80001.7f000001-mm-fs-e.a.tld", RecordType::AAAA);

    let reply = responder.handle(&query, test_peer()).expect("a reply");
    let message = Message::from_vec(&reply).unwrap();
    assert!(message.answers().is_empty());

    // The abort happens before timestamp bookkeeping.
    assert_eq!(sessions.read("mm", |s| s.last_query_time), Some(None));
}

#[test]
fn test_multi_answer_tolerates_family_mismatch() {
    // Multi-A with a v6 target against an A question still carries both
    // records; the mismatched family rides along.
    let hex6 = "00000000000000000000000000000001";
    let (responder, _sessions) = test_responder(test_config());
    let query = wire_query(
        &format!("s-c0a80001.{}-mx-ma-e.a.tld", hex6),
        RecordType::A,
    );

    let reply = responder.handle(&query, test_peer()).expect("a reply");
    assert_eq!(
        answers_of(&reply),
        vec![
            (RecordType::A, 10, "192.168.0.1".to_string()),
            (RecordType::AAAA, 0, "::1".to_string()),
        ]
    );
}

#[test]
fn test_unknown_strategy_tag_falls_back_to_default() {
    let mut config = test_config();
    config.default_strategy = Strategy::MultiA;
    let (responder, _sessions) = test_responder(config);

    let query = wire_query("s-c0a80001.7f000001-uk-zz-e.a.tld", RecordType::A);
    let reply = responder.handle(&query, test_peer()).expect("a reply");
    // the default (multi-A) produced two answers
    assert_eq!(answers_of(&reply).len(), 2);
}

#[test]
fn test_session_timestamps_are_monotonic() {
    // Property 3: last_query_time never goes backwards, and the first
    // answered query sets first == last.
    let (responder, sessions) = test_responder(test_config());
    let query = wire_query("s-c0a80001.7f000001-mono-fs-e.a.tld", RecordType::A);

    responder.handle(&query, test_peer()).expect("first reply");
    let (first, last1) = sessions
        .read("mono", |s| (s.first_query_time, s.last_query_time))
        .unwrap();
    assert_eq!(Some(first), last1);

    responder.handle(&query, test_peer()).expect("second reply");
    let last2 = sessions.read("mono", |s| s.last_query_time).unwrap();
    assert!(last2 >= last1);

    responder.handle(&query, test_peer()).expect("third reply");
    let last3 = sessions.read("mono", |s| s.last_query_time).unwrap();
    assert!(last3 >= last2);
}

#[test]
fn test_reply_mirrors_request_id_and_question() {
    let (responder, _sessions) = test_responder(test_config());
    let query = wire_query("s-c0a80001.7f000001-abc-fs-e.a.tld", RecordType::A);

    let reply = responder.handle(&query, test_peer()).expect("a reply");
    let request = Message::from_vec(&query).unwrap();
    let response = Message::from_vec(&reply).unwrap();

    assert_eq!(request.id(), response.id());
    assert_eq!(request.queries(), response.queries());
}

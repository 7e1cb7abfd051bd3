use std::time::{Duration, Instant};

use super::*;
use crate::message::{Message, TransactionId, BINDING_REQUEST};

fn new_request() -> (Message, TransactionId) {
    let mut m = Message::new();
    let id = TransactionId::new();
    m.build(&[Box::new(BINDING_REQUEST), Box::new(id)]).unwrap();
    (m, id)
}

#[test]
fn test_agent_response_cancels_timer() {
    let mut a = Agent::new();
    let now = Instant::now();
    let (m, id) = new_request();

    a.start(id, m.raw.clone(), now).unwrap();
    assert!(a.poll_timeout().is_some());

    let mut response = Message::new();
    response.unmarshal_binary(&m.raw).unwrap();
    a.process(response).unwrap();

    assert!(a.poll_timeout().is_none(), "timer must be cancelled");
    match a.poll_event() {
        Some(TransactionEvent::Response(got)) => assert_eq!(got.transaction_id, id),
        other => panic!("expected response event, got {other:?}"),
    }
}

#[test]
fn test_agent_retransmission_backoff() {
    let mut a = Agent::new();
    let mut now = Instant::now();
    let (m, id) = new_request();
    a.start(id, m.raw.clone(), now).unwrap();

    // RFC 5389 schedule: intervals 0.5, 1, 2, 4, 8, 16 then a final 8s wait.
    let start = now;
    let mut rto = INITIAL_RTO;
    for retry in 0..MAX_RETRANSMITS {
        now += rto;
        a.handle_timeout(now);
        match a.poll_event() {
            Some(TransactionEvent::Retransmit(got, raw)) => {
                assert_eq!(got, id, "retry {retry}");
                assert_eq!(raw, m.raw);
            }
            other => panic!("expected retransmit at retry {retry}, got {other:?}"),
        }
        if retry + 1 < MAX_RETRANSMITS {
            rto *= 2;
        }
    }

    now += LAST_WAIT;
    a.handle_timeout(now);
    match a.poll_event() {
        Some(TransactionEvent::TimedOut(got)) => assert_eq!(got, id),
        other => panic!("expected timeout, got {other:?}"),
    }
    assert!(a.poll_timeout().is_none());

    // The whole budget caps at 39.5s.
    assert_eq!(now - start, Duration::from_millis(39_500));
}

#[test]
fn test_agent_close_cancels_all() {
    let mut a = Agent::new();
    let now = Instant::now();
    let (m1, id1) = new_request();
    let (m2, id2) = new_request();
    a.start(id1, m1.raw, now).unwrap();
    a.start(id2, m2.raw, now).unwrap();

    a.close().unwrap();
    let mut cancelled = 0;
    while let Some(ev) = a.poll_event() {
        if matches!(ev, TransactionEvent::Cancelled(_)) {
            cancelled += 1;
        }
    }
    assert_eq!(cancelled, 2);
    assert_eq!(a.close(), Err(shared::error::Error::ErrAgentClosed));
    assert!(a.start(id1, vec![], now).is_err());
}

#[test]
fn test_agent_duplicate_start_rejected() {
    let mut a = Agent::new();
    let now = Instant::now();
    let (m, id) = new_request();
    a.start(id, m.raw.clone(), now).unwrap();
    assert_eq!(
        a.start(id, m.raw, now),
        Err(shared::error::Error::ErrTransactionExists)
    );
}

use std::net::SocketAddr;
use std::time::{Duration, Instant};

use super::agent_config::AgentConfig;
use super::*;
use crate::candidate::candidate_pair::CandidatePairState;
use crate::candidate::unmarshal_candidate;
use crate::connection_state::{ConnectionState, GatheringState};
use shared::error::Error;

fn addr(s: &str) -> SocketAddr {
    s.parse().unwrap()
}

/// Shuttles queued transmits between two agents until both go quiet.
fn pump(a: &mut Agent, b: &mut Agent, now: Instant) {
    loop {
        let mut moved = false;
        while let Some(t) = a.poll_transmit() {
            moved = true;
            let _ = b.handle_read(t.remote, t.local, &t.message, now);
        }
        while let Some(t) = b.poll_transmit() {
            moved = true;
            let _ = a.handle_read(t.remote, t.local, &t.message, now);
        }
        if !moved {
            break;
        }
    }
}

fn connect_pair() -> (Agent, Agent, Instant) {
    let mut now = Instant::now();
    let mut a = Agent::new(AgentConfig::default());
    let mut b = Agent::new(AgentConfig::default());

    a.gather_candidates(&[addr("10.0.0.1:4000")], now).unwrap();
    b.gather_candidates(&[addr("10.0.0.2:5000")], now).unwrap();
    assert_eq!(a.gathering_state(), GatheringState::Complete);

    let (a_ufrag, a_pwd) = {
        let (u, p) = a.local_credentials();
        (u.to_owned(), p.to_owned())
    };
    let (b_ufrag, b_pwd) = {
        let (u, p) = b.local_credentials();
        (u.to_owned(), p.to_owned())
    };
    a.set_remote_credentials(b_ufrag, b_pwd).unwrap();
    b.set_remote_credentials(a_ufrag, a_pwd).unwrap();

    for c in a.local_candidates().to_vec() {
        b.add_remote_candidate(c);
    }
    for c in b.local_candidates().to_vec() {
        a.add_remote_candidate(c);
    }

    a.start_checks(true, now).unwrap();
    b.start_checks(false, now).unwrap();

    // Drive both schedulers; checks pace at 50ms.
    for _ in 0..40 {
        now += Duration::from_millis(50);
        a.handle_timeout(now);
        b.handle_timeout(now);
        pump(&mut a, &mut b, now);
        if a.connection_state() == ConnectionState::Completed
            && b.connection_state() == ConnectionState::Completed
        {
            break;
        }
    }
    (a, b, now)
}

#[test]
fn test_agents_connect_over_loopback() {
    let (a, b, _) = connect_pair();
    assert!(matches!(
        a.connection_state(),
        ConnectionState::Connected | ConnectionState::Completed
    ));
    assert!(matches!(
        b.connection_state(),
        ConnectionState::Connected | ConnectionState::Completed
    ));

    let (a_local, a_remote) = a.selected_pair().expect("controlling selected a pair");
    let (b_local, b_remote) = b.selected_pair().expect("controlled selected a pair");
    assert_eq!(a_local.addr().unwrap(), b_remote.addr().unwrap());
    assert_eq!(a_remote.addr().unwrap(), b_local.addr().unwrap());
}

#[test]
fn test_selected_pair_events_emitted() {
    let (mut a, _, _) = connect_pair();
    let mut saw_selected = false;
    let mut saw_connected = false;
    while let Some(ev) = a.poll_event() {
        match ev {
            AgentEvent::SelectedPairChange(_) => saw_selected = true,
            AgentEvent::ConnectionStateChange(ConnectionState::Connected) => {
                saw_connected = true;
            }
            _ => {}
        }
    }
    assert!(saw_selected);
    assert!(saw_connected);
}

#[test]
fn test_restart_regenerates_credentials() {
    let (mut a, _, _) = connect_pair();
    let (ufrag_before, pwd_before) = {
        let (u, p) = a.local_credentials();
        (u.to_owned(), p.to_owned())
    };
    let generation_before = a.generation();

    a.restart().unwrap();

    let (ufrag_after, pwd_after) = a.local_credentials();
    assert_ne!(ufrag_before, ufrag_after);
    assert_ne!(pwd_before, pwd_after);
    assert_eq!(a.generation(), generation_before + 1);
    assert!(a.local_candidates().is_empty());
    assert_eq!(a.connection_state(), ConnectionState::New);
    assert!(a.selected_pair().is_none());
}

#[test]
fn test_remote_credentials_must_not_be_empty() {
    let mut a = Agent::new(AgentConfig::default());
    assert_eq!(
        a.set_remote_credentials(String::new(), "pwd".into()),
        Err(Error::ErrRemoteUfragEmpty)
    );
    assert_eq!(
        a.set_remote_credentials("ufrag".into(), String::new()),
        Err(Error::ErrRemotePwdEmpty)
    );
}

#[test]
fn test_checks_require_remote_credentials() {
    let mut a = Agent::new(AgentConfig::default());
    assert_eq!(
        a.start_checks(true, Instant::now()),
        Err(Error::ErrRemoteUfragEmpty)
    );
}

#[test]
fn test_remote_candidate_parsed_from_sdp() {
    let mut a = Agent::new(AgentConfig::default());
    let now = Instant::now();
    a.gather_candidates(&[addr("10.0.0.1:4000")], now).unwrap();

    let c = unmarshal_candidate("1 1 udp 2130706431 10.0.0.9 6000 typ host generation 0").unwrap();
    a.add_remote_candidate(c.clone());
    a.add_remote_candidate(c);

    // Duplicates are dropped; one pair exists with the single local host.
    assert_eq!(a.checklist.len(), 1);
    assert_eq!(a.checklist[0].state(), CandidatePairState::Waiting);
}

#[test]
fn test_consent_expiry_fails_agent() {
    let (mut a, mut _b, mut now) = connect_pair();
    assert!(a.selected_pair().is_some());

    // Stop answering consent checks; after the expiry the agent fails.
    for _ in 0..40 {
        now += Duration::from_secs(1);
        a.handle_timeout(now);
    }
    assert_eq!(a.connection_state(), ConnectionState::Failed);
}

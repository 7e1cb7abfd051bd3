use std::net::SocketAddr;
use std::time::Duration;

use crate::{CHECK_PACING, CONSENT_EXPIRY, CONSENT_INTERVAL, DEFAULT_GATHER_TIMEOUT};

/// Collects the tunables of an [Agent](super::Agent).
#[derive(Clone)]
pub struct AgentConfig {
    /// STUN servers used for server-reflexive gathering. Already resolved;
    /// name resolution is the embedder's concern.
    pub stun_servers: Vec<SocketAddr>,

    /// Use aggressive nomination (USE-CANDIDATE on every check) instead of
    /// regular nomination.
    pub aggressive_nomination: bool,

    /// Cap on the gathering phase, after which the gathering state moves to
    /// complete regardless of outstanding server-reflexive transactions.
    pub gather_timeout: Duration,

    /// Pacing between outgoing connectivity checks (RFC 8445 Ta).
    pub check_pacing: Duration,

    /// Interval between consent freshness checks on the selected pair.
    pub consent_interval: Duration,

    /// Time without any confirmed consent after which the agent fails.
    pub consent_expiry: Duration,

    /// Maximum checks sent per pair before it is failed.
    pub max_binding_requests: u16,
}

impl Default for AgentConfig {
    fn default() -> Self {
        AgentConfig {
            stun_servers: vec![],
            aggressive_nomination: false,
            gather_timeout: DEFAULT_GATHER_TIMEOUT,
            check_pacing: CHECK_PACING,
            consent_interval: CONSENT_INTERVAL,
            consent_expiry: CONSENT_EXPIRY,
            max_binding_requests: 7,
        }
    }
}

#![warn(rust_2018_idioms)]

pub mod agent;
pub mod candidate;
pub mod connection_state;
pub mod rand;
pub mod url;

/// Pacing interval between outgoing connectivity checks (RFC 8445 Ta).
pub const CHECK_PACING: std::time::Duration = std::time::Duration::from_millis(50);

/// Interval between consent freshness checks on the selected pair.
pub const CONSENT_INTERVAL: std::time::Duration = std::time::Duration::from_secs(15);

/// Time without consent after which the agent fails.
pub const CONSENT_EXPIRY: std::time::Duration = std::time::Duration::from_secs(30);

/// Default cap on the candidate gathering phase.
pub const DEFAULT_GATHER_TIMEOUT: std::time::Duration = std::time::Duration::from_secs(10);

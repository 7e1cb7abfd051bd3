use std::fmt;

use serde::Serialize;

/// Signals the state of the ICE connection.
#[derive(Default, Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ConnectionState {
    #[serde(rename = "unspecified")]
    Unspecified,

    /// The agent is gathering addresses or waiting for remote candidates.
    #[default]
    #[serde(rename = "new")]
    New,

    /// The agent has been given local and remote candidates and is checking
    /// pairs, but has not found a working one yet.
    #[serde(rename = "checking")]
    Checking,

    /// A working pair exists, but checks are still in flight.
    #[serde(rename = "connected")]
    Connected,

    /// The agent has finished checking and nominated a pair.
    #[serde(rename = "completed")]
    Completed,

    /// All pairs failed, or consent was lost for longer than the expiry.
    #[serde(rename = "failed")]
    Failed,

    /// Consent checks are going unanswered; the agent may still recover.
    #[serde(rename = "disconnected")]
    Disconnected,

    /// The agent was shut down.
    #[serde(rename = "closed")]
    Closed,
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match *self {
            ConnectionState::Unspecified => "Unspecified",
            ConnectionState::New => "new",
            ConnectionState::Checking => "checking",
            ConnectionState::Connected => "connected",
            ConnectionState::Completed => "completed",
            ConnectionState::Failed => "failed",
            ConnectionState::Disconnected => "disconnected",
            ConnectionState::Closed => "closed",
        };
        write!(f, "{s}")
    }
}

/// Signals the state of the candidate gathering process.
#[derive(Default, Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum GatheringState {
    #[serde(rename = "unspecified")]
    Unspecified,

    /// Gathering has not started yet.
    #[default]
    #[serde(rename = "new")]
    New,

    /// Candidates are being collected.
    #[serde(rename = "gathering")]
    Gathering,

    /// Gathering finished or hit the configured cap.
    #[serde(rename = "complete")]
    Complete,
}

impl fmt::Display for GatheringState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match *self {
            GatheringState::Unspecified => "unspecified",
            GatheringState::New => "new",
            GatheringState::Gathering => "gathering",
            GatheringState::Complete => "complete",
        };
        write!(f, "{s}")
    }
}

#[cfg(test)]
mod candidate_pair_test;

use std::fmt;

use serde::Serialize;

/// Represent the ICE candidate pair state.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub enum CandidatePairState {
    #[default]
    #[serde(rename = "unspecified")]
    Unspecified,

    /// A check could be performed for this pair, but another pair with the
    /// same foundation goes first.
    #[serde(rename = "frozen")]
    Frozen,

    /// A check has not been performed for this pair yet.
    #[serde(rename = "waiting")]
    Waiting,

    /// A check has been sent for this pair and the transaction is in
    /// progress.
    #[serde(rename = "in-progress")]
    InProgress,

    /// A check for this pair was already done and failed, either never
    /// producing any response or producing an unrecoverable failure
    /// response.
    #[serde(rename = "failed")]
    Failed,

    /// A check for this pair was already done and produced a successful
    /// result.
    #[serde(rename = "succeeded")]
    Succeeded,
}

impl fmt::Display for CandidatePairState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match *self {
            Self::Frozen => "frozen",
            Self::Waiting => "waiting",
            Self::InProgress => "in-progress",
            Self::Failed => "failed",
            Self::Succeeded => "succeeded",
            Self::Unspecified => "unspecified",
        };
        write!(f, "{s}")
    }
}

/// A combination of a local and a remote candidate, referenced by index into
/// the agent's candidate lists.
#[derive(Clone, Copy)]
pub struct CandidatePair {
    pub local_index: usize,
    pub remote_index: usize,
    pub local_priority: u32,
    pub remote_priority: u32,
    pub(crate) ice_role_controlling: bool,
    pub(crate) binding_request_count: u16,
    pub(crate) state: CandidatePairState,
    pub(crate) nominated: bool,
}

impl fmt::Debug for CandidatePair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "prio {} (local {} prio {}) <-> (remote {} prio {}) [{}]",
            self.priority(),
            self.local_index,
            self.local_priority,
            self.remote_index,
            self.remote_priority,
            self.state,
        )
    }
}

impl PartialEq for CandidatePair {
    fn eq(&self, other: &Self) -> bool {
        self.local_index == other.local_index && self.remote_index == other.remote_index
    }
}

impl CandidatePair {
    #[must_use]
    pub fn new(
        local_index: usize,
        remote_index: usize,
        local_priority: u32,
        remote_priority: u32,
        ice_role_controlling: bool,
    ) -> Self {
        Self {
            local_index,
            remote_index,
            local_priority,
            remote_priority,
            ice_role_controlling,
            state: CandidatePairState::Frozen,
            binding_request_count: 0,
            nominated: false,
        }
    }

    /// RFC 8445 Section 6.1.2.3: with G the controlling-side candidate
    /// priority and D the controlled-side one,
    /// `pair priority = 2^32*MIN(G,D) + 2*MAX(G,D) + (G>D ? 1 : 0)`.
    pub fn priority(&self) -> u64 {
        let (g, d) = if self.ice_role_controlling {
            (self.local_priority, self.remote_priority)
        } else {
            (self.remote_priority, self.local_priority)
        };

        // Saturating: both terms only meet u64::MAX when g == d == u32::MAX.
        (1u64 << 32)
            .saturating_mul(u64::from(std::cmp::min(g, d)))
            .saturating_add(2 * u64::from(std::cmp::max(g, d)) + u64::from(g > d))
    }

    pub fn state(&self) -> CandidatePairState {
        self.state
    }

    pub fn nominated(&self) -> bool {
        self.nominated
    }
}

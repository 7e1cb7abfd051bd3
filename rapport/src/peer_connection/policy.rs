use std::fmt;

use serde::Serialize;

/// Affects which ICE candidates are surfaced and used.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum RTCIceTransportPolicy {
    /// Any candidate type.
    #[default]
    #[serde(rename = "all")]
    All,
    /// Only TURN-relayed candidates.
    #[serde(rename = "relay")]
    Relay,
}

impl fmt::Display for RTCIceTransportPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RTCIceTransportPolicy::All => write!(f, "all"),
            RTCIceTransportPolicy::Relay => write!(f, "relay"),
        }
    }
}

/// How media is bundled onto transports. This stack always offers a single
/// BUNDLE group; `Disable` keeps per-section transports for legacy peers.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum RTCBundlePolicy {
    #[default]
    #[serde(rename = "balanced")]
    Balanced,
    #[serde(rename = "max-compat")]
    MaxCompat,
    #[serde(rename = "max-bundle")]
    MaxBundle,
    #[serde(rename = "disable")]
    Disable,
}

impl fmt::Display for RTCBundlePolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            RTCBundlePolicy::Balanced => "balanced",
            RTCBundlePolicy::MaxCompat => "max-compat",
            RTCBundlePolicy::MaxBundle => "max-bundle",
            RTCBundlePolicy::Disable => "disable",
        };
        write!(f, "{s}")
    }
}

#![warn(rust_2018_idioms)]

pub mod client;
pub mod proto;

/// Default TURN allocation lifetime requested by the client.
pub const DEFAULT_LIFETIME: std::time::Duration = std::time::Duration::from_secs(600);

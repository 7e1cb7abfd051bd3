#![warn(rust_2018_idioms)]

#[cfg(test)]
mod sdp_test;

pub mod media_description;
pub mod session_description;

pub use media_description::MediaDescription;
pub use session_description::{Attribute, Origin, SessionDescription};

//! Shared wire types and pure helpers for the patio player client.
//!
//! Nothing in this crate touches a socket: the framing codec, the typed
//! event/command model, the gain curve, configuration and platform paths
//! all live here so the client crate can stay focused on the realtime loop.

pub mod codec;
pub mod config;
pub mod gain;
pub mod platform;
pub mod protocol;

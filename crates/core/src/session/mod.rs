//! Session state: client slots, watchdogs, and shared stream properties.
//!
//! RTSP sessions (RFC 2326 §3) identify clients across requests and
//! connections. Each stream keeps a fixed table of
//! [`client::MAX_CLIENTS`] slots; slot 0 owns the stream. A per-client
//! watchdog reaps sessions whose keepalives stop arriving.

pub mod client;
pub mod properties;

pub use client::{ClientTable, SessionRecord};
pub use properties::StreamProperties;

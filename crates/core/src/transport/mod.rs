//! Network transport layer for RTSP signaling and RTP media delivery.
//!
//! SAT>IP uses a split transport model:
//!
//! - **TCP** ([`tcp`]): carries RTSP request/response signaling. One TCP
//!   connection per client, with a thread per connection. Streaming
//!   sessions survive their control connection; keepalives may arrive
//!   on a new one.
//!
//! - **UDP** ([`udp`]): carries RTP media and RTCP reports. Each worker
//!   thread owns its own ephemeral outbound socket.

pub mod tcp;
pub mod udp;

pub use udp::UdpTransport;

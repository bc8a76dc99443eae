//! RTSP protocol implementation (RFC 2326) with SAT>IP extensions.
//!
//! This module handles the text-based RTSP signaling protocol — parsing
//! requests and transport parameters, building responses, routing
//! methods to streams, and generating SDP.
//!
//! ## RTSP message format (RFC 2326 §4)
//!
//! RTSP messages follow HTTP/1.1 syntax with a different method set:
//!
//! ```text
//! SETUP rtsp://server/?freq=11362.50&msys=dvbs2&sr=27500 RTSP/1.0\r\n
//! CSeq: 2\r\n
//! Transport: RTP/AVP;unicast;client_port=51354-51355\r\n
//! \r\n
//! ```
//!
//! SAT>IP layers on top of plain RTSP (SAT>IP spec §3.5):
//! - Tuning requests travel as key=value pairs in the URI query
//!   ([`params`]).
//! - SETUP responses carry `com.ses.streamID`.
//! - DESCRIBE returns one `m=video 0 RTP/AVP 33` section per tuner.
//!
//! ## Supported methods
//!
//! | Method | RFC section | Purpose |
//! |--------|-------------|---------|
//! | OPTIONS | §10.1 | Capability discovery / keepalive |
//! | DESCRIBE | §10.2 | Retrieve SDP with tuner state |
//! | SETUP | §10.4 | Claim a tuner, negotiate UDP ports, start delivery |
//! | PLAY | §10.5 | Tune/retune and (re)start delivery |
//! | PAUSE | §10.6 | Suspend delivery without releasing the tuner |
//! | TEARDOWN | §10.7 | Release the client slot / tuner |

pub mod handler;
pub mod params;
pub mod request;
pub mod response;
pub mod sdp;

pub use handler::MethodHandler;
pub use params::TransportParams;
pub use request::RtspRequest;
pub use response::RtspResponse;

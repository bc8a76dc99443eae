//! RTP/RTCP media delivery for MPEG transport streams.
//!
//! This module turns the DVR byte stream of a tuned frontend into RTP
//! packets on the wire, plus the periodic RTCP reports SAT>IP clients
//! expect.
//!
//! ## RTP framing (RFC 3550, RFC 2250)
//!
//! MPEG-TS over RTP uses static payload type 33. Each RTP packet
//! carries a whole number of 188-byte TS packets — seven per frame at
//! the conventional 1500-byte MTU ([`buffer`]). Sequence numbers and
//! timestamps are assigned when a frame is sent: the timestamp is the
//! send-time wall clock on a 90 kHz rate ([`rtp`]).
//!
//! ## Worker model
//!
//! Each playing stream runs one RTP thread and one RTCP thread
//! ([`worker`]). The RTP thread polls the DVR, fills a fixed ring of
//! packet buffers, and flushes on frame completion or a 100ms pacing
//! deadline. The RTCP thread sends an SR + SDES + APP compound every
//! 200ms ([`rtcp`]) and periodically refreshes the frontend signal
//! monitor.

pub mod buffer;
pub mod rtcp;
pub mod rtp;
pub mod worker;

//! SDP (Session Description Protocol) generation (RFC 4566 / RFC 8866).
//!
//! Produces the SDP body returned by DESCRIBE responses, one media
//! section per configured stream (SAT>IP spec §3.5.7); tuners that were
//! never tuned get no section:
//!
//! ```text
//! v=0                                  ← protocol version
//! o=- <sess-id> <sess-ver> IN IP4 <addr>
//! s=SatIPServer:1 2,0,0                ← tuner counts: S2,T/T2,C/C2
//! t=0 0                                ← timing (live)
//! m=video 0 RTP/AVP 33                 ← MPEG-TS over RTP
//! c=IN IP4 0.0.0.0                     ← delivery address set per SETUP
//! a=control:stream=1                   ← stream control URL segment
//! a=fmtp:33 ver=1.0;src=1;tuner=...    ← stream attribute string
//! a=sendonly                           ← streaming (a=inactive when idle)
//! ```

use crate::stream::registry::Streams;

/// Generate the server-level SDP for a DESCRIBE.
pub fn generate_sdp(streams: &Streams, host: &str) -> String {
    let (s2, t, c) = streams.delivery_counts();

    let mut sdp: Vec<String> = Vec::new();
    sdp.push("v=0".to_string());
    sdp.push(format!("o=- 2 3 IN IP4 {host}"));
    sdp.push(format!("s=SatIPServer:1 {s2},{t},{c}"));
    sdp.push("t=0 0".to_string());

    for stream in streams.iter() {
        if !stream.is_configured() {
            continue;
        }
        sdp.push("m=video 0 RTP/AVP 33".to_string());
        sdp.push("c=IN IP4 0.0.0.0".to_string());
        sdp.push(format!("a=control:stream={}", stream.wire_id()));
        sdp.push(format!("a=fmtp:33 {}", stream.attribute_describe_string()));
        sdp.push(if stream.in_use() { "a=sendonly" } else { "a=inactive" }.to_string());
    }

    tracing::debug!("SDP: {}", sdp.join("\r\n"));

    format!("{}\r\n", sdp.join("\r\n"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::params::TransportParams;
    use crate::protocol::request::RtspRequest;
    use crate::session::client::DEFAULT_SESSION_TIMEOUT;
    use crate::stream::Stream;
    use crate::stream::registry::Resolved;
    use crate::tuner::lnb::Lnb;
    use crate::tuner::sim::SimTuner;
    use std::net::{IpAddr, Ipv4Addr};
    use std::sync::Arc;

    fn registry() -> Streams {
        Streams::new(vec![
            Arc::new(Stream::new(
                0,
                Box::new(SimTuner::dvbs2("sim0")),
                Lnb::default(),
                DEFAULT_SESSION_TIMEOUT,
                None,
            )),
            Arc::new(Stream::new(
                1,
                Box::new(SimTuner::dvbs2("sim1")),
                Lnb::default(),
                DEFAULT_SESSION_TIMEOUT,
                None,
            )),
        ])
    }

    #[test]
    fn bound_stream_advertises_tuning_state() {
        let streams = registry();
        let uri = "rtsp://10.0.0.5/?src=1&freq=11362.50&pol=h&msys=dvbs2&sr=27500&fec=34&pids=0";
        let req = RtspRequest::parse(&format!("SETUP {uri} RTSP/1.0\r\nCSeq: 1\r\n\r\n")).unwrap();
        let params = TransportParams::from_uri(uri);
        let Resolved::Bound { stream, client_id } = streams.find_stream_and_client_for(
            &req,
            &params,
            IpAddr::V4(Ipv4Addr::LOCALHOST),
        ) else {
            panic!("expected bound");
        };
        stream.process_request(client_id, &req, &params);

        let sdp = generate_sdp(&streams, "192.168.1.100");
        assert!(sdp.contains("v=0\r\n"));
        assert!(sdp.contains("o=- 2 3 IN IP4 192.168.1.100\r\n"));
        assert!(sdp.contains("s=SatIPServer:1 2,0,0\r\n"));
        assert!(sdp.contains("t=0 0\r\n"));
        assert!(sdp.contains("a=fmtp:33 ver=1.0;src=1;tuner=1,"), "{sdp}");
        assert!(sdp.contains("a=sendonly\r\n"));
        assert!(sdp.ends_with("\r\n"));

        // the never-tuned second tuner gets no media section
        assert_eq!(sdp.matches("m=video 0 RTP/AVP 33\r\n").count(), 1);
        assert!(sdp.contains("a=control:stream=1\r\n"));
        assert!(!sdp.contains("a=control:stream=2"));
        assert!(!sdp.contains("NONE"), "{sdp}");
    }
}

//! Stream registry: one [`Stream`] per tuner, request resolution.

use std::net::IpAddr;
use std::sync::Arc;

use rand::RngExt;

use crate::protocol::params::TransportParams;
use crate::protocol::request::RtspRequest;
use crate::stream::Stream;

/// Outcome of resolving a request to a stream and client slot.
pub enum Resolved {
    /// The request belongs to this stream, as this client slot.
    Bound {
        stream: Arc<Stream>,
        client_id: usize,
    },
    /// No session and no tuning parameters: answer without binding
    /// (bare OPTIONS, server-level DESCRIBE).
    Unbound,
    /// No stream can serve this request (unknown session, all tuners
    /// busy, or no tuner capable of the delivery system). Maps to 503.
    NotFound,
}

/// All streams of the server, fixed at startup (one per tuner).
pub struct Streams {
    streams: Vec<Arc<Stream>>,
}

impl Streams {
    pub fn new(streams: Vec<Arc<Stream>>) -> Self {
        Self { streams }
    }

    pub fn len(&self) -> usize {
        self.streams.len()
    }

    pub fn is_empty(&self) -> bool {
        self.streams.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Arc<Stream>> {
        self.streams.iter()
    }

    /// Stream by wire ID (`stream=<n>`/`fe=<n>`, 1-based).
    pub fn by_wire_id(&self, wire_id: u32) -> Option<&Arc<Stream>> {
        self.streams.get(wire_id.checked_sub(1)? as usize)
    }

    /// Map a request to the stream and client slot that must handle it.
    ///
    /// Requests inside a session resolve to their existing slot. A
    /// session-less request with tuning parameters gets a fresh session
    /// on a suitable tuner: the explicitly addressed one (`stream=`,
    /// `fe=`) if given, otherwise the first free tuner capable of the
    /// requested delivery system.
    pub fn find_stream_and_client_for(
        &self,
        request: &RtspRequest,
        params: &TransportParams,
        peer_ip: IpAddr,
    ) -> Resolved {
        if let Some(session_id) = request.session() {
            return self.resolve_session(session_id, params);
        }

        if !params.has_tuning_params() {
            return Resolved::Unbound;
        }

        let session_id = new_session_id();

        // explicit addressing first
        let addressed = params.stream_id.or(params.fe.map(|fe| fe as u32));
        if let Some(wire_id) = addressed {
            let Some(stream) = self.by_wire_id(wire_id) else {
                tracing::info!(wire_id, "addressed stream does not exist");
                return Resolved::NotFound;
            };
            if let Some(system) = params.delivery_system
                && !stream.capable_of(system)
            {
                tracing::info!(wire_id, %system, "addressed stream cannot tune this system");
                return Resolved::NotFound;
            }
            return match stream.attach_client(&session_id, peer_ip) {
                Some(client_id) => Resolved::Bound {
                    stream: stream.clone(),
                    client_id,
                },
                None => Resolved::NotFound,
            };
        }

        for stream in &self.streams {
            if stream.in_use() {
                continue;
            }
            if let Some(system) = params.delivery_system
                && !stream.capable_of(system)
            {
                continue;
            }
            if let Some(client_id) = stream.attach_client(&session_id, peer_ip) {
                return Resolved::Bound {
                    stream: stream.clone(),
                    client_id,
                };
            }
        }

        tracing::info!("no free capable tuner for request");
        Resolved::NotFound
    }

    fn resolve_session(&self, session_id: &str, params: &TransportParams) -> Resolved {
        if let Some(wire_id) = params.stream_id
            && let Some(stream) = self.by_wire_id(wire_id)
            && let Some(client_id) = stream.find_session(session_id)
        {
            return Resolved::Bound {
                stream: stream.clone(),
                client_id,
            };
        }

        for stream in &self.streams {
            if let Some(client_id) = stream.find_session(session_id) {
                return Resolved::Bound {
                    stream: stream.clone(),
                    client_id,
                };
            }
        }

        tracing::info!(session_id, "session not found");
        Resolved::NotFound
    }

    /// Tuner counts per delivery family for the SDP `s=` line:
    /// (DVB-S/S2, DVB-T/T2, DVB-C/C2).
    pub fn delivery_counts(&self) -> (usize, usize, usize) {
        let mut s2 = 0;
        let mut t = 0;
        let mut c = 0;
        for stream in &self.streams {
            let systems = stream.delivery_systems();
            if systems.iter().any(|s| s.is_satellite()) {
                s2 += 1;
            }
            if systems.iter().any(|s| s.is_terrestrial()) {
                t += 1;
            }
            if systems.iter().any(|s| s.is_cable()) {
                c += 1;
            }
        }
        (s2, t, c)
    }

    /// Streams with a configured channel (DESCRIBE 404s when zero).
    pub fn configured_count(&self) -> usize {
        self.streams.iter().filter(|s| s.is_configured()).count()
    }

    /// Watchdog sweep across all streams. Returns removed clients.
    pub fn check_clients_with_timeout(&self) -> usize {
        self.streams
            .iter()
            .map(|stream| stream.check_clients_with_timeout())
            .sum()
    }

    /// All stream states as one XML document.
    pub fn make_streams_xml(&self) -> String {
        let mut xml = String::from("<streams>");
        for stream in &self.streams {
            stream.add_to_xml(&mut xml);
        }
        xml.push_str("</streams>");
        xml
    }
}

/// 10-digit decimal RTSP session ID.
fn new_session_id() -> String {
    format!("{:010}", rand::rng().random_range(0..10_000_000_000u64))
}

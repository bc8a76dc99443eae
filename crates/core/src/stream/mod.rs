//! One stream: a tuner frontend, its client slots, and its worker pair.

pub mod registry;

use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use parking_lot::Mutex;

use crate::decrypt::Decrypt;
use crate::error::{Result, SatIpError};
use crate::media::worker::{StreamWorkers, WorkerContext};
use crate::protocol::params::TransportParams;
use crate::protocol::request::RtspRequest;
use crate::session::client::{ClientTable, SessionRecord};
use crate::session::properties::StreamProperties;
use crate::tuner::delivery::DeliverySystem;
use crate::tuner::device::{DvrReader, TunerDevice};
use crate::tuner::frontend::Frontend;
use crate::tuner::lnb::Lnb;

/// SDES CNAME sent in RTCP compounds.
const RTCP_CNAME: &str = "satip-rs";

/// One tuner exposed as a stream, with up to
/// [`MAX_CLIENTS`](crate::session::client::MAX_CLIENTS) attached
/// clients. Slot 0 owns the stream: releasing it tears everything down.
pub struct Stream {
    id: u32,
    in_use: AtomicBool,
    frontend: Arc<Mutex<Frontend>>,
    properties: Arc<Mutex<StreamProperties>>,
    clients: Mutex<ClientTable>,
    workers: Mutex<Option<StreamWorkers>>,
    dvr: Arc<Mutex<Option<Box<dyn DvrReader>>>>,
    decrypt: Option<Arc<dyn Decrypt>>,
    session_timeout: Duration,
}

impl Stream {
    pub fn new(
        id: u32,
        device: Box<dyn TunerDevice>,
        lnb: Lnb,
        session_timeout: Duration,
        decrypt: Option<Arc<dyn Decrypt>>,
    ) -> Self {
        Self {
            id,
            in_use: AtomicBool::new(false),
            frontend: Arc::new(Mutex::new(Frontend::new(device, lnb))),
            properties: Arc::new(Mutex::new(StreamProperties::new(id))),
            clients: Mutex::new(ClientTable::default()),
            workers: Mutex::new(None),
            dvr: Arc::new(Mutex::new(None)),
            decrypt,
            session_timeout,
        }
    }

    pub fn id(&self) -> u32 {
        self.id
    }

    /// Wire-visible stream ID (`stream=`, `com.ses.streamID`), 1-based.
    pub fn wire_id(&self) -> u32 {
        self.id + 1
    }

    pub fn in_use(&self) -> bool {
        self.in_use.load(Ordering::SeqCst)
    }

    pub fn capable_of(&self, system: DeliverySystem) -> bool {
        self.frontend.lock().capable_of(system)
    }

    pub fn delivery_systems(&self) -> Vec<DeliverySystem> {
        self.frontend.lock().delivery_systems().to_vec()
    }

    pub fn session_timeout(&self) -> Duration {
        self.session_timeout
    }

    /// Attach a new client session. Returns the claimed slot index.
    pub fn attach_client(&self, session_id: &str, ip: IpAddr) -> Option<usize> {
        let record = SessionRecord::new(session_id.to_string(), ip, self.session_timeout);
        let slot = self.clients.lock().claim_free(record)?;
        self.in_use.store(true, Ordering::SeqCst);
        tracing::info!(stream_id = self.id, session_id, client_id = slot, "client attached");
        Some(slot)
    }

    /// Slot bound to the given RTSP session, if any.
    pub fn find_session(&self, session_id: &str) -> Option<usize> {
        self.clients.lock().find_for_session(session_id)
    }

    pub fn has_client(&self, client_id: usize) -> bool {
        self.clients.lock().get(client_id).is_some()
    }

    pub fn session_id_of(&self, client_id: usize) -> Option<String> {
        self.clients
            .lock()
            .get(client_id)
            .map(|record| record.session_id.clone())
    }

    /// Whether the connection serving `client_id` may close without the
    /// session being torn down.
    pub fn can_close(&self, client_id: usize) -> bool {
        self.clients
            .lock()
            .get(client_id)
            .is_none_or(|record| record.can_close)
    }

    /// Per-request bookkeeping shared by all methods: CSeq tracking,
    /// transport negotiation, watchdog restart, and folding tuning
    /// parameters into the channel state.
    pub fn process_request(
        &self,
        client_id: usize,
        request: &RtspRequest,
        params: &TransportParams,
    ) {
        {
            let mut clients = self.clients.lock();
            if let Some(record) = clients.get_mut(client_id) {
                if let Some(cseq) = request.cseq().and_then(|v| v.parse().ok()) {
                    record.cseq = cseq;
                }
                if let Some(port) = request.client_rtp_port()
                    && !record.set_rtp_port(port)
                {
                    tracing::warn!(port, "client_port range has no RTCP port");
                }
                // a SETUP binds the session to this connection; other
                // methods (and session-less requests) leave it closable
                record.can_close = request.method != "SETUP"
                    && (request.method == "TEARDOWN" || request.session().is_none());
                record.restart_watchdog();
            }
        }

        if params.has_tuning_params() {
            self.properties.lock().channel.apply(params);
        }
    }

    /// Bring the tuner in line with the requested channel state.
    /// A retune replaces the DVR reader the RTP worker drains.
    pub fn update_frontend(&self) -> Result<()> {
        let new_dvr = self.frontend.lock().update(&self.properties)?;
        if let Some(reader) = new_dvr {
            *self.dvr.lock() = Some(reader);
        }
        Ok(())
    }

    /// Start (or resume) the RTP/RTCP worker pair, sending to the
    /// client in slot 0. A second PLAY is a no-op.
    pub fn start_streaming(&self) -> Result<()> {
        let mut workers = self.workers.lock();
        if let Some(existing) = workers.as_ref() {
            existing.resume();
            self.properties.lock().stream_active = true;
            return Ok(());
        }

        let (ip, rtp_port, rtcp_port) = {
            let clients = self.clients.lock();
            let owner = clients.get(0).ok_or(SatIpError::SessionNotFound(
                "stream has no owner client".to_string(),
            ))?;
            (owner.ip, owner.rtp_port, owner.rtcp_port)
        };

        {
            let mut props = self.properties.lock();
            props.reset_rtp_counters();
            props.stream_active = true;
        }

        let started = StreamWorkers::start(WorkerContext {
            properties: self.properties.clone(),
            frontend: self.frontend.clone(),
            dvr: self.dvr.clone(),
            decrypt: self.decrypt.clone(),
            rtp_dest: SocketAddr::new(ip, rtp_port),
            rtcp_dest: SocketAddr::new(ip, rtcp_port),
            cname: RTCP_CNAME.to_string(),
        })?;
        *workers = Some(started);
        Ok(())
    }

    /// Pause delivery without releasing the tuner.
    pub fn pause_streaming(&self) {
        if let Some(workers) = self.workers.lock().as_ref() {
            workers.pause();
        }
        self.properties.lock().stream_active = false;
    }

    /// Detach one client. Releasing slot 0 (or the last slot) stops the
    /// workers, closes the frontend, and frees the stream.
    ///
    /// `graceful` is false for watchdog/disconnect cleanup; frontend
    /// errors are then logged rather than returned.
    pub fn teardown(&self, client_id: usize, graceful: bool) -> Result<()> {
        let (released, empty) = {
            let mut clients = self.clients.lock();
            let released = clients.release(client_id);
            (released, clients.is_empty())
        };
        let Some(record) = released else {
            return Ok(());
        };
        tracing::info!(
            stream_id = self.id,
            session_id = %record.session_id,
            client_id,
            graceful,
            "client detached"
        );

        if client_id != 0 && !empty {
            return Ok(());
        }

        // owner gone: the whole stream shuts down
        if let Some(workers) = self.workers.lock().take() {
            workers.stop();
        }
        if let Some(decrypt) = &self.decrypt {
            decrypt.stop_decrypt(self.id);
        }
        *self.dvr.lock() = None;

        let teardown_result = self.frontend.lock().teardown();
        {
            let mut props = self.properties.lock();
            props.stream_active = false;
            props.channel = Default::default();
            props.reset_rtp_counters();
        }
        {
            // detach any remaining secondary clients
            let mut clients = self.clients.lock();
            for id in 0..crate::session::client::MAX_CLIENTS {
                clients.release(id);
            }
        }
        self.in_use.store(false, Ordering::SeqCst);

        match teardown_result {
            Err(e) if !graceful => {
                tracing::warn!(stream_id = self.id, error = %e, "frontend teardown failed");
                Ok(())
            }
            other => other,
        }
    }

    /// Tear down every client whose watchdog deadline passed.
    /// Returns how many were removed.
    pub fn check_clients_with_timeout(&self) -> usize {
        self.check_clients_with_timeout_at(Instant::now())
    }

    /// Watchdog sweep against an explicit deadline clock.
    pub fn check_clients_with_timeout_at(&self, now: Instant) -> usize {
        let expired = self.clients.lock().expired_slots_at(now);
        let count = expired.len();
        for client_id in expired {
            tracing::info!(stream_id = self.id, client_id, "session watchdog expired");
            let _ = self.teardown(client_id, false);
        }
        count
    }

    /// SAT>IP attribute string for DESCRIBE and RTCP.
    pub fn attribute_describe_string(&self) -> String {
        self.properties.lock().attribute_describe_string()
    }

    /// Whether this stream has a configured (tuned or tunable) channel.
    pub fn is_configured(&self) -> bool {
        self.properties.lock().channel.is_configured()
    }

    /// Append this stream's state as one `<stream>` XML element.
    pub fn add_to_xml(&self, xml: &mut String) {
        xml.push_str(&format!("<stream id=\"{}\">", self.wire_id()));
        xml.push_str(&format!("<inuse>{}</inuse>", u8::from(self.in_use())));
        self.properties.lock().add_to_xml(xml);
        xml.push_str("</stream>");
    }

    /// Apply settings posted back through the XML accessors.
    pub fn from_xml(&self, xml: &str) {
        self.properties.lock().from_xml(xml);
    }

    pub fn dvr_buffer_size(&self) -> usize {
        self.properties.lock().dvr_buffer_size
    }

    pub fn set_dvr_buffer_size(&self, size: usize) {
        self.properties.lock().dvr_buffer_size = size;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::client::DEFAULT_SESSION_TIMEOUT;
    use crate::tuner::sim::SimTuner;
    use std::net::Ipv4Addr;

    fn sim_stream() -> (Stream, crate::tuner::sim::SimTuner) {
        let sim = SimTuner::dvbs2("sim0").with_dvr_packets(16);
        let stream = Stream::new(
            0,
            Box::new(sim.clone()),
            Lnb::default(),
            DEFAULT_SESSION_TIMEOUT,
            None,
        );
        (stream, sim)
    }

    fn setup_request(uri: &str) -> (RtspRequest, TransportParams) {
        let raw = format!(
            "SETUP {uri} RTSP/1.0\r\nCSeq: 2\r\n\
             Transport: RTP/AVP;unicast;client_port=51354-51355\r\n\r\n"
        );
        let request = RtspRequest::parse(&raw).unwrap();
        let params = TransportParams::from_uri(uri);
        (request, params)
    }

    const TUNE_URI: &str =
        "rtsp://10.0.0.5/?src=1&freq=11362.50&pol=h&msys=dvbs2&sr=27500&fec=34&pids=0,17";

    #[test]
    fn attach_marks_stream_in_use() {
        let (stream, _) = sim_stream();
        assert!(!stream.in_use());
        let slot = stream
            .attach_client("0000000001", IpAddr::V4(Ipv4Addr::LOCALHOST))
            .unwrap();
        assert_eq!(slot, 0);
        assert!(stream.in_use());
        assert_eq!(stream.find_session("0000000001"), Some(0));
    }

    #[test]
    fn process_request_negotiates_transport() {
        let (stream, _) = sim_stream();
        stream
            .attach_client("0000000001", IpAddr::V4(Ipv4Addr::LOCALHOST))
            .unwrap();
        let (request, params) = setup_request(TUNE_URI);
        stream.process_request(0, &request, &params);

        let clients = stream.clients.lock();
        let record = clients.get(0).unwrap();
        assert_eq!(record.rtp_port, 51354);
        assert_eq!(record.rtcp_port, 51355);
        assert_eq!(record.cseq, 2);
        assert!(!record.can_close, "SETUP binds the connection");
        drop(clients);

        assert!(stream.is_configured());
    }

    #[test]
    fn teardown_request_allows_close() {
        let (stream, _) = sim_stream();
        stream
            .attach_client("0000000001", IpAddr::V4(Ipv4Addr::LOCALHOST))
            .unwrap();
        let raw = "TEARDOWN rtsp://10.0.0.5/stream=1 RTSP/1.0\r\n\
                   CSeq: 5\r\nSession: 0000000001\r\n\r\n";
        let request = RtspRequest::parse(raw).unwrap();
        stream.process_request(0, &request, &TransportParams::from_uri(&request.uri));
        assert!(stream.can_close(0));
    }

    #[test]
    fn owner_teardown_frees_everything() {
        let (stream, sim) = sim_stream();
        stream
            .attach_client("0000000001", IpAddr::V4(Ipv4Addr::LOCALHOST))
            .unwrap();
        let (request, params) = setup_request(TUNE_URI);
        stream.process_request(0, &request, &params);
        stream.update_frontend().unwrap();
        assert!(sim.state().lock().is_open());

        stream.teardown(0, true).unwrap();
        assert!(!stream.in_use());
        assert!(!sim.state().lock().is_open());
        assert!(!stream.is_configured());
    }

    #[test]
    fn secondary_client_teardown_keeps_stream() {
        let (stream, _) = sim_stream();
        stream
            .attach_client("0000000001", IpAddr::V4(Ipv4Addr::LOCALHOST))
            .unwrap();
        stream
            .attach_client("0000000002", IpAddr::V4(Ipv4Addr::LOCALHOST))
            .unwrap();

        stream.teardown(1, true).unwrap();
        assert!(stream.in_use());
        assert_eq!(stream.find_session("0000000001"), Some(0));
        assert_eq!(stream.find_session("0000000002"), None);
    }

    #[test]
    fn watchdog_reaps_setup_without_followup() {
        let (stream, sim) = sim_stream();
        stream
            .attach_client("0000000001", IpAddr::V4(Ipv4Addr::LOCALHOST))
            .unwrap();
        let (request, params) = setup_request(TUNE_URI);
        stream.process_request(0, &request, &params);
        stream.update_frontend().unwrap();
        assert!(stream.in_use());

        // one sweep short of the deadline leaves the session alone
        let armed = std::time::Instant::now();
        assert_eq!(
            stream.check_clients_with_timeout_at(armed + DEFAULT_SESSION_TIMEOUT),
            0
        );
        assert!(stream.in_use());

        let past_deadline = armed
            + DEFAULT_SESSION_TIMEOUT
            + crate::session::client::WATCHDOG_GRACE
            + std::time::Duration::from_secs(1);
        assert_eq!(stream.check_clients_with_timeout_at(past_deadline), 1);
        assert!(!stream.in_use());
        assert!(!sim.state().lock().is_open());
    }

    #[test]
    fn start_streaming_is_idempotent() {
        let client = std::net::UdpSocket::bind("127.0.0.1:0").unwrap();
        let port = client.local_addr().unwrap().port();

        let (stream, _) = sim_stream();
        stream
            .attach_client("0000000001", IpAddr::V4(Ipv4Addr::LOCALHOST))
            .unwrap();
        let uri = TUNE_URI.to_string();
        let raw = format!(
            "SETUP {uri} RTSP/1.0\r\nCSeq: 2\r\n\
             Transport: RTP/AVP;unicast;client_port={port}-{}\r\n\r\n",
            port + 1
        );
        let request = RtspRequest::parse(&raw).unwrap();
        stream.process_request(0, &request, &TransportParams::from_uri(&uri));
        stream.update_frontend().unwrap();

        stream.start_streaming().unwrap();
        stream.start_streaming().unwrap();
        assert!(stream.properties.lock().stream_active);

        stream.teardown(0, true).unwrap();
    }

    #[test]
    fn pause_suspends_and_play_resumes() {
        let client = std::net::UdpSocket::bind("127.0.0.1:0").unwrap();
        let port = client.local_addr().unwrap().port();

        let (stream, _) = sim_stream();
        stream
            .attach_client("0000000001", IpAddr::V4(Ipv4Addr::LOCALHOST))
            .unwrap();
        let raw = format!(
            "SETUP {TUNE_URI} RTSP/1.0\r\nCSeq: 2\r\n\
             Transport: RTP/AVP;unicast;client_port={port}-{}\r\n\r\n",
            port + 1
        );
        let request = RtspRequest::parse(&raw).unwrap();
        stream.process_request(0, &request, &TransportParams::from_uri(TUNE_URI));
        stream.update_frontend().unwrap();
        stream.start_streaming().unwrap();

        stream.pause_streaming();
        assert!(!stream.properties.lock().stream_active);

        stream.start_streaming().unwrap();
        assert!(stream.properties.lock().stream_active);

        stream.teardown(0, true).unwrap();
    }
}

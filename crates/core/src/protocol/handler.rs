use std::net::SocketAddr;
use std::sync::Arc;

use crate::protocol::params::TransportParams;
use crate::protocol::request::RtspRequest;
use crate::protocol::response::RtspResponse;
use crate::protocol::sdp;
use crate::server::ServerConfig;
use crate::stream::Stream;
use crate::stream::registry::{Resolved, Streams};

/// Handles RTSP method requests for a single TCP connection.
///
/// Tracks which stream/client bindings this connection touched so that
/// sessions which never progressed past OPTIONS can be cleaned up when
/// the connection drops. Streaming sessions survive the control
/// connection and are reaped by the watchdog instead.
pub struct MethodHandler {
    streams: Arc<Streams>,
    peer_addr: SocketAddr,
    config: Arc<ServerConfig>,
    /// (stream id, client slot) pairs bound on this connection.
    bound: Vec<(u32, usize)>,
}

impl MethodHandler {
    pub fn new(streams: Arc<Streams>, peer_addr: SocketAddr, config: Arc<ServerConfig>) -> Self {
        MethodHandler {
            streams,
            peer_addr,
            config,
            bound: Vec::new(),
        }
    }

    /// Stream/client bindings made on this connection, for disconnect
    /// cleanup.
    pub fn bound(&self) -> &[(u32, usize)] {
        &self.bound
    }

    pub fn handle(&mut self, request: &RtspRequest) -> RtspResponse {
        let cseq = request.cseq().unwrap_or("0");
        let params = TransportParams::from_uri(&request.uri);

        let (stream, client_id) =
            match self
                .streams
                .find_stream_and_client_for(request, &params, self.peer_addr.ip())
            {
                Resolved::Bound { stream, client_id } => (stream, client_id),
                Resolved::Unbound => return self.handle_outside_session(cseq, request),
                Resolved::NotFound => {
                    tracing::info!(%cseq, method = %request.method, uri = %request.uri, "no stream for request");
                    return RtspResponse::service_unavailable().add_header("CSeq", cseq);
                }
            };

        if !self.bound.contains(&(stream.id(), client_id)) {
            self.bound.push((stream.id(), client_id));
        }

        stream.process_request(client_id, request, &params);
        let session_id = stream.session_id_of(client_id).unwrap_or_default();

        match request.method.as_str() {
            "OPTIONS" => self.handle_options(cseq).add_header("Session", &session_id),
            "DESCRIBE" => self
                .handle_describe(cseq, &request.uri)
                .add_header("Session", &session_id),
            "SETUP" => self.handle_setup(cseq, request, &stream, client_id, &session_id),
            "PLAY" => self.handle_play(cseq, request, &stream, client_id, &session_id),
            "PAUSE" => self.handle_pause(cseq, &stream, &session_id),
            "TEARDOWN" => self.handle_teardown(cseq, &stream, client_id, &session_id),
            _ => {
                tracing::warn!(method = %request.method, %cseq, "unsupported RTSP method");
                RtspResponse::new(501, "Not Implemented").add_header("CSeq", cseq)
            }
        }
    }

    /// A request with no session and no tuning parameters binds nothing:
    /// OPTIONS and DESCRIBE are answered statelessly, anything else has
    /// no stream to work on.
    fn handle_outside_session(&self, cseq: &str, request: &RtspRequest) -> RtspResponse {
        match request.method.as_str() {
            "OPTIONS" => self.handle_options(cseq),
            "DESCRIBE" => self.handle_describe(cseq, &request.uri),
            _ => {
                tracing::info!(%cseq, method = %request.method, "method outside session");
                RtspResponse::service_unavailable().add_header("CSeq", cseq)
            }
        }
    }

    fn handle_options(&self, cseq: &str) -> RtspResponse {
        tracing::debug!(%cseq, "OPTIONS");
        RtspResponse::ok()
            .add_header("CSeq", cseq)
            .add_header("Public", "OPTIONS, DESCRIBE, SETUP, PLAY, PAUSE, TEARDOWN")
    }

    /// Parses host from an RTSP URI (e.g. rtsp://host:554/path -> host).
    /// Falls back to the client-facing address if invalid.
    fn host_from_uri_or_client(&self, uri: &str) -> String {
        if let Some(host) = &self.config.public_host {
            return host.clone();
        }

        if let Some(after_scheme) = uri.strip_prefix("rtsp://") {
            let host = after_scheme
                .split('/')
                .next()
                .and_then(|host_port| host_port.split(':').next())
                .unwrap_or("")
                .trim();
            if !host.is_empty() {
                return host.to_string();
            }
        }
        self.peer_addr.ip().to_string()
    }

    fn handle_describe(&self, cseq: &str, uri: &str) -> RtspResponse {
        tracing::debug!(%cseq, uri, "DESCRIBE");

        if self.streams.configured_count() == 0 {
            tracing::info!(%cseq, "DESCRIBE with no configured stream");
            return RtspResponse::not_found().add_header("CSeq", cseq);
        }

        let host = self.host_from_uri_or_client(uri);
        let body = sdp::generate_sdp(&self.streams, &host);

        RtspResponse::ok()
            .add_header("CSeq", cseq)
            .add_header("Content-Type", "application/sdp")
            .add_header("Content-Base", uri)
            .with_body(body)
    }

    fn handle_setup(
        &mut self,
        cseq: &str,
        request: &RtspRequest,
        stream: &Arc<Stream>,
        client_id: usize,
        session_id: &str,
    ) -> RtspResponse {
        let Some(rtp_port) = request.client_rtp_port() else {
            tracing::warn!(%cseq, "SETUP missing Transport client_port");
            // a slot claimed by this very SETUP must not stay pinned
            if request.session().is_none() {
                let _ = stream.teardown(client_id, false);
            }
            return RtspResponse::bad_request().add_header("CSeq", cseq);
        };
        let Some(rtcp_port) = rtp_port.checked_add(1) else {
            tracing::warn!(%cseq, rtp_port, "client_port range has no RTCP port");
            if request.session().is_none() {
                let _ = stream.teardown(client_id, false);
            }
            return RtspResponse::bad_request().add_header("CSeq", cseq);
        };

        if let Err(e) = stream.update_frontend() {
            tracing::error!(stream_id = stream.id(), error = %e, "SETUP tune failed");
            let _ = stream.teardown(client_id, false);
            return RtspResponse::internal_server_error().add_header("CSeq", cseq);
        }
        if let Err(e) = stream.start_streaming() {
            tracing::error!(stream_id = stream.id(), error = %e, "failed to start streaming");
            let _ = stream.teardown(client_id, false);
            return RtspResponse::internal_server_error().add_header("CSeq", cseq);
        }

        tracing::info!(
            stream_id = stream.id(),
            session_id,
            client = %self.peer_addr.ip(),
            rtp_port,
            "session set up"
        );

        let transport = format!("RTP/AVP;unicast;client_port={rtp_port}-{rtcp_port}");
        RtspResponse::ok()
            .add_header("CSeq", cseq)
            .add_header(
                "Session",
                &format!(
                    "{session_id};timeout={}",
                    stream.session_timeout().as_secs()
                ),
            )
            .add_header("Transport", &transport)
            .add_header("com.ses.streamID", &stream.wire_id().to_string())
    }

    fn handle_play(
        &mut self,
        cseq: &str,
        request: &RtspRequest,
        stream: &Arc<Stream>,
        client_id: usize,
        session_id: &str,
    ) -> RtspResponse {
        if let Err(e) = stream.update_frontend() {
            tracing::error!(stream_id = stream.id(), error = %e, "PLAY tune failed");
            let _ = stream.teardown(client_id, false);
            return RtspResponse::internal_server_error().add_header("CSeq", cseq);
        }
        if let Err(e) = stream.start_streaming() {
            tracing::error!(stream_id = stream.id(), error = %e, "failed to start streaming");
            return RtspResponse::internal_server_error().add_header("CSeq", cseq);
        }

        tracing::info!(stream_id = stream.id(), session_id, "stream playing");

        let host = self.host_from_uri_or_client(&request.uri);
        let rtp_info = format!("url=rtsp://{host}/stream={}", stream.wire_id());
        RtspResponse::ok()
            .add_header("CSeq", cseq)
            .add_header("Session", session_id)
            .add_header("RTP-Info", &rtp_info)
    }

    fn handle_pause(&self, cseq: &str, stream: &Arc<Stream>, session_id: &str) -> RtspResponse {
        stream.pause_streaming();
        tracing::info!(stream_id = stream.id(), session_id, "stream paused");
        RtspResponse::ok()
            .add_header("CSeq", cseq)
            .add_header("Session", session_id)
    }

    fn handle_teardown(
        &mut self,
        cseq: &str,
        stream: &Arc<Stream>,
        client_id: usize,
        session_id: &str,
    ) -> RtspResponse {
        // reply is formatted before teardown so the response reflects
        // the session that is being closed
        let response = RtspResponse::ok()
            .add_header("CSeq", cseq)
            .add_header("Session", session_id);

        if let Err(e) = stream.teardown(client_id, true) {
            tracing::warn!(stream_id = stream.id(), error = %e, "teardown error");
        }
        self.bound.retain(|&(id, client)| (id, client) != (stream.id(), client_id));
        tracing::info!(stream_id = stream.id(), session_id, "session torn down");

        response
    }

    /// Disconnect cleanup: tear down bindings whose session is not
    /// pinned by an active SETUP (a bare OPTIONS session, or one the
    /// client already tore down).
    pub fn cleanup(&self) -> usize {
        let mut removed = 0;
        for &(stream_id, client_id) in &self.bound {
            if let Some(stream) = self.streams.by_wire_id(stream_id + 1)
                && stream.has_client(client_id)
                && stream.can_close(client_id)
            {
                let _ = stream.teardown(client_id, false);
                removed += 1;
            }
        }
        removed
    }
}

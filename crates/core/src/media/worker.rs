//! RTP and RTCP worker threads for one stream.
//!
//! Each playing stream runs a pair of OS threads: the RTP worker drains
//! the DVR into RTP frames, the RTCP worker sends periodic sender-report
//! compounds and refreshes the signal monitor. Both poll their run/state
//! flags at short intervals so stop and pause take effect promptly.

use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

use parking_lot::Mutex;

use crate::decrypt::Decrypt;
use crate::error::Result;
use crate::media::buffer::PacketRing;
use crate::media::rtcp;
use crate::media::rtp::{RtpHeader, TS_PACKET_SIZE, wallclock_timestamp};
use crate::session::properties::StreamProperties;
use crate::transport::UdpTransport;
use crate::tuner::device::DvrReader;
use crate::tuner::frontend::Frontend;

/// RTCP compound interval.
const RTCP_INTERVAL: Duration = Duration::from_millis(200);
/// Signal monitor refresh: every fifth RTCP interval (1s).
const MONITOR_EVERY: u32 = 5;
/// Longest an RTP frame may sit unfinished before it is sent anyway.
const SEND_INTERVAL: Duration = Duration::from_millis(100);
/// DVR poll timeout per read.
const DVR_POLL: Duration = Duration::from_millis(100);
/// State/flag poll interval while paused or idle.
const POLL: Duration = Duration::from_millis(50);
/// Pause waits at most this many poll intervals for acknowledgment.
const PAUSE_WAIT_POLLS: u32 = 50;

/// Worker lifecycle state shared between the RTSP side and one worker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerState {
    Running,
    /// Pause requested; the worker acknowledges at its next iteration.
    Pause,
    /// Worker acknowledged the pause and sends nothing.
    Paused,
}

/// Everything a worker pair needs, fixed at start.
pub struct WorkerContext {
    pub properties: Arc<Mutex<StreamProperties>>,
    pub frontend: Arc<Mutex<Frontend>>,
    pub dvr: Arc<Mutex<Option<Box<dyn DvrReader>>>>,
    pub decrypt: Option<Arc<dyn Decrypt>>,
    /// Client RTP destination, fixed at SETUP.
    pub rtp_dest: SocketAddr,
    /// Client RTCP destination, RTP port + 1.
    pub rtcp_dest: SocketAddr,
    /// SDES CNAME identifying this server.
    pub cname: String,
}

/// Handle to a running RTP/RTCP worker pair.
pub struct StreamWorkers {
    running: Arc<AtomicBool>,
    rtp_state: Arc<Mutex<WorkerState>>,
    rtcp_state: Arc<Mutex<WorkerState>>,
    rtp_handle: Option<JoinHandle<()>>,
    rtcp_handle: Option<JoinHandle<()>>,
    stream_id: u32,
}

impl StreamWorkers {
    /// Bind the outbound sockets and spawn both threads.
    pub fn start(context: WorkerContext) -> Result<Self> {
        let stream_id = context.properties.lock().stream_id;
        let running = Arc::new(AtomicBool::new(true));
        let rtp_state = Arc::new(Mutex::new(WorkerState::Running));
        let rtcp_state = Arc::new(Mutex::new(WorkerState::Running));

        let rtp_socket = UdpTransport::bind()?;
        let rtcp_socket = UdpTransport::bind()?;

        let rtp_handle = {
            let running = running.clone();
            let state = rtp_state.clone();
            let properties = context.properties.clone();
            let dvr = context.dvr.clone();
            let decrypt = context.decrypt.clone();
            let dest = context.rtp_dest;
            thread::Builder::new()
                .name(format!("rtp-{stream_id}"))
                .spawn(move || {
                    rtp_loop(running, state, properties, dvr, decrypt, rtp_socket, dest);
                })?
        };

        let rtcp_handle = {
            let running = running.clone();
            let state = rtcp_state.clone();
            let properties = context.properties.clone();
            let frontend = context.frontend.clone();
            let dest = context.rtcp_dest;
            let cname = context.cname;
            thread::Builder::new()
                .name(format!("rtcp-{stream_id}"))
                .spawn(move || {
                    rtcp_loop(running, state, properties, frontend, rtcp_socket, dest, cname);
                })?
        };

        tracing::info!(stream_id, rtp = %context.rtp_dest, "stream workers started");

        Ok(Self {
            running,
            rtp_state,
            rtcp_state,
            rtp_handle: Some(rtp_handle),
            rtcp_handle: Some(rtcp_handle),
            stream_id,
        })
    }

    /// Ask both workers to pause and wait (bounded) for acknowledgment.
    pub fn pause(&self) {
        *self.rtp_state.lock() = WorkerState::Pause;
        *self.rtcp_state.lock() = WorkerState::Pause;

        for _ in 0..PAUSE_WAIT_POLLS {
            if *self.rtp_state.lock() == WorkerState::Paused
                && *self.rtcp_state.lock() == WorkerState::Paused
            {
                return;
            }
            thread::sleep(POLL);
        }
        tracing::error!(stream_id = self.stream_id, "workers did not acknowledge pause");
    }

    pub fn resume(&self) {
        *self.rtp_state.lock() = WorkerState::Running;
        *self.rtcp_state.lock() = WorkerState::Running;
    }

    /// Signal shutdown and join both threads.
    pub fn stop(mut self) {
        self.running.store(false, Ordering::SeqCst);
        if let Some(handle) = self.rtp_handle.take() {
            let _ = handle.join();
        }
        if let Some(handle) = self.rtcp_handle.take() {
            let _ = handle.join();
        }
        tracing::info!(stream_id = self.stream_id, "stream workers stopped");
    }
}

/// Check the shared state at the top of a loop iteration.
/// Returns `true` when the caller should skip this iteration.
fn paused(state: &Mutex<WorkerState>) -> bool {
    let mut state = state.lock();
    match *state {
        WorkerState::Running => false,
        WorkerState::Pause => {
            *state = WorkerState::Paused;
            true
        }
        WorkerState::Paused => {
            drop(state);
            thread::sleep(POLL);
            true
        }
    }
}

fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}

fn rtp_loop(
    running: Arc<AtomicBool>,
    state: Arc<Mutex<WorkerState>>,
    properties: Arc<Mutex<StreamProperties>>,
    dvr: Arc<Mutex<Option<Box<dyn DvrReader>>>>,
    decrypt: Option<Arc<dyn Decrypt>>,
    socket: UdpTransport,
    dest: SocketAddr,
) {
    let (ssrc, stream_id) = {
        let props = properties.lock();
        (props.ssrc, props.stream_id)
    };
    let mut header = RtpHeader::new(ssrc);
    let mut ring = PacketRing::default();
    let mut read_buf = vec![0u8; TS_PACKET_SIZE * 64];
    let mut residual: Vec<u8> = Vec::with_capacity(TS_PACKET_SIZE);
    let mut last_send = Instant::now();

    while running.load(Ordering::SeqCst) {
        if paused(&state) {
            continue;
        }

        let n = {
            let mut slot = dvr.lock();
            match slot.as_mut() {
                Some(reader) => match reader.poll_read(&mut read_buf, DVR_POLL) {
                    Ok(n) => n,
                    Err(e) => {
                        tracing::error!(stream_id, error = %e, "dvr read error");
                        drop(slot);
                        thread::sleep(POLL);
                        continue;
                    }
                },
                None => {
                    drop(slot);
                    thread::sleep(POLL);
                    continue;
                }
            }
        };

        if n > 0 {
            residual.extend_from_slice(&read_buf[..n]);
            let mut counters: Vec<(u16, u8)> = Vec::new();
            let mut consumed = 0;

            while residual.len() - consumed >= TS_PACKET_SIZE {
                let packet = &mut residual[consumed..consumed + TS_PACKET_SIZE];
                consumed += TS_PACKET_SIZE;
                if packet[0] != 0x47 {
                    // lost sync, drop this block
                    continue;
                }

                let pid = (u16::from(packet[1] & 0x1f) << 8) | u16::from(packet[2]);
                counters.push((pid, packet[3] & 0x0f));

                if let Some(decrypt) = &decrypt {
                    decrypt.decrypt(stream_id, packet);
                }

                if ring.current().write_slot().is_none() && !ring.advance() {
                    // ring exhausted, flush before buffering more
                    drain(&mut ring, &mut header, &properties, &socket, dest, stream_id);
                    ring.advance();
                }
                if let Some(slot) = ring.current().write_slot() {
                    slot.copy_from_slice(packet);
                    ring.current().commit();
                }
            }
            residual.drain(..consumed);

            if !counters.is_empty() {
                let mut props = properties.lock();
                for (pid, cc) in counters {
                    props.channel.pids.record_packet(pid, cc);
                }
            }
        }

        if ring.current().is_full() {
            ring.advance();
        }

        // pacing: a partial frame goes out after SEND_INTERVAL anyway
        if last_send.elapsed() >= SEND_INTERVAL && !ring.current().is_empty() {
            ring.advance();
        }

        if ring.filled() > 0 {
            drain(&mut ring, &mut header, &properties, &socket, dest, stream_id);
            last_send = Instant::now();
        }
    }
}

/// Send every finished frame in the ring, assigning sequence numbers
/// and send-time timestamps as they leave.
fn drain(
    ring: &mut PacketRing,
    header: &mut RtpHeader,
    properties: &Mutex<StreamProperties>,
    socket: &UdpTransport,
    dest: SocketAddr,
    stream_id: u32,
) {
    while let Some(buffer) = ring.drainable() {
        if buffer.is_empty() {
            ring.pop();
            continue;
        }
        let timestamp = wallclock_timestamp(now_millis());
        header.write(buffer.header_mut(), timestamp);
        let payload_len = buffer.payload_len() as u32;
        if let Err(e) = socket.send_to(buffer.frame(), dest) {
            tracing::error!(stream_id, error = %e, "rtp send error");
        }
        properties.lock().add_rtp_sent(payload_len, timestamp);
        ring.pop();
    }
}

fn rtcp_loop(
    running: Arc<AtomicBool>,
    state: Arc<Mutex<WorkerState>>,
    properties: Arc<Mutex<StreamProperties>>,
    frontend: Arc<Mutex<Frontend>>,
    socket: UdpTransport,
    dest: SocketAddr,
    cname: String,
) {
    let stream_id = properties.lock().stream_id;
    let mut iteration: u32 = 0;

    while running.load(Ordering::SeqCst) {
        if paused(&state) {
            continue;
        }

        if iteration % MONITOR_EVERY == 0
            && let Err(e) = frontend.lock().refresh_signal(&properties)
        {
            tracing::warn!(stream_id, error = %e, "signal monitor read failed");
        }

        let (ssrc, timestamp, spc, soc, describe) = {
            let props = properties.lock();
            (
                props.ssrc,
                props.timestamp,
                props.spc,
                props.soc,
                props.attribute_describe_string(),
            )
        };

        let packet = rtcp::compound(ssrc, timestamp, spc, soc, &cname, &describe);
        if let Err(e) = socket.send_to(&packet, dest) {
            tracing::error!(stream_id, error = %e, "rtcp send error");
        }

        iteration = iteration.wrapping_add(1);
        thread::sleep(RTCP_INTERVAL);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::params::TransportParams;
    use crate::tuner::frontend::Frontend;
    use crate::tuner::lnb::Lnb;
    use crate::tuner::sim::SimTuner;
    use std::net::UdpSocket;

    fn context_for(client: &UdpSocket, packets: usize) -> WorkerContext {
        let sim = SimTuner::dvbs2("sim0").with_dvr_packets(packets);
        let mut props = StreamProperties::new(0);
        props.channel.apply(&TransportParams::from_uri(
            "rtsp://host/?src=1&freq=11362.50&pol=h&msys=dvbs2&sr=27500&pids=256",
        ));
        let properties = Arc::new(Mutex::new(props));
        let mut frontend = Frontend::new(Box::new(sim), Lnb::default());
        let dvr = frontend.update(&properties).unwrap();

        let rtp_dest = client.local_addr().unwrap();
        let mut rtcp_dest = rtp_dest;
        rtcp_dest.set_port(rtp_dest.port() + 1);

        WorkerContext {
            properties,
            frontend: Arc::new(Mutex::new(frontend)),
            dvr: Arc::new(Mutex::new(dvr)),
            decrypt: None,
            rtp_dest,
            rtcp_dest,
            cname: "satip-rs".to_string(),
        }
    }

    #[test]
    fn rtp_worker_delivers_ts_payloads() {
        let client = UdpSocket::bind("127.0.0.1:0").unwrap();
        client
            .set_read_timeout(Some(Duration::from_secs(2)))
            .unwrap();

        let context = context_for(&client, 16);
        let properties = context.properties.clone();
        let workers = StreamWorkers::start(context).unwrap();

        let mut buf = [0u8; 2048];
        let n = client.recv(&mut buf).unwrap();
        assert!(n > 12);
        assert_eq!(buf[0] >> 6, 2);
        assert_eq!(buf[1] & 0x7f, 33);
        assert_eq!((n - 12) % TS_PACKET_SIZE, 0);
        assert_eq!(buf[12], 0x47);

        workers.stop();
        let props = properties.lock();
        assert!(props.spc > 0);
        assert!(props.soc > 0);
    }

    #[test]
    fn pause_is_acknowledged() {
        let client = UdpSocket::bind("127.0.0.1:0").unwrap();
        let context = context_for(&client, 4);
        let workers = StreamWorkers::start(context).unwrap();

        workers.pause();
        assert_eq!(*workers.rtp_state.lock(), WorkerState::Paused);
        assert_eq!(*workers.rtcp_state.lock(), WorkerState::Paused);

        workers.resume();
        workers.stop();
    }

    #[test]
    fn rtcp_worker_sends_compounds() {
        let client = UdpSocket::bind("127.0.0.1:0").unwrap();
        client
            .set_read_timeout(Some(Duration::from_secs(2)))
            .unwrap();
        let rtcp_client = UdpSocket::bind((
            "127.0.0.1",
            client.local_addr().unwrap().port() + 1,
        ))
        .unwrap();
        rtcp_client
            .set_read_timeout(Some(Duration::from_secs(2)))
            .unwrap();

        let context = context_for(&client, 4);
        let workers = StreamWorkers::start(context).unwrap();

        let mut buf = [0u8; 1024];
        let n = rtcp_client.recv(&mut buf).unwrap();
        assert!(n >= 28);
        assert_eq!(buf[1], 200, "compound starts with a sender report");
        assert_eq!(&buf[28 + 0..28 + 2], &[0x81, 202], "SDES follows");

        workers.stop();
    }
}

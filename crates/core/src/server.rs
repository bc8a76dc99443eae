use std::net::TcpListener;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::Duration;

use crate::error::{Result, SatIpError};
use crate::stream::registry::Streams;
use crate::transport::tcp;

/// Interval between session watchdog sweeps.
const WATCHDOG_SWEEP: Duration = Duration::from_millis(500);

/// Server-level configuration used by protocol handlers.
#[derive(Debug, Clone, Default)]
pub struct ServerConfig {
    /// Public host advertised in SDP `o=` lines and RTP-Info URLs.
    /// When `None`, host is inferred from request URI/client address.
    pub public_host: Option<String>,
}

/// High-level SAT>IP server orchestrator.
///
/// Owns the stream registry and the run flag. Delegates TCP connection
/// handling to [`transport::tcp`](crate::transport::tcp); the per-stream
/// RTP/RTCP workers are started by the streams themselves on PLAY. A
/// background sweep thread reaps clients whose session watchdog expired.
pub struct RtspServer {
    streams: Arc<Streams>,
    running: Arc<AtomicBool>,
    bind_addr: String,
    config: Arc<ServerConfig>,
}

impl RtspServer {
    pub fn new(bind_addr: &str, streams: Streams) -> Self {
        Self::with_config(bind_addr, streams, ServerConfig::default())
    }

    /// Create a server with custom protocol configuration.
    pub fn with_config(bind_addr: &str, streams: Streams, config: ServerConfig) -> Self {
        Self {
            streams: Arc::new(streams),
            running: Arc::new(AtomicBool::new(false)),
            bind_addr: bind_addr.to_string(),
            config: Arc::new(config),
        }
    }

    pub fn start(&mut self) -> Result<()> {
        if self.running.load(Ordering::SeqCst) {
            return Err(SatIpError::AlreadyRunning);
        }

        let listener = TcpListener::bind(&self.bind_addr)?;
        listener.set_nonblocking(true)?;

        self.running.store(true, Ordering::SeqCst);

        let running = self.running.clone();
        let streams = self.streams.clone();
        let config = self.config.clone();

        tracing::info!(addr = %self.bind_addr, tuners = streams.len(), "SAT>IP server listening");

        thread::spawn(move || {
            tcp::accept_loop(listener, streams, config, running);
        });

        let running = self.running.clone();
        let streams = self.streams.clone();
        thread::spawn(move || {
            while running.load(Ordering::SeqCst) {
                let removed = streams.check_clients_with_timeout();
                if removed > 0 {
                    tracing::info!(removed, "watchdog removed timed-out clients");
                }
                thread::sleep(WATCHDOG_SWEEP);
            }
            tracing::debug!("watchdog sweep exited");
        });

        Ok(())
    }

    pub fn stop(&mut self) {
        self.running.store(false, Ordering::SeqCst);
        tracing::info!("server stopping");
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// The stream registry, e.g. for status XML or tests.
    pub fn streams(&self) -> Arc<Streams> {
        self.streams.clone()
    }

    /// Returns the server's protocol configuration.
    pub fn config(&self) -> Arc<ServerConfig> {
        self.config.clone()
    }
}

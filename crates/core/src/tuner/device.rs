//! Hardware seam: traits a DVB tuner adapter implements.
//!
//! The server core never touches `/dev/dvb` itself. Frontend, demux and
//! DVR access go through [`TunerDevice`] and [`DvrReader`] so that the
//! same state machine drives real adapters and the simulation backend
//! ([`crate::tuner::sim`]) alike.

use std::io;
use std::time::Duration;

use crate::error::Result;
use crate::tuner::channel::ChannelData;
use crate::tuner::delivery::DeliverySystem;

/// Opaque handle to an installed demux PID filter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FilterHandle(pub u32);

/// PID value that selects the whole mux on the demux device.
pub const WHOLE_MUX_PID: u16 = 8192;

/// Signal monitor sample from the frontend.
#[derive(Debug, Clone, Copy, Default)]
pub struct SignalStatus {
    pub locked: bool,
    /// Signal strength, 0..=255 as reported by the SAT>IP scale.
    pub strength: u8,
    /// Signal quality, 0..=15.
    pub snr: u8,
    pub ber: u32,
    pub uncorrected_blocks: u32,
}

/// One DVB tuner adapter (frontend + demux + DVR).
///
/// All methods may fail; the caller ([`Frontend`](crate::tuner::frontend::Frontend))
/// owns the retry budgets, so implementations should report errors
/// immediately rather than retrying internally.
pub trait TunerDevice: Send {
    /// Human-readable adapter name for logs and status reports.
    fn name(&self) -> &str;

    /// Delivery systems this adapter can tune.
    fn delivery_systems(&self) -> &[DeliverySystem];

    /// Open the frontend device.
    fn open(&mut self) -> Result<()>;

    fn is_open(&self) -> bool;

    /// Send a raw DiSEqC command on the satellite cable.
    fn send_diseqc(&mut self, command: &[u8]) -> Result<()>;

    /// Request a tune. `if_freq_khz` carries the LNB intermediate
    /// frequency for satellite systems; terrestrial/cable tune the
    /// channel frequency directly.
    fn tune(&mut self, channel: &ChannelData, if_freq_khz: Option<u32>) -> Result<()>;

    /// Read the current signal monitor values.
    fn signal_status(&mut self) -> Result<SignalStatus>;

    /// Install a demux filter for one PID ([`WHOLE_MUX_PID`] selects
    /// everything).
    fn add_pid_filter(&mut self, pid: u16) -> Result<FilterHandle>;

    fn remove_pid_filter(&mut self, handle: FilterHandle) -> Result<()>;

    /// Open the DVR device with the given read buffer size.
    fn open_dvr(&mut self, buffer_size: usize) -> Result<Box<dyn DvrReader>>;

    /// Release the frontend and any open filters.
    fn close(&mut self) -> Result<()>;
}

/// Blocking-with-timeout reader over the DVR device.
pub trait DvrReader: Send {
    /// Read available TS bytes into `buf`, waiting at most `timeout`.
    /// `Ok(0)` means the timeout expired with no data.
    fn poll_read(&mut self, buf: &mut [u8], timeout: Duration) -> io::Result<usize>;
}

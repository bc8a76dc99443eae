//! Simulation tuner backend.
//!
//! Implements [`TunerDevice`] without hardware: tuning always succeeds
//! (after an optional configured number of failures, for exercising the
//! retry paths), the signal monitor reports a locked carrier, and the DVR
//! serves caller-provided TS bytes. Used by the test suite and the demo
//! CLI.

use std::collections::BTreeMap;
use std::io;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use parking_lot::Mutex;

use crate::error::{Result, SatIpError};
use crate::tuner::channel::ChannelData;
use crate::tuner::delivery::DeliverySystem;
use crate::tuner::device::{DvrReader, FilterHandle, SignalStatus, TunerDevice};

/// Shared state behind a [`SimTuner`] handle.
#[derive(Debug, Default)]
pub struct SimState {
    open: bool,
    tuned: bool,
    /// Remaining tune calls that fail before success.
    fail_tunes: u32,
    /// Remaining DVR opens that fail before success.
    fail_dvr_opens: u32,
    /// Remaining monitor reads that report no lock.
    unlocked_reads: u32,
    next_filter: u32,
    filters: BTreeMap<u32, u16>,
    diseqc_sent: Vec<Vec<u8>>,
    dvr_data: Vec<u8>,
    tune_count: u32,
}

impl SimState {
    /// PIDs with an installed demux filter, ascending.
    pub fn filter_pids(&self) -> Vec<u16> {
        let mut pids: Vec<u16> = self.filters.values().copied().collect();
        pids.sort_unstable();
        pids
    }

    pub fn diseqc_commands(&self) -> &[Vec<u8>] {
        &self.diseqc_sent
    }

    pub fn tune_count(&self) -> u32 {
        self.tune_count
    }

    pub fn is_open(&self) -> bool {
        self.open
    }
}

/// Cloneable handle to a simulated tuner adapter.
///
/// Clones share state, so a test can keep one handle for assertions
/// while the boxed clone lives inside a
/// [`Frontend`](crate::tuner::frontend::Frontend).
#[derive(Clone)]
pub struct SimTuner {
    name: String,
    systems: Vec<DeliverySystem>,
    state: Arc<Mutex<SimState>>,
}

impl SimTuner {
    pub fn new(name: &str, systems: Vec<DeliverySystem>) -> Self {
        Self {
            name: name.to_string(),
            systems,
            state: Arc::new(Mutex::new(SimState::default())),
        }
    }

    /// Satellite adapter (DVB-S and DVB-S2).
    pub fn dvbs2(name: &str) -> Self {
        Self::new(name, vec![DeliverySystem::DvbS, DeliverySystem::DvbS2])
    }

    /// Terrestrial adapter (DVB-T and DVB-T2).
    pub fn dvbt2(name: &str) -> Self {
        Self::new(name, vec![DeliverySystem::DvbT, DeliverySystem::DvbT2])
    }

    /// Cable adapter (DVB-C).
    pub fn dvbc(name: &str) -> Self {
        Self::new(name, vec![DeliverySystem::DvbC])
    }

    /// Preload the DVR with `count` generated TS packets (PID 0x100,
    /// cycling continuity counter).
    pub fn with_dvr_packets(self, count: usize) -> Self {
        self.state.lock().dvr_data = generate_ts_packets(count);
        self
    }

    /// Make the next `n` tune calls fail.
    pub fn fail_next_tunes(&self, n: u32) {
        self.state.lock().fail_tunes = n;
    }

    /// Make the next `n` DVR opens fail.
    pub fn fail_next_dvr_opens(&self, n: u32) {
        self.state.lock().fail_dvr_opens = n;
    }

    /// Make the next `n` monitor reads report an unlocked carrier.
    pub fn unlocked_for(&self, n: u32) {
        self.state.lock().unlocked_reads = n;
    }

    pub fn state(&self) -> Arc<Mutex<SimState>> {
        self.state.clone()
    }
}

impl TunerDevice for SimTuner {
    fn name(&self) -> &str {
        &self.name
    }

    fn delivery_systems(&self) -> &[DeliverySystem] {
        &self.systems
    }

    fn open(&mut self) -> Result<()> {
        self.state.lock().open = true;
        Ok(())
    }

    fn is_open(&self) -> bool {
        self.state.lock().open
    }

    fn send_diseqc(&mut self, command: &[u8]) -> Result<()> {
        self.state.lock().diseqc_sent.push(command.to_vec());
        Ok(())
    }

    fn tune(&mut self, _channel: &ChannelData, _if_freq_khz: Option<u32>) -> Result<()> {
        let mut state = self.state.lock();
        state.tune_count += 1;
        if state.fail_tunes > 0 {
            state.fail_tunes -= 1;
            return Err(SatIpError::Device {
                operation: "tune",
                message: "simulated tune failure".to_string(),
            });
        }
        state.tuned = true;
        Ok(())
    }

    fn signal_status(&mut self) -> Result<SignalStatus> {
        let mut state = self.state.lock();
        if state.unlocked_reads > 0 {
            state.unlocked_reads -= 1;
            return Ok(SignalStatus::default());
        }
        Ok(SignalStatus {
            locked: state.tuned,
            strength: if state.tuned { 240 } else { 0 },
            snr: if state.tuned { 15 } else { 0 },
            ber: 0,
            uncorrected_blocks: 0,
        })
    }

    fn add_pid_filter(&mut self, pid: u16) -> Result<FilterHandle> {
        let mut state = self.state.lock();
        let handle = state.next_filter;
        state.next_filter += 1;
        state.filters.insert(handle, pid);
        Ok(FilterHandle(handle))
    }

    fn remove_pid_filter(&mut self, handle: FilterHandle) -> Result<()> {
        self.state.lock().filters.remove(&handle.0);
        Ok(())
    }

    fn open_dvr(&mut self, _buffer_size: usize) -> Result<Box<dyn DvrReader>> {
        let mut state = self.state.lock();
        if state.fail_dvr_opens > 0 {
            state.fail_dvr_opens -= 1;
            return Err(SatIpError::Device {
                operation: "open dvr",
                message: "simulated dvr open failure".to_string(),
            });
        }
        Ok(Box::new(SimDvr {
            data: state.dvr_data.clone(),
            pos: 0,
        }))
    }

    fn close(&mut self) -> Result<()> {
        let mut state = self.state.lock();
        state.open = false;
        state.tuned = false;
        state.filters.clear();
        Ok(())
    }
}

struct SimDvr {
    data: Vec<u8>,
    pos: usize,
}

impl DvrReader for SimDvr {
    fn poll_read(&mut self, buf: &mut [u8], timeout: Duration) -> io::Result<usize> {
        let remaining = self.data.len() - self.pos;
        if remaining == 0 {
            thread::sleep(timeout);
            return Ok(0);
        }
        let n = remaining.min(buf.len());
        buf[..n].copy_from_slice(&self.data[self.pos..self.pos + n]);
        self.pos += n;
        Ok(n)
    }
}

/// Generate syntactically valid TS packets on PID 0x100 with a cycling
/// continuity counter.
pub fn generate_ts_packets(count: usize) -> Vec<u8> {
    let mut data = Vec::with_capacity(count * 188);
    for i in 0..count {
        let mut packet = [0xffu8; 188];
        packet[0] = 0x47;
        packet[1] = 0x01;
        packet[2] = 0x00;
        packet[3] = 0x10 | (i as u8 & 0x0f);
        data.extend_from_slice(&packet);
    }
    data
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generated_packets_are_valid_ts() {
        let data = generate_ts_packets(20);
        assert_eq!(data.len(), 20 * 188);
        for (i, packet) in data.chunks(188).enumerate() {
            assert_eq!(packet[0], 0x47);
            assert_eq!(packet[3] & 0x0f, i as u8 & 0x0f);
        }
    }

    #[test]
    fn dvr_serves_then_times_out() {
        let mut tuner = SimTuner::dvbs2("sim0").with_dvr_packets(2);
        let mut dvr = tuner.open_dvr(188 * 120).unwrap();

        let mut buf = vec![0u8; 188 * 4];
        let n = dvr.poll_read(&mut buf, Duration::from_millis(10)).unwrap();
        assert_eq!(n, 188 * 2);

        let n = dvr.poll_read(&mut buf, Duration::from_millis(1)).unwrap();
        assert_eq!(n, 0);
    }

    #[test]
    fn tune_failures_are_consumed() {
        let mut tuner = SimTuner::dvbs2("sim0");
        tuner.fail_next_tunes(1);
        let channel = ChannelData::default();
        assert!(tuner.tune(&channel, None).is_err());
        assert!(tuner.tune(&channel, None).is_ok());
        assert_eq!(tuner.state().lock().tune_count(), 2);
    }
}

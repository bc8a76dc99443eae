//! Frontend state machine: tuning, signal lock, PID filter maintenance.

use std::collections::BTreeMap;
use std::thread;
use std::time::Duration;

use parking_lot::Mutex;

use crate::error::{Result, SatIpError};
use crate::session::properties::StreamProperties;
use crate::tuner::channel::ChannelData;
use crate::tuner::delivery::{DeliverySystem, Polarization};
use crate::tuner::device::{DvrReader, FilterHandle, TunerDevice, WHOLE_MUX_PID};
use crate::tuner::lnb::{Lnb, committed_switch_command};

const TUNE_RETRIES: u32 = 3;
const TUNE_RETRY_DELAY: Duration = Duration::from_millis(50);
const LOCK_POLLS: u32 = 4;
const LOCK_POLL_DELAY: Duration = Duration::from_millis(150);
const DVR_OPEN_RETRIES: u32 = 3;
const DVR_OPEN_DELAY: Duration = Duration::from_millis(150);
const FILTER_RETRIES: u32 = 3;
const FILTER_RETRY_DELAY: Duration = Duration::from_millis(350);

/// Run `op` up to `attempts` times, sleeping `delay` between failures.
/// Returns the first success or the last error.
pub fn retry<T>(attempts: u32, delay: Duration, mut op: impl FnMut() -> Result<T>) -> Result<T> {
    let mut attempt = 1;
    loop {
        match op() {
            Ok(value) => return Ok(value),
            Err(e) if attempt < attempts => {
                tracing::debug!(attempt, error = %e, "retrying device operation");
                attempt += 1;
                thread::sleep(delay);
            }
            Err(e) => return Err(e),
        }
    }
}

/// One tuner frontend and its demux filter state.
///
/// Owns the [`TunerDevice`] and tracks which PID filters are installed,
/// so that [`update`](Self::update) can apply the difference between the
/// demand table and the hardware state. All device retries carry an
/// explicit budget.
pub struct Frontend {
    device: Box<dyn TunerDevice>,
    lnb: Lnb,
    tuned: bool,
    filters: BTreeMap<u16, FilterHandle>,
    whole_mux: Option<FilterHandle>,
}

impl Frontend {
    pub fn new(device: Box<dyn TunerDevice>, lnb: Lnb) -> Self {
        Self {
            device,
            lnb,
            tuned: false,
            filters: BTreeMap::new(),
            whole_mux: None,
        }
    }

    pub fn name(&self) -> &str {
        self.device.name()
    }

    pub fn capable_of(&self, system: DeliverySystem) -> bool {
        self.device.delivery_systems().contains(&system)
    }

    pub fn delivery_systems(&self) -> &[DeliverySystem] {
        self.device.delivery_systems()
    }

    pub fn is_tuned(&self) -> bool {
        self.tuned
    }

    /// Bring the hardware in line with the channel state.
    ///
    /// Called on SETUP and PLAY. If the tuning parameters changed, the
    /// frontend retunes and a fresh DVR reader is returned for the
    /// stream to hand to its RTP worker. PID filter differences are
    /// applied afterwards in either case.
    pub fn update(
        &mut self,
        properties: &Mutex<StreamProperties>,
    ) -> Result<Option<Box<dyn DvrReader>>> {
        let (channel, dvr_buffer_size) = {
            let mut props = properties.lock();
            if props.channel.changed {
                props.channel.changed = false;
                self.tuned = false;
            }
            (props.channel.clone(), props.dvr_buffer_size)
        };

        let mut new_dvr = None;
        if !self.tuned && channel.is_configured() {
            retry(TUNE_RETRIES, TUNE_RETRY_DELAY, || {
                self.setup_and_tune(&channel)
            })?;
            self.tuned = true;
            let dvr = retry(DVR_OPEN_RETRIES, DVR_OPEN_DELAY, || {
                self.device.open_dvr(dvr_buffer_size)
            })?;
            new_dvr = Some(dvr);
            tracing::info!(frontend = self.device.name(), freq_khz = channel.freq_khz, "tuned");
        }

        self.update_pid_filters(properties)?;
        Ok(new_dvr)
    }

    /// One tune pass: open the frontend, steer the dish for satellite
    /// systems, tune, and wait for a signal lock.
    fn setup_and_tune(&mut self, channel: &ChannelData) -> Result<()> {
        if !self.device.is_open() {
            self.device.open()?;
        }

        let mut if_freq_khz = None;
        if channel.delivery_system.is_some_and(DeliverySystem::is_satellite) {
            let band = self.lnb.select_band(channel.freq_khz);
            let polarization = channel.polarization.unwrap_or(Polarization::Vertical);
            let command = committed_switch_command(channel.src, polarization, band.hiband);
            self.device.send_diseqc(&command)?;
            if self.lnb.repeat_diseqc {
                self.device.send_diseqc(&command)?;
            }
            if_freq_khz = Some(band.if_freq_khz);
        }

        self.device.tune(channel, if_freq_khz)?;

        for _ in 0..LOCK_POLLS {
            let status = self.device.signal_status()?;
            if status.locked {
                return Ok(());
            }
            thread::sleep(LOCK_POLL_DELAY);
        }
        Err(SatIpError::NoLock {
            attempts: LOCK_POLLS,
        })
    }

    /// Apply the difference between the PID demand table and the
    /// installed demux filters.
    fn update_pid_filters(&mut self, properties: &Mutex<StreamProperties>) -> Result<()> {
        let (all_pids, wanted) = {
            let mut props = properties.lock();
            if !props.channel.pids.changed() {
                return Ok(());
            }
            props.channel.pids.reset_changed();
            (props.channel.pids.all_pids(), props.channel.pids.used_pids())
        };

        if all_pids && self.whole_mux.is_none() {
            let handle = retry(FILTER_RETRIES, FILTER_RETRY_DELAY, || {
                self.device.add_pid_filter(WHOLE_MUX_PID)
            })?;
            self.whole_mux = Some(handle);
        } else if !all_pids
            && let Some(handle) = self.whole_mux.take()
        {
            self.device.remove_pid_filter(handle)?;
        }

        let to_remove: Vec<u16> = self
            .filters
            .keys()
            .copied()
            .filter(|pid| !wanted.contains(pid))
            .collect();
        for pid in to_remove {
            if let Some(handle) = self.filters.remove(&pid) {
                self.device.remove_pid_filter(handle)?;
            }
        }

        for pid in wanted {
            if !self.filters.contains_key(&pid) {
                let handle = retry(FILTER_RETRIES, FILTER_RETRY_DELAY, || {
                    self.device.add_pid_filter(pid)
                })?;
                self.filters.insert(pid, handle);
            }
        }

        tracing::debug!(
            frontend = self.device.name(),
            filters = self.filters.len(),
            all_pids,
            "pid filters updated"
        );
        Ok(())
    }

    /// Read the signal monitor and publish the sample.
    pub fn refresh_signal(&mut self, properties: &Mutex<StreamProperties>) -> Result<()> {
        let status = self.device.signal_status()?;
        properties.lock().monitor = status;
        Ok(())
    }

    /// Release all filters and close the frontend.
    pub fn teardown(&mut self) -> Result<()> {
        for (_, handle) in std::mem::take(&mut self.filters) {
            self.device.remove_pid_filter(handle)?;
        }
        if let Some(handle) = self.whole_mux.take() {
            self.device.remove_pid_filter(handle)?;
        }
        self.device.close()?;
        self.tuned = false;
        Ok(())
    }
}

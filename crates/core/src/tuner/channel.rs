//! Channel tuning data and the PID filter table.

use std::collections::BTreeMap;

use crate::protocol::params::{PidSelection, TransportParams};
use crate::tuner::delivery::{
    Bandwidth, DeliverySystem, Fec, GuardInterval, Hierarchy, Modulation, Pilot, Polarization,
    RollOff, SpectralInversion, TransmissionMode,
};

/// Highest valid PID in an MPEG-TS mux (13-bit field).
pub const MAX_PID: u16 = 8191;

/// Per-PID bookkeeping: demand plus continuity-counter statistics.
///
/// Demux filter handles are owned by the frontend, not stored here;
/// this table only records what the client asked for and what arrived.
#[derive(Debug, Clone, Default)]
pub struct PidEntry {
    /// Client asked for this PID (`pids=`/`addpids=`).
    pub used: bool,
    /// Last continuity counter seen, `None` before the first packet.
    pub cc: Option<u8>,
    /// Accumulated continuity errors (wrapped distance between expected
    /// and received counter).
    pub cc_errors: u32,
    /// TS packets received on this PID.
    pub packets: u64,
}

/// Sparse PID demand table.
///
/// Requested PIDs are keys of a `BTreeMap`; the whole-mux request
/// (`pids=all`, wire value 8192) is the separate [`all_pids`](Self::all_pids)
/// flag and never appears as a key.
#[derive(Debug, Clone, Default)]
pub struct PidTable {
    entries: BTreeMap<u16, PidEntry>,
    all_pids: bool,
    changed: bool,
}

impl PidTable {
    /// Mark a single PID as wanted or unwanted. Out-of-range PIDs are
    /// ignored.
    pub fn set_used(&mut self, pid: u16, used: bool) {
        if pid > MAX_PID {
            return;
        }
        let entry = self.entries.entry(pid).or_default();
        if entry.used != used {
            entry.used = used;
            self.changed = true;
        }
    }

    /// Request or release the whole mux.
    pub fn set_all(&mut self, all: bool) {
        if self.all_pids != all {
            self.all_pids = all;
            self.changed = true;
        }
    }

    /// Drop every demand and all statistics.
    pub fn clear(&mut self) {
        if !self.entries.is_empty() || self.all_pids {
            self.changed = true;
        }
        self.entries.clear();
        self.all_pids = false;
    }

    pub fn all_pids(&self) -> bool {
        self.all_pids
    }

    /// True when the demand set changed since the last
    /// [`reset_changed`](Self::reset_changed).
    pub fn changed(&self) -> bool {
        self.changed
    }

    pub fn reset_changed(&mut self) {
        self.changed = false;
    }

    pub fn is_used(&self, pid: u16) -> bool {
        self.entries.get(&pid).is_some_and(|e| e.used)
    }

    /// PIDs currently wanted, in ascending order.
    pub fn used_pids(&self) -> Vec<u16> {
        self.entries
            .iter()
            .filter(|(_, e)| e.used)
            .map(|(&pid, _)| pid)
            .collect()
    }

    pub fn entry(&self, pid: u16) -> Option<&PidEntry> {
        self.entries.get(&pid)
    }

    /// Account one received TS packet with continuity counter `cc`.
    ///
    /// A mismatch against the expected `(prev + 1) mod 16` adds the wrapped
    /// distance to the error count, so a burst of N lost packets counts N.
    pub fn record_packet(&mut self, pid: u16, cc: u8) {
        if pid > MAX_PID {
            return;
        }
        let entry = self.entries.entry(pid).or_default();
        if let Some(prev) = entry.cc {
            let expected = (prev + 1) & 0x0f;
            if cc != expected {
                entry.cc_errors += u32::from(cc.wrapping_sub(expected) & 0x0f);
            }
        }
        entry.cc = Some(cc);
        entry.packets += 1;
    }

    /// Comma-separated demand list for DESCRIBE/RTCP attribute strings:
    /// `all` for a whole-mux request, empty when nothing is wanted.
    pub fn csv(&self) -> String {
        if self.all_pids {
            return "all".to_string();
        }
        let pids: Vec<String> = self
            .entries
            .iter()
            .filter(|(_, e)| e.used)
            .map(|(pid, _)| pid.to_string())
            .collect();
        pids.join(",")
    }

    /// Total continuity errors across all PIDs.
    pub fn total_cc_errors(&self) -> u32 {
        self.entries.values().map(|e| e.cc_errors).sum()
    }
}

/// All tuning parameters of one transponder/mux, as requested by the
/// client, plus the PID demand table.
#[derive(Debug, Clone)]
pub struct ChannelData {
    pub delivery_system: Option<DeliverySystem>,
    /// Center frequency in kHz (`freq=` is MHz with decimals).
    pub freq_khz: u32,
    /// Symbol rate in Sym/s (`sr=` is kSym/s).
    pub symbol_rate: u32,
    pub modulation: Modulation,
    pub fec: Fec,
    pub roll_off: RollOff,
    pub inversion: SpectralInversion,
    pub pilot: Pilot,
    /// DiSEqC signal source, 1-based (`src=`).
    pub src: u8,
    pub polarization: Option<Polarization>,
    pub bandwidth: Bandwidth,
    pub transmission_mode: TransmissionMode,
    pub guard_interval: GuardInterval,
    pub hierarchy: Hierarchy,
    pub plp_id: Option<u8>,
    pub t2_system_id: Option<u16>,
    pub siso_miso: Option<u8>,
    pub c2_tft: Option<u8>,
    pub data_slice: Option<u8>,
    /// Tuning parameters changed since the last frontend update.
    pub changed: bool,
    pub pids: PidTable,
}

impl Default for ChannelData {
    fn default() -> Self {
        Self {
            delivery_system: None,
            freq_khz: 0,
            symbol_rate: 0,
            modulation: Modulation::Auto,
            fec: Fec::Auto,
            roll_off: RollOff::Auto,
            inversion: SpectralInversion::Auto,
            pilot: Pilot::Auto,
            src: 1,
            polarization: None,
            bandwidth: Bandwidth::Auto,
            transmission_mode: TransmissionMode::Auto,
            guard_interval: GuardInterval::Auto,
            hierarchy: Hierarchy::Auto,
            plp_id: None,
            t2_system_id: None,
            siso_miso: None,
            c2_tft: None,
            data_slice: None,
            changed: false,
            pids: PidTable::default(),
        }
    }
}

impl ChannelData {
    /// True once a frequency has been requested.
    pub fn is_configured(&self) -> bool {
        self.freq_khz != 0
    }

    /// Fold a parsed transport-parameter set into the channel state.
    ///
    /// A `freq=` parameter starts a fresh channel description: all previous
    /// tuning data and PID demands are dropped before the new values are
    /// applied. PID edits are applied adds-first, deletes-last.
    pub fn apply(&mut self, params: &TransportParams) {
        if let Some(freq_khz) = params.freq_khz {
            *self = ChannelData::default();
            self.freq_khz = freq_khz;
            self.changed = true;
        }

        if let Some(system) = params.delivery_system {
            self.delivery_system = Some(system);
            if params.modulation.is_none() {
                self.modulation = Modulation::default_for(system);
            }
        }
        if let Some(sr) = params.symbol_rate_ksyms {
            self.symbol_rate = sr * 1000;
        }
        if let Some(modulation) = params.modulation {
            self.modulation = modulation;
        }
        if let Some(fec) = params.fec {
            self.fec = fec;
        }
        if let Some(roll_off) = params.roll_off {
            self.roll_off = roll_off;
        }
        if let Some(inversion) = params.inversion {
            self.inversion = inversion;
        }
        if let Some(pilot) = params.pilot {
            self.pilot = pilot;
        }
        if let Some(src) = params.src {
            self.src = src;
        }
        if let Some(pol) = params.polarization {
            self.polarization = Some(pol);
        }
        if let Some(bw) = params.bandwidth {
            self.bandwidth = bw;
        }
        if let Some(tmode) = params.transmission_mode {
            self.transmission_mode = tmode;
        }
        if let Some(gi) = params.guard_interval {
            self.guard_interval = gi;
        }
        if let Some(hier) = params.hierarchy {
            self.hierarchy = hier;
        }
        if let Some(plp) = params.plp_id {
            self.plp_id = Some(plp);
        }
        if let Some(t2id) = params.t2_system_id {
            self.t2_system_id = Some(t2id);
        }
        if let Some(sm) = params.siso_miso {
            self.siso_miso = Some(sm);
        }
        if let Some(c2tft) = params.c2_tft {
            self.c2_tft = Some(c2tft);
        }
        if let Some(ds) = params.data_slice {
            self.data_slice = Some(ds);
        }

        if let Some(pids) = &params.pids {
            self.pids.clear();
            for sel in pids {
                match sel {
                    PidSelection::All => self.pids.set_all(true),
                    PidSelection::Pid(pid) => self.pids.set_used(*pid, true),
                }
            }
        }
        for sel in &params.add_pids {
            match sel {
                PidSelection::All => self.pids.set_all(true),
                PidSelection::Pid(pid) => self.pids.set_used(*pid, true),
            }
        }
        for sel in &params.del_pids {
            match sel {
                PidSelection::All => self.pids.set_all(false),
                PidSelection::Pid(pid) => self.pids.set_used(*pid, false),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cc_tracking_counts_gaps() {
        let mut table = PidTable::default();
        table.record_packet(512, 3);
        table.record_packet(512, 4);
        assert_eq!(table.entry(512).unwrap().cc_errors, 0);

        // two packets lost: expected 5, got 7
        table.record_packet(512, 7);
        assert_eq!(table.entry(512).unwrap().cc_errors, 2);
        assert_eq!(table.entry(512).unwrap().packets, 3);
    }

    #[test]
    fn cc_tracking_wraps() {
        let mut table = PidTable::default();
        table.record_packet(100, 15);
        table.record_packet(100, 0);
        assert_eq!(table.entry(100).unwrap().cc_errors, 0);

        table.record_packet(100, 15);
        // expected 1, got 15: 14 lost
        assert_eq!(table.entry(100).unwrap().cc_errors, 14);
    }

    #[test]
    fn csv_forms() {
        let mut table = PidTable::default();
        assert_eq!(table.csv(), "");

        table.set_used(0, true);
        table.set_used(512, true);
        table.set_used(17, true);
        assert_eq!(table.csv(), "0,17,512");

        table.set_all(true);
        assert_eq!(table.csv(), "all");
    }

    #[test]
    fn changed_flag_tracks_demand_edits() {
        let mut table = PidTable::default();
        assert!(!table.changed());
        table.set_used(512, true);
        assert!(table.changed());
        table.reset_changed();

        // no-op edit leaves the flag clear
        table.set_used(512, true);
        assert!(!table.changed());

        table.set_used(512, false);
        assert!(table.changed());
    }

    #[test]
    fn freq_resets_channel_and_pids() {
        let mut channel = ChannelData::default();
        let mut params = TransportParams::default();
        params.freq_khz = Some(11_362_500);
        params.pids = Some(vec![PidSelection::Pid(0), PidSelection::Pid(512)]);
        channel.apply(&params);
        assert_eq!(channel.freq_khz, 11_362_500);
        assert!(channel.changed);
        assert!(channel.pids.is_used(512));

        // retune drops the old demand set
        let mut retune = TransportParams::default();
        retune.freq_khz = Some(12_050_000);
        channel.apply(&retune);
        assert_eq!(channel.freq_khz, 12_050_000);
        assert!(!channel.pids.is_used(512));
    }

    #[test]
    fn modulation_defaults_follow_delivery_system() {
        let mut channel = ChannelData::default();
        let mut params = TransportParams::default();
        params.freq_khz = Some(11_362_500);
        params.delivery_system = Some(DeliverySystem::DvbS2);
        channel.apply(&params);
        assert_eq!(channel.modulation, Modulation::Psk8);

        let mut explicit = TransportParams::default();
        explicit.delivery_system = Some(DeliverySystem::DvbS);
        explicit.modulation = Some(Modulation::Psk8);
        channel.apply(&explicit);
        assert_eq!(channel.modulation, Modulation::Psk8);
    }

    #[test]
    fn adds_apply_before_deletes() {
        let mut channel = ChannelData::default();
        let mut params = TransportParams::default();
        params.add_pids = vec![PidSelection::Pid(100), PidSelection::Pid(200)];
        params.del_pids = vec![PidSelection::Pid(100)];
        channel.apply(&params);
        assert!(!channel.pids.is_used(100));
        assert!(channel.pids.is_used(200));
    }

    #[test]
    fn symbol_rate_scales_to_syms() {
        let mut channel = ChannelData::default();
        let mut params = TransportParams::default();
        params.symbol_rate_ksyms = Some(27_500);
        channel.apply(&params);
        assert_eq!(channel.symbol_rate, 27_500_000);
    }
}

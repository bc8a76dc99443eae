//! Universal LNB local-oscillator data and DiSEqC switch commands.

use crate::tuner::delivery::Polarization;

/// Universal LNB low-band local oscillator frequency (kHz).
pub const DEFAULT_LOF_LOW: u32 = 9_750_000;
/// Universal LNB high-band local oscillator frequency (kHz).
pub const DEFAULT_LOF_HIGH: u32 = 10_600_000;
/// Band switch point (kHz): transponders at or above use the high band.
pub const DEFAULT_LOF_SWITCH: u32 = 11_700_000;

/// LNB local-oscillator configuration.
#[derive(Debug, Clone)]
pub struct Lnb {
    pub lof_low_khz: u32,
    pub lof_high_khz: u32,
    pub switch_khz: u32,
    /// Send each DiSEqC command twice for long or noisy cable runs.
    pub repeat_diseqc: bool,
}

impl Default for Lnb {
    fn default() -> Self {
        Self {
            lof_low_khz: DEFAULT_LOF_LOW,
            lof_high_khz: DEFAULT_LOF_HIGH,
            switch_khz: DEFAULT_LOF_SWITCH,
            repeat_diseqc: false,
        }
    }
}

/// Downconversion result for one transponder.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BandSelection {
    /// Intermediate frequency the tuner is actually set to (kHz).
    pub if_freq_khz: u32,
    /// High band selected (22 kHz tone on).
    pub hiband: bool,
}

impl Lnb {
    /// Pick the band for a transponder frequency and compute the IF the
    /// frontend must tune to.
    pub fn select_band(&self, freq_khz: u32) -> BandSelection {
        if self.lof_high_khz > 0 && freq_khz >= self.switch_khz {
            BandSelection {
                if_freq_khz: freq_khz.abs_diff(self.lof_high_khz),
                hiband: true,
            }
        } else {
            BandSelection {
                if_freq_khz: freq_khz.abs_diff(self.lof_low_khz),
                hiband: false,
            }
        }
    }
}

/// DiSEqC 1.0 committed switch command (framing, address, command, data).
///
/// The data byte selects satellite position, polarization voltage, and
/// band tone: `0xf0 | position<<2 | pol | band` per the DiSEqC bus spec.
pub fn committed_switch_command(src: u8, polarization: Polarization, hiband: bool) -> [u8; 4] {
    let position = src.saturating_sub(1);
    let mut data = 0xf0u8;
    data |= (position << 2) & 0x0f;
    if polarization == Polarization::Horizontal {
        data |= 0x02;
    }
    if hiband {
        data |= 0x01;
    }
    // framing 0xe0, address 0x10 (any switch), command 0x38 (write port group)
    [0xe0, 0x10, 0x38, data]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn low_band_below_switch_point() {
        let lnb = Lnb::default();
        let band = lnb.select_band(11_362_500);
        assert!(!band.hiband);
        assert_eq!(band.if_freq_khz, 11_362_500 - DEFAULT_LOF_LOW);
    }

    #[test]
    fn high_band_at_switch_point() {
        let lnb = Lnb::default();
        let band = lnb.select_band(DEFAULT_LOF_SWITCH);
        assert!(band.hiband);
        assert_eq!(band.if_freq_khz, DEFAULT_LOF_SWITCH - DEFAULT_LOF_HIGH);

        let band = lnb.select_band(12_515_000);
        assert!(band.hiband);
        assert_eq!(band.if_freq_khz, 12_515_000 - DEFAULT_LOF_HIGH);
    }

    #[test]
    fn committed_command_bits() {
        // src 1, vertical, low band: bare 0xf0
        let cmd = committed_switch_command(1, Polarization::Vertical, false);
        assert_eq!(cmd, [0xe0, 0x10, 0x38, 0xf0]);

        // src 2, horizontal, high band: position 1, pol bit, band bit
        let cmd = committed_switch_command(2, Polarization::Horizontal, true);
        assert_eq!(cmd[3], 0xf0 | 0x04 | 0x02 | 0x01);
    }
}

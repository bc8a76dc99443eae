//! Delivery-system and channel-parameter enums.
//!
//! String forms follow the SAT>IP transport-parameter grammar
//! (SAT>IP specification §3.5.11): lowercase tokens in the request URI,
//! the same tokens echoed back in DESCRIBE attribute strings.

use std::fmt;

/// DVB delivery system selected by the `msys=` parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeliverySystem {
    DvbS,
    DvbS2,
    DvbT,
    DvbT2,
    DvbC,
    DvbC2,
}

impl DeliverySystem {
    /// Parse the `msys=` token. Returns `None` for unknown systems.
    pub fn parse(token: &str) -> Option<Self> {
        match token {
            "dvbs" => Some(Self::DvbS),
            "dvbs2" => Some(Self::DvbS2),
            "dvbt" => Some(Self::DvbT),
            "dvbt2" => Some(Self::DvbT2),
            "dvbc" => Some(Self::DvbC),
            "dvbc2" => Some(Self::DvbC2),
            _ => None,
        }
    }

    /// True for the satellite family (needs DiSEqC/LNB handling).
    pub fn is_satellite(self) -> bool {
        matches!(self, Self::DvbS | Self::DvbS2)
    }

    /// True for the terrestrial family.
    pub fn is_terrestrial(self) -> bool {
        matches!(self, Self::DvbT | Self::DvbT2)
    }

    /// True for the cable family.
    pub fn is_cable(self) -> bool {
        matches!(self, Self::DvbC | Self::DvbC2)
    }
}

impl fmt::Display for DeliverySystem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::DvbS => "dvbs",
            Self::DvbS2 => "dvbs2",
            Self::DvbT => "dvbt",
            Self::DvbT2 => "dvbt2",
            Self::DvbC => "dvbc",
            Self::DvbC2 => "dvbc2",
        };
        write!(f, "{s}")
    }
}

/// Modulation type (`mtype=`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Modulation {
    Qpsk,
    Psk8,
    Qam16,
    Qam64,
    Qam256,
    #[default]
    Auto,
}

impl Modulation {
    pub fn parse(token: &str) -> Option<Self> {
        match token {
            "qpsk" => Some(Self::Qpsk),
            "8psk" => Some(Self::Psk8),
            "16qam" => Some(Self::Qam16),
            "64qam" => Some(Self::Qam64),
            "256qam" => Some(Self::Qam256),
            _ => None,
        }
    }

    /// Default modulation for a delivery system when `mtype=` is absent.
    pub fn default_for(system: DeliverySystem) -> Self {
        match system {
            DeliverySystem::DvbS => Self::Qpsk,
            DeliverySystem::DvbS2 => Self::Psk8,
            _ => Self::Auto,
        }
    }
}

impl fmt::Display for Modulation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Qpsk => "qpsk",
            Self::Psk8 => "8psk",
            Self::Qam16 => "16qam",
            Self::Qam64 => "64qam",
            Self::Qam256 => "256qam",
            Self::Auto => "auto",
        };
        write!(f, "{s}")
    }
}

/// Forward error correction rate (`fec=`), given as the rate digits
/// without the slash: `34` means 3/4.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Fec {
    F12,
    F23,
    F34,
    F35,
    F45,
    F56,
    F78,
    F89,
    F910,
    #[default]
    Auto,
    None,
}

impl Fec {
    /// Map the numeric `fec=` code. `999` selects auto; anything else
    /// unknown disables FEC signalling.
    pub fn from_code(code: u32) -> Self {
        match code {
            12 => Self::F12,
            23 => Self::F23,
            34 => Self::F34,
            35 => Self::F35,
            45 => Self::F45,
            56 => Self::F56,
            78 => Self::F78,
            89 => Self::F89,
            910 => Self::F910,
            999 => Self::Auto,
            _ => Self::None,
        }
    }
}

impl fmt::Display for Fec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::F12 => "12",
            Self::F23 => "23",
            Self::F34 => "34",
            Self::F35 => "35",
            Self::F45 => "45",
            Self::F56 => "56",
            Self::F78 => "78",
            Self::F89 => "89",
            Self::F910 => "910",
            Self::Auto => "auto",
            Self::None => "none",
        };
        write!(f, "{s}")
    }
}

/// DVB-S2 roll-off factor (`ro=`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RollOff {
    R035,
    R025,
    R020,
    #[default]
    Auto,
}

impl RollOff {
    pub fn parse(token: &str) -> Option<Self> {
        match token {
            "0.35" => Some(Self::R035),
            "0.25" => Some(Self::R025),
            "0.20" => Some(Self::R020),
            _ => None,
        }
    }
}

impl fmt::Display for RollOff {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::R035 => "0.35",
            Self::R025 => "0.25",
            Self::R020 => "0.20",
            Self::Auto => "auto",
        };
        write!(f, "{s}")
    }
}

/// DVB-S2 pilot tones (`plts=`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Pilot {
    On,
    Off,
    #[default]
    Auto,
}

impl Pilot {
    pub fn parse(token: &str) -> Option<Self> {
        match token {
            "on" => Some(Self::On),
            "off" => Some(Self::Off),
            _ => None,
        }
    }
}

impl fmt::Display for Pilot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::On => "on",
            Self::Off => "off",
            Self::Auto => "auto",
        };
        write!(f, "{s}")
    }
}

/// Satellite signal polarization (`pol=`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Polarization {
    Horizontal,
    Vertical,
}

impl Polarization {
    pub fn parse(token: &str) -> Option<Self> {
        match token {
            "h" => Some(Self::Horizontal),
            "v" => Some(Self::Vertical),
            _ => None,
        }
    }
}

impl fmt::Display for Polarization {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let c = match self {
            Self::Horizontal => 'h',
            Self::Vertical => 'v',
        };
        write!(f, "{c}")
    }
}

/// Spectral inversion (`specinv=`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SpectralInversion {
    Off,
    On,
    #[default]
    Auto,
}

impl SpectralInversion {
    pub fn from_code(code: u32) -> Self {
        match code {
            0 => Self::Off,
            1 => Self::On,
            _ => Self::Auto,
        }
    }
}

/// Channel bandwidth in MHz (`bw=`), terrestrial/cable systems.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Bandwidth {
    Bw5,
    Bw6,
    Bw7,
    Bw8,
    Bw10,
    Bw1_712,
    #[default]
    Auto,
}

impl Bandwidth {
    pub fn parse(token: &str) -> Option<Self> {
        match token {
            "5" => Some(Self::Bw5),
            "6" => Some(Self::Bw6),
            "7" => Some(Self::Bw7),
            "8" => Some(Self::Bw8),
            "10" => Some(Self::Bw10),
            "1.712" => Some(Self::Bw1_712),
            _ => None,
        }
    }

    /// Bandwidth in Hz, `None` for auto.
    pub fn hz(self) -> Option<u32> {
        match self {
            Self::Bw5 => Some(5_000_000),
            Self::Bw6 => Some(6_000_000),
            Self::Bw7 => Some(7_000_000),
            Self::Bw8 => Some(8_000_000),
            Self::Bw10 => Some(10_000_000),
            Self::Bw1_712 => Some(1_712_000),
            Self::Auto => None,
        }
    }
}

impl fmt::Display for Bandwidth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Bw5 => "5",
            Self::Bw6 => "6",
            Self::Bw7 => "7",
            Self::Bw8 => "8",
            Self::Bw10 => "10",
            Self::Bw1_712 => "1.712",
            Self::Auto => "auto",
        };
        write!(f, "{s}")
    }
}

/// OFDM transmission mode (`tmode=`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TransmissionMode {
    T1k,
    T2k,
    T4k,
    T8k,
    T16k,
    T32k,
    #[default]
    Auto,
}

impl TransmissionMode {
    pub fn parse(token: &str) -> Option<Self> {
        match token {
            "1k" => Some(Self::T1k),
            "2k" => Some(Self::T2k),
            "4k" => Some(Self::T4k),
            "8k" => Some(Self::T8k),
            "16k" => Some(Self::T16k),
            "32k" => Some(Self::T32k),
            _ => None,
        }
    }
}

impl fmt::Display for TransmissionMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::T1k => "1k",
            Self::T2k => "2k",
            Self::T4k => "4k",
            Self::T8k => "8k",
            Self::T16k => "16k",
            Self::T32k => "32k",
            Self::Auto => "auto",
        };
        write!(f, "{s}")
    }
}

/// OFDM guard interval (`gi=`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum GuardInterval {
    G14,
    G18,
    G116,
    G132,
    G1128,
    G19128,
    G19256,
    #[default]
    Auto,
}

impl GuardInterval {
    pub fn parse(token: &str) -> Option<Self> {
        match token {
            "14" => Some(Self::G14),
            "18" => Some(Self::G18),
            "116" => Some(Self::G116),
            "132" => Some(Self::G132),
            "1128" => Some(Self::G1128),
            "19128" => Some(Self::G19128),
            "19256" => Some(Self::G19256),
            _ => None,
        }
    }
}

impl fmt::Display for GuardInterval {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::G14 => "14",
            Self::G18 => "18",
            Self::G116 => "116",
            Self::G132 => "132",
            Self::G1128 => "1128",
            Self::G19128 => "19128",
            Self::G19256 => "19256",
            Self::Auto => "auto",
        };
        write!(f, "{s}")
    }
}

/// DVB-T hierarchy (`hier=` alpha value).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Hierarchy {
    None,
    H1,
    H2,
    H4,
    #[default]
    Auto,
}

impl Hierarchy {
    pub fn from_code(code: u32) -> Self {
        match code {
            0 => Self::None,
            1 => Self::H1,
            2 => Self::H2,
            4 => Self::H4,
            _ => Self::Auto,
        }
    }
}

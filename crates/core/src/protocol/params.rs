//! SAT>IP transport-parameter parsing.
//!
//! Tuning requests arrive as key=value pairs in the request URI query
//! (SAT>IP specification §3.5.11), e.g.
//!
//! ```text
//! rtsp://10.0.0.5/?src=1&freq=11362.50&pol=h&msys=dvbs2&sr=27500&fec=34&pids=0,17,512
//! rtsp://10.0.0.5/stream=3?addpids=513&delpids=512
//! ```
//!
//! Unknown values for enumerated parameters are logged and fall back to
//! auto rather than rejecting the request.

use crate::tuner::delivery::{
    Bandwidth, DeliverySystem, Fec, GuardInterval, Hierarchy, Modulation, Pilot, Polarization,
    RollOff, SpectralInversion, TransmissionMode,
};

/// One element of a `pids=`/`addpids=`/`delpids=` list.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PidSelection {
    /// The whole mux (`all`, or the wire sentinel 8192).
    All,
    /// A single PID, 0..=8191.
    Pid(u16),
}

/// All transport parameters found in one request URI.
///
/// Every field is optional; [`ChannelData::apply`](crate::tuner::channel::ChannelData::apply)
/// folds the present ones into the stream's channel state.
#[derive(Debug, Clone, Default)]
pub struct TransportParams {
    /// `freq=` in MHz, stored as kHz.
    pub freq_khz: Option<u32>,
    pub delivery_system: Option<DeliverySystem>,
    /// `sr=` in kSym/s as sent on the wire.
    pub symbol_rate_ksyms: Option<u32>,
    pub modulation: Option<Modulation>,
    pub fec: Option<Fec>,
    pub roll_off: Option<RollOff>,
    pub inversion: Option<SpectralInversion>,
    pub pilot: Option<Pilot>,
    /// `src=` DiSEqC source, 1-based.
    pub src: Option<u8>,
    pub polarization: Option<Polarization>,
    pub bandwidth: Option<Bandwidth>,
    pub transmission_mode: Option<TransmissionMode>,
    pub guard_interval: Option<GuardInterval>,
    pub hierarchy: Option<Hierarchy>,
    pub plp_id: Option<u8>,
    pub t2_system_id: Option<u16>,
    pub siso_miso: Option<u8>,
    pub c2_tft: Option<u8>,
    pub data_slice: Option<u8>,
    /// `pids=` replaces the whole demand set when present.
    pub pids: Option<Vec<PidSelection>>,
    pub add_pids: Vec<PidSelection>,
    pub del_pids: Vec<PidSelection>,
    /// `stream=<n>` path segment: server-assigned stream ID.
    pub stream_id: Option<u32>,
    /// `fe=<n>`: explicit 1-based frontend selection.
    pub fe: Option<usize>,
}

impl TransportParams {
    /// Parse every recognized key=value pair out of a request URI.
    pub fn from_uri(uri: &str) -> Self {
        let mut params = TransportParams::default();

        for part in uri.split(['?', '&', '/']) {
            let Some((key, value)) = part.split_once('=') else {
                continue;
            };
            match key {
                "freq" => match value.parse::<f64>() {
                    Ok(mhz) if mhz > 0.0 => params.freq_khz = Some((mhz * 1000.0).round() as u32),
                    _ => tracing::warn!(value, "invalid freq parameter"),
                },
                "msys" => match DeliverySystem::parse(value) {
                    Some(system) => params.delivery_system = Some(system),
                    None => tracing::warn!(value, "unknown msys parameter"),
                },
                "sr" => match value.parse() {
                    Ok(sr) => params.symbol_rate_ksyms = Some(sr),
                    Err(_) => tracing::warn!(value, "invalid sr parameter"),
                },
                "mtype" => match Modulation::parse(value) {
                    Some(modulation) => params.modulation = Some(modulation),
                    None => {
                        tracing::warn!(value, "unknown mtype parameter");
                        params.modulation = Some(Modulation::Auto);
                    }
                },
                "fec" => match value.parse() {
                    Ok(code) => params.fec = Some(Fec::from_code(code)),
                    Err(_) => tracing::warn!(value, "invalid fec parameter"),
                },
                "ro" => match RollOff::parse(value) {
                    Some(ro) => params.roll_off = Some(ro),
                    None => {
                        tracing::warn!(value, "unknown ro parameter");
                        params.roll_off = Some(RollOff::Auto);
                    }
                },
                "specinv" => match value.parse() {
                    Ok(code) => params.inversion = Some(SpectralInversion::from_code(code)),
                    Err(_) => tracing::warn!(value, "invalid specinv parameter"),
                },
                "plts" => match Pilot::parse(value) {
                    Some(plts) => params.pilot = Some(plts),
                    None => {
                        tracing::warn!(value, "unknown plts parameter");
                        params.pilot = Some(Pilot::Auto);
                    }
                },
                "src" => match value.parse() {
                    Ok(src @ 1..) => params.src = Some(src),
                    _ => tracing::warn!(value, "invalid src parameter"),
                },
                "pol" => match Polarization::parse(value) {
                    Some(pol) => params.polarization = Some(pol),
                    None => tracing::warn!(value, "unknown pol parameter"),
                },
                "bw" => match Bandwidth::parse(value) {
                    Some(bw) => params.bandwidth = Some(bw),
                    None => {
                        tracing::warn!(value, "unknown bw parameter");
                        params.bandwidth = Some(Bandwidth::Auto);
                    }
                },
                "tmode" => match TransmissionMode::parse(value) {
                    Some(tmode) => params.transmission_mode = Some(tmode),
                    None => {
                        tracing::warn!(value, "unknown tmode parameter");
                        params.transmission_mode = Some(TransmissionMode::Auto);
                    }
                },
                "gi" => match GuardInterval::parse(value) {
                    Some(gi) => params.guard_interval = Some(gi),
                    None => {
                        tracing::warn!(value, "unknown gi parameter");
                        params.guard_interval = Some(GuardInterval::Auto);
                    }
                },
                "hier" => match value.parse() {
                    Ok(code) => params.hierarchy = Some(Hierarchy::from_code(code)),
                    Err(_) => tracing::warn!(value, "invalid hier parameter"),
                },
                "plp" => match value.parse() {
                    Ok(plp) => params.plp_id = Some(plp),
                    Err(_) => tracing::warn!(value, "invalid plp parameter"),
                },
                "t2id" => match value.parse() {
                    Ok(t2id) => params.t2_system_id = Some(t2id),
                    Err(_) => tracing::warn!(value, "invalid t2id parameter"),
                },
                "sm" => match value.parse() {
                    Ok(sm) => params.siso_miso = Some(sm),
                    Err(_) => tracing::warn!(value, "invalid sm parameter"),
                },
                "c2tft" => match value.parse() {
                    Ok(c2tft) => params.c2_tft = Some(c2tft),
                    Err(_) => tracing::warn!(value, "invalid c2tft parameter"),
                },
                "ds" => match value.parse() {
                    Ok(ds) => params.data_slice = Some(ds),
                    Err(_) => tracing::warn!(value, "invalid ds parameter"),
                },
                "pids" => params.pids = Some(parse_pid_list(value)),
                "addpids" => params.add_pids = parse_pid_list(value),
                "delpids" => params.del_pids = parse_pid_list(value),
                "stream" => match value.parse() {
                    Ok(id) => params.stream_id = Some(id),
                    Err(_) => tracing::warn!(value, "invalid stream path segment"),
                },
                "fe" => match value.parse() {
                    Ok(fe @ 1..) => params.fe = Some(fe),
                    _ => tracing::warn!(value, "invalid fe parameter"),
                },
                _ => {}
            }
        }

        params
    }

    /// True when the request carries any tuning or PID demand, i.e. it
    /// needs a stream to work on.
    pub fn has_tuning_params(&self) -> bool {
        self.freq_khz.is_some()
            || self.delivery_system.is_some()
            || self.pids.is_some()
            || !self.add_pids.is_empty()
            || !self.del_pids.is_empty()
    }
}

fn parse_pid_list(value: &str) -> Vec<PidSelection> {
    let mut list = Vec::new();
    for token in value.split(',') {
        if token == "all" {
            list.push(PidSelection::All);
            continue;
        }
        match token.parse::<u16>() {
            Ok(8192) => list.push(PidSelection::All),
            Ok(pid) if pid <= 8191 => list.push(PidSelection::Pid(pid)),
            _ => tracing::warn!(token, "invalid pid in list"),
        }
    }
    list
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn full_dvbs2_query() {
        let uri = "rtsp://10.0.0.5:554/?src=1&freq=11362.50&pol=h&ro=0.35&msys=dvbs2\
                   &mtype=8psk&plts=on&sr=27500&fec=34&pids=0,17,512";
        let p = TransportParams::from_uri(uri);
        assert_eq!(p.freq_khz, Some(11_362_500));
        assert_eq!(p.polarization, Some(Polarization::Horizontal));
        assert_eq!(p.delivery_system, Some(DeliverySystem::DvbS2));
        assert_eq!(p.modulation, Some(Modulation::Psk8));
        assert_eq!(p.symbol_rate_ksyms, Some(27_500));
        assert_eq!(p.fec, Some(Fec::F34));
        assert_eq!(p.src, Some(1));
        assert_eq!(
            p.pids.as_deref(),
            Some(&[
                PidSelection::Pid(0),
                PidSelection::Pid(17),
                PidSelection::Pid(512)
            ][..])
        );
        assert!(p.has_tuning_params());
    }

    #[test]
    fn stream_path_with_pid_edit() {
        let p = TransportParams::from_uri("rtsp://10.0.0.5/stream=3?addpids=513&delpids=512");
        assert_eq!(p.stream_id, Some(3));
        assert_eq!(p.add_pids, vec![PidSelection::Pid(513)]);
        assert_eq!(p.del_pids, vec![PidSelection::Pid(512)]);
        assert!(p.has_tuning_params());
        assert!(p.freq_khz.is_none());
    }

    #[test]
    fn all_pids_spellings() {
        let p = TransportParams::from_uri("rtsp://host/?pids=all");
        assert_eq!(p.pids.as_deref(), Some(&[PidSelection::All][..]));

        let p = TransportParams::from_uri("rtsp://host/?pids=8192");
        assert_eq!(p.pids.as_deref(), Some(&[PidSelection::All][..]));
    }

    #[test]
    fn bare_uri_has_no_tuning_params() {
        let p = TransportParams::from_uri("rtsp://10.0.0.5:554/");
        assert!(!p.has_tuning_params());
        assert!(p.stream_id.is_none());
    }

    #[test]
    fn fe_selection_is_one_based() {
        let p = TransportParams::from_uri("rtsp://host/?fe=2&freq=514&msys=dvbt&bw=8");
        assert_eq!(p.fe, Some(2));
        assert_eq!(p.freq_khz, Some(514_000));
        assert_eq!(p.bandwidth, Some(Bandwidth::Bw8));

        let p = TransportParams::from_uri("rtsp://host/?fe=0");
        assert_eq!(p.fe, None);
    }

    #[test]
    fn unknown_enum_value_falls_back_to_auto() {
        let p = TransportParams::from_uri("rtsp://host/?mtype=1024qam&gi=77");
        assert_eq!(p.modulation, Some(Modulation::Auto));
        assert_eq!(p.guard_interval, Some(GuardInterval::Auto));
    }

    #[test]
    fn out_of_range_pid_skipped() {
        let p = TransportParams::from_uri("rtsp://host/?pids=0,9000,17");
        assert_eq!(
            p.pids.as_deref(),
            Some(&[PidSelection::Pid(0), PidSelection::Pid(17)][..])
        );
    }
}

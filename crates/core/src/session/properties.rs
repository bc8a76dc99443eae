//! Shared per-stream state: tuning data, RTP counters, signal monitor.

use rand::RngExt;

use crate::tuner::channel::ChannelData;
use crate::tuner::delivery::DeliverySystem;
use crate::tuner::device::SignalStatus;

/// Default DVR read buffer: 120 TS packets.
pub const DEFAULT_DVR_BUFFER_SIZE: usize = 188 * 120;

/// Everything the RTSP side and the worker threads share about one
/// stream. Always lives behind a `parking_lot::Mutex`; the RTP hot path
/// takes the lock only for counter updates.
#[derive(Debug)]
pub struct StreamProperties {
    /// Server-assigned stream ID, 0-based. The wire forms
    /// (`com.ses.streamID`, the `stream=` URI segment, the `tuner=`
    /// frontend ID) are all this value plus one.
    pub stream_id: u32,
    /// PLAY seen and workers running.
    pub stream_active: bool,
    /// RTP synchronization source, random per stream (RFC 3550 §8.1).
    pub ssrc: u32,
    /// Sender packet count since the stream started (RFC 3550 §6.4.1).
    pub spc: u32,
    /// Sender octet count (payload bytes only).
    pub soc: u32,
    /// RTP timestamp of the most recently sent packet.
    pub timestamp: u32,
    pub channel: ChannelData,
    /// Last frontend monitor sample, refreshed by the RTCP worker.
    pub monitor: SignalStatus,
    pub dvr_buffer_size: usize,
}

impl StreamProperties {
    pub fn new(stream_id: u32) -> Self {
        Self {
            stream_id,
            stream_active: false,
            ssrc: rand::rng().random::<u32>(),
            spc: 0,
            soc: 0,
            timestamp: 0,
            channel: ChannelData::default(),
            monitor: SignalStatus::default(),
            dvr_buffer_size: DEFAULT_DVR_BUFFER_SIZE,
        }
    }

    /// Account one sent RTP packet.
    pub fn add_rtp_sent(&mut self, payload_bytes: u32, timestamp: u32) {
        self.spc = self.spc.wrapping_add(1);
        self.soc = self.soc.wrapping_add(payload_bytes);
        self.timestamp = timestamp;
    }

    /// Reset the RTP counters for a fresh streaming run.
    pub fn reset_rtp_counters(&mut self) {
        self.spc = 0;
        self.soc = 0;
        self.timestamp = 0;
    }

    /// The SAT>IP stream attribute string used in the DESCRIBE
    /// `a=fmtp:33` line and as RTCP APP payload (SAT>IP spec §3.5.7).
    ///
    /// Version depends on the delivery family: `ver=1.0` for DVB-S/S2,
    /// `ver=1.1` for DVB-T/T2, `ver=1.2` for DVB-C/C2. A stream that has
    /// never been tuned describes itself as `NONE`.
    pub fn attribute_describe_string(&self) -> String {
        let Some(system) = self.channel.delivery_system.filter(|_| self.channel.is_configured())
        else {
            return "NONE".to_string();
        };

        let fe_id = self.stream_id + 1;
        let level = self.monitor.strength;
        let lock = u8::from(self.monitor.locked);
        let quality = self.monitor.snr;
        let freq_mhz = f64::from(self.channel.freq_khz) / 1000.0;
        let ch = &self.channel;

        if system.is_satellite() {
            let pol = ch.polarization.map(|p| p.to_string()).unwrap_or_default();
            format!(
                "ver=1.0;src={};tuner={},{},{},{},{:.2},{},{},{},{},{},{},{};pids={}",
                ch.src,
                fe_id,
                level,
                lock,
                quality,
                freq_mhz,
                pol,
                system,
                ch.modulation,
                ch.pilot,
                ch.roll_off,
                ch.symbol_rate / 1000,
                ch.fec,
                ch.pids.csv()
            )
        } else if system.is_terrestrial() {
            format!(
                "ver=1.1;tuner={},{},{},{},{:.2},{},{},{},{},{},{},{},{},{};pids={}",
                fe_id,
                level,
                lock,
                quality,
                freq_mhz,
                ch.bandwidth,
                system,
                ch.transmission_mode,
                ch.modulation,
                ch.guard_interval,
                ch.fec,
                ch.plp_id.map(u32::from).unwrap_or(0),
                ch.t2_system_id.map(u32::from).unwrap_or(0),
                ch.siso_miso.map(u32::from).unwrap_or(0),
                ch.pids.csv()
            )
        } else {
            format!(
                "ver=1.2;tuner={},{},{},{},{:.2},{},{},{},{},{},{},{},{};pids={}",
                fe_id,
                level,
                lock,
                quality,
                freq_mhz,
                ch.bandwidth,
                system,
                ch.modulation,
                ch.symbol_rate / 1000,
                ch.c2_tft.map(u32::from).unwrap_or(0),
                ch.data_slice.map(u32::from).unwrap_or(0),
                ch.plp_id.map(u32::from).unwrap_or(0),
                match ch.inversion {
                    crate::tuner::delivery::SpectralInversion::Off => 0,
                    crate::tuner::delivery::SpectralInversion::On => 1,
                    crate::tuner::delivery::SpectralInversion::Auto => 2,
                },
                ch.pids.csv()
            )
        }
    }

    /// Append this stream's status as XML elements (status page /
    /// config collaborator).
    pub fn add_to_xml(&self, xml: &mut String) {
        let system = self
            .channel
            .delivery_system
            .map(|s| s.to_string())
            .unwrap_or_else(|| "none".to_string());
        xml.push_str(&format!("<delsys>{system}</delsys>"));
        xml.push_str(&format!("<tunefreq>{}</tunefreq>", self.channel.freq_khz));
        xml.push_str(&format!("<symbolrate>{}</symbolrate>", self.channel.symbol_rate));
        xml.push_str(&format!("<status>{}</status>", u8::from(self.monitor.locked)));
        xml.push_str(&format!("<signal>{}</signal>", self.monitor.strength));
        xml.push_str(&format!("<snr>{}</snr>", self.monitor.snr));
        xml.push_str(&format!("<ber>{}</ber>", self.monitor.ber));
        xml.push_str(&format!("<unc>{}</unc>", self.monitor.uncorrected_blocks));
        xml.push_str(&format!("<pidcsv>{}</pidcsv>", self.channel.pids.csv()));
        xml.push_str(&format!(
            "<ccerrors>{}</ccerrors>",
            self.channel.pids.total_cc_errors()
        ));
        xml.push_str(&format!("<dvrbuffer>{}</dvrbuffer>", self.dvr_buffer_size));
    }

    /// Apply settings posted back from the config collaborator.
    /// Currently only the DVR buffer size is settable.
    pub fn from_xml(&mut self, xml: &str) {
        if let Some(value) = extract_element(xml, "dvrbuffer")
            && let Ok(size) = value.parse::<usize>()
            && size > 0
        {
            self.dvr_buffer_size = size;
        }
    }

    /// Delivery family of the configured channel, if any.
    pub fn delivery_system(&self) -> Option<DeliverySystem> {
        self.channel.delivery_system
    }
}

fn extract_element<'a>(xml: &'a str, name: &str) -> Option<&'a str> {
    let open = format!("<{name}>");
    let close = format!("</{name}>");
    let start = xml.find(&open)? + open.len();
    let end = xml[start..].find(&close)? + start;
    Some(&xml[start..end])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::params::TransportParams;

    fn tuned_dvbs2() -> StreamProperties {
        let mut props = StreamProperties::new(0);
        let params = TransportParams::from_uri(
            "rtsp://host/?src=1&freq=11362.50&pol=h&msys=dvbs2&mtype=8psk\
             &plts=on&ro=0.35&sr=27500&fec=34&pids=0,17,512",
        );
        props.channel.apply(&params);
        props.monitor = SignalStatus {
            locked: true,
            strength: 240,
            snr: 15,
            ber: 0,
            uncorrected_blocks: 0,
        };
        props
    }

    #[test]
    fn untuned_stream_describes_as_none() {
        let props = StreamProperties::new(0);
        assert_eq!(props.attribute_describe_string(), "NONE");
    }

    #[test]
    fn dvbs2_describe_string() {
        let props = tuned_dvbs2();
        let s = props.attribute_describe_string();
        assert_eq!(
            s,
            "ver=1.0;src=1;tuner=1,240,1,15,11362.50,h,dvbs2,8psk,on,0.35,27500,34;pids=0,17,512"
        );
    }

    #[test]
    fn dvbt_describe_string_is_ver_1_1() {
        let mut props = StreamProperties::new(1);
        let params =
            TransportParams::from_uri("rtsp://host/?freq=514&msys=dvbt&bw=8&tmode=8k&gi=14&fec=23");
        props.channel.apply(&params);
        let s = props.attribute_describe_string();
        assert!(s.starts_with("ver=1.1;tuner=2,"), "{s}");
        assert!(s.contains(",514.00,8,dvbt,8k,"), "{s}");
    }

    #[test]
    fn dvbc_describe_string_is_ver_1_2() {
        let mut props = StreamProperties::new(0);
        let params = TransportParams::from_uri("rtsp://host/?freq=314&msys=dvbc&sr=6900&mtype=256qam");
        props.channel.apply(&params);
        let s = props.attribute_describe_string();
        assert!(s.starts_with("ver=1.2;tuner=1,"), "{s}");
        assert!(s.contains(",dvbc,256qam,6900,"), "{s}");
    }

    #[test]
    fn rtp_counters_accumulate() {
        let mut props = StreamProperties::new(0);
        props.add_rtp_sent(1316, 90_000);
        props.add_rtp_sent(1316, 93_000);
        assert_eq!(props.spc, 2);
        assert_eq!(props.soc, 2632);
        assert_eq!(props.timestamp, 93_000);

        props.reset_rtp_counters();
        assert_eq!(props.spc, 0);
    }

    #[test]
    fn xml_round_trips_dvr_buffer() {
        let mut props = tuned_dvbs2();
        let mut xml = String::new();
        props.add_to_xml(&mut xml);
        assert!(xml.contains("<delsys>dvbs2</delsys>"));
        assert!(xml.contains(&format!("<dvrbuffer>{DEFAULT_DVR_BUFFER_SIZE}</dvrbuffer>")));

        props.from_xml("<data><dvrbuffer>37600</dvrbuffer></data>");
        assert_eq!(props.dvr_buffer_size, 37_600);

        // garbage leaves the old value
        props.from_xml("<data><dvrbuffer>zero</dvrbuffer></data>");
        assert_eq!(props.dvr_buffer_size, 37_600);
    }
}

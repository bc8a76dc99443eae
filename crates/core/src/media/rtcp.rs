//! RTCP sender report compounds (RFC 3550 §6).
//!
//! Every interval the RTCP worker sends one compound packet:
//! SR + SDES + APP. The APP packet (name `SES1`) carries the SAT>IP
//! stream attribute string, the same text DESCRIBE puts in the
//! `a=fmtp:33` line (SAT>IP spec §3.5.7).

use std::time::{SystemTime, UNIX_EPOCH};

const RTCP_SR: u8 = 200;
const RTCP_SDES: u8 = 202;
const RTCP_APP: u8 = 204;

/// Seconds between the NTP epoch (1900) and the Unix epoch (1970).
const NTP_UNIX_OFFSET: u64 = 2_208_988_800;

/// Build a 28-byte sender report (RFC 3550 §6.4.1, no report blocks).
pub fn sender_report(ssrc: u32, rtp_timestamp: u32, spc: u32, soc: u32) -> [u8; 28] {
    let (ntp_sec, ntp_frac) = ntp_now();

    let mut sr = [0u8; 28];
    sr[0] = 0x80;
    sr[1] = RTCP_SR;
    sr[2..4].copy_from_slice(&word_length(28).to_be_bytes());
    sr[4..8].copy_from_slice(&ssrc.to_be_bytes());
    sr[8..12].copy_from_slice(&ntp_sec.to_be_bytes());
    sr[12..16].copy_from_slice(&ntp_frac.to_be_bytes());
    sr[16..20].copy_from_slice(&rtp_timestamp.to_be_bytes());
    sr[20..24].copy_from_slice(&spc.to_be_bytes());
    sr[24..28].copy_from_slice(&soc.to_be_bytes());
    sr
}

/// Build a source description with a single CNAME item (RFC 3550 §6.5).
pub fn source_description(ssrc: u32, cname: &str) -> Vec<u8> {
    // header + ssrc + item type/len + text + END, padded to 32 bits
    let item_len = 2 + cname.len() + 1;
    let padded = (8 + item_len).div_ceil(4) * 4;

    let mut sdes = vec![0u8; padded];
    sdes[0] = 0x81; // one source chunk
    sdes[1] = RTCP_SDES;
    sdes[2..4].copy_from_slice(&word_length(padded).to_be_bytes());
    sdes[4..8].copy_from_slice(&ssrc.to_be_bytes());
    sdes[8] = 1; // CNAME
    sdes[9] = cname.len() as u8;
    sdes[10..10 + cname.len()].copy_from_slice(cname.as_bytes());
    // trailing END item and padding are already zero
    sdes
}

/// Build the SAT>IP `SES1` application packet (RFC 3550 §6.7) carrying
/// the stream attribute string.
pub fn app_packet(ssrc: u32, describe: &str) -> Vec<u8> {
    // header + ssrc + name + identifier/string-length + text, padded
    let padded = (16 + describe.len()).div_ceil(4) * 4;

    let mut app = vec![0u8; padded];
    app[0] = 0x80;
    app[1] = RTCP_APP;
    app[2..4].copy_from_slice(&word_length(padded).to_be_bytes());
    app[4..8].copy_from_slice(&ssrc.to_be_bytes());
    app[8..12].copy_from_slice(b"SES1");
    // bytes 12..14: identifier, always zero
    app[14..16].copy_from_slice(&(describe.len() as u16).to_be_bytes());
    app[16..16 + describe.len()].copy_from_slice(describe.as_bytes());
    app
}

/// Assemble the full SR + SDES + APP compound.
pub fn compound(
    ssrc: u32,
    rtp_timestamp: u32,
    spc: u32,
    soc: u32,
    cname: &str,
    describe: &str,
) -> Vec<u8> {
    let sr = sender_report(ssrc, rtp_timestamp, spc, soc);
    let sdes = source_description(ssrc, cname);
    let app = app_packet(ssrc, describe);

    let mut packet = Vec::with_capacity(sr.len() + sdes.len() + app.len());
    packet.extend_from_slice(&sr);
    packet.extend_from_slice(&sdes);
    packet.extend_from_slice(&app);
    packet
}

/// RTCP length field: packet length in 32-bit words minus one
/// (RFC 3550 §6.4.1).
fn word_length(bytes: usize) -> u16 {
    (bytes / 4 - 1) as u16
}

fn ntp_now() -> (u32, u32) {
    let now = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default();
    let sec = (now.as_secs() + NTP_UNIX_OFFSET) as u32;
    let frac = ((u64::from(now.subsec_nanos()) << 32) / 1_000_000_000) as u32;
    (sec, frac)
}

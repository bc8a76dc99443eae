//! RTP fixed header for MPEG-TS payloads.

/// RTP fixed header length (RFC 3550 §5.1).
pub const RTP_HEADER_LEN: usize = 12;

/// One MPEG transport stream packet.
pub const TS_PACKET_SIZE: usize = 188;

/// Static payload type for MPEG-2 transport streams (RFC 3551 §6).
pub const MP2T_PAYLOAD_TYPE: u8 = 33;

/// RTP fixed header state for one stream (RFC 3550 §5.1).
///
/// ```text
///  0                   1                   2                   3
///  0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1
/// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
/// |V=2|P|X|  CC   |M|     PT      |       Sequence Number         |
/// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
/// |                           Timestamp                           |
/// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
/// |                             SSRC                              |
/// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
/// ```
///
/// Payload type is always 33 (MP2T), marker is never set, and the
/// timestamp is the send-time wall clock at a 90 kHz rate
/// (RFC 2250 §2). Sequence and timestamp are finalized when the packet
/// is flushed, not when TS data is buffered into it.
#[derive(Debug)]
pub struct RtpHeader {
    pub ssrc: u32,
    sequence: u16,
}

impl RtpHeader {
    pub fn new(ssrc: u32) -> Self {
        Self { ssrc, sequence: 0 }
    }

    /// Current sequence number (the one the next [`write`](Self::write)
    /// will use).
    pub fn sequence(&self) -> u16 {
        self.sequence
    }

    /// Fill a 12-byte header in place and advance the sequence number.
    pub fn write(&mut self, header: &mut [u8], timestamp: u32) {
        header[0] = 2 << 6;
        header[1] = MP2T_PAYLOAD_TYPE;
        header[2..4].copy_from_slice(&self.sequence.to_be_bytes());
        header[4..8].copy_from_slice(&timestamp.to_be_bytes());
        header[8..12].copy_from_slice(&self.ssrc.to_be_bytes());
        self.sequence = self.sequence.wrapping_add(1);
    }
}

/// Map a wall-clock millisecond reading to the 90 kHz RTP clock.
pub fn wallclock_timestamp(millis: u64) -> u32 {
    (millis * 90) as u32
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn header_layout() {
        let mut h = RtpHeader::new(0xAABBCCDD);
        let mut buf = [0u8; RTP_HEADER_LEN];
        h.write(&mut buf, 90_000);

        assert_eq!(buf[0] >> 6, 2);
        assert_eq!(buf[1] & 0x80, 0, "marker never set for MP2T");
        assert_eq!(buf[1] & 0x7f, MP2T_PAYLOAD_TYPE);
        assert_eq!(u32::from_be_bytes([buf[4], buf[5], buf[6], buf[7]]), 90_000);
        assert_eq!(
            u32::from_be_bytes([buf[8], buf[9], buf[10], buf[11]]),
            0xAABBCCDD
        );
    }

    #[test]
    fn sequence_increments_and_wraps() {
        let mut h = RtpHeader::new(1);
        let mut buf = [0u8; RTP_HEADER_LEN];
        h.write(&mut buf, 0);
        assert_eq!(u16::from_be_bytes([buf[2], buf[3]]), 0);
        h.write(&mut buf, 0);
        assert_eq!(u16::from_be_bytes([buf[2], buf[3]]), 1);

        let mut h = RtpHeader::new(1);
        h.sequence = u16::MAX;
        h.write(&mut buf, 0);
        assert_eq!(u16::from_be_bytes([buf[2], buf[3]]), u16::MAX);
        assert_eq!(h.sequence(), 0);
    }

    #[test]
    fn timestamp_is_90khz() {
        assert_eq!(wallclock_timestamp(1000), 90_000);
        assert_eq!(wallclock_timestamp(0), 0);
        // u32 wrap is fine, clients difference timestamps
        assert_eq!(wallclock_timestamp(47_721_859), 47_721_859u64.wrapping_mul(90) as u32);
    }
}

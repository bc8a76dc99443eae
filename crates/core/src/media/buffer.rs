//! Fixed ring of RTP/MPEG-TS packet buffers.

use crate::media::rtp::{RTP_HEADER_LEN, TS_PACKET_SIZE};

/// Conventional Ethernet MTU; one RTP packet must fit.
pub const MTU: usize = 1500;

/// TS packets per RTP frame: largest multiple that fits the MTU
/// (12 + 7 * 188 = 1328 bytes).
pub const TS_PACKETS_PER_FRAME: usize = (MTU - RTP_HEADER_LEN) / TS_PACKET_SIZE;

/// Buffers in the ring between the DVR reader and the UDP sender.
pub const RING_SIZE: usize = 150;

/// One wire frame under construction: 12 header bytes followed by up to
/// seven TS packets. The header is filled in at send time.
#[derive(Debug, Clone)]
pub struct PacketBuffer {
    data: [u8; RTP_HEADER_LEN + TS_PACKETS_PER_FRAME * TS_PACKET_SIZE],
    write_pos: usize,
}

impl Default for PacketBuffer {
    fn default() -> Self {
        Self {
            data: [0; RTP_HEADER_LEN + TS_PACKETS_PER_FRAME * TS_PACKET_SIZE],
            write_pos: RTP_HEADER_LEN,
        }
    }
}

impl PacketBuffer {
    /// Space for the next TS packet, or `None` when the frame is full.
    pub fn write_slot(&mut self) -> Option<&mut [u8]> {
        if self.is_full() {
            return None;
        }
        Some(&mut self.data[self.write_pos..self.write_pos + TS_PACKET_SIZE])
    }

    /// Commit the TS packet written into the last
    /// [`write_slot`](Self::write_slot).
    pub fn commit(&mut self) {
        debug_assert!(!self.is_full());
        self.write_pos += TS_PACKET_SIZE;
    }

    pub fn is_full(&self) -> bool {
        self.write_pos >= self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.write_pos == RTP_HEADER_LEN
    }

    /// Number of TS payload bytes buffered so far.
    pub fn payload_len(&self) -> usize {
        self.write_pos - RTP_HEADER_LEN
    }

    /// The frame as built so far: header slot plus committed payload.
    pub fn frame(&self) -> &[u8] {
        &self.data[..self.write_pos]
    }

    /// Mutable access to the 12-byte header slot.
    pub fn header_mut(&mut self) -> &mut [u8] {
        &mut self.data[..RTP_HEADER_LEN]
    }

    pub fn reset(&mut self) {
        self.write_pos = RTP_HEADER_LEN;
    }
}

/// FIFO ring of [`RING_SIZE`] packet buffers.
///
/// The RTP worker fills the write head and drains completed frames in
/// order; when the ring is full the oldest unsent frame is flushed
/// before more data is buffered.
pub struct PacketRing {
    buffers: Vec<PacketBuffer>,
    write: usize,
    read: usize,
    filled: usize,
}

impl Default for PacketRing {
    fn default() -> Self {
        Self {
            buffers: vec![PacketBuffer::default(); RING_SIZE],
            write: 0,
            read: 0,
            filled: 0,
        }
    }
}

impl PacketRing {
    /// The buffer currently being filled.
    pub fn current(&mut self) -> &mut PacketBuffer {
        &mut self.buffers[self.write]
    }

    /// Rotate to the next buffer; the finished one becomes drainable.
    /// Returns `false` when the ring is completely full.
    pub fn advance(&mut self) -> bool {
        if self.filled == RING_SIZE - 1 {
            return false;
        }
        self.write = (self.write + 1) % RING_SIZE;
        self.filled += 1;
        true
    }

    /// Next finished frame to send, oldest first.
    pub fn drainable(&mut self) -> Option<&mut PacketBuffer> {
        if self.filled == 0 {
            return None;
        }
        Some(&mut self.buffers[self.read])
    }

    /// Release the frame returned by [`drainable`](Self::drainable).
    pub fn pop(&mut self) {
        if self.filled > 0 {
            self.buffers[self.read].reset();
            self.read = (self.read + 1) % RING_SIZE;
            self.filled -= 1;
        }
    }

    pub fn filled(&self) -> usize {
        self.filled
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn seven_ts_packets_per_frame() {
        assert_eq!(TS_PACKETS_PER_FRAME, 7);
    }

    #[test]
    fn buffer_fills_after_seven_packets() {
        let mut buf = PacketBuffer::default();
        assert!(buf.is_empty());
        for _ in 0..TS_PACKETS_PER_FRAME {
            let slot = buf.write_slot().unwrap();
            slot[0] = 0x47;
            buf.commit();
        }
        assert!(buf.is_full());
        assert!(buf.write_slot().is_none());
        assert_eq!(buf.payload_len(), 7 * TS_PACKET_SIZE);
        assert_eq!(buf.frame().len(), RTP_HEADER_LEN + 7 * TS_PACKET_SIZE);
    }

    #[test]
    fn reset_clears_payload() {
        let mut buf = PacketBuffer::default();
        buf.write_slot().unwrap()[0] = 0x47;
        buf.commit();
        buf.reset();
        assert!(buf.is_empty());
    }

    #[test]
    fn ring_drains_in_fifo_order() {
        let mut ring = PacketRing::default();
        ring.current().write_slot().unwrap()[0] = 1;
        ring.current().commit();
        assert!(ring.advance());

        ring.current().write_slot().unwrap()[0] = 2;
        ring.current().commit();
        assert!(ring.advance());

        assert_eq!(ring.filled(), 2);
        assert_eq!(ring.drainable().unwrap().frame()[RTP_HEADER_LEN], 1);
        ring.pop();
        assert_eq!(ring.drainable().unwrap().frame()[RTP_HEADER_LEN], 2);
        ring.pop();
        assert!(ring.drainable().is_none());
    }

    #[test]
    fn ring_reports_full() {
        let mut ring = PacketRing::default();
        for _ in 0..RING_SIZE - 1 {
            assert!(ring.advance());
        }
        assert!(!ring.advance());
    }
}

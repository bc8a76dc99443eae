//! Optional descrambling collaborator.

/// In-place TS packet descrambler (e.g. a softcam client).
///
/// The RTP worker calls [`decrypt`](Self::decrypt) for every TS packet
/// when a stream has a decrypter attached; implementations that need
/// key state per stream key it by `stream_id`.
pub trait Decrypt: Send + Sync {
    /// Descramble one 188-byte TS packet in place.
    fn decrypt(&self, stream_id: u32, packet: &mut [u8]);

    /// The stream is going away; drop any per-stream key state.
    fn stop_decrypt(&self, stream_id: u32);
}

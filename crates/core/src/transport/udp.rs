use std::net::{SocketAddr, UdpSocket};

use crate::error::Result;

/// UDP transport for outbound RTP/RTCP delivery.
///
/// Binds a single ephemeral socket (`0.0.0.0:0`). Each worker thread
/// owns its own instance: one for RTP data, one for RTCP reports.
///
/// This layer is deliberately address-only — it does not know about
/// streams or sessions. The stream resolves its client slot to socket
/// addresses before the workers start.
pub struct UdpTransport {
    socket: UdpSocket,
}

impl UdpTransport {
    /// Bind an ephemeral UDP socket.
    pub fn bind() -> Result<Self> {
        let socket = UdpSocket::bind("0.0.0.0:0")?;
        Ok(Self { socket })
    }

    /// Send raw bytes to a specific socket address.
    pub fn send_to(&self, payload: &[u8], addr: SocketAddr) -> Result<usize> {
        Ok(self.socket.send_to(payload, addr)?)
    }
}
